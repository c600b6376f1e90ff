//! # sensorlens
//!
//! **Performance and energy reports, laid out along your source tree.**
//!
//! A profiler report is a tree of measured code units: the project's own
//! directories and files (intern) and the dependency modules they call into
//! (extern). sensorlens turns it into a directory-shaped view, prunes it with
//! include/exclude globs, recomputes every directory as the sum of what
//! survived, and expresses each node as an absolute value, a share of its
//! parent or a share of the whole project. Any arithmetic formula over the
//! measurement fields can stand in for a single field.
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,no_run
//! use sensorlens::{DisplayMode, FilterSpec, LensSession, Report, Representation};
//! use std::path::Path;
//!
//! let report = Report::load(Path::new(".sensorlens/report.json")).unwrap();
//! let session = LensSession::with_settings(
//!     report,
//!     &FilterSpec::new(Some("src"), Some("**/*.test.ts")),
//!     Representation::formula("aggregatedCPUTime/profilerHits", DisplayMode::TotallyRelative),
//! )
//! .unwrap();
//!
//! if let Some(rendered) = session.rendered() {
//!     for label in rendered.root_labels() {
//!         println!("{} {}", label.path, label.description);
//!     }
//! }
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! lens tree --mode locally-relative       # Aggregated tree
//! lens tree --include src --json          # Filtered, machine-readable
//! lens highlights src/index.ts            # Per-line measurements
//! lens check-formula "selfCPUTime / profilerHits"
//! ```

// ============================================================================
// Model
// ============================================================================

/// Measurement fields, units and the per-node value vector.
pub mod measurement;

/// Report input: the intern/extern source tree and module names.
pub mod source;

/// Error types shared by every layer.
pub mod error;

// ============================================================================
// Engine
// ============================================================================

/// Arena directory tree built from a report.
pub mod tree;

/// Include/exclude glob pruning.
pub mod filter;

/// Sum-of-children recomputation after pruning.
pub mod aggregate;

/// Custom formula validation and evaluation.
pub mod formula;

/// Display modes and per-node labels.
pub mod representation;

/// Value and percentage formatting.
pub mod format;

/// Per-line highlights of one file.
pub mod highlight;

/// Full passes over a report and their published results.
pub mod session;

// ============================================================================
// Front end
// ============================================================================

/// `.sensorlens/config.toml` loading.
pub mod config;

/// `lens` argument parsing and dispatch.
pub mod cli;

/// Text and JSON output.
pub mod render;

/// Terminal colors.
pub mod colors;

/// Output options.
pub mod types;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::SensorLensConfig;
pub use error::{FormulaError, LensError, Result};
pub use filter::{FilterSpec, GlobFilter};
pub use formula::{calc_or_return_sensor_value, check_formula_validity, validate_formula};
pub use highlight::{Highlight, LineHighlights};
pub use measurement::{SensorField, SensorValues, Unit};
pub use representation::{DisplayMode, NodeLabel, Representation, ValueSelection};
pub use session::{LensSession, RenderedTree};
pub use source::{ModuleNameResolver, ModuleNames, Report, SourceNode};
pub use tree::{DirectoryTree, NodeId, build_tree};
