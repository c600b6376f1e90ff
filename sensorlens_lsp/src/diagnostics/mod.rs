//! Diagnostics generation for sensorlens LSP
//!
//! Publishes measured source locations as low-severity diagnostics so
//! editors without custom decorations still show them inline.

mod highlights;

pub use highlights::{highlight_diagnostics, severity_for_weight};

use tower_lsp::lsp_types::Diagnostic;

use crate::state::ReportState;

/// Collect all diagnostics for a project-relative file
pub async fn collect_diagnostics(state: &ReportState, file_path: &str) -> Vec<Diagnostic> {
    let highlights = state.highlights(file_path).await;
    highlight_diagnostics(&highlights)
}
