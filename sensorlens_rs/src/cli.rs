//! `lens` command line.
//!
//! Flags override `.sensorlens/config.toml`, which overrides the defaults.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::colors::Painter;
use crate::config::SensorLensConfig;
use crate::filter::FilterSpec;
use crate::formula::validate_formula;
use crate::render;
use crate::representation::{DisplayMode, Representation, ValueSelection};
use crate::session::LensSession;
use crate::source::Report;
use crate::types::{ColorMode, OutputMode};

#[derive(Parser, Debug)]
#[command(name = "lens")]
#[command(about = "Explore performance and energy reports along your source tree")]
#[command(version)]
pub struct Cli {
    /// Project root holding `.sensorlens/`
    #[arg(long, global = true, default_value = ".")]
    pub root: PathBuf,

    /// Report file (default: from config, then `.sensorlens/report.json`)
    #[arg(long, global = true)]
    pub report: Option<PathBuf>,

    #[arg(long, global = true, value_enum, default_value_t = ColorMode::Auto)]
    pub color: ColorMode,

    /// Machine-readable output
    #[arg(long, global = true)]
    pub json: bool,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the filtered, aggregated tree
    Tree {
        #[command(flatten)]
        view: ViewArgs,

        /// Maximum depth to print
        #[arg(long)]
        depth: Option<usize>,
    },
    /// Print per-line highlights of one file
    Highlights {
        /// Project-relative file path, e.g. `src/index.ts`
        file: String,

        #[command(flatten)]
        view: ViewArgs,
    },
    /// List the measurement fields usable in formulas
    Fields,
    /// Validate a custom formula
    CheckFormula { formula: String },
}

/// Representation and filter overrides.
#[derive(Args, Debug, Default, Clone)]
pub struct ViewArgs {
    /// Measurement field, or `customFormula`
    #[arg(long)]
    pub field: Option<ValueSelection>,

    /// absolute | locally-relative | totally-relative
    #[arg(long)]
    pub mode: Option<DisplayMode>,

    /// Custom formula; implies `--field customFormula`
    #[arg(long)]
    pub formula: Option<String>,

    /// Glob of paths to keep
    #[arg(long)]
    pub include: Option<String>,

    /// Glob of paths to drop; wins over --include
    #[arg(long)]
    pub exclude: Option<String>,
}

impl ViewArgs {
    /// Apply overrides on top of the configured representation and filter.
    pub fn resolve(&self, config: &SensorLensConfig) -> (Representation, FilterSpec) {
        let mut representation = config.representation.clone();
        if let Some(selection) = self.field {
            representation.selection = selection;
        }
        if let Some(mode) = self.mode {
            representation.mode = mode;
        }
        if let Some(formula) = &self.formula {
            representation.selection = ValueSelection::CustomFormula;
            representation.formula = Some(formula.clone());
        }

        let mut filter = config.filter.clone();
        if self.include.is_some() {
            filter.include = self.include.clone();
        }
        if self.exclude.is_some() {
            filter.exclude = self.exclude.clone();
        }
        (representation, filter)
    }
}

pub fn run(cli: &Cli) -> Result<ExitCode> {
    let painter = Painter::new(cli.color);
    let output = OutputMode::from_json_flag(cli.json);

    match &cli.command {
        Command::Fields => {
            match output {
                OutputMode::Json => {
                    println!("{}", serde_json::to_string_pretty(&render::fields_json())?)
                }
                OutputMode::Human => print!("{}", render::render_fields(painter)),
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::CheckFormula { formula } => check_formula(formula, output, painter),
        Command::Tree { view, depth } => {
            let session = open_session(cli, view)?;
            match output {
                OutputMode::Json => {
                    println!("{}", serde_json::to_string_pretty(&render::tree_json(&session))?)
                }
                OutputMode::Human => {
                    if let Some(rendered) = session.rendered() {
                        print!("{}", render::render_tree(rendered, painter, *depth));
                    }
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Highlights { file, view } => {
            let session = open_session(cli, view)?;
            let highlights = session
                .highlights(file)
                .with_context(|| format!("cannot highlight {}", file))?;
            match output {
                OutputMode::Json => println!("{}", serde_json::to_string_pretty(&highlights)?),
                OutputMode::Human => {
                    print!("{}", render::render_highlights(file, &highlights, painter))
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn check_formula(formula: &str, output: OutputMode, painter: Painter) -> Result<ExitCode> {
    let result = validate_formula(formula);
    match output {
        OutputMode::Json => {
            let payload = serde_json::json!({
                "formula": formula,
                "valid": result.is_ok(),
                "error": result.as_ref().err().map(ToString::to_string),
            });
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
        OutputMode::Human => match &result {
            Ok(()) => println!("{}", painter.status_ok(formula)),
            Err(e) => println!("{}", painter.status_error(&e.to_string())),
        },
    }
    Ok(if result.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn open_session(cli: &Cli, view: &ViewArgs) -> Result<LensSession> {
    let config = SensorLensConfig::load(&cli.root);
    let report_path = match &cli.report {
        Some(path) => path.clone(),
        None => config.report_path(&cli.root),
    };
    tracing::debug!("loading report {}", report_path.display());
    let report = Report::load(&report_path)?;

    let (representation, filter) = view.resolve(&config);
    LensSession::with_settings(report, &filter, representation)
        .context("cannot apply the requested view")
}
