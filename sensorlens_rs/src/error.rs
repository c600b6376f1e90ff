//! Error types for sensorlens.
//!
//! User input problems (bad formulas, bad globs) are ordinary values the
//! caller reports and recovers from. [`FormulaError::Evaluation`] is the one
//! internal-invariant failure: a formula passed validation but could not be
//! evaluated.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Formula validation and evaluation failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    #[error("formula is empty")]
    Empty,

    #[error("formula uses unknown fields: {}", .0.join(", "))]
    UnknownTokens(Vec<String>),

    /// Validated formula failed to evaluate. Indicates the validator and
    /// evaluator disagree.
    #[error("internal error evaluating formula '{formula}': {reason}")]
    Evaluation { formula: String, reason: String },
}

#[derive(Debug, Error)]
pub enum LensError {
    #[error(transparent)]
    Formula(#[from] FormulaError),

    #[error("invalid glob '{pattern}': {reason}")]
    InvalidGlob { pattern: String, reason: String },

    #[error("unknown measurement field '{0}'")]
    UnknownField(String),

    #[error("no tree node at '{0}'")]
    UnknownNode(String),

    #[error("error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("error parsing {path:?}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

impl LensError {
    /// `true` for errors caused by user input that leave the previous view in place.
    pub fn is_user_input(&self) -> bool {
        matches!(
            self,
            LensError::Formula(FormulaError::Empty)
                | LensError::Formula(FormulaError::UnknownTokens(_))
                | LensError::InvalidGlob { .. }
                | LensError::UnknownField(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, LensError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_tokens_are_listed() {
        let err = FormulaError::UnknownTokens(vec!["foo".into(), "bar".into()]);
        assert_eq!(err.to_string(), "formula uses unknown fields: foo, bar");
    }

    #[test]
    fn evaluation_failure_is_not_user_input() {
        let err = LensError::from(FormulaError::Evaluation {
            formula: "(".into(),
            reason: "unexpected end".into(),
        });
        assert!(!err.is_user_input());
        assert!(LensError::from(FormulaError::Empty).is_user_input());
    }
}
