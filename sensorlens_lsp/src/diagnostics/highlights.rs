//! Highlight diagnostics
//!
//! Converts line highlights to LSP diagnostics.

use sensorlens::highlight::Highlight;
use tower_lsp::lsp_types::{Diagnostic, DiagnosticSeverity, NumberOrString, Position, Range};

pub const DIAGNOSTIC_CODE: &str = "sensor-value";
pub const DIAGNOSTIC_SOURCE: &str = "sensorlens";

/// Hot spots warn, warm ones inform, the rest are hints.
pub fn severity_for_weight(weight: f64) -> DiagnosticSeverity {
    if weight >= 0.75 {
        DiagnosticSeverity::WARNING
    } else if weight >= 0.25 {
        DiagnosticSeverity::INFORMATION
    } else {
        DiagnosticSeverity::HINT
    }
}

pub fn highlight_diagnostics(highlights: &[Highlight]) -> Vec<Diagnostic> {
    highlights
        .iter()
        .map(|h| {
            // Line numbers in LSP are 0-indexed
            let line = h.location.line.saturating_sub(1);
            let character = h.location.column.saturating_sub(1);

            Diagnostic {
                range: Range {
                    start: Position { line, character },
                    end: Position {
                        line,
                        character: character + h.identifier.chars().count().max(1) as u32,
                    },
                },
                severity: Some(severity_for_weight(h.weight)),
                code: Some(NumberOrString::String(DIAGNOSTIC_CODE.to_string())),
                code_description: None,
                source: Some(DIAGNOSTIC_SOURCE.to_string()),
                message: format!("{} {}", h.identifier, h.message),
                related_information: None,
                tags: None,
                data: serde_json::to_value(h.weight).ok(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensorlens::highlight::HighlightLocation;

    fn highlight(line: u32, column: u32, weight: f64) -> Highlight {
        Highlight {
            location: HighlightLocation {
                file: "src/a.ts".into(),
                line,
                column,
            },
            identifier: "parse".into(),
            message: "selfCPUTime: 120 µs".into(),
            weight,
        }
    }

    #[test]
    fn maps_position_to_zero_based_range() {
        let diags = highlight_diagnostics(&[highlight(7, 5, 1.0)]);
        assert_eq!(diags.len(), 1);
        let d = &diags[0];
        assert_eq!(d.range.start, Position::new(6, 4));
        assert_eq!(d.range.end, Position::new(6, 9));
        assert_eq!(d.message, "parse selfCPUTime: 120 µs");
        assert_eq!(
            d.code,
            Some(NumberOrString::String("sensor-value".to_string()))
        );
        assert_eq!(d.source.as_deref(), Some("sensorlens"));
    }

    #[test]
    fn severity_follows_weight() {
        assert_eq!(severity_for_weight(0.9), DiagnosticSeverity::WARNING);
        assert_eq!(severity_for_weight(0.5), DiagnosticSeverity::INFORMATION);
        assert_eq!(severity_for_weight(0.1), DiagnosticSeverity::HINT);
    }

    #[test]
    fn line_zero_does_not_underflow() {
        let diags = highlight_diagnostics(&[highlight(0, 0, 0.0)]);
        assert_eq!(diags[0].range.start, Position::new(0, 0));
        assert_eq!(diags[0].severity, Some(DiagnosticSeverity::HINT));
    }
}
