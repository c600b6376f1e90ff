//! Hover provider for sensorlens LSP
//!
//! Shows the measured locations of the hovered line and the file's own value.

use sensorlens::highlight::Highlight;
use sensorlens::representation::NodeLabel;
use tower_lsp::lsp_types::{Hover, HoverContents, MarkupContent, MarkupKind, Position};

/// Markdown hover for a 0-based position, `None` when the line has no
/// measured location.
pub fn hover_for_position(
    highlights: &[Highlight],
    position: Position,
    file_label: Option<&NodeLabel>,
) -> Option<Hover> {
    let target_line = position.line + 1;
    let on_line: Vec<&Highlight> = highlights
        .iter()
        .filter(|h| h.location.line == target_line)
        .collect();
    if on_line.is_empty() {
        return None;
    }

    let mut value = String::new();
    for h in on_line {
        value.push_str(&format!("**{}**: {}\n\n", h.identifier, h.message));
    }
    if let Some(label) = file_label {
        value.push_str(&format!("---\n\n`{}`: {}\n", label.path, label.description));
    }

    Some(Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value,
        }),
        range: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensorlens::highlight::HighlightLocation;

    fn highlight(line: u32, identifier: &str) -> Highlight {
        Highlight {
            location: HighlightLocation {
                file: "src/a.ts".into(),
                line,
                column: 1,
            },
            identifier: identifier.into(),
            message: "profilerHits: 3".into(),
            weight: 1.0,
        }
    }

    fn markdown(hover: Hover) -> String {
        match hover.contents {
            HoverContents::Markup(m) => m.value,
            other => panic!("unexpected hover contents: {:?}", other),
        }
    }

    #[test]
    fn hover_lists_locations_on_line() {
        let highlights = vec![highlight(2, "run"), highlight(2, "inner"), highlight(9, "other")];
        let text = markdown(
            hover_for_position(&highlights, Position::new(1, 4), None).expect("hover"),
        );
        assert!(text.contains("**run**: profilerHits: 3"));
        assert!(text.contains("**inner**"));
        assert!(!text.contains("other"));
    }

    #[test]
    fn no_hover_on_unmeasured_line() {
        let highlights = vec![highlight(2, "run")];
        assert!(hover_for_position(&highlights, Position::new(5, 0), None).is_none());
    }
}
