//! Text and JSON output of a rendered tree, highlights and the field table.

use serde_json::{Value, json};

use crate::colors::Painter;
use crate::highlight::Highlight;
use crate::measurement::SensorField;
use crate::representation::NodeLabel;
use crate::session::{LensSession, RenderedTree};
use crate::tree::{NodeId, NodeKind};

struct Line {
    label: String,
    plain_len: usize,
    description: String,
    weight: f64,
}

/// Draw the forest with box-drawing guides and a right-aligned value column.
pub fn render_tree(rendered: &RenderedTree, painter: Painter, max_depth: Option<usize>) -> String {
    let tree = rendered.tree();
    if tree.is_empty() {
        return "(no measurements match the current filter)\n".to_string();
    }

    let project_total = rendered.calculator().project_total();
    let mut lines = Vec::new();
    let mut prefix_parts = Vec::new();
    let roots = tree.roots();
    for (idx, root) in roots.iter().enumerate() {
        walk(
            rendered,
            *root,
            idx + 1 == roots.len(),
            &mut prefix_parts,
            max_depth,
            project_total,
            painter,
            &mut lines,
        );
    }

    let width = lines.iter().map(|l| l.plain_len).max().unwrap_or(0);
    let mut out = String::new();
    for line in &lines {
        let padding = " ".repeat(width - line.plain_len);
        out.push_str(&format!(
            "{}{}  {}\n",
            line.label,
            padding,
            painter.heat(&line.description, line.weight)
        ));
    }
    out
}

#[allow(clippy::too_many_arguments)]
fn walk(
    rendered: &RenderedTree,
    id: NodeId,
    is_last: bool,
    prefix_parts: &mut Vec<bool>,
    max_depth: Option<usize>,
    project_total: f64,
    painter: Painter,
    lines: &mut Vec<Line>,
) {
    let Ok(label) = rendered.label(id) else {
        return;
    };

    let mut prefix = String::new();
    for &has_more in prefix_parts.iter() {
        prefix.push_str(if has_more { "│   " } else { "    " });
    }
    let branch = if is_last { "└── " } else { "├── " };
    let name = display_name(label);
    let plain_len = prefix.chars().count() + branch.chars().count() + name.chars().count();
    let colored = match label.kind {
        NodeKind::Module => painter.module(&name),
        _ => painter.path(&name),
    };

    let value = rendered.calculator().scalar(&rendered.tree().node(id).values);
    let weight = if project_total > 0.0 {
        value / project_total
    } else {
        0.0
    };
    lines.push(Line {
        label: format!("{}{}", painter.dim(&format!("{}{}", prefix, branch)), colored),
        plain_len,
        description: label.description.clone(),
        weight,
    });

    if max_depth.is_some_and(|max| prefix_parts.len() + 1 >= max) {
        return;
    }
    let children = rendered.tree().children(id);
    prefix_parts.push(!is_last);
    for (idx, child) in children.iter().enumerate() {
        walk(
            rendered,
            *child,
            idx + 1 == children.len(),
            prefix_parts,
            max_depth,
            project_total,
            painter,
            lines,
        );
    }
    prefix_parts.pop();
}

fn display_name(label: &NodeLabel) -> String {
    if label.has_children {
        format!("{}/", label.name)
    } else {
        label.name.clone()
    }
}

/// JSON payload of `lens tree --json`.
pub fn tree_json(session: &LensSession) -> Value {
    let rendered = session.rendered();
    json!({
        "representation": session.representation(),
        "filter": session.filter(),
        "totals": rendered.map(|r| r.totals()),
        "projectTotal": rendered.map(|r| r.calculator().project_total()),
        "tree": rendered.map(|r| r.snapshot()).unwrap_or_default(),
    })
}

pub fn render_highlights(file: &str, highlights: &[Highlight], painter: Painter) -> String {
    if highlights.is_empty() {
        return format!("{}: no measured locations\n", file);
    }
    let mut out = format!("{}\n", painter.header(file));
    for h in highlights {
        out.push_str(&format!(
            "  {:>5}:{:<3} {:<24} {}\n",
            h.location.line,
            h.location.column,
            h.identifier,
            painter.heat(&h.message, h.weight)
        ));
    }
    out
}

/// The measurement field table.
pub fn render_fields(painter: Painter) -> String {
    let mut out = String::new();
    for field in SensorField::ALL {
        let descriptor = field.descriptor();
        out.push_str(&format!(
            "{:<34} {:<4} {}\n",
            painter.path(descriptor.name),
            descriptor.unit.symbol(),
            painter.dim(descriptor.label)
        ));
    }
    out
}

pub fn fields_json() -> Value {
    Value::Array(
        SensorField::ALL
            .iter()
            .map(|field| {
                let d = field.descriptor();
                json!({
                    "name": d.name,
                    "label": d.label,
                    "unit": d.unit.symbol(),
                    "isEnergy": d.is_energy,
                })
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterSpec;
    use crate::measurement::SensorValues;
    use crate::representation::{DisplayMode, Representation};
    use crate::source::{Report, SourceKind, SourceNode};
    use crate::types::ColorMode;

    fn session(mode: DisplayMode) -> LensSession {
        let hits = |n: f64| SensorValues {
            profiler_hits: n,
            ..Default::default()
        };
        let mut root = SourceNode::new(SourceKind::Root, "./")
            .with_intern_child(
                "src",
                SourceNode::new(SourceKind::Directory, "src")
                    .with_intern_child(
                        "a.ts",
                        SourceNode::new(SourceKind::File, "src/a.ts").with_values(hits(30.0)),
                    )
                    .with_intern_child(
                        "b.ts",
                        SourceNode::new(SourceKind::File, "src/b.ts").with_values(hits(50.0)),
                    ),
            )
            .with_extern_child(
                "dep",
                SourceNode::new(SourceKind::Module, "dep").with_values(hits(20.0)),
            );
        root.aggregated_extern = hits(20.0);
        LensSession::with_settings(
            Report {
                root,
                ..Default::default()
            },
            &FilterSpec::default(),
            Representation::field(SensorField::ProfilerHits, mode),
        )
        .expect("session")
    }

    fn plain() -> Painter {
        Painter::new(ColorMode::Never)
    }

    #[test]
    fn tree_uses_guides_and_aligned_values() {
        let session = session(DisplayMode::Absolute);
        let out = render_tree(session.rendered().expect("rendered"), plain(), None);
        let expected = "\
├── src/           80
│   ├── a.ts       30
│   └── b.ts       50
└── node_modules/  20
    └── dep        20
";
        assert_eq!(out, expected);
    }

    #[test]
    fn depth_limit_cuts_children() {
        let session = session(DisplayMode::TotallyRelative);
        let out = render_tree(session.rendered().expect("rendered"), plain(), Some(1));
        assert_eq!(out.lines().count(), 2);
        assert!(out.contains("80 %"));
    }

    #[test]
    fn json_payload_has_tree_and_totals() {
        let session = session(DisplayMode::LocallyRelative);
        let value = tree_json(&session);
        assert_eq!(value["representation"]["mode"], "locally-relative");
        assert_eq!(value["projectTotal"], 100.0);
        assert_eq!(value["tree"][0]["children"][1]["description"], "62.5 %");
    }

    #[test]
    fn field_table_lists_every_field() {
        let out = render_fields(plain());
        assert_eq!(out.lines().count(), SensorField::COUNT);
        assert!(out.contains("selfCPUEnergyConsumption"));
        assert_eq!(fields_json().as_array().map(Vec::len), Some(SensorField::COUNT));
    }

    #[test]
    fn empty_highlights_are_reported() {
        let out = render_highlights("src/a.ts", &[], plain());
        assert_eq!(out, "src/a.ts: no measured locations\n");
    }
}
