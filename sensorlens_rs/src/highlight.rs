//! Per-line highlights for one source file.
//!
//! A file node of the report carries nested [`SourceLocation`]s (functions,
//! methods, closures). [`LineHighlights`] walks them depth-first with an
//! explicit stack and yields one [`Highlight`] per measured location. The
//! weight of a highlight is its value relative to the hottest location of the
//! same file, so editors can scale decoration intensity.

use serde::Serialize;

use crate::format::{format_percentage, format_selection};
use crate::measurement::SensorValues;
use crate::representation::{DisplayMode, RepresentationCalculator, percentage};
use crate::source::{SourceLocation, SourceNode, normalize_path};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HighlightLocation {
    pub file: String,
    /// 1-based line.
    pub line: u32,
    pub column: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Highlight {
    pub location: HighlightLocation,
    pub identifier: String,
    /// e.g. `selfCPUTime: 120 µs (12.5 %)`
    pub message: String,
    /// `value / hottest value` in the file, within `0..=1`.
    pub weight: f64,
}

/// Depth-first iterator over the measured locations of one file.
///
/// Locations whose selected value is zero are skipped. Creating a new
/// iterator restarts the walk.
pub struct LineHighlights<'a> {
    file: String,
    calculator: &'a RepresentationCalculator,
    stack: Vec<&'a SourceLocation>,
    reference: Option<f64>,
    hottest: f64,
}

impl<'a> LineHighlights<'a> {
    pub fn new(
        file: &str,
        node: &'a SourceNode,
        calculator: &'a RepresentationCalculator,
    ) -> Self {
        let reference = match calculator.representation().mode {
            DisplayMode::Absolute => None,
            DisplayMode::LocallyRelative => Some(calculator.scalar(&node.aggregated_intern)),
            DisplayMode::TotallyRelative => Some(calculator.project_total()),
        };
        let hottest = max_value(&node.locations, calculator);
        Self {
            file: normalize_path(file),
            calculator,
            stack: node.locations.iter().rev().collect(),
            reference,
            hottest,
        }
    }

    /// Take the locally-relative reference from `values`, the file's node in
    /// the rendered tree, instead of the raw report values.
    pub fn with_file_values(mut self, values: &SensorValues) -> Self {
        if self.calculator.representation().mode == DisplayMode::LocallyRelative {
            self.reference = Some(self.calculator.scalar(values));
        }
        self
    }

    fn highlight(&self, location: &SourceLocation, value: f64) -> Highlight {
        let selection = self.calculator.representation().selection;
        let mut message = format!("{}: {}", selection, format_selection(value, selection));
        if let Some(total) = self.reference {
            message.push_str(&format!(" ({})", format_percentage(percentage(value, total))));
        }
        let weight = if self.hottest > 0.0 {
            (value / self.hottest).clamp(0.0, 1.0)
        } else {
            0.0
        };
        Highlight {
            location: HighlightLocation {
                file: self.file.clone(),
                line: location.line,
                column: location.column,
            },
            identifier: location.identifier.clone(),
            message,
            weight,
        }
    }
}

impl Iterator for LineHighlights<'_> {
    type Item = Highlight;

    fn next(&mut self) -> Option<Highlight> {
        while let Some(location) = self.stack.pop() {
            self.stack.extend(location.children.iter().rev());
            let value = self.calculator.scalar(&location.sensor_values);
            if value > 0.0 {
                return Some(self.highlight(location, value));
            }
        }
        None
    }
}

fn max_value(locations: &[SourceLocation], calculator: &RepresentationCalculator) -> f64 {
    let mut stack: Vec<&SourceLocation> = locations.iter().collect();
    let mut max = 0.0_f64;
    while let Some(location) = stack.pop() {
        max = max.max(calculator.scalar(&location.sensor_values));
        stack.extend(location.children.iter());
    }
    max
}
