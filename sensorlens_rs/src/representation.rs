//! What is shown for each node: a field (or a custom formula) in one of three
//! display modes.
//!
//! - **absolute**: the value itself with its unit.
//! - **locally-relative**: percentage of the enclosing scope. Nodes are
//!   compared with their parent; roots and direct children of the modules
//!   namespace are compared with the whole project (intern + modules).
//! - **totally-relative**: percentage of the whole project.
//!
//! Percentages are always finite; a zero denominator yields 0.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FormulaError;
use crate::format::{FormattedValue, format_percentage, format_selection};
use crate::formula::Formula;
use crate::measurement::{SensorField, SensorValues};
use crate::tree::{DirectoryTree, NodeId, NodeKind};

/// Sentinel selection name for custom formulas.
pub const CUSTOM_FORMULA: &str = "customFormula";

/// A measurement field or the custom formula sentinel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ValueSelection {
    Field(SensorField),
    CustomFormula,
}

impl FromStr for ValueSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == CUSTOM_FORMULA {
            Ok(ValueSelection::CustomFormula)
        } else {
            s.parse::<SensorField>().map(ValueSelection::Field)
        }
    }
}

impl TryFrom<String> for ValueSelection {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ValueSelection> for String {
    fn from(value: ValueSelection) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ValueSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueSelection::Field(field) => f.write_str(field.name()),
            ValueSelection::CustomFormula => f.write_str(CUSTOM_FORMULA),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayMode {
    #[default]
    Absolute,
    LocallyRelative,
    TotallyRelative,
}

impl FromStr for DisplayMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "absolute" => Ok(DisplayMode::Absolute),
            "locally-relative" | "local" => Ok(DisplayMode::LocallyRelative),
            "totally-relative" | "total" => Ok(DisplayMode::TotallyRelative),
            other => Err(format!(
                "unknown display mode '{}' (expected absolute, locally-relative or totally-relative)",
                other
            )),
        }
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DisplayMode::Absolute => "absolute",
            DisplayMode::LocallyRelative => "locally-relative",
            DisplayMode::TotallyRelative => "totally-relative",
        })
    }
}

/// The active selection. Immutable for a render pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Representation {
    #[serde(rename = "field")]
    pub selection: ValueSelection,
    pub mode: DisplayMode,
    pub formula: Option<String>,
}

impl Default for Representation {
    fn default() -> Self {
        Self::field(SensorField::SelfCpuTime, DisplayMode::Absolute)
    }
}

impl Representation {
    pub fn field(field: SensorField, mode: DisplayMode) -> Self {
        Self {
            selection: ValueSelection::Field(field),
            mode,
            formula: None,
        }
    }

    pub fn formula(formula: impl Into<String>, mode: DisplayMode) -> Self {
        Self {
            selection: ValueSelection::CustomFormula,
            mode,
            formula: Some(formula.into()),
        }
    }
}

/// Project-wide totals of a rendered tree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Totals {
    /// Sum of all intern roots.
    pub intern: SensorValues,
    /// Value of the modules namespace (zero without dependencies).
    pub modules: SensorValues,
}

impl Totals {
    pub fn from_tree(tree: &DirectoryTree) -> Self {
        let mut totals = Totals::default();
        for root in tree.roots() {
            let node = tree.node(*root);
            if node.is_modules_namespace {
                totals.modules.add_assign(&node.values);
            } else {
                totals.intern.add_assign(&node.values);
            }
        }
        totals
    }

    /// Intern plus modules.
    pub fn project(&self) -> SensorValues {
        SensorValues::sum([&self.intern, &self.modules])
    }
}

/// Value shown for one node.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct NodeValue {
    pub value: f64,
    /// Present in the relative modes.
    pub percentage: Option<f64>,
}

/// Everything the presentation layer needs to draw one node.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeLabel {
    pub id: NodeId,
    pub name: String,
    pub path: String,
    pub kind: NodeKind,
    pub has_children: bool,
    pub value: FormattedValue,
    pub percentage: Option<f64>,
    /// `"12 µs"` in absolute mode, `"25 %"` otherwise.
    pub description: String,
}

/// Turns node vectors into displayed values for one representation.
///
/// Holds the parsed formula and the project scalar so neither is recomputed
/// per node.
#[derive(Clone, Debug)]
pub struct RepresentationCalculator {
    representation: Representation,
    formula: Option<Formula>,
    project_total: f64,
}

impl RepresentationCalculator {
    pub fn new(representation: &Representation, totals: &Totals) -> Result<Self, FormulaError> {
        let formula = match representation.selection {
            ValueSelection::CustomFormula => Some(Formula::parse(
                representation.formula.as_deref().unwrap_or(""),
            )?),
            ValueSelection::Field(_) => None,
        };
        let mut calculator = Self {
            representation: representation.clone(),
            formula,
            project_total: 0.0,
        };
        calculator.project_total = calculator.scalar(&totals.project());
        Ok(calculator)
    }

    pub fn representation(&self) -> &Representation {
        &self.representation
    }

    /// Raw field value, or the formula evaluated over `values`.
    pub fn scalar(&self, values: &SensorValues) -> f64 {
        match (&self.representation.selection, &self.formula) {
            (ValueSelection::Field(field), _) => values.get(*field),
            (ValueSelection::CustomFormula, Some(formula)) => formula.eval(values),
            (ValueSelection::CustomFormula, None) => 0.0,
        }
    }

    /// The project scalar used as the totally-relative denominator.
    pub fn project_total(&self) -> f64 {
        self.project_total
    }

    /// Denominator for the locally-relative mode.
    pub fn local_total(&self, tree: &DirectoryTree, id: NodeId) -> f64 {
        match tree.parent(id) {
            Some(parent) if !tree.node(parent).is_modules_namespace => {
                self.scalar(&tree.node(parent).values)
            }
            _ => self.project_total,
        }
    }

    pub fn node_value(&self, tree: &DirectoryTree, id: NodeId) -> NodeValue {
        let value = self.scalar(&tree.node(id).values);
        let percentage = match self.representation.mode {
            DisplayMode::Absolute => None,
            DisplayMode::LocallyRelative => Some(percentage(value, self.local_total(tree, id))),
            DisplayMode::TotallyRelative => Some(percentage(value, self.project_total)),
        };
        NodeValue { value, percentage }
    }

    pub fn label(&self, tree: &DirectoryTree, id: NodeId) -> NodeLabel {
        let node = tree.node(id);
        let NodeValue { value, percentage } = self.node_value(tree, id);
        let formatted = format_selection(value, self.representation.selection);
        let description = match percentage {
            Some(p) => format_percentage(p),
            None => formatted.to_string(),
        };
        NodeLabel {
            id,
            name: node.name.clone(),
            path: node.path.clone(),
            kind: node.kind,
            has_children: !node.children.is_empty(),
            value: formatted,
            percentage,
            description,
        }
    }
}

/// `value / total` as a percentage; 0 when the result is not finite.
pub fn percentage(value: f64, total: f64) -> f64 {
    if total == 0.0 {
        return 0.0;
    }
    let p = value / total * 100.0;
    if p.is_finite() { p } else { 0.0 }
}
