//! The explicit context every front end works through.
//!
//! A [`LensSession`] owns the loaded report, the active filter and the active
//! representation. Any change runs a full pass (build, filter, recompute,
//! totals) and publishes a new [`RenderedTree`] only once the pass is done.
//! Rejected input leaves the previous state and tree untouched.

use once_cell::sync::OnceCell;
use serde::Serialize;

use crate::aggregate;
use crate::error::{LensError, Result};
use crate::filter::{FilterSpec, GlobFilter};
use crate::formula::validate_formula;
use crate::highlight::{Highlight, LineHighlights};
use crate::representation::{
    NodeLabel, Representation, RepresentationCalculator, Totals, ValueSelection,
};
use crate::source::Report;
use crate::tree::{DirectoryTree, NodeId, build_tree};

/// Result of one full pass.
///
/// Labels are computed per node on first request, so expanding a branch only
/// pays for the nodes it shows.
#[derive(Debug)]
pub struct RenderedTree {
    tree: DirectoryTree,
    totals: Totals,
    calculator: RepresentationCalculator,
    labels: Vec<OnceCell<NodeLabel>>,
}

/// A label with its computed subtree, for JSON output.
#[derive(Clone, Debug, Serialize)]
pub struct LabeledNode {
    #[serde(flatten)]
    pub label: NodeLabel,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<LabeledNode>,
}

impl RenderedTree {
    fn new(tree: DirectoryTree, totals: Totals, calculator: RepresentationCalculator) -> Self {
        let labels = (0..tree.len()).map(|_| OnceCell::new()).collect();
        Self {
            tree,
            totals,
            calculator,
            labels,
        }
    }

    pub fn tree(&self) -> &DirectoryTree {
        &self.tree
    }

    pub fn totals(&self) -> &Totals {
        &self.totals
    }

    pub fn calculator(&self) -> &RepresentationCalculator {
        &self.calculator
    }

    pub fn label(&self, id: NodeId) -> Result<&NodeLabel> {
        let cell = self
            .labels
            .get(id.0)
            .ok_or_else(|| LensError::UnknownNode(format!("#{}", id.0)))?;
        Ok(cell.get_or_init(|| self.calculator.label(&self.tree, id)))
    }

    pub fn root_labels(&self) -> Vec<NodeLabel> {
        self.tree
            .roots()
            .iter()
            .filter_map(|id| self.label(*id).ok().cloned())
            .collect()
    }

    /// Labels of the direct children of `id`.
    pub fn children_labels(&self, id: NodeId) -> Result<Vec<NodeLabel>> {
        let node = self
            .tree
            .get(id)
            .ok_or_else(|| LensError::UnknownNode(format!("#{}", id.0)))?;
        node.children
            .iter()
            .map(|child| self.label(*child).cloned())
            .collect()
    }

    pub fn find_by_path(&self, path: &str) -> Option<NodeId> {
        self.tree.find_by_path(path)
    }

    /// Labels of the whole forest, nested.
    pub fn snapshot(&self) -> Vec<LabeledNode> {
        self.tree
            .roots()
            .iter()
            .filter_map(|id| self.labeled(*id))
            .collect()
    }

    fn labeled(&self, id: NodeId) -> Option<LabeledNode> {
        let label = self.label(id).ok()?.clone();
        let children = self
            .tree
            .children(id)
            .iter()
            .filter_map(|child| self.labeled(*child))
            .collect();
        Some(LabeledNode { label, children })
    }
}

#[derive(Debug)]
pub struct LensSession {
    report: Option<Report>,
    filter: GlobFilter,
    representation: Representation,
    current: Option<RenderedTree>,
}

impl Default for LensSession {
    fn default() -> Self {
        Self::new()
    }
}

impl LensSession {
    pub fn new() -> Self {
        Self {
            report: None,
            filter: GlobFilter::pass_through(),
            representation: Representation::default(),
            current: None,
        }
    }

    /// Session with a report, filter and representation applied in one pass.
    pub fn with_settings(
        report: Report,
        filter: &FilterSpec,
        representation: Representation,
    ) -> Result<Self> {
        check_representation(&representation)?;
        let mut session = Self {
            report: Some(report),
            filter: GlobFilter::new(filter)?,
            representation,
            current: None,
        };
        session.rebuild()?;
        Ok(session)
    }

    pub fn report(&self) -> Option<&Report> {
        self.report.as_ref()
    }

    pub fn filter(&self) -> &FilterSpec {
        self.filter.spec()
    }

    pub fn representation(&self) -> &Representation {
        &self.representation
    }

    /// The last completed pass, if a report is loaded.
    pub fn rendered(&self) -> Option<&RenderedTree> {
        self.current.as_ref()
    }

    /// Replace the report and run a pass.
    pub fn set_report(&mut self, report: Report) -> Result<()> {
        let previous = self.report.replace(report);
        if let Err(e) = self.rebuild() {
            self.report = previous;
            return Err(e);
        }
        Ok(())
    }

    /// Replace the filter. Invalid globs keep the previous filter.
    pub fn set_filter(&mut self, spec: FilterSpec) -> Result<()> {
        let filter = match GlobFilter::new(&spec) {
            Ok(filter) => filter,
            Err(e) => {
                tracing::warn!("rejected filter: {}", e);
                return Err(e);
            }
        };
        let previous = std::mem::replace(&mut self.filter, filter);
        if let Err(e) = self.rebuild() {
            self.filter = previous;
            return Err(e);
        }
        Ok(())
    }

    /// Replace the representation. Invalid formulas keep the previous one.
    pub fn set_representation(&mut self, representation: Representation) -> Result<()> {
        if let Err(e) = check_representation(&representation) {
            tracing::warn!("rejected representation: {}", e);
            return Err(e);
        }
        let previous = std::mem::replace(&mut self.representation, representation);
        if let Err(e) = self.rebuild() {
            self.representation = previous;
            return Err(e);
        }
        Ok(())
    }

    /// Run a full pass and publish its result.
    pub fn rebuild(&mut self) -> Result<()> {
        let Some(report) = &self.report else {
            self.current = None;
            return Ok(());
        };

        let built = build_tree(&report.root, &report.module_names);
        let mut tree = self.filter.apply(&built);
        aggregate::recompute(&mut tree);
        let totals = Totals::from_tree(&tree);
        let calculator = RepresentationCalculator::new(&self.representation, &totals)?;

        tracing::debug!(
            "pass done: {} nodes, representation {} ({})",
            tree.len(),
            self.representation.selection,
            self.representation.mode
        );
        self.current = Some(RenderedTree::new(tree, totals, calculator));
        Ok(())
    }

    /// Highlights of one file under the active representation.
    pub fn highlights(&self, file: &str) -> Result<Vec<Highlight>> {
        let (Some(report), Some(rendered)) = (&self.report, &self.current) else {
            return Ok(Vec::new());
        };
        let node = report
            .root
            .find_file(file)
            .ok_or_else(|| LensError::UnknownNode(file.to_string()))?;
        let Some(id) = rendered.find_by_path(file) else {
            tracing::debug!("{} is filtered out, no highlights", file);
            return Ok(Vec::new());
        };
        let values = &rendered.tree().node(id).values;
        Ok(LineHighlights::new(file, node, rendered.calculator())
            .with_file_values(values)
            .collect())
    }
}

fn check_representation(representation: &Representation) -> Result<()> {
    if representation.selection == ValueSelection::CustomFormula {
        validate_formula(representation.formula.as_deref().unwrap_or(""))?;
    }
    Ok(())
}
