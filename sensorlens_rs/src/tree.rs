//! Directory-shaped view of a report.
//!
//! The report's intern children become directories and files, its extern
//! children are nested under one synthetic `node_modules` directory. Nodes
//! live in an arena ([`DirectoryTree`]) and know their parent index, so walks
//! in either direction are O(depth).
//!
//! Trees are rebuilt from scratch on every pass and never patched.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::measurement::SensorValues;
use crate::source::{ModuleNameResolver, SourceKind, SourceNode, join_path};

/// Path of the synthetic modules namespace directory.
pub const MODULES_NAMESPACE: &str = "node_modules";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Root,
    Directory,
    File,
    Module,
}

impl NodeKind {
    /// Kinds that are measured units on their own and survive filtering
    /// without children.
    pub fn is_leaf_kind(self) -> bool {
        matches!(self, NodeKind::File | NodeKind::Module)
    }
}

impl From<SourceKind> for NodeKind {
    fn from(kind: SourceKind) -> Self {
        match kind {
            SourceKind::Root => NodeKind::Root,
            SourceKind::Directory => NodeKind::Directory,
            SourceKind::File => NodeKind::File,
            SourceKind::Module => NodeKind::Module,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DirectoryNode {
    /// Normalized path, no leading `./`.
    pub path: String,
    /// Display name: the path segment, or the readable package name for modules.
    pub name: String,
    pub kind: NodeKind,
    pub values: SensorValues,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
    pub is_modules_namespace: bool,
}

/// Arena forest of [`DirectoryNode`]s.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DirectoryTree {
    nodes: Vec<DirectoryNode>,
    roots: Vec<NodeId>,
}

impl DirectoryTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node. With a parent it becomes that parent's last child,
    /// otherwise a new root.
    pub fn push(
        &mut self,
        path: impl Into<String>,
        name: impl Into<String>,
        kind: NodeKind,
        values: SensorValues,
        parent: Option<NodeId>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(DirectoryNode {
            path: path.into(),
            name: name.into(),
            kind,
            values,
            children: Vec::new(),
            parent,
            is_modules_namespace: false,
        });
        match parent {
            Some(parent_id) => self.nodes[parent_id.0].children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn node(&self, id: NodeId) -> &DirectoryNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut DirectoryNode {
        &mut self.nodes[id.0]
    }

    pub fn get(&self, id: NodeId) -> Option<&DirectoryNode> {
        self.nodes.get(id.0)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.nodes[id.0].children.is_empty()
    }

    /// Exact path lookup.
    pub fn find_by_path(&self, path: &str) -> Option<NodeId> {
        let wanted = crate::source::normalize_path(path);
        self.nodes
            .iter()
            .position(|n| n.path == wanted)
            .map(NodeId)
    }

    /// The synthetic modules namespace root, if the report has dependencies.
    pub fn modules_namespace(&self) -> Option<NodeId> {
        self.roots
            .iter()
            .copied()
            .find(|id| self.node(*id).is_modules_namespace)
    }

    /// Pre-order walk of the forest, roots in order.
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    /// Nodes without children.
    pub fn leaves(&self) -> Vec<NodeId> {
        self.preorder()
            .into_iter()
            .filter(|id| self.is_leaf(*id))
            .collect()
    }

    /// Number of edges between `id` and its root.
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = self.parent(id);
        while let Some(parent) = current {
            depth += 1;
            current = self.parent(parent);
        }
        depth
    }
}

/// Build the directory view of a report root.
///
/// The root itself contributes no node: its intern children and the modules
/// namespace are the roots of the forest.
///
/// Paths are unique in the result. A module whose readable name is already
/// taken under the namespace falls back to its identifier, and any remaining
/// clash (an intern `node_modules` directory, say) gets a `~N` suffix.
pub fn build_tree(root: &SourceNode, modules: &dyn ModuleNameResolver) -> DirectoryTree {
    let mut builder = TreeBuilder {
        tree: DirectoryTree::new(),
        taken: HashSet::new(),
    };

    for (segment, child) in &root.intern_children {
        builder.visit(child, None, segment, None);
    }

    if !root.extern_children.is_empty() {
        let namespace = builder.insert(
            None,
            MODULES_NAMESPACE,
            MODULES_NAMESPACE,
            NodeKind::Directory,
            root.aggregated_extern,
        );
        builder.tree.node_mut(namespace).is_modules_namespace = true;
        let namespace_path = builder.tree.node(namespace).path.clone();

        for (module_id, module) in &root.extern_children {
            let segment = match modules.readable_name(module_id) {
                Some(name) if !builder.taken.contains(&join_path(&namespace_path, &name)) => name,
                Some(name) => {
                    tracing::debug!("module name '{}' is shared, using '{}'", name, module_id);
                    module_id.clone()
                }
                None => module_id.clone(),
            };
            builder.visit(module, Some(namespace), &segment, Some(NodeKind::Module));
        }
    }

    tracing::debug!(
        "built directory tree: {} nodes, {} roots",
        builder.tree.len(),
        builder.tree.roots().len()
    );
    builder.tree
}

struct TreeBuilder {
    tree: DirectoryTree,
    taken: HashSet<String>,
}

impl TreeBuilder {
    fn visit(
        &mut self,
        node: &SourceNode,
        parent: Option<NodeId>,
        segment: &str,
        kind_override: Option<NodeKind>,
    ) {
        let parent_path = parent.map_or("", |p| self.tree.node(p).path.as_str());
        let path = join_path(parent_path, segment);
        let name = segment.trim_start_matches("./").trim_end_matches('/');
        let kind = kind_override.unwrap_or_else(|| node.kind.into());
        let id = self.insert(parent, &path, name, kind, node.aggregated_intern);

        for (child_segment, child) in &node.intern_children {
            self.visit(child, Some(id), child_segment, None);
        }
    }

    /// Create a node under `parent`, or a new root. The stored path is
    /// `path`, suffixed when an earlier node already owns it.
    fn insert(
        &mut self,
        parent: Option<NodeId>,
        path: &str,
        name: &str,
        kind: NodeKind,
        values: SensorValues,
    ) -> NodeId {
        let mut unique = path.to_string();
        let mut n = 2;
        while self.taken.contains(&unique) {
            unique = format!("{}~{}", path, n);
            n += 1;
        }
        self.taken.insert(unique.clone());
        self.tree.push(unique, name, kind, values, parent)
    }
}
