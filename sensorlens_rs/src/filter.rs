//! Include/exclude glob filtering of a directory tree.
//!
//! Patterns are compiled with `globset`; `*` and `**` both match across
//! `/`. An include pattern targets a directory's contents: `src` becomes
//! `src/*` and `src/` becomes `src/*`. A node matches a pattern when the
//! pattern matches its path or its path with a trailing `/`, so `src/*`
//! keeps the `src` directory itself.
//!
//! Exclusion wins: an excluded node is dropped with its whole subtree before
//! the include pattern is consulted. Filtering is a projection, applying the
//! same filter twice gives the same tree.

use globset::{GlobBuilder, GlobMatcher};
use serde::{Deserialize, Serialize};

use crate::error::{LensError, Result};
use crate::source::normalize_path;
use crate::tree::{DirectoryTree, NodeId};

/// User filter patterns. Empty strings count as absent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSpec {
    pub include: Option<String>,
    pub exclude: Option<String>,
}

impl FilterSpec {
    pub fn new(include: Option<&str>, exclude: Option<&str>) -> Self {
        Self {
            include: include.map(str::to_string),
            exclude: exclude.map(str::to_string),
        }
    }

    pub fn is_empty(&self) -> bool {
        non_blank(&self.include).is_none() && non_blank(&self.exclude).is_none()
    }
}

fn non_blank(pattern: &Option<String>) -> Option<&str> {
    pattern.as_deref().map(str::trim).filter(|p| !p.is_empty())
}

/// Append the directory-contents suffix to an include pattern.
pub fn normalize_include(pattern: &str) -> String {
    let pattern = normalize_path(pattern.trim());
    if pattern.ends_with("/*") {
        pattern
    } else if pattern.ends_with('/') {
        format!("{}*", pattern)
    } else {
        format!("{}/*", pattern)
    }
}

fn compile(pattern: &str) -> Result<GlobMatcher> {
    GlobBuilder::new(pattern)
        .literal_separator(false)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|e| LensError::InvalidGlob {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })
}

/// A compiled [`FilterSpec`].
#[derive(Clone, Debug)]
pub struct GlobFilter {
    spec: FilterSpec,
    include: Option<GlobMatcher>,
    exclude: Option<GlobMatcher>,
}

impl GlobFilter {
    pub fn new(spec: &FilterSpec) -> Result<Self> {
        let include = non_blank(&spec.include)
            .map(|p| compile(&normalize_include(p)))
            .transpose()?;
        let exclude = non_blank(&spec.exclude)
            .map(|p| compile(&normalize_path(p)))
            .transpose()?;
        Ok(Self {
            spec: spec.clone(),
            include,
            exclude,
        })
    }

    /// Filter that keeps everything.
    pub fn pass_through() -> Self {
        Self {
            spec: FilterSpec::default(),
            include: None,
            exclude: None,
        }
    }

    pub fn spec(&self) -> &FilterSpec {
        &self.spec
    }

    pub fn is_identity(&self) -> bool {
        self.include.is_none() && self.exclude.is_none()
    }

    fn matches(matcher: &GlobMatcher, path: &str) -> bool {
        let path = normalize_path(path);
        matcher.is_match(&path) || matcher.is_match(format!("{}/", path))
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        self.exclude
            .as_ref()
            .is_some_and(|m| Self::matches(m, path))
    }

    pub fn is_included(&self, path: &str) -> bool {
        self.include
            .as_ref()
            .is_none_or(|m| Self::matches(m, path))
    }

    /// Filter the whole forest into a new tree. Parent links and child order
    /// are preserved for surviving nodes.
    pub fn apply(&self, tree: &DirectoryTree) -> DirectoryTree {
        if self.is_identity() {
            return tree.clone();
        }
        let mut out = DirectoryTree::new();
        for root in tree.roots() {
            if let Some(kept) = self.filter_node(tree, *root)
                && kept.is_visible(tree)
            {
                copy_into(tree, &kept, None, &mut out);
            }
        }
        tracing::debug!(
            "filter include={:?} exclude={:?}: {} -> {} nodes",
            self.spec.include,
            self.spec.exclude,
            tree.len(),
            out.len()
        );
        out
    }

    /// Post-order filter of one subtree. `None` when the node is dropped.
    fn filter_node(&self, tree: &DirectoryTree, id: NodeId) -> Option<Pruned> {
        let node = tree.node(id);
        if self.is_excluded(&node.path) {
            return None;
        }

        let children: Vec<Pruned> = node
            .children
            .iter()
            .filter_map(|child| self.filter_node(tree, *child))
            .filter(|child| child.is_visible(tree))
            .collect();

        if self.is_included(&node.path) || !children.is_empty() {
            Some(Pruned { id, children })
        } else {
            None
        }
    }
}

/// Surviving node and its surviving children.
struct Pruned {
    id: NodeId,
    children: Vec<Pruned>,
}

impl Pruned {
    /// File and module nodes stand on their own, other nodes only with
    /// surviving children.
    fn is_visible(&self, tree: &DirectoryTree) -> bool {
        tree.node(self.id).kind.is_leaf_kind() || !self.children.is_empty()
    }
}

fn copy_into(
    source: &DirectoryTree,
    pruned: &Pruned,
    parent: Option<NodeId>,
    out: &mut DirectoryTree,
) {
    let node = source.node(pruned.id);
    let id = out.push(
        node.path.clone(),
        node.name.clone(),
        node.kind,
        node.values,
        parent,
    );
    out.node_mut(id).is_modules_namespace = node.is_modules_namespace;
    for child in &pruned.children {
        copy_into(source, child, Some(id), out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::SensorValues;
    use crate::tree::NodeKind;

    fn paths(tree: &DirectoryTree) -> Vec<String> {
        tree.preorder()
            .into_iter()
            .map(|id| tree.node(id).path.clone())
            .collect()
    }

    fn sample() -> DirectoryTree {
        let mut tree = DirectoryTree::new();
        let v = SensorValues::default();
        let src = tree.push("src", "src", NodeKind::Directory, v, None);
        tree.push("src/x.ts", "x.ts", NodeKind::File, v, Some(src));
        let util = tree.push("src/util", "util", NodeKind::Directory, v, Some(src));
        tree.push("src/util/x.test.ts", "x.test.ts", NodeKind::File, v, Some(util));
        tree.push("src/util/y.ts", "y.ts", NodeKind::File, v, Some(util));
        let lib = tree.push("lib", "lib", NodeKind::Directory, v, None);
        tree.push("lib/y.ts", "y.ts", NodeKind::File, v, Some(lib));
        let ns = tree.push("node_modules", "node_modules", NodeKind::Directory, v, None);
        tree.node_mut(ns).is_modules_namespace = true;
        tree.push("node_modules/dep", "dep", NodeKind::Module, v, Some(ns));
        tree
    }

    fn filter(include: Option<&str>, exclude: Option<&str>) -> GlobFilter {
        GlobFilter::new(&FilterSpec::new(include, exclude)).expect("valid globs")
    }

    #[test]
    fn include_pattern_normalization() {
        assert_eq!(normalize_include("src"), "src/*");
        assert_eq!(normalize_include("src/"), "src/*");
        assert_eq!(normalize_include("src/*"), "src/*");
        assert_eq!(normalize_include("./src"), "src/*");
    }

    #[test]
    fn include_keeps_matching_subtree_only() {
        let out = filter(Some("src"), None).apply(&sample());
        assert_eq!(
            paths(&out),
            vec!["src", "src/x.ts", "src/util", "src/util/x.test.ts", "src/util/y.ts"]
        );
    }

    #[test]
    fn include_single_file_pattern() {
        let mut tree = DirectoryTree::new();
        let v = SensorValues::default();
        let src = tree.push("src", "src", NodeKind::Directory, v, None);
        tree.push("src/x.ts", "x.ts", NodeKind::File, v, Some(src));
        let lib = tree.push("lib", "lib", NodeKind::Directory, v, None);
        tree.push("lib/y.ts", "y.ts", NodeKind::File, v, Some(lib));

        let out = filter(Some("src"), None).apply(&tree);
        assert_eq!(paths(&out), vec!["src", "src/x.ts"]);
    }

    #[test]
    fn exclude_drops_whole_subtree() {
        let out = filter(None, Some("src/util")).apply(&sample());
        assert!(!paths(&out).iter().any(|p| p.starts_with("src/util")));
        assert!(paths(&out).contains(&"src/x.ts".to_string()));
        assert!(paths(&out).contains(&"node_modules/dep".to_string()));
    }

    #[test]
    fn exclude_wins_over_include() {
        let out = filter(Some("src"), Some("**/*.test.ts")).apply(&sample());
        let kept = paths(&out);
        assert!(!kept.contains(&"src/util/x.test.ts".to_string()));
        assert!(kept.contains(&"src/util/y.ts".to_string()));

        let out = filter(Some("src"), Some("src")).apply(&sample());
        assert!(out.is_empty());
    }

    #[test]
    fn directories_without_survivors_are_dropped() {
        let out = filter(None, Some("src/util/*")).apply(&sample());
        let kept = paths(&out);
        assert!(!kept.contains(&"src/util".to_string()));
        assert!(kept.contains(&"src".to_string()));
    }

    #[test]
    fn empty_spec_is_identity() {
        let tree = sample();
        let f = GlobFilter::new(&FilterSpec::new(Some("  "), None)).expect("blank ok");
        assert!(f.is_identity());
        assert_eq!(f.apply(&tree), tree);
        assert_eq!(GlobFilter::pass_through().apply(&tree), tree);
    }

    #[test]
    fn filtering_is_idempotent() {
        let tree = sample();
        for (inc, exc) in [
            (Some("src"), None),
            (None, Some("**/*.test.ts")),
            (Some("src/util"), Some("src/util/y.ts")),
            (Some("node_modules"), None),
        ] {
            let f = filter(inc, exc);
            let once = f.apply(&tree);
            let twice = f.apply(&once);
            assert_eq!(once, twice, "include={inc:?} exclude={exc:?}");
        }
    }

    #[test]
    fn parent_links_survive_filtering() {
        let out = filter(Some("src/util"), None).apply(&sample());
        let y = out.find_by_path("src/util/y.ts").expect("y.ts kept");
        let util = out.parent(y).expect("util parent");
        assert_eq!(out.node(util).path, "src/util");
        let src = out.parent(util).expect("src parent");
        assert_eq!(out.node(src).path, "src");
        assert_eq!(out.parent(src), None);
    }

    #[test]
    fn modules_namespace_flag_is_kept() {
        let out = filter(Some("node_modules"), None).apply(&sample());
        assert!(out.modules_namespace().is_some());
        assert_eq!(paths(&out), vec!["node_modules", "node_modules/dep"]);
    }

    #[test]
    fn invalid_glob_is_reported() {
        let err = GlobFilter::new(&FilterSpec::new(Some("src/[abc"), None)).unwrap_err();
        assert!(matches!(err, LensError::InvalidGlob { .. }));
        assert!(err.is_user_input());
    }
}
