//! Input measurement tree.
//!
//! A report arrives as a tree of [`SourceNode`]s: intern children are the
//! project's own directories and files keyed by path segment, extern children
//! of the root are dependency modules keyed by module identifier. This crate
//! only reads the tree.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{LensError, Result};
use crate::measurement::SensorValues;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Root,
    #[default]
    Directory,
    File,
    Module,
}

/// A node of the report tree.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceNode {
    pub kind: SourceKind,
    /// Identifying path, informational only.
    pub path: String,
    /// Own aggregated intern measurements.
    pub aggregated_intern: SensorValues,
    /// Aggregated measurements spent in dependencies.
    pub aggregated_extern: SensorValues,
    #[serde(with = "ordered_children")]
    pub intern_children: Vec<(String, SourceNode)>,
    #[serde(with = "ordered_children")]
    pub extern_children: Vec<(String, SourceNode)>,
    /// Per-location measurements of a file, used for line highlighting.
    pub locations: Vec<SourceLocation>,
}

impl SourceNode {
    pub fn new(kind: SourceKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_values(mut self, values: SensorValues) -> Self {
        self.aggregated_intern = values;
        self
    }

    pub fn with_intern_child(mut self, segment: impl Into<String>, child: SourceNode) -> Self {
        self.intern_children.push((segment.into(), child));
        self
    }

    pub fn with_extern_child(mut self, module_id: impl Into<String>, child: SourceNode) -> Self {
        self.extern_children.push((module_id.into(), child));
        self
    }

    /// Find the file node for a project-relative path by walking intern
    /// children segment by segment.
    pub fn find_file(&self, path: &str) -> Option<&SourceNode> {
        let wanted = normalize_path(path);
        self.find_file_under("", &wanted)
    }

    fn find_file_under(&self, prefix: &str, wanted: &str) -> Option<&SourceNode> {
        for (segment, child) in &self.intern_children {
            let child_path = join_path(prefix, segment);
            if child_path == wanted {
                return Some(child);
            }
            if wanted.starts_with(&format!("{}/", child_path)) {
                if let Some(found) = child.find_file_under(&child_path, wanted) {
                    return Some(found);
                }
            }
        }
        None
    }
}

/// Measurements attributed to one source location (a function, method or
/// other code unit) inside a file. Locations nest.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceLocation {
    /// 1-based line.
    pub line: u32,
    pub column: u32,
    pub identifier: String,
    pub sensor_values: SensorValues,
    pub children: Vec<SourceLocation>,
}

/// Resolves dependency module identifiers (e.g. `lodash@4.17.21`) to their
/// readable package name.
pub trait ModuleNameResolver {
    fn readable_name(&self, module_id: &str) -> Option<String>;
}

/// Table-backed resolver read from a report's `moduleNames` section.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleNames(pub HashMap<String, String>);

impl ModuleNameResolver for ModuleNames {
    fn readable_name(&self, module_id: &str) -> Option<String> {
        self.0.get(module_id).cloned()
    }
}

/// Resolver that keeps identifiers as they are.
pub struct NoModuleNames;

impl ModuleNameResolver for NoModuleNames {
    fn readable_name(&self, _module_id: &str) -> Option<String> {
        None
    }
}

/// A loaded report: the measurement tree plus its module name table.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Report {
    pub root: SourceNode,
    pub module_names: ModuleNames,
}

impl Report {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| LensError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content).map_err(|e| LensError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn from_json(content: &str) -> serde_json::Result<Self> {
        serde_json::from_str(content)
    }
}

/// Strip a leading `./` (repeatedly) from a path.
pub fn normalize_path(path: &str) -> String {
    let mut rest = path;
    while let Some(stripped) = rest.strip_prefix("./") {
        rest = stripped;
    }
    rest.to_string()
}

pub(crate) fn join_path(prefix: &str, segment: &str) -> String {
    let segment = normalize_path(segment);
    let segment = segment.trim_end_matches('/');
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{}/{}", prefix, segment)
    }
}

/// Children maps keep their order of appearance in the report.
mod ordered_children {
    use super::*;
    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S>(
        children: &[(String, SourceNode)],
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(children.len()))?;
        for (key, node) in children {
            map.serialize_entry(key, node)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D>(
        deserializer: D,
    ) -> std::result::Result<Vec<(String, SourceNode)>, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ChildrenVisitor;

        impl<'de> Visitor<'de> for ChildrenVisitor {
            type Value = Vec<(String, SourceNode)>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of path segment to node")
            }

            fn visit_map<A>(self, mut access: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut out = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, node)) = access.next_entry::<String, SourceNode>()? {
                    out.push((key, node));
                }
                Ok(out)
            }
        }

        deserializer.deserialize_map(ChildrenVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::SensorField;

    const REPORT: &str = r#"{
        "root": {
            "kind": "root",
            "internChildren": {
                "./src": {
                    "kind": "directory",
                    "aggregatedIntern": {"profilerHits": 3},
                    "internChildren": {
                        "zeta.ts": {"kind": "file", "aggregatedIntern": {"profilerHits": 1}},
                        "alpha.ts": {"kind": "file", "aggregatedIntern": {"profilerHits": 2}}
                    }
                }
            },
            "externChildren": {
                "lodash@4.17.21": {"kind": "module", "aggregatedIntern": {"profilerHits": 5}}
            }
        },
        "moduleNames": {"lodash@4.17.21": "lodash"}
    }"#;

    #[test]
    fn children_keep_report_order() {
        let report = Report::from_json(REPORT).expect("parse report");
        let src = &report.root.intern_children[0].1;
        let names: Vec<&str> = src.intern_children.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["zeta.ts", "alpha.ts"]);
        assert_eq!(src.aggregated_intern.get(SensorField::ProfilerHits), 3.0);
    }

    #[test]
    fn module_names_resolve() {
        let report = Report::from_json(REPORT).expect("parse report");
        assert_eq!(
            report.module_names.readable_name("lodash@4.17.21"),
            Some("lodash".to_string())
        );
        assert_eq!(report.module_names.readable_name("react@18"), None);
        assert_eq!(NoModuleNames.readable_name("lodash@4.17.21"), None);
    }

    #[test]
    fn find_file_walks_segments() {
        let report = Report::from_json(REPORT).expect("parse report");
        let file = report.root.find_file("./src/alpha.ts").expect("file found");
        assert_eq!(file.kind, SourceKind::File);
        assert!(report.root.find_file("src/missing.ts").is_none());
    }

    #[test]
    fn load_reports_missing_file() {
        let tmp = tempfile::tempdir().expect("tmp dir");
        let err = Report::load(&tmp.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, LensError::Io { .. }));
    }

    #[test]
    fn normalize_strips_dot_slash() {
        assert_eq!(normalize_path("./././src/a.ts"), "src/a.ts");
        assert_eq!(join_path("", "./src"), "src");
        assert_eq!(join_path("src", "a.ts"), "src/a.ts");
    }
}
