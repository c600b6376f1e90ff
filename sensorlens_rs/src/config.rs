//! Configuration file support for sensorlens.
//!
//! Loads optional `.sensorlens/config.toml` from project root.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::filter::FilterSpec;
use crate::representation::Representation;

/// Directory holding the config file and, by default, the report.
pub const CONFIG_DIR: &str = ".sensorlens";

/// Root configuration structure
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SensorLensConfig {
    /// Report path, relative to the project root.
    pub report: Option<PathBuf>,
    pub filter: FilterSpec,
    pub representation: Representation,
}

impl SensorLensConfig {
    /// Load config from `.sensorlens/config.toml` in the given root directory.
    /// Returns default config if file doesn't exist or is invalid.
    pub fn load(root: &Path) -> Self {
        let config_path = root.join(CONFIG_DIR).join("config.toml");
        Self::load_from_path(&config_path)
    }

    /// Load config from a specific path.
    pub fn load_from_path(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("failed to parse {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("failed to read {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Report location under `root`: the configured path, or
    /// `.sensorlens/report.json`.
    pub fn report_path(&self, root: &Path) -> PathBuf {
        match &self.report {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => root.join(path),
            None => root.join(CONFIG_DIR).join("report.json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::SensorField;
    use crate::representation::{DisplayMode, ValueSelection};
    use std::io::Write;
    use tempfile::TempDir;

    fn write_config(temp: &TempDir, content: &str) {
        let dir = temp.path().join(CONFIG_DIR);
        std::fs::create_dir_all(&dir).expect("create .sensorlens");
        let mut file = std::fs::File::create(dir.join("config.toml")).expect("create config");
        writeln!(file, "{}", content).expect("write config");
    }

    #[test]
    fn test_default_config() {
        let config = SensorLensConfig::default();
        assert!(config.report.is_none());
        assert!(config.filter.is_empty());
        assert_eq!(
            config.representation.selection,
            ValueSelection::Field(SensorField::SelfCpuTime)
        );
        assert_eq!(config.representation.mode, DisplayMode::Absolute);
    }

    #[test]
    fn test_load_missing_file() {
        let temp = TempDir::new().expect("temp dir");
        let config = SensorLensConfig::load(temp.path());
        assert_eq!(config, SensorLensConfig::default());
        assert_eq!(
            config.report_path(temp.path()),
            temp.path().join(".sensorlens/report.json")
        );
    }

    #[test]
    fn test_load_valid_config() {
        let temp = TempDir::new().expect("temp dir");
        write_config(
            &temp,
            r#"
report = "out/profile.json"

[filter]
include = "src"
exclude = "**/*.test.ts"

[representation]
field = "customFormula"
mode = "locally-relative"
formula = "aggregatedCPUTime/profilerHits"
"#,
        );

        let config = SensorLensConfig::load(temp.path());
        assert_eq!(
            config.report_path(temp.path()),
            temp.path().join("out/profile.json")
        );
        assert_eq!(config.filter.include.as_deref(), Some("src"));
        assert_eq!(config.filter.exclude.as_deref(), Some("**/*.test.ts"));
        assert_eq!(config.representation.selection, ValueSelection::CustomFormula);
        assert_eq!(config.representation.mode, DisplayMode::LocallyRelative);
        assert_eq!(
            config.representation.formula.as_deref(),
            Some("aggregatedCPUTime/profilerHits")
        );
    }

    #[test]
    fn test_partial_representation_keeps_defaults() {
        let temp = TempDir::new().expect("temp dir");
        write_config(&temp, "[representation]\nmode = \"totally-relative\"\n");

        let config = SensorLensConfig::load(temp.path());
        assert_eq!(config.representation.mode, DisplayMode::TotallyRelative);
        assert_eq!(
            config.representation.selection,
            ValueSelection::Field(SensorField::SelfCpuTime)
        );
    }

    #[test]
    fn test_invalid_config_falls_back_to_default() {
        let temp = TempDir::new().expect("temp dir");
        write_config(&temp, "[representation]\nfield = \"noSuchField\"\n");
        assert_eq!(
            SensorLensConfig::load(temp.path()),
            SensorLensConfig::default()
        );
    }
}
