//! `qgen.toml` project file: types, loading and validation.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the project file looked up by default.
pub const PROJECT_FILE: &str = "qgen.toml";

/// Errors that can occur when loading a project file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read project file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse project file: {0}")]
    ParseError(String),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Root of the project file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProjectFile {
    pub project: ProjectSection,
    pub qgen: QGenSection,
}

/// Generic project layout and build settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProjectSection {
    /// Directories scanned (recursively) for sources, relative to the project file.
    pub source_dirs: Vec<String>,
    pub object_dir: String,
    /// Main units that can be built and debugged.
    pub main: Vec<String>,
    /// Build command; the main unit is appended.
    pub build: Vec<String>,
    pub debugger: String,
}

impl Default for ProjectSection {
    fn default() -> Self {
        Self {
            source_dirs: vec![".".to_string()],
            object_dir: "obj".to_string(),
            main: Vec::new(),
            build: vec!["gprbuild".to_string()],
            debugger: "gdb".to_string(),
        }
    }
}

/// Code generator settings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct QGenSection {
    /// Where generated code and mapping files go. Defaults to the object dir.
    pub output_dir: Option<String>,
    /// Switches keyed by model file name (`"ctrl.mdl"`) or by the language
    /// key `"simulink"` for the project-wide default.
    pub switches: IndexMap<String, String>,
    /// Explicit path to `qgenc`, bypassing the `PATH` lookup.
    pub generator: Option<String>,
}

/// Reads and validates a project file.
pub fn load_config(path: &Path) -> Result<ProjectFile, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Parses and validates a project file from a string.
pub fn load_config_from_str(content: &str) -> Result<ProjectFile, ConfigError> {
    let config: ProjectFile =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &ProjectFile) -> Result<(), ConfigError> {
    if config.project.object_dir.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "project.object_dir must not be empty".to_string(),
        ));
    }
    if config.project.build.is_empty() {
        return Err(ConfigError::ValidationError(
            "project.build must name a program".to_string(),
        ));
    }
    for (key, switches) in &config.qgen.switches {
        if shlex::split(switches).is_none() {
            return Err(ConfigError::ValidationError(format!(
                "qgen.switches.{key}: unbalanced quotes in `{switches}`"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_empty_uses_defaults() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.project.source_dirs, vec!["."]);
        assert_eq!(config.project.object_dir, "obj");
        assert_eq!(config.project.build, vec!["gprbuild"]);
        assert!(config.qgen.output_dir.is_none());
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[project]
source_dirs = ["src", "generated"]
object_dir = "build"
main = ["main.adb"]
build = ["gprbuild", "-P", "default.gpr"]

[qgen]
output_dir = "generated"

[qgen.switches]
simulink = "-l c"
"ctrl.mdl" = "-t 'my types.txt'"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.project.source_dirs, vec!["src", "generated"]);
        assert_eq!(config.qgen.output_dir.as_deref(), Some("generated"));
        assert_eq!(config.qgen.switches["ctrl.mdl"], "-t 'my types.txt'");
        assert_eq!(config.project.debugger, "gdb");
    }

    #[test]
    fn reject_unbalanced_switches() {
        let toml = "[qgen.switches]\nsimulink = \"-t 'oops\"\n";
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn reject_garbage() {
        let err = load_config_from_str("[project\n").unwrap_err();
        assert!(format!("{err}").starts_with("failed to parse project file:"));
    }
}
