//! Resolver configuration
//!
//! Every field has a default, so an empty (or missing) `stud.toml` is valid.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Knobs for locating, scanning and resolving a project
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResolveOptions {
    /// Name of the synthetic tree root (and first segment of every path)
    #[serde(default = "default_root_name")]
    pub root_name: String,

    /// Class of the root when the project does not set `$className`
    #[serde(default = "default_root_class_name")]
    pub root_class_name: String,

    /// Project file checked first by the locator
    #[serde(default = "default_project_file")]
    pub default_project_file: String,

    /// Suffix recognised on any other project file
    #[serde(default = "default_project_file_suffix")]
    pub project_file_suffix: String,

    /// Script file extensions, highest priority first
    #[serde(default = "default_script_extensions")]
    pub script_extensions: Vec<String>,

    /// Include dot-files and dot-directories in scans
    #[serde(default)]
    pub include_hidden: bool,

    /// Maximum directory nesting below the project directory
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// How many sibling partitions resolve concurrently
    #[serde(default = "default_max_concurrent_scans")]
    pub max_concurrent_scans: usize,
}

fn default_root_name() -> String {
    "game".to_string()
}

fn default_root_class_name() -> String {
    "DataModel".to_string()
}

fn default_project_file() -> String {
    "default.project.json".to_string()
}

fn default_project_file_suffix() -> String {
    ".project.json".to_string()
}

fn default_script_extensions() -> Vec<String> {
    ["luau", "lua"].iter().map(|s| s.to_string()).collect()
}

fn default_max_depth() -> usize {
    64
}

fn default_max_concurrent_scans() -> usize {
    16
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            root_name: default_root_name(),
            root_class_name: default_root_class_name(),
            default_project_file: default_project_file(),
            project_file_suffix: default_project_file_suffix(),
            script_extensions: default_script_extensions(),
            include_hidden: false,
            max_depth: default_max_depth(),
            max_concurrent_scans: default_max_concurrent_scans(),
        }
    }
}

/// Error loading a [`ResolveOptions`] file
#[derive(Debug, thiserror::Error)]
pub enum OptionsError {
    #[error("Failed to read options file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse options file: {0}")]
    ParseError(#[from] toml::de::Error),
}

impl ResolveOptions {
    /// Parse options from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, OptionsError> {
        Ok(toml::from_str(content)?)
    }

    /// Load options from a TOML file
    pub fn from_toml_file(path: &Path) -> Result<Self, OptionsError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Fan-out width, never zero
    pub(crate) fn concurrency(&self) -> usize {
        self.max_concurrent_scans.max(1)
    }
}
