//! Error taxonomy for tree resolution
//!
//! Only [`ProjectError`] ever reaches the caller as a failure. Everything
//! below the root degrades into a [`Diagnostic`](crate::Diagnostic).

use std::path::PathBuf;

/// Fatal errors: the whole resolution request fails.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("Failed to read project directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors in the project configuration file itself
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read project file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse project file: {0}")]
    Syntax(#[from] serde_json::Error),

    #[error("Project file must contain a JSON object")]
    NotAnObject,

    #[error("Invalid `{key}` on {node}: expected {expected}")]
    InvalidDirective {
        node: String,
        key: String,
        expected: &'static str,
    },

    #[error("Invalid child name {name:?} under {node}")]
    InvalidName { node: String, name: String },

    #[error("`$path` of {node} escapes the project directory: {path}")]
    PathEscapesRoot { node: String, path: String },
}

/// A single partition that could not be resolved. The partition is omitted
/// from its parent; the rest of the tree is unaffected.
#[derive(Debug, thiserror::Error)]
pub enum SubtreeError {
    #[error("`$path` does not exist: {}", .0.display())]
    MissingPath(PathBuf),

    #[error("Failed to read directory {}: {source}", .path.display())]
    UnreadableDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory {} re-enters one of its ancestors", .0.display())]
    Cycle(PathBuf),

    #[error("Directory {} exceeds the maximum depth of {max}", .path.display())]
    DepthExceeded { path: PathBuf, max: usize },
}
