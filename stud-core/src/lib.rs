//! Stud Core Library
//!
//! Turns a Rojo project file plus the source directory it describes into
//! one instance tree:
//! - Project file lookup (`default.project.json`, `*.project.json`)
//! - Project file parsing and validation
//! - Directory scanning with Rojo naming conventions
//! - Merging both into an addressable `InstanceNode` tree
//! - A canonical path index over the result

pub mod error;
pub mod index;
pub mod locator;
pub mod options;
pub mod path_utils;
pub mod project;
pub mod resolver;
pub mod scanner;
pub mod tree;

// Re-export commonly used types
pub use error::{ConfigError, ProjectError, SubtreeError};
pub use index::PathIndex;
pub use locator::{find_project_file, DirectoryTarget};
pub use options::{OptionsError, ResolveOptions};
pub use project::{parse_project, parse_project_file, ParsedProject, ProjectChild, ProjectNode};
pub use resolver::{resolve, resolve_directory, resolve_project};
pub use scanner::{DirectoryScan, EntryKind, FilesystemEntry, InitScript, Scanner, ScriptKind};
pub use tree::{Diagnostic, InstanceNode, Resolution, Severity, TreeResponse};
pub use path_utils::{normalize_path, path_to_string};
