//! Rojo project file parsing
//!
//! A project file describes a partition tree. Keys prefixed with `$` are
//! directives for the node they appear in:
//! - `$className`: The Roblox class name
//! - `$path`: File or folder on disk, relative to the project file
//! - `$properties`: Property overrides
//! - `$ignoreUnknownInstances`: Drop on-disk children the project doesn't name
//!
//! Every other key is a named child partition.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::options::ResolveOptions;
use crate::path_utils::join_within;

/// Keys that may sit next to `tree` in a Rojo-style envelope
const ENVELOPE_KEYS: &[&str] = &[
    "name",
    "globIgnorePaths",
    "servePort",
    "serveAddress",
    "servePlaceIds",
    "placeId",
    "gameId",
    "emitLegacyScripts",
];

/// A parsed project file
#[derive(Debug, Clone)]
pub struct ParsedProject {
    /// Project name, when the file uses the `{ "name", "tree" }` envelope
    pub name: Option<String>,

    /// Directory `$path`s are relative to
    pub root_dir: PathBuf,

    /// Root of the partition tree
    pub tree: ProjectNode,

    /// Glob patterns excluded from directory scans
    pub glob_ignore_paths: Vec<String>,
}

/// One partition in the project tree
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectNode {
    pub class_name: Option<String>,

    /// `$path` as written
    pub path: Option<String>,

    /// `$path` joined onto the project directory; always inside it
    pub resolved_path: Option<PathBuf>,

    pub properties: BTreeMap<String, Value>,

    pub ignore_unknown_instances: bool,

    /// Named children. Project objects are unordered, so these are kept sorted.
    pub children: BTreeMap<String, ProjectChild>,
}

/// A child partition, or the reason it could not be parsed
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectChild {
    Node(ProjectNode),
    Malformed(String),
}

impl ProjectChild {
    pub fn as_node(&self) -> Option<&ProjectNode> {
        match self {
            ProjectChild::Node(node) => Some(node),
            ProjectChild::Malformed(_) => None,
        }
    }
}

/// Read and parse a project file
pub async fn parse_project_file(path: &Path, options: &ResolveOptions) -> Result<ParsedProject, ConfigError> {
    let content = tokio::fs::read_to_string(path).await?;
    // `$path`s resolve against an absolute directory, even for a bare file name
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let root_dir = tokio::fs::canonicalize(parent).await?;
    let root_dir = dunce::simplified(&root_dir).to_path_buf();
    parse_project(&content, &root_dir, options)
}

/// Parse project file text
///
/// Fails when the text is not a JSON object, when the root node carries a
/// badly-shaped directive, or when any `$path` anywhere in the tree leaves
/// `root_dir`. Badly-shaped nested partitions become
/// [`ProjectChild::Malformed`] instead of failing the whole file.
pub fn parse_project(content: &str, root_dir: &Path, options: &ResolveOptions) -> Result<ParsedProject, ConfigError> {
    let document: Value = serde_json::from_str(content)?;
    let Value::Object(document) = document else {
        return Err(ConfigError::NotAnObject);
    };

    let (name, glob_ignore_paths, tree) = match split_envelope(&document) {
        Some(tree) => {
            let name = match document.get("name") {
                None => None,
                Some(Value::String(name)) => Some(name.clone()),
                Some(_) => {
                    return Err(ConfigError::InvalidDirective {
                        node: "project".to_string(),
                        key: "name".to_string(),
                        expected: "a string",
                    })
                }
            };
            let globs = parse_glob_ignores(&document)?;
            (name, globs, tree)
        }
        None => (None, Vec::new(), &document),
    };

    let root_label = options.root_name.as_str();
    check_paths(tree, root_label, root_dir)?;
    let tree = parse_node(tree, root_label, root_dir)?;

    Ok(ParsedProject {
        name,
        root_dir: root_dir.to_path_buf(),
        tree,
        glob_ignore_paths,
    })
}

/// Returns the `tree` object when `document` is a Rojo envelope
fn split_envelope(document: &Map<String, Value>) -> Option<&Map<String, Value>> {
    let tree = document.get("tree")?.as_object()?;
    document
        .keys()
        .all(|k| k == "tree" || ENVELOPE_KEYS.contains(&k.as_str()))
        .then_some(tree)
}

fn parse_glob_ignores(document: &Map<String, Value>) -> Result<Vec<String>, ConfigError> {
    let invalid = || ConfigError::InvalidDirective {
        node: "project".to_string(),
        key: "globIgnorePaths".to_string(),
        expected: "an array of strings",
    };
    match document.get("globIgnorePaths") {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| v.as_str().map(str::to_string).ok_or_else(invalid))
            .collect(),
        Some(_) => Err(invalid()),
    }
}

/// Reject any `$path` that escapes the project directory, at any depth
fn check_paths(object: &Map<String, Value>, label: &str, root_dir: &Path) -> Result<(), ConfigError> {
    for (key, value) in object {
        if key == "$path" {
            if let Some(path) = value.as_str() {
                if join_within(root_dir, path).is_none() {
                    return Err(ConfigError::PathEscapesRoot {
                        node: label.to_string(),
                        path: path.to_string(),
                    });
                }
            }
        } else if !key.starts_with('$') {
            if let Value::Object(child) = value {
                check_paths(child, &format!("{}.{}", label, key), root_dir)?;
            }
        }
    }
    Ok(())
}

fn invalid_directive(label: &str, key: &str, expected: &'static str) -> ConfigError {
    ConfigError::InvalidDirective {
        node: label.to_string(),
        key: key.to_string(),
        expected,
    }
}

/// Child names become path segments, so they can't be empty or contain `.`
pub(crate) fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('.')
}

fn parse_node(object: &Map<String, Value>, label: &str, root_dir: &Path) -> Result<ProjectNode, ConfigError> {
    let mut node = ProjectNode::default();

    for (key, value) in object {
        match key.as_str() {
            "$className" => {
                let class_name = value
                    .as_str()
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| invalid_directive(label, key, "a non-empty string"))?;
                node.class_name = Some(class_name.to_string());
            }
            "$path" => {
                let path = value
                    .as_str()
                    .ok_or_else(|| invalid_directive(label, key, "a string"))?;
                let resolved = join_within(root_dir, path).ok_or_else(|| ConfigError::PathEscapesRoot {
                    node: label.to_string(),
                    path: path.to_string(),
                })?;
                node.path = Some(path.to_string());
                node.resolved_path = Some(resolved);
            }
            "$properties" => {
                let properties = value
                    .as_object()
                    .ok_or_else(|| invalid_directive(label, key, "an object"))?;
                node.properties = properties.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            }
            "$ignoreUnknownInstances" => {
                node.ignore_unknown_instances = value
                    .as_bool()
                    .ok_or_else(|| invalid_directive(label, key, "a boolean"))?;
            }
            other if other.starts_with('$') => {
                tracing::debug!("Ignoring unsupported directive `{}` on {}", other, label);
            }
            name => {
                let child_label = format!("{}.{}", label, name);
                let child = if !is_valid_name(name) {
                    ProjectChild::Malformed(
                        ConfigError::InvalidName {
                            node: label.to_string(),
                            name: name.to_string(),
                        }
                        .to_string(),
                    )
                } else {
                    match value {
                        Value::Object(child) => match parse_node(child, &child_label, root_dir) {
                            Ok(child) => ProjectChild::Node(child),
                            Err(e) => ProjectChild::Malformed(e.to_string()),
                        },
                        _ => ProjectChild::Malformed(
                            invalid_directive(&child_label, name, "an object").to_string(),
                        ),
                    }
                };
                node.children.insert(name.to_string(), child);
            }
        }
    }

    Ok(node)
}
