//! Resolved instance tree
//!
//! This is the shape served to clients:
//! `{ name, className, path, filePath?, properties?, children? }`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// One addressable instance in the resolved tree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InstanceNode {
    /// Name, unique among siblings
    pub name: String,

    /// Resolved Roblox class
    pub class_name: String,

    /// Canonical dotted path from the root (e.g. `game.ServerScriptService.Main`)
    pub path: String,

    /// Absolute path of the script file backing this node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,

    /// `$properties` declared for this node
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, serde_json::Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<InstanceNode>,
}

impl InstanceNode {
    /// Number of nodes in this subtree, including `self`
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(InstanceNode::count).sum::<usize>()
    }

    /// Depth-first, pre-order traversal of this subtree
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }

    pub fn child(&self, name: &str) -> Option<&InstanceNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Indented `- Name (ClassName)` listing
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        render_level(self, 0, &mut out);
        out
    }
}

fn render_level(node: &InstanceNode, indent: usize, out: &mut String) {
    let _ = writeln!(out, "{}- {} ({})", "  ".repeat(indent), node.name, node.class_name);
    for child in &node.children {
        render_level(child, indent + 1, out);
    }
}

/// Pre-order iterator returned by [`InstanceNode::descendants`]
pub struct Descendants<'a> {
    stack: Vec<&'a InstanceNode>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a InstanceNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Response body for a tree request. `tree` is `None` exactly when no
/// project file was found.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TreeResponse {
    pub tree: Option<InstanceNode>,
    pub project_file: Option<String>,
}

impl TreeResponse {
    pub fn empty() -> Self {
        Self {
            tree: None,
            project_file: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    /// An entry was skipped; its parent resolved normally
    Warning,
    /// A partition failed and was omitted
    Error,
}

/// Something that was left out of the tree, and why
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    /// Canonical path of the affected position
    pub path: String,
    pub severity: Severity,
    pub message: String,
}

impl Diagnostic {
    pub fn warning(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            severity: Severity::Warning,
            message: message.into(),
        }
    }

    pub fn error(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            severity: Severity::Error,
            message: message.into(),
        }
    }
}

/// Result of one resolution request
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub response: TreeResponse,
    /// Project name from a Rojo-style `{ "name", "tree" }` envelope
    pub project_name: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Resolution {
    pub fn tree(&self) -> Option<&InstanceNode> {
        self.response.tree.as_ref()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }
}
