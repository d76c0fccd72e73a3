//! Path index over a resolved tree
//!
//! Built once per resolution and borrowed from the tree it indexes.
//! Used to map runtime selections back to tree nodes and to find the
//! script file behind a node.

use std::collections::HashMap;

use crate::path_utils::normalize_path;
use crate::tree::InstanceNode;

#[derive(Debug, Default)]
pub struct PathIndex<'t> {
    by_path: HashMap<&'t str, &'t InstanceNode>,
    by_file: HashMap<&'t str, &'t InstanceNode>,
}

impl<'t> PathIndex<'t> {
    pub fn build(root: &'t InstanceNode) -> Self {
        let mut index = Self::default();
        for node in root.descendants() {
            if index.by_path.insert(node.path.as_str(), node).is_some() {
                tracing::warn!("Duplicate instance path {}", node.path);
            }
            if let Some(file_path) = &node.file_path {
                index.by_file.insert(file_path.as_str(), node);
            }
        }
        index
    }

    pub fn get(&self, path: &str) -> Option<&'t InstanceNode> {
        self.by_path.get(path).copied()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.by_path.contains_key(path)
    }

    /// Node backed by the given script file
    pub fn by_file_path(&self, file_path: &str) -> Option<&'t InstanceNode> {
        self.by_file.get(normalize_path(file_path).as_str()).copied()
    }

    /// Script file behind the node at `path`
    pub fn script_file(&self, path: &str) -> Option<&'t str> {
        self.get(path)?.file_path.as_deref()
    }

    /// Deepest indexed node on the way to `path`
    ///
    /// A live session reports paths for instances that never came from
    /// disk (e.g. `game.Workspace.Baseplate`); this finds the closest node
    /// the tree does know about.
    pub fn nearest(&self, path: &str) -> Option<&'t InstanceNode> {
        let mut candidate = path;
        loop {
            if let Some(node) = self.get(candidate) {
                return Some(node);
            }
            let (parent, _) = candidate.rsplit_once('.')?;
            candidate = parent;
        }
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }

    /// All indexed paths, sorted
    pub fn paths(&self) -> Vec<&'t str> {
        let mut paths: Vec<_> = self.by_path.keys().copied().collect();
        paths.sort_unstable();
        paths
    }
}
