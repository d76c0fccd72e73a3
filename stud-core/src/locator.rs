//! Project file lookup
//!
//! Lookup is scoped to exactly the given directory; parents are never
//! searched.

use std::io;
use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;

use crate::options::ResolveOptions;

/// Directory a tree request is made for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryTarget {
    /// The process's working directory
    CurrentDir,
    Explicit(PathBuf),
}

impl DirectoryTarget {
    /// Build a target from a percent-encoded directory string, as received
    /// in a request path segment
    pub fn from_encoded(encoded: &str) -> Self {
        let decoded = percent_decode_str(encoded).decode_utf8_lossy();
        Self::Explicit(PathBuf::from(decoded.as_ref()))
    }

    pub fn to_path(&self) -> io::Result<PathBuf> {
        match self {
            Self::CurrentDir => std::env::current_dir(),
            Self::Explicit(path) => Ok(path.clone()),
        }
    }
}

/// Find the project file in `dir`
///
/// Checks, in order:
/// 1. the default project file (`default.project.json`)
/// 2. any other `*.project.json`, lexicographically first
///
/// Returns `Ok(None)` when there is none, including when `dir` itself does
/// not exist.
pub async fn find_project_file(dir: &Path, options: &ResolveOptions) -> io::Result<Option<PathBuf>> {
    let default_path = dir.join(&options.default_project_file);
    if tokio::fs::metadata(&default_path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
    {
        return Ok(Some(default_path));
    }

    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    let mut candidates = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.len() > options.project_file_suffix.len()
            && name.ends_with(&options.project_file_suffix)
            && entry.file_type().await.map(|t| !t.is_dir()).unwrap_or(false)
        {
            candidates.push(path);
        }
    }

    candidates.sort();
    if candidates.len() > 1 {
        tracing::debug!(
            "Multiple project files in {}, using {}",
            dir.display(),
            candidates[0].display()
        );
    }
    Ok(candidates.into_iter().next())
}
