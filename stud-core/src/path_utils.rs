//! Cross-platform path utilities
//!
//! Instance trees report file paths with forward slashes on every platform.
//! `$path` containment is checked lexically, before anything touches the disk.

use std::path::{Component, Path, PathBuf};

/// Normalize path to forward slashes
#[inline]
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Convert a path to a normalized string
#[inline]
pub fn path_to_string(path: &Path) -> String {
    normalize_path(&path.to_string_lossy())
}

/// Resolve `.` and `..` components without consulting the filesystem.
///
/// A `..` that would climb above the first component is kept, so the result
/// of normalizing `a/../../b` is `../b` and callers can still detect escapes.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    out.iter().collect()
}

/// Join a (possibly relative) `$path` onto the project root and verify the
/// result stays inside it. Returns `None` when the path escapes.
pub fn join_within(root: &Path, relative: &str) -> Option<PathBuf> {
    let candidate = normalize_lexically(&root.join(normalize_path(relative)));
    let root = normalize_lexically(root);
    // An empty (relative) root is a prefix of everything, so a leading `..`
    // has to be caught on its own
    let climbs = matches!(candidate.components().next(), Some(Component::ParentDir));
    (!climbs && candidate.starts_with(&root)).then_some(candidate)
}

/// Path of `path` relative to `base`, with forward slashes
pub fn relative_string(path: &Path, base: &Path) -> String {
    match path.strip_prefix(base) {
        Ok(rel) => path_to_string(rel),
        Err(_) => path_to_string(path),
    }
}
