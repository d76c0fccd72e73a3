//! Filesystem scanning
//!
//! Lists one directory at a time and classifies each entry by the Rojo
//! naming conventions:
//! - `Name.server.luau` -> `Script`
//! - `Name.client.luau` -> `LocalScript`
//! - `Name.luau` -> `ModuleScript`
//! - directories -> `Folder`, unless bound by an init script
//!
//! Recursion is left to the resolver.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::error::ConfigError;
use crate::options::ResolveOptions;
use crate::path_utils::relative_string;
use crate::project::is_valid_name;

/// Script flavour, from the file name suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScriptKind {
    Server,
    Client,
    Module,
}

impl ScriptKind {
    pub fn class_name(self) -> &'static str {
        match self {
            ScriptKind::Server => "Script",
            ScriptKind::Client => "LocalScript",
            ScriptKind::Module => "ModuleScript",
        }
    }
}

/// Whether `class_name` is one of the classes a script file can back
pub fn is_script_class(class_name: &str) -> bool {
    matches!(class_name, "Script" | "LocalScript" | "ModuleScript")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    ScriptFile(ScriptKind),
    /// Anything else; never becomes an instance
    OtherFile,
}

impl EntryKind {
    /// Class an unconfigured entry of this kind resolves to
    pub fn inferred_class(self) -> Option<&'static str> {
        match self {
            EntryKind::Directory => Some("Folder"),
            EntryKind::ScriptFile(kind) => Some(kind.class_name()),
            EntryKind::OtherFile => None,
        }
    }

    fn rank(self) -> u8 {
        match self {
            EntryKind::Directory => 0,
            EntryKind::ScriptFile(ScriptKind::Server) => 1,
            EntryKind::ScriptFile(ScriptKind::Client) => 2,
            EntryKind::ScriptFile(ScriptKind::Module) => 3,
            EntryKind::OtherFile => 4,
        }
    }
}

/// One classified directory entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilesystemEntry {
    /// Instance name: the file name minus script suffix and extension
    pub name: String,
    pub kind: EntryKind,
    pub absolute_path: PathBuf,
}

/// Script that binds its parent directory (`init.server.luau` and friends)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitScript {
    pub kind: ScriptKind,
    pub path: PathBuf,
}

/// Contents of one directory
#[derive(Debug, Clone, Default)]
pub struct DirectoryScan {
    pub init: Option<InitScript>,

    /// Entries sorted by name, names unique among directories and scripts
    pub entries: Vec<FilesystemEntry>,

    /// Entries that were skipped, as human-readable messages
    pub warnings: Vec<String>,
}

/// Directory lister configured for one project
#[derive(Debug)]
pub struct Scanner {
    root_dir: PathBuf,
    script_extensions: Vec<String>,
    include_hidden: bool,
    ignore: Option<GlobSet>,
}

impl Scanner {
    pub fn new(root_dir: &Path, options: &ResolveOptions, glob_ignore_paths: &[String]) -> Result<Self, ConfigError> {
        let ignore = if glob_ignore_paths.is_empty() {
            None
        } else {
            let mut builder = GlobSetBuilder::new();
            for pattern in glob_ignore_paths {
                let glob = Glob::new(pattern).map_err(|_| ConfigError::InvalidDirective {
                    node: "project".to_string(),
                    key: "globIgnorePaths".to_string(),
                    expected: "valid glob patterns",
                })?;
                builder.add(glob);
            }
            Some(builder.build().map_err(|_| ConfigError::InvalidDirective {
                node: "project".to_string(),
                key: "globIgnorePaths".to_string(),
                expected: "valid glob patterns",
            })?)
        };

        Ok(Self {
            root_dir: root_dir.to_path_buf(),
            script_extensions: options.script_extensions.clone(),
            include_hidden: options.include_hidden,
            ignore,
        })
    }

    /// Split a file name into instance name and script kind
    ///
    /// Returns `None` for files that aren't scripts.
    pub fn classify_file_name(&self, file_name: &str) -> Option<(String, ScriptKind)> {
        for ext in &self.script_extensions {
            let Some(stem) = file_name
                .strip_suffix(ext.as_str())
                .and_then(|s| s.strip_suffix('.'))
            else {
                continue;
            };
            let (name, kind) = if let Some(name) = stem.strip_suffix(".server") {
                (name, ScriptKind::Server)
            } else if let Some(name) = stem.strip_suffix(".client") {
                (name, ScriptKind::Client)
            } else {
                (stem, ScriptKind::Module)
            };
            if name.is_empty() {
                return None;
            }
            return Some((name.to_string(), kind));
        }
        None
    }

    /// Whether the glob ignore list excludes `path`
    pub fn is_ignored(&self, path: &Path) -> bool {
        match &self.ignore {
            Some(set) => set.is_match(relative_string(path, &self.root_dir)),
            None => false,
        }
    }

    /// Scan `dir` on the blocking thread pool
    pub async fn scan(self: &Arc<Self>, dir: PathBuf) -> io::Result<DirectoryScan> {
        let scanner = Arc::clone(self);
        tokio::task::spawn_blocking(move || scanner.scan_blocking(&dir))
            .await
            .map_err(io::Error::other)?
    }

    /// List and classify the immediate children of `dir`
    ///
    /// Only a failure to open `dir` itself is an error. Entries that can't be
    /// inspected are skipped and reported in [`DirectoryScan::warnings`].
    pub fn scan_blocking(&self, dir: &Path) -> io::Result<DirectoryScan> {
        let dir_name = dir.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        let mut scan = DirectoryScan::default();
        let mut init_candidates: Vec<(u8, InitScript)> = Vec::new();

        for entry in std::fs::read_dir(dir)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    scan.warn(format!("Skipped unreadable entry in {}: {}", dir.display(), e));
                    continue;
                }
            };
            let path = entry.path();
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
                scan.warn(format!("Skipped non UTF-8 file name: {}", path.display()));
                continue;
            };

            if !self.include_hidden && file_name.starts_with('.') {
                tracing::debug!("Skipping hidden entry {}", path.display());
                continue;
            }
            if self.is_ignored(&path) {
                tracing::debug!("Skipping ignored entry {}", path.display());
                continue;
            }

            // Follows symlinks; cycles are caught by the resolver
            let metadata = match std::fs::metadata(&path) {
                Ok(metadata) => metadata,
                Err(e) => {
                    scan.warn(format!("Skipped {}: {}", path.display(), e));
                    continue;
                }
            };

            let (name, kind) = if metadata.is_dir() {
                (file_name, EntryKind::Directory)
            } else if let Some((name, kind)) = self.classify_file_name(&file_name) {
                let init_priority = match (name.as_str(), kind) {
                    ("init", ScriptKind::Server) => Some(0),
                    ("init", ScriptKind::Client) => Some(1),
                    ("init", ScriptKind::Module) => Some(2),
                    (n, ScriptKind::Server) if n == dir_name => Some(3),
                    _ => None,
                };
                if let Some(priority) = init_priority {
                    init_candidates.push((priority, InitScript { kind, path }));
                    continue;
                }
                (name, EntryKind::ScriptFile(kind))
            } else {
                (file_name, EntryKind::OtherFile)
            };

            if kind != EntryKind::OtherFile && !is_valid_name(&name) {
                scan.warn(format!(
                    "Skipped {}: instance name {:?} can't contain '.'",
                    path.display(),
                    name
                ));
                continue;
            }

            scan.entries.push(FilesystemEntry {
                name,
                kind,
                absolute_path: path,
            });
        }

        init_candidates.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.path.cmp(&b.1.path)));
        let mut candidates = init_candidates.into_iter();
        scan.init = candidates.next().map(|(_, init)| init);
        for (_, surplus) in candidates {
            scan.warn(format!(
                "Skipped {}: directory already bound by another init script",
                surplus.path.display()
            ));
        }

        scan.entries.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then_with(|| a.kind.rank().cmp(&b.kind.rank()))
                .then_with(|| a.absolute_path.cmp(&b.absolute_path))
        });

        // Directories and scripts must have unique names; other files never
        // become instances and are left alone
        let mut deduped: Vec<FilesystemEntry> = Vec::with_capacity(scan.entries.len());
        for entry in std::mem::take(&mut scan.entries) {
            let clashes = entry.kind != EntryKind::OtherFile
                && deduped
                    .iter()
                    .rev()
                    .take_while(|e| e.name == entry.name)
                    .any(|e| e.kind != EntryKind::OtherFile);
            if clashes {
                scan.warn(format!(
                    "Skipped {}: another entry is already named {:?}",
                    entry.absolute_path.display(),
                    entry.name
                ));
                continue;
            }
            deduped.push(entry);
        }
        scan.entries = deduped;

        Ok(scan)
    }
}

impl DirectoryScan {
    fn warn(&mut self, message: String) {
        tracing::warn!("{}", message);
        self.warnings.push(message);
    }

    /// Entries that become instances
    pub fn instance_entries(&self) -> impl Iterator<Item = &FilesystemEntry> {
        self.entries.iter().filter(|e| e.kind != EntryKind::OtherFile)
    }
}
