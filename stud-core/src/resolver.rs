//! Tree resolution
//!
//! Merges the project's partition tree with what is actually on disk.
//! Each tree position may have a project node, a filesystem binding, or
//! both; the project always wins where they disagree. Sibling positions are
//! resolved concurrently and joined in order before their parent is built.
//!
//! A position that fails is dropped from its parent with a diagnostic. Only
//! problems with the project file itself fail the whole request.

use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};

use crate::error::{ConfigError, ProjectError, SubtreeError};
use crate::locator::{find_project_file, DirectoryTarget};
use crate::options::ResolveOptions;
use crate::path_utils::path_to_string;
use crate::project::{parse_project_file, ParsedProject, ProjectChild, ProjectNode};
use crate::scanner::{is_script_class, EntryKind, FilesystemEntry, Scanner, ScriptKind};
use crate::tree::{Diagnostic, InstanceNode, Resolution, TreeResponse};

/// Services whose class can be inferred from their name when they sit
/// directly under the root
const KNOWN_SERVICES: &[&str] = &[
    "Chat",
    "HttpService",
    "Lighting",
    "LocalizationService",
    "MaterialService",
    "Players",
    "ReplicatedFirst",
    "ReplicatedStorage",
    "ServerScriptService",
    "ServerStorage",
    "SoundService",
    "StarterGui",
    "StarterPack",
    "StarterPlayer",
    "Teams",
    "TestService",
    "TextChatService",
    "Workspace",
];

/// Resolve the project for a request target
pub async fn resolve(target: &DirectoryTarget, options: &ResolveOptions) -> Result<Resolution, ProjectError> {
    let dir = target.to_path().map_err(|source| ProjectError::Io {
        path: PathBuf::from("."),
        source,
    })?;
    resolve_directory(&dir, options).await
}

/// Locate, parse and resolve the project in `dir`
///
/// Yields an empty response (no tree, no project file) when `dir` has no
/// project file or does not exist.
pub async fn resolve_directory(dir: &Path, options: &ResolveOptions) -> Result<Resolution, ProjectError> {
    let empty = || Resolution {
        response: TreeResponse::empty(),
        project_name: None,
        diagnostics: Vec::new(),
    };

    let dir = match tokio::fs::canonicalize(dir).await {
        Ok(dir) => dunce::simplified(&dir).to_path_buf(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!("Directory {} does not exist", dir.display());
            return Ok(empty());
        }
        Err(source) => {
            return Err(ProjectError::Io {
                path: dir.to_path_buf(),
                source,
            })
        }
    };

    let project_file = find_project_file(&dir, options)
        .await
        .map_err(|source| ProjectError::Io {
            path: dir.clone(),
            source,
        })?;
    let Some(project_file) = project_file else {
        tracing::debug!("No project file in {}", dir.display());
        return Ok(empty());
    };

    let project = parse_project_file(&project_file, options).await?;
    let (tree, diagnostics) = resolve_project(&project, options).await?;

    tracing::info!(
        "Resolved {} instances from {} ({} diagnostics)",
        tree.count(),
        project_file.display(),
        diagnostics.len()
    );

    Ok(Resolution {
        response: TreeResponse {
            tree: Some(tree),
            project_file: Some(path_to_string(&project_file)),
        },
        project_name: project.name,
        diagnostics,
    })
}

/// Build the instance tree for an already-parsed project
pub async fn resolve_project(
    project: &ParsedProject,
    options: &ResolveOptions,
) -> Result<(InstanceNode, Vec<Diagnostic>), ConfigError> {
    let scanner = Arc::new(Scanner::new(&project.root_dir, options, &project.glob_ignore_paths)?);
    let resolver = Resolver { options, scanner };
    let root_path = options.root_name.clone();

    match resolver.resolve_node(Position::root(&project.tree, options)).await {
        Ok(resolved) => Ok((resolved.node, resolved.diagnostics)),
        Err(e) => {
            // The root can't be omitted; resolve it again without its binding
            tracing::warn!("Root binding failed: {}", e);
            let mut diagnostics = vec![Diagnostic::error(&root_path, e.to_string())];
            let unbound = ProjectNode {
                path: None,
                resolved_path: None,
                ..project.tree.clone()
            };
            let node = match resolver.resolve_node(Position::root(&unbound, options)).await {
                Ok(resolved) => {
                    diagnostics.extend(resolved.diagnostics);
                    resolved.node
                }
                Err(e) => {
                    diagnostics.push(Diagnostic::error(&root_path, e.to_string()));
                    InstanceNode {
                        name: root_path.clone(),
                        class_name: options.root_class_name.clone(),
                        path: root_path.clone(),
                        file_path: None,
                        properties: BTreeMap::new(),
                        children: Vec::new(),
                    }
                }
            };
            Ok((node, diagnostics))
        }
    }
}

/// What a position is backed by on disk
#[derive(Debug, Clone)]
enum Binding {
    Directory(PathBuf),
    Script(ScriptKind, PathBuf),
}

/// One tree position waiting to be resolved
struct Position<'a> {
    name: String,
    path: String,
    config: Option<&'a ProjectNode>,
    entry: Option<FilesystemEntry>,
    depth: usize,
    /// Canonical directories bound by the ancestors of this position
    ancestors: Arc<Vec<PathBuf>>,
}

impl<'a> Position<'a> {
    fn root(config: &'a ProjectNode, options: &ResolveOptions) -> Self {
        Self {
            name: options.root_name.clone(),
            path: options.root_name.clone(),
            config: Some(config),
            entry: None,
            depth: 0,
            ancestors: Arc::new(Vec::new()),
        }
    }

    fn child(
        &self,
        name: &str,
        config: Option<&'a ProjectNode>,
        entry: Option<FilesystemEntry>,
        ancestors: &Arc<Vec<PathBuf>>,
    ) -> Position<'a> {
        Position {
            name: name.to_string(),
            path: format!("{}.{}", self.path, name),
            config,
            entry,
            depth: self.depth + 1,
            ancestors: Arc::clone(ancestors),
        }
    }
}

/// A resolved subtree plus everything that was left out of it
struct Resolved {
    node: InstanceNode,
    diagnostics: Vec<Diagnostic>,
}

struct Resolver<'a> {
    options: &'a ResolveOptions,
    scanner: Arc<Scanner>,
}

impl<'a> Resolver<'a> {
    fn resolve_node<'p>(&'p self, pos: Position<'p>) -> BoxFuture<'p, Result<Resolved, SubtreeError>>
    where
        'a: 'p,
    {
        async move {
            let mut diagnostics = Vec::new();
            let binding = self.bind(&pos, &mut diagnostics).await?;

            let mut ancestors = Arc::clone(&pos.ancestors);
            let mut scan = None;
            if let Some(Binding::Directory(dir)) = &binding {
                if pos.depth > self.options.max_depth {
                    return Err(SubtreeError::DepthExceeded {
                        path: dir.clone(),
                        max: self.options.max_depth,
                    });
                }
                let canonical = tokio::fs::canonicalize(dir)
                    .await
                    .map_err(|source| SubtreeError::UnreadableDirectory {
                        path: dir.clone(),
                        source,
                    })?;
                if pos.ancestors.contains(&canonical) {
                    return Err(SubtreeError::Cycle(dir.clone()));
                }
                let listing = self
                    .scanner
                    .scan(dir.clone())
                    .await
                    .map_err(|source| SubtreeError::UnreadableDirectory {
                        path: dir.clone(),
                        source,
                    })?;
                for warning in &listing.warnings {
                    diagnostics.push(Diagnostic::warning(&pos.path, warning));
                }
                let mut chain = pos.ancestors.as_ref().clone();
                chain.push(canonical);
                ancestors = Arc::new(chain);
                scan = Some(listing);
            }

            let script = match &binding {
                Some(Binding::Script(kind, path)) => Some((*kind, path.clone())),
                _ => scan
                    .as_ref()
                    .and_then(|s| s.init.as_ref())
                    .map(|init| (init.kind, init.path.clone())),
            };

            // Plan children: project-only names first, then on-disk names in
            // scan order. Both groups are sorted by name.
            let config_children = pos.config.map(|c| &c.children);
            let ignore_unknown = pos.config.is_some_and(|c| c.ignore_unknown_instances);
            let disk_entries: Vec<FilesystemEntry> = scan
                .as_ref()
                .map(|s| s.instance_entries().cloned().collect::<Vec<_>>())
                .unwrap_or_default();
            let disk_names: HashSet<&str> = disk_entries.iter().map(|e| e.name.as_str()).collect();

            let plan_config_child = |name: &str, entry: Option<FilesystemEntry>, diagnostics: &mut Vec<Diagnostic>| {
                match config_children.and_then(|c| c.get(name)) {
                    Some(ProjectChild::Node(node)) => Some(pos.child(name, Some(node), entry, &ancestors)),
                    Some(ProjectChild::Malformed(message)) => {
                        let path = format!("{}.{}", pos.path, name);
                        tracing::warn!("Omitting malformed partition {}: {}", path, message);
                        diagnostics.push(Diagnostic::error(path, message.clone()));
                        None
                    }
                    None => None,
                }
            };

            let mut planned: Vec<Position<'p>> = Vec::new();
            for name in config_children.into_iter().flat_map(|c| c.keys()) {
                if !disk_names.contains(name.as_str()) {
                    planned.extend(plan_config_child(name.as_str(), None, &mut diagnostics));
                }
            }
            for entry in disk_entries {
                let name = entry.name.clone();
                match config_children.and_then(|c| c.get(&name)) {
                    Some(ProjectChild::Node(node)) => {
                        let entry = match merge_candidate(node, entry) {
                            Ok(entry) => entry,
                            Err(dropped) => {
                                let path = format!("{}.{}", pos.path, name);
                                let message = format!(
                                    "Dropped {}: the project declares {} as a different instance",
                                    dropped.absolute_path.display(),
                                    name
                                );
                                tracing::warn!("{}", message);
                                diagnostics.push(Diagnostic::warning(path, message));
                                None
                            }
                        };
                        planned.extend(plan_config_child(name.as_str(), entry, &mut diagnostics));
                    }
                    Some(ProjectChild::Malformed(_)) => {
                        planned.extend(plan_config_child(name.as_str(), None, &mut diagnostics));
                    }
                    None if ignore_unknown => {
                        tracing::debug!("Ignoring unknown instance {}.{}", pos.path, name);
                    }
                    None => planned.push(pos.child(&name, None, Some(entry), &ancestors)),
                }
            }

            let child_paths: Vec<String> = planned.iter().map(|p| p.path.clone()).collect();
            let pending: Vec<_> = planned.into_iter().map(|child| self.resolve_node(child)).collect();
            let outcomes: Vec<Result<Resolved, SubtreeError>> = futures::stream::iter(pending)
                .buffered(self.options.concurrency())
                .collect()
                .await;

            let mut children = Vec::with_capacity(outcomes.len());
            for (path, outcome) in child_paths.into_iter().zip(outcomes) {
                match outcome {
                    Ok(resolved) => {
                        diagnostics.extend(resolved.diagnostics);
                        children.push(resolved.node);
                    }
                    Err(e) => {
                        tracing::warn!("Omitting {}: {}", path, e);
                        diagnostics.push(Diagnostic::error(path, e.to_string()));
                    }
                }
            }

            let class_name = if pos.depth == 0 {
                pos.config
                    .and_then(|c| c.class_name.clone())
                    .unwrap_or_else(|| self.options.root_class_name.clone())
            } else {
                resolve_class_name(ClassSources {
                    explicit: pos.config.and_then(|c| c.class_name.as_deref()),
                    script: script.as_ref().map(|(kind, _)| *kind),
                    directory: matches!(binding, Some(Binding::Directory(_))),
                    service: (pos.depth == 1 && KNOWN_SERVICES.contains(&pos.name.as_str()))
                        .then_some(pos.name.as_str()),
                    has_children: !children.is_empty(),
                })
            };

            // Only nodes bound to a script file carry it; init-bound
            // directories take the script's class but stay containers
            let file_path = match binding {
                Some(Binding::Script(_, path)) if is_script_class(&class_name) => Some(path_to_string(&path)),
                Some(Binding::Script(_, path)) => {
                    let message = format!(
                        "{} is not attached: {} is a {}",
                        path.display(),
                        pos.path,
                        class_name
                    );
                    tracing::warn!("{}", message);
                    diagnostics.push(Diagnostic::warning(&pos.path, message));
                    None
                }
                _ => None,
            };

            tracing::debug!("Resolved {} ({})", pos.path, class_name);

            Ok(Resolved {
                node: InstanceNode {
                    name: pos.name,
                    class_name,
                    path: pos.path,
                    file_path,
                    properties: pos.config.map(|c| c.properties.clone()).unwrap_or_default(),
                    children,
                },
                diagnostics,
            })
        }
        .boxed()
    }

    /// Work out what a position is backed by. An explicit `$path` beats the
    /// entry discovered in the parent directory.
    async fn bind(&self, pos: &Position<'_>, diagnostics: &mut Vec<Diagnostic>) -> Result<Option<Binding>, SubtreeError> {
        if let Some(path) = pos.config.and_then(|c| c.resolved_path.as_ref()) {
            let metadata = tokio::fs::metadata(path).await.map_err(|source| {
                if source.kind() == io::ErrorKind::NotFound {
                    SubtreeError::MissingPath(path.clone())
                } else {
                    SubtreeError::UnreadableDirectory {
                        path: path.clone(),
                        source,
                    }
                }
            })?;
            if metadata.is_dir() {
                return Ok(Some(Binding::Directory(path.clone())));
            }
            let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            return match self.scanner.classify_file_name(file_name) {
                Some((_, kind)) => Ok(Some(Binding::Script(kind, path.clone()))),
                None => {
                    let message = format!("{} is not a script file; nothing is bound", path.display());
                    tracing::warn!("{}", message);
                    diagnostics.push(Diagnostic::warning(&pos.path, message));
                    Ok(None)
                }
            };
        }

        Ok(pos.entry.as_ref().and_then(|entry| match entry.kind {
            EntryKind::Directory => Some(Binding::Directory(entry.absolute_path.clone())),
            EntryKind::ScriptFile(kind) => Some(Binding::Script(kind, entry.absolute_path.clone())),
            EntryKind::OtherFile => None,
        }))
    }
}

/// Decide whether an on-disk entry is the same instance as the project node
/// of the same name.
///
/// Returns `Ok(Some(entry))` to merge, `Ok(None)` when the node's own `$path`
/// supersedes it, and `Err(entry)` when the two are different instances.
fn merge_candidate(node: &ProjectNode, entry: FilesystemEntry) -> Result<Option<FilesystemEntry>, FilesystemEntry> {
    if node.resolved_path.is_some() {
        return Ok(None);
    }
    let compatible = match (entry.kind, node.class_name.as_deref()) {
        (EntryKind::Directory, _) | (_, None) => true,
        (EntryKind::ScriptFile(kind), Some(class_name)) => class_name == kind.class_name(),
        (EntryKind::OtherFile, Some(_)) => false,
    };
    if compatible {
        Ok(Some(entry))
    } else {
        Err(entry)
    }
}

struct ClassSources<'s> {
    explicit: Option<&'s str>,
    script: Option<ScriptKind>,
    directory: bool,
    service: Option<&'s str>,
    has_children: bool,
}

/// First available class, in precedence order
fn resolve_class_name(sources: ClassSources<'_>) -> String {
    sources
        .explicit
        .or_else(|| sources.script.map(ScriptKind::class_name))
        .or(sources.service)
        .or_else(|| sources.directory.then_some("Folder"))
        .or_else(|| sources.has_children.then_some("Folder"))
        .unwrap_or("Model")
        .to_string()
}
