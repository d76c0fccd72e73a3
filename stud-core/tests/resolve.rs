//! End-to-end resolution of project directories

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use pretty_assertions::assert_eq;
use stud_core::{
    path_to_string, resolve, resolve_directory, ConfigError, DirectoryTarget, InstanceNode, PathIndex, ProjectError,
    ResolveOptions, Severity, TreeResponse,
};
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn canonical(root: &Path, rel: &str) -> String {
    path_to_string(&fs::canonicalize(root).unwrap().join(rel))
}

fn child<'a>(node: &'a InstanceNode, name: &str) -> &'a InstanceNode {
    node.child(name)
        .unwrap_or_else(|| panic!("{} has no child {}", node.path, name))
}

fn child_names(node: &InstanceNode) -> Vec<&str> {
    node.children.iter().map(|c| c.name.as_str()).collect()
}

/// Paths, sibling uniqueness and the filePath rule, for every node
fn assert_invariants(node: &InstanceNode) {
    let mut seen = HashSet::new();
    for c in &node.children {
        assert_eq!(c.path, format!("{}.{}", node.path, c.name));
        assert!(seen.insert(c.name.as_str()), "duplicate sibling {}", c.path);
        if c.file_path.is_some() {
            assert!(
                matches!(c.class_name.as_str(), "Script" | "LocalScript" | "ModuleScript"),
                "{} has a filePath but is a {}",
                c.path,
                c.class_name
            );
        }
        assert_invariants(c);
    }
}

async fn resolve_tree(root: &Path) -> (InstanceNode, stud_core::Resolution) {
    let resolution = resolve_directory(root, &ResolveOptions::default()).await.unwrap();
    let tree = resolution.tree().cloned().expect("tree");
    assert_invariants(&tree);
    (tree, resolution)
}

#[tokio::test]
async fn empty_directory_has_no_tree() {
    let temp_dir = TempDir::new().unwrap();

    let resolution = resolve_directory(temp_dir.path(), &ResolveOptions::default()).await.unwrap();
    assert_eq!(resolution.response, TreeResponse::empty());
    assert_eq!(
        serde_json::to_value(&resolution.response).unwrap(),
        serde_json::json!({ "tree": null, "projectFile": null })
    );
    assert!(resolution.diagnostics.is_empty());
}

#[tokio::test]
async fn missing_directory_has_no_tree() {
    let temp_dir = TempDir::new().unwrap();
    let resolution = resolve_directory(&temp_dir.path().join("gone"), &ResolveOptions::default())
        .await
        .unwrap();
    assert_eq!(resolution.response, TreeResponse::empty());
}

#[tokio::test]
async fn explicit_script_path_binds_script() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(
        root,
        "default.project.json",
        r#"{
            "ServerScriptService": {
                "$className": "ServerScriptService",
                "Main": { "$path": "src/main.server.lua" }
            }
        }"#,
    );
    write(root, "src/main.server.lua", "print('hi')");

    let (tree, resolution) = resolve_tree(root).await;
    assert_eq!(resolution.response.project_file, Some(canonical(root, "default.project.json")));
    assert_eq!(tree.name, "game");
    assert_eq!(tree.path, "game");
    assert_eq!(child_names(&tree), vec!["ServerScriptService"]);

    let sss = child(&tree, "ServerScriptService");
    assert_eq!(sss.class_name, "ServerScriptService");
    assert_eq!(sss.path, "game.ServerScriptService");
    assert_eq!(sss.file_path, None);

    let main = child(sss, "Main");
    assert_eq!(main.class_name, "Script");
    assert_eq!(main.path, "game.ServerScriptService.Main");
    assert_eq!(main.file_path, Some(canonical(root, "src/main.server.lua")));
    assert!(main.children.is_empty());
}

#[tokio::test]
async fn unconfigured_directory_becomes_folder() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(
        root,
        "default.project.json",
        r#"{ "ReplicatedStorage": { "$className": "ReplicatedStorage", "$path": "src" } }"#,
    );
    write(root, "src/Utils/Helper.lua", "return {}");
    write(root, "src/Utils/README.md", "docs");

    let (tree, _) = resolve_tree(root).await;
    let utils = child(child(&tree, "ReplicatedStorage"), "Utils");
    assert_eq!(utils.class_name, "Folder");
    assert_eq!(utils.path, "game.ReplicatedStorage.Utils");
    assert_eq!(utils.file_path, None);
    assert_eq!(child_names(utils), vec!["Helper"]);

    let helper = child(utils, "Helper");
    assert_eq!(helper.class_name, "ModuleScript");
    assert_eq!(helper.file_path, Some(canonical(root, "src/Utils/Helper.lua")));
}

#[tokio::test]
async fn project_wins_name_collisions() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(
        root,
        "default.project.json",
        r#"{
            "ReplicatedStorage": {
                "$path": "src",
                "Foo": { "$className": "RemoteEvent" }
            }
        }"#,
    );
    write(root, "src/Foo.lua", "return {}");
    write(root, "src/Bar.lua", "return {}");

    let (tree, resolution) = resolve_tree(root).await;
    let rs = child(&tree, "ReplicatedStorage");
    assert_eq!(child_names(rs), vec!["Bar", "Foo"]);

    let foo = child(rs, "Foo");
    assert_eq!(foo.class_name, "RemoteEvent");
    assert_eq!(foo.file_path, None);

    assert!(resolution
        .diagnostics
        .iter()
        .any(|d| d.path == "game.ReplicatedStorage.Foo" && d.severity == Severity::Warning));
}

#[tokio::test]
async fn nested_path_escape_fails_resolution() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("project");
    write(
        &root,
        "default.project.json",
        r#"{
            "ServerScriptService": {
                "Good": { "$path": "src" },
                "Sneaky": { "Deeper": { "$path": "../secrets" } }
            }
        }"#,
    );
    write(&root, "src/A.lua", "");
    write(temp_dir.path(), "secrets/Key.lua", "");

    let err = resolve_directory(&root, &ResolveOptions::default()).await.unwrap_err();
    assert!(matches!(err, ProjectError::Config(ConfigError::PathEscapesRoot { .. })));
}

#[tokio::test]
async fn invalid_json_fails_resolution() {
    let temp_dir = TempDir::new().unwrap();
    write(temp_dir.path(), "default.project.json", "{ \"Workspace\": ");

    let err = resolve_directory(temp_dir.path(), &ResolveOptions::default()).await.unwrap_err();
    assert!(matches!(err, ProjectError::Config(ConfigError::Syntax(_))));
}

#[tokio::test]
async fn config_only_tree_mirrors_config_shape() {
    let temp_dir = TempDir::new().unwrap();
    write(
        temp_dir.path(),
        "game.project.json",
        r#"{
            "ReplicatedStorage": {
                "Remotes": {
                    "Fire": { "$className": "RemoteEvent" },
                    "Ask": { "$className": "RemoteFunction" }
                },
                "Empty": {}
            },
            "Workspace": {}
        }"#,
    );

    let (tree, _) = resolve_tree(temp_dir.path()).await;
    assert_eq!(tree.class_name, "DataModel");
    assert_eq!(child_names(&tree), vec!["ReplicatedStorage", "Workspace"]);

    let rs = child(&tree, "ReplicatedStorage");
    assert_eq!(rs.class_name, "ReplicatedStorage");
    assert_eq!(child_names(rs), vec!["Empty", "Remotes"]);
    assert_eq!(child(rs, "Empty").class_name, "Model");

    let remotes = child(rs, "Remotes");
    assert_eq!(remotes.class_name, "Folder");
    assert_eq!(child_names(remotes), vec!["Ask", "Fire"]);
    assert_eq!(child(&tree, "Workspace").class_name, "Workspace");
}

#[tokio::test]
async fn resolution_is_deterministic() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(root, "default.project.json", r#"{ "ServerStorage": { "$path": "src" } }"#);
    for name in ["Zeta.lua", "alpha.server.lua", "Mid.client.luau", "Dir/Inner.lua", "Dir/Deep/x.lua"] {
        write(root, &format!("src/{}", name), "");
    }

    let first = resolve_directory(root, &ResolveOptions::default()).await.unwrap();
    let second = resolve_directory(root, &ResolveOptions::default()).await.unwrap();
    assert_eq!(
        serde_json::to_string(&first.response).unwrap(),
        serde_json::to_string(&second.response).unwrap()
    );

    let storage = child(first.tree().unwrap(), "ServerStorage");
    assert_eq!(child_names(storage), vec!["Dir", "Mid", "Zeta", "alpha"]);
}

#[tokio::test]
async fn config_only_children_come_first() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(
        root,
        "default.project.json",
        r#"{
            "ReplicatedStorage": {
                "$path": "src",
                "Zed": { "$className": "RemoteEvent" },
                "Assets": { "$className": "Folder" },
                "Shared": { "$className": "Folder" }
            }
        }"#,
    );
    write(root, "src/Shared/Util.lua", "");
    write(root, "src/Alpha.lua", "");

    let (tree, _) = resolve_tree(root).await;
    let rs = child(&tree, "ReplicatedStorage");
    assert_eq!(child_names(rs), vec!["Assets", "Zed", "Alpha", "Shared"]);
    // Directory merged into the declared node
    assert_eq!(child_names(child(rs, "Shared")), vec!["Util"]);
}

#[tokio::test]
async fn init_scripts_bind_directories() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(root, "default.project.json", r#"{ "ServerScriptService": { "$path": "src" } }"#);
    write(root, "src/Combat/init.server.lua", "");
    write(root, "src/Combat/Damage.lua", "");
    write(root, "src/Shop/Shop.server.luau", "");
    write(root, "src/Lib/init.lua", "");

    let (tree, _) = resolve_tree(root).await;
    let sss = child(&tree, "ServerScriptService");
    assert_eq!(sss.class_name, "ServerScriptService");
    assert_eq!(sss.file_path, None);

    let combat = child(sss, "Combat");
    assert_eq!(combat.class_name, "Script");
    // Directory-backed, so no filePath even though the class comes from the script
    assert_eq!(combat.file_path, None);
    assert_eq!(child_names(combat), vec!["Damage"]);
    let damage = child(combat, "Damage");
    assert_eq!(damage.file_path, Some(canonical(root, "src/Combat/Damage.lua")));

    let shop = child(sss, "Shop");
    assert_eq!(shop.class_name, "Script");
    assert_eq!(shop.file_path, None);
    assert!(shop.children.is_empty());

    let lib = child(sss, "Lib");
    assert_eq!(lib.class_name, "ModuleScript");
    assert_eq!(lib.file_path, None);
}

#[tokio::test]
async fn ignore_unknown_instances_drops_disk_children() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(
        root,
        "default.project.json",
        r#"{
            "StarterGui": {
                "$path": "gui",
                "$ignoreUnknownInstances": true,
                "Menu": {}
            }
        }"#,
    );
    write(root, "gui/Menu.client.lua", "");
    write(root, "gui/Extra.lua", "");

    let (tree, _) = resolve_tree(root).await;
    let gui = child(&tree, "StarterGui");
    assert_eq!(child_names(gui), vec!["Menu"]);
    assert_eq!(child(gui, "Menu").class_name, "LocalScript");
}

#[tokio::test]
async fn broken_partitions_are_omitted() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(
        root,
        "default.project.json",
        r#"{
            "ReplicatedStorage": {
                "Good": { "$path": "src/Good.lua" },
                "Missing": { "$path": "src/Nope" },
                "Broken": { "$className": 42 },
                "Odd.Name": {}
            }
        }"#,
    );
    write(root, "src/Good.lua", "");

    let (tree, resolution) = resolve_tree(root).await;
    let rs = child(&tree, "ReplicatedStorage");
    assert_eq!(child_names(rs), vec!["Good"]);

    let errors: Vec<&str> = resolution
        .diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .map(|d| d.path.as_str())
        .collect();
    assert_eq!(errors.len(), 3);
    assert!(errors.contains(&"game.ReplicatedStorage.Missing"));
    assert!(errors.contains(&"game.ReplicatedStorage.Broken"));
    assert!(resolution.has_errors());
}

#[tokio::test]
async fn missing_root_path_resolves_unbound_root() {
    let temp_dir = TempDir::new().unwrap();
    write(
        temp_dir.path(),
        "default.project.json",
        r#"{ "name": "Demo", "tree": { "$path": "nowhere", "Workspace": {} } }"#,
    );

    let (tree, resolution) = resolve_tree(temp_dir.path()).await;
    assert_eq!(resolution.project_name.as_deref(), Some("Demo"));
    assert_eq!(child_names(&tree), vec!["Workspace"]);
    assert_eq!(resolution.diagnostics.len(), 1);
    assert_eq!(resolution.diagnostics[0].path, "game");
}

#[tokio::test]
async fn glob_ignore_paths_exclude_entries() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(
        root,
        "default.project.json",
        r#"{
            "name": "Globbed",
            "globIgnorePaths": ["src/**/*.spec.lua"],
            "tree": {
                "$className": "DataModel",
                "ReplicatedStorage": { "$path": "src" }
            }
        }"#,
    );
    write(root, "src/Thing.lua", "");
    write(root, "src/Thing.spec.lua", "");
    write(root, "src/Nested/Other.spec.lua", "");

    let (tree, _) = resolve_tree(root).await;
    let rs = child(&tree, "ReplicatedStorage");
    assert_eq!(child_names(rs), vec!["Nested", "Thing"]);
    assert!(child(rs, "Nested").children.is_empty());
}

#[tokio::test]
async fn non_script_path_binds_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(
        root,
        "default.project.json",
        r#"{ "Workspace": { "Data": { "$path": "data.json" } } }"#,
    );
    write(root, "data.json", "{}");

    let (tree, resolution) = resolve_tree(root).await;
    let data = child(child(&tree, "Workspace"), "Data");
    assert_eq!(data.class_name, "Model");
    assert_eq!(data.file_path, None);
    assert_eq!(resolution.diagnostics.len(), 1);
    assert_eq!(resolution.diagnostics[0].severity, Severity::Warning);
}

#[tokio::test]
async fn properties_are_carried_through() {
    let temp_dir = TempDir::new().unwrap();
    write(
        temp_dir.path(),
        "default.project.json",
        r#"{ "Lighting": { "$properties": { "Brightness": 2, "ClockTime": 14.5 } } }"#,
    );

    let (tree, _) = resolve_tree(temp_dir.path()).await;
    let lighting = child(&tree, "Lighting");
    assert_eq!(lighting.class_name, "Lighting");
    assert_eq!(lighting.properties.get("Brightness"), Some(&serde_json::json!(2)));

    let json = serde_json::to_value(lighting).unwrap();
    assert_eq!(json["properties"]["ClockTime"], serde_json::json!(14.5));
}

#[tokio::test]
async fn path_index_over_resolved_tree() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(root, "default.project.json", r#"{ "ServerScriptService": { "$path": "src" } }"#);
    write(root, "src/Main.server.lua", "");
    write(root, "src/Modules/Data.lua", "");

    let (tree, _) = resolve_tree(root).await;
    let index = PathIndex::build(&tree);
    assert_eq!(index.len(), tree.count());

    let data_file = canonical(root, "src/Modules/Data.lua");
    assert_eq!(
        index.by_file_path(&data_file).map(|n| n.path.as_str()),
        Some("game.ServerScriptService.Modules.Data")
    );
    assert_eq!(index.script_file("game.ServerScriptService.Modules.Data"), Some(data_file.as_str()));
    assert_eq!(
        index.nearest("game.ServerScriptService.Main.Child").map(|n| n.class_name.as_str()),
        Some("Script")
    );
}

#[tokio::test]
async fn encoded_directory_target() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("my game");
    write(&root, "default.project.json", r#"{ "Workspace": {} }"#);

    let encoded = path_to_string(&root).replace(' ', "%20");
    let resolution = resolve(&DirectoryTarget::from_encoded(&encoded), &ResolveOptions::default())
        .await
        .unwrap();
    assert!(resolution.tree().is_some());
}

#[tokio::test]
async fn depth_limit_omits_deep_directories() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(root, "default.project.json", r#"{ "ServerStorage": { "$path": "src" } }"#);
    write(root, "src/a/b/c/Deep.lua", "");

    let options = ResolveOptions {
        max_depth: 3,
        ..Default::default()
    };
    let resolution = resolve_directory(root, &options).await.unwrap();
    let tree = resolution.tree().unwrap();
    // game(0).ServerStorage(1).a(2).b(3) resolves; c(4) is too deep
    let b = child(child(child(tree, "ServerStorage"), "a"), "b");
    assert!(b.children.is_empty());
    assert!(resolution.has_errors());
}

#[cfg(unix)]
#[tokio::test]
async fn symlink_cycles_terminate() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(root, "default.project.json", r#"{ "ServerStorage": { "$path": "src" } }"#);
    write(root, "src/Loop/Thing.lua", "");
    std::os::unix::fs::symlink(root.join("src"), root.join("src/Loop/Back")).unwrap();

    let resolution = resolve_directory(root, &ResolveOptions::default()).await.unwrap();
    let tree = resolution.tree().unwrap();
    let looped = child(child(tree, "ServerStorage"), "Loop");
    assert_eq!(child_names(looped), vec!["Thing"]);
    assert!(resolution
        .diagnostics
        .iter()
        .any(|d| d.path == "game.ServerStorage.Loop.Back" && d.severity == Severity::Error));
}

#[cfg(unix)]
#[tokio::test]
async fn unreadable_entries_are_skipped_with_a_warning() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(root, "default.project.json", r#"{ "ServerStorage": { "$path": "src" } }"#);
    write(root, "src/Ok.lua", "return {}");
    std::os::unix::fs::symlink(root.join("src/Nowhere.lua"), root.join("src/Dangling.lua")).unwrap();

    let (tree, resolution) = resolve_tree(root).await;
    let storage = child(&tree, "ServerStorage");
    assert_eq!(child_names(storage), vec!["Ok"]);
    assert_eq!(child(storage, "Ok").class_name, "ModuleScript");
    assert!(resolution
        .diagnostics
        .iter()
        .any(|d| d.severity == Severity::Warning && d.path == "game.ServerStorage" && d.message.contains("Dangling.lua")));
    assert!(!resolution.has_errors());
}
