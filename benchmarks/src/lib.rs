//! Fixture generation for the resolution benchmarks

use std::fs;
use std::io;
use std::path::Path;

use tempfile::TempDir;

/// Write a project with `services` top-level partitions, each bound to a
/// directory tree `depth` levels deep with `breadth` folders and scripts
/// per level.
pub fn generate_project(services: usize, breadth: usize, depth: usize) -> io::Result<TempDir> {
    let temp_dir = TempDir::new()?;
    let mut tree = String::from("{");
    for s in 0..services {
        let dir = format!("src/Service{}", s);
        if s > 0 {
            tree.push(',');
        }
        tree.push_str(&format!(r#""Service{s}": {{ "$className": "Folder", "$path": "{dir}" }}"#));
        build_level(&temp_dir.path().join(&dir), breadth, depth)?;
    }
    tree.push('}');
    fs::write(temp_dir.path().join("default.project.json"), tree)?;
    Ok(temp_dir)
}

fn build_level(dir: &Path, breadth: usize, remaining_depth: usize) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    for i in 0..breadth {
        fs::write(dir.join(format!("Module{}.luau", i)), "return {}\n")?;
        if remaining_depth > 0 {
            build_level(&dir.join(format!("Folder{}", i)), breadth, remaining_depth - 1)?;
        }
    }
    Ok(())
}
