//! Stud CLI
//!
//! Command-line interface for resolving Rojo projects into instance trees.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use stud_core::{
    find_project_file, resolve, DirectoryTarget, PathIndex, Resolution, ResolveOptions, Severity,
};

#[derive(Parser)]
#[command(name = "stud")]
#[command(about = "Resolve Rojo projects into Roblox instance trees")]
#[command(version)]
struct Cli {
    /// Resolver options file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the resolved instance tree
    Tree {
        /// Project directory (default: current directory)
        dir: Option<String>,

        /// Treat DIR as percent-encoded
        #[arg(long)]
        encoded: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "json")]
        format: OutputFormat,
    },

    /// Print the project file that would be used
    Locate {
        /// Project directory (default: current directory)
        dir: Option<PathBuf>,
    },

    /// Look up an instance by its path (e.g. game.ServerScriptService.Main)
    Find {
        path: String,

        /// Project directory (default: current directory)
        dir: Option<PathBuf>,
    },

    /// Print the source of the script behind an instance
    Show {
        path: String,

        /// Project directory (default: current directory)
        dir: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("stud=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let options = load_options(cli.config.as_deref())?;

    match cli.command {
        Commands::Tree { dir, encoded, format } => {
            let target = match dir {
                Some(dir) if encoded => DirectoryTarget::from_encoded(&dir),
                Some(dir) => DirectoryTarget::Explicit(PathBuf::from(dir)),
                None => DirectoryTarget::CurrentDir,
            };
            cmd_tree(&target, format, &options).await?;
        }
        Commands::Locate { dir } => {
            cmd_locate(&target_for(dir), &options).await?;
        }
        Commands::Find { path, dir } => {
            cmd_find(&path, &target_for(dir), &options).await?;
        }
        Commands::Show { path, dir } => {
            cmd_show(&path, &target_for(dir), &options).await?;
        }
    }

    Ok(())
}

fn target_for(dir: Option<PathBuf>) -> DirectoryTarget {
    dir.map(DirectoryTarget::Explicit).unwrap_or(DirectoryTarget::CurrentDir)
}

fn load_options(path: Option<&Path>) -> Result<ResolveOptions> {
    match path {
        Some(path) => ResolveOptions::from_toml_file(path)
            .with_context(|| format!("Failed to load options from {}", path.display())),
        None => Ok(ResolveOptions::default()),
    }
}

async fn resolve_target(target: &DirectoryTarget, options: &ResolveOptions) -> Result<Resolution> {
    tracing::info!("Resolving {:?}", target);
    let resolution = resolve(target, options)
        .await
        .context("Failed to resolve project")?;
    report_diagnostics(&resolution);
    Ok(resolution)
}

fn report_diagnostics(resolution: &Resolution) {
    for diagnostic in &resolution.diagnostics {
        match diagnostic.severity {
            Severity::Warning => tracing::warn!("{}: {}", diagnostic.path, diagnostic.message),
            Severity::Error => tracing::error!("{}: {}", diagnostic.path, diagnostic.message),
        }
    }
    if resolution.has_errors() {
        tracing::error!("Some partitions were omitted from the tree");
    }
}

/// Print the tree response
async fn cmd_tree(target: &DirectoryTarget, format: OutputFormat, options: &ResolveOptions) -> Result<()> {
    let resolution = resolve_target(target, options).await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&resolution.response)?);
        }
        OutputFormat::Text => match (&resolution.response.tree, &resolution.response.project_file) {
            (Some(tree), Some(project_file)) => {
                println!("Project: {}", project_file);
                if let Some(name) = &resolution.project_name {
                    println!("Name: {}", name);
                }
                println!();
                print!("{}", tree.render_text());
            }
            _ => println!("No project file found"),
        },
    }

    Ok(())
}

/// Print the located project file
async fn cmd_locate(target: &DirectoryTarget, options: &ResolveOptions) -> Result<()> {
    let dir = target.to_path().context("Failed to determine directory")?;
    let found = find_project_file(&dir, options)
        .await
        .with_context(|| format!("Failed to search {}", dir.display()))?;

    match found {
        Some(path) => {
            tracing::info!("Found project file in {}", dir.display());
            println!("{}", stud_core::path_to_string(&path));
            Ok(())
        }
        None => anyhow::bail!("No project file found in {}", dir.display()),
    }
}

/// Look up one instance by path, falling back to its nearest known ancestor
async fn cmd_find(path: &str, target: &DirectoryTarget, options: &ResolveOptions) -> Result<()> {
    let resolution = resolve_target(target, options).await?;
    let tree = resolution.tree().context("No project file found")?;
    let index = PathIndex::build(tree);

    let node = index
        .nearest(path)
        .with_context(|| format!("{} is not in the project tree", path))?;
    if node.path != path {
        tracing::warn!("{} is not in the project tree; nearest is {}", path, node.path);
    }

    println!("{} ({})", node.path, node.class_name);
    if let Some(file_path) = &node.file_path {
        println!("  file: {}", file_path);
    }
    println!("  children: {}", node.children.len());
    Ok(())
}

/// Print the source behind a script instance
async fn cmd_show(path: &str, target: &DirectoryTarget, options: &ResolveOptions) -> Result<()> {
    let resolution = resolve_target(target, options).await?;
    let tree = resolution.tree().context("No project file found")?;
    let index = PathIndex::build(tree);

    let node = index
        .get(path)
        .with_context(|| format!("{} is not in the project tree", path))?;
    let file_path = index
        .script_file(path)
        .with_context(|| format!("{} ({}) is not backed by a script file", path, node.class_name))?;

    let source = tokio::fs::read_to_string(file_path)
        .await
        .with_context(|| format!("Failed to read {}", file_path))?;

    for (i, line) in source.lines().enumerate() {
        println!("{:05}| {}", i + 1, line);
    }
    Ok(())
}
