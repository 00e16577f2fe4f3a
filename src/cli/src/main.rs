/* src/cli/src/main.rs */

mod build;
mod cache;
mod config;
mod snapshot;
mod ui;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use now_next::BuildOptions;

use config::{load_now_config, NowConfig};

#[derive(Parser)]
#[command(name = "now-builder", about = "Next.js builder pipeline for the Now platform")]
struct Cli {
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Build the project into deployable lambdas and static files
  Build {
    /// Project directory (defaults to the current directory)
    #[arg(short, long)]
    project: Option<PathBuf>,
    /// Path to now.toml (project root is checked if omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Entrypoint relative to the project root
    #[arg(short, long)]
    entrypoint: Option<String>,
    /// Output directory for packaged results
    #[arg(short, long)]
    out: Option<PathBuf>,
    /// Scratch directory for the build
    #[arg(long)]
    work_dir: Option<PathBuf>,
  },
  /// Rebuild into the cache directory and report what to keep
  PrepareCache {
    /// Project directory (defaults to the current directory)
    #[arg(short, long)]
    project: Option<PathBuf>,
    /// Path to now.toml (project root is checked if omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Entrypoint relative to the project root
    #[arg(short, long)]
    entrypoint: Option<String>,
    /// Cache directory handed back to the platform
    #[arg(long)]
    cache_dir: Option<PathBuf>,
    /// Scratch directory of the previous build
    #[arg(long)]
    work_dir: Option<PathBuf>,
  },
}

/// Warn if `.now/` is not covered by any gitignore rule
fn warn_now_not_gitignored(project_dir: &Path) {
  use std::process::Command;
  let output =
    Command::new("git").args(["check-ignore", "-q", ".now"]).current_dir(project_dir).output();
  match output {
    // exit 1 = not ignored by any gitignore rule
    Ok(o) if o.status.code() == Some(1) => {
      ui::warn(".now/ is not in .gitignore -- consider adding it to avoid tracking build output");
    }
    // exit 0 = ignored (good); other = not a git repo or git missing (skip)
    _ => {}
  }
}

fn resolve_project(explicit: Option<PathBuf>) -> Result<PathBuf> {
  let dir = explicit.unwrap_or_else(|| PathBuf::from("."));
  dir.canonicalize().with_context(|| format!("failed to resolve {}", dir.display()))
}

/// An explicit --config path has to exist; otherwise the project root is
/// checked for `now.toml` and going without is fine.
fn resolve_config(explicit: Option<PathBuf>, project_dir: &Path) -> Result<Option<NowConfig>> {
  match explicit {
    Some(path) => config::load_config_file(&path).map(Some),
    None => load_now_config(project_dir),
  }
}

/// Flag wins over `now.toml`, which wins over the default entrypoint.
fn resolve_entrypoint(explicit: Option<String>, config: Option<&NowConfig>) -> String {
  explicit
    .or_else(|| config.and_then(|c| c.build.entrypoint.clone()))
    .unwrap_or_else(|| "package.json".to_string())
}

/// Pipeline knobs from `now.toml` plus the one environment lookup. The
/// registry token never travels further than the options struct.
fn resolve_options(config: Option<&NowConfig>) -> BuildOptions {
  let auth_token = std::env::var("NPM_AUTH_TOKEN").ok().filter(|token| !token.is_empty());
  let defaults = BuildOptions::default();
  let section = config.map(|c| &c.build);
  BuildOptions {
    auth_token,
    static_dir: section.and_then(|s| s.static_dir.clone()).unwrap_or(defaults.static_dir),
    max_lambda_size: section.and_then(|s| s.max_lambda_size).unwrap_or(defaults.max_lambda_size),
    runtime: section.and_then(|s| s.runtime.clone()).unwrap_or(defaults.runtime),
  }
}

fn main() {
  if let Err(err) = run() {
    ui::fail(&format!("{err:#}"));
    std::process::exit(1);
  }
}

fn run() -> Result<()> {
  let cli = Cli::parse();

  match cli.command {
    Command::Build { project, config, entrypoint, out, work_dir } => {
      let project_dir = resolve_project(project)?;
      let config = resolve_config(config, &project_dir)?;
      let entrypoint = resolve_entrypoint(entrypoint, config.as_ref());
      let options = resolve_options(config.as_ref());
      let out_dir = out.unwrap_or_else(|| project_dir.join(".now/output"));
      let work_dir = work_dir.unwrap_or_else(|| project_dir.join(".now/build"));
      warn_now_not_gitignored(&project_dir);
      build::run_build(
        &project_dir,
        &entrypoint,
        &out_dir,
        &work_dir,
        config.as_ref().map(|c| c.project.name.as_str()),
        &options,
      )
    }
    Command::PrepareCache { project, config, entrypoint, cache_dir, work_dir } => {
      let project_dir = resolve_project(project)?;
      let config = resolve_config(config, &project_dir)?;
      let entrypoint = resolve_entrypoint(entrypoint, config.as_ref());
      let options = resolve_options(config.as_ref());
      let cache_dir = cache_dir.unwrap_or_else(|| project_dir.join(".now/cache"));
      let work_dir = work_dir.unwrap_or_else(|| project_dir.join(".now/build"));
      cache::run_prepare_cache(
        &project_dir,
        &entrypoint,
        &cache_dir,
        &work_dir,
        config.as_ref().map(|c| c.project.name.as_str()),
        &options,
      )
    }
  }
}
