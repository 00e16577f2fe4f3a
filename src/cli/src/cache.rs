/* src/cli/src/cache.rs */

// The prepare-cache command: rebuild into the cache directory and report
// what the platform should keep for the next run.

use std::path::Path;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use now_build_utils::{FileRef, Npm};
use now_next::{BuildOptions, CacheContext, NccBundler};

use crate::snapshot::snapshot_project;
use crate::ui;

pub fn run_prepare_cache(
  project_dir: &Path,
  entrypoint: &str,
  cache_dir: &Path,
  work_dir: &Path,
  project_name: Option<&str>,
  options: &BuildOptions,
) -> Result<()> {
  let started = Instant::now();
  ui::banner("prepare-cache", project_name);

  ui::step(1, 2, "Snapshotting sources");
  let files = snapshot_project(project_dir)?;
  if !files.contains_key(entrypoint) {
    bail!("entrypoint {entrypoint} not found under {}", project_dir.display());
  }
  ui::detail_ok(&format!("{} files", files.len()));
  ui::blank();

  ui::step(2, 2, "Rebuilding into the cache");
  std::fs::create_dir_all(cache_dir)
    .with_context(|| format!("failed to create {}", cache_dir.display()))?;
  let npm = Npm;
  // Under the cache directory, so the compiler install is kept too.
  let bundler = NccBundler::new(cache_dir.join("ncc"), &npm);
  let ctx = CacheContext { files: &files, entrypoint, work_dir, cache_dir };
  let output = now_next::prepare_cache(&ctx, options, &npm, &bundler)?;
  for warning in &output.warnings {
    ui::warn(warning);
  }
  ui::blank();

  let elapsed = started.elapsed().as_secs_f64();
  let total: u64 = output.files.values().map(FileRef::size).sum();
  ui::ok(&format!("cache ready in {elapsed:.1}s"));
  ui::detail(&format!("{} files \u{00b7} {}", output.files.len(), ui::format_size(total)));

  Ok(())
}
