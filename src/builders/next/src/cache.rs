/* src/builders/next/src/cache.rs */

// Cache preparation: run the pipeline once more into the cache directory
// and keep only what makes the next run faster.

use std::path::Path;

use anyhow::Result;

use now_build_utils::{glob_files, FileSet, Installer};

use crate::bundler::Bundler;
use crate::driver::{run_driver, BuildContext, BuildOptions};

/// What survives between runs: installed dependencies, lock files, and
/// the compiler's incremental records. Credentials are removed by the
/// driver before this enumeration can see them.
const CACHE_PATTERNS: [&str; 8] = [
  "user/node_modules/**",
  "user/package-lock.json",
  "user/yarn.lock",
  "ncc/node_modules/**",
  "ncc/package-lock.json",
  "ncc/yarn.lock",
  "user/.next/records.json",
  "user/.next/server/records.json",
];

pub struct CacheContext<'a> {
  pub files: &'a FileSet,
  pub entrypoint: &'a str,
  /// Scratch directory of the build that just finished, dropped here.
  pub work_dir: &'a Path,
  /// Writable directory whose selected contents are handed back to the
  /// platform for the next run.
  pub cache_dir: &'a Path,
}

pub struct CacheOutput {
  pub files: FileSet,
  pub warnings: Vec<String>,
}

/// Rebuild into the cache directory, then enumerate the keepers. For the
/// compiler install to be cached too, the bundler should live under
/// `ncc/` inside the cache directory.
pub fn prepare_cache(
  ctx: &CacheContext<'_>,
  options: &BuildOptions,
  installer: &dyn Installer,
  bundler: &dyn Bundler,
) -> Result<CacheOutput> {
  let mut warnings = Vec::new();
  if ctx.work_dir.exists() {
    // Best-effort: a stale work directory wastes disk but breaks nothing.
    if let Err(err) = std::fs::remove_dir_all(ctx.work_dir) {
      warnings.push(format!("could not remove {}: {err}", ctx.work_dir.display()));
    }
  }

  let build_ctx =
    BuildContext { files: ctx.files, entrypoint: ctx.entrypoint, work_dir: ctx.cache_dir };
  let driver_output = run_driver(&build_ctx, options, installer, bundler)?;
  warnings.extend(driver_output.warnings);

  let mut files = FileSet::new();
  for pattern in CACHE_PATTERNS {
    files.extend(glob_files(ctx.cache_dir, pattern)?);
  }
  Ok(CacheOutput { files, warnings })
}
