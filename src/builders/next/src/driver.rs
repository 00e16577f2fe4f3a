/* src/builders/next/src/driver.rs */

// The build pipeline: filter and materialize the project, shape its
// manifest for the selected packaging mode, install, run the build
// script, bundle the optional dispatch override, and re-enumerate the
// directory for assembly.

use std::io;
use std::path::Path;

use anyhow::Result;
use indexmap::IndexMap;

use now_build_utils::{
  download, exclude_lock_files, exclude_static_directory, glob_files, read_package_json,
  remove_npmrc, reparent_to_root, restrict_to_subtree, write_npmrc, write_package_json,
  BuilderOutput, FileSet, Installer, DEFAULT_MAX_LAMBDA_SIZE, DEFAULT_STATIC_DIR,
};

use crate::assembler;
use crate::bundler::Bundler;
use crate::error::BuildError;
use crate::manifest::{
  ensure_build_script, normalize_package_json, MODERN_BUILD_SCRIPT, NOW_BUILD_SCRIPT,
};
use crate::version::{framework_version, packaging_mode, PackagingMode};

pub const DEFAULT_RUNTIME: &str = "nodejs8.10";

/// Recognized dispatch-override sources, in lookup order. The second name
/// is the older convention and still honored.
const OVERRIDE_SOURCES: [&str; 2] = ["launcher.config.js", "now.launcher.js"];

/// What one build invocation receives from the platform.
pub struct BuildContext<'a> {
  pub files: &'a FileSet,
  pub entrypoint: &'a str,
  pub work_dir: &'a Path,
}

/// Per-build knobs. Environment lookups stay at the caller's edge, the
/// pipeline itself only sees these.
#[derive(Debug, Clone)]
pub struct BuildOptions {
  pub auth_token: Option<String>,
  pub static_dir: String,
  pub max_lambda_size: u64,
  pub runtime: String,
}

impl Default for BuildOptions {
  fn default() -> Self {
    Self {
      auth_token: None,
      static_dir: DEFAULT_STATIC_DIR.to_string(),
      max_lambda_size: DEFAULT_MAX_LAMBDA_SIZE,
      runtime: DEFAULT_RUNTIME.to_string(),
    }
  }
}

/// Everything the build steps leave behind for assembly.
pub(crate) struct DriverOutput {
  pub(crate) files_after_build: FileSet,
  pub(crate) files_without_lockfiles: FileSet,
  pub(crate) override_blob: Option<(String, Vec<u8>)>,
  pub(crate) mode: PackagingMode,
  pub(crate) entry_directory: String,
  pub(crate) warnings: Vec<String>,
}

/// Final build result: deployable units keyed by output path.
#[derive(Debug)]
pub struct BuildOutput {
  pub files: IndexMap<String, BuilderOutput>,
  pub mode: PackagingMode,
  pub warnings: Vec<String>,
}

/// Run the whole pipeline and package the compiled output per route.
pub fn build(
  ctx: &BuildContext<'_>,
  options: &BuildOptions,
  installer: &dyn Installer,
  bundler: &dyn Bundler,
) -> Result<BuildOutput> {
  let driver_output = run_driver(ctx, options, installer, bundler)?;
  let files = assembler::assemble(&driver_output, options)?;
  Ok(BuildOutput { files, mode: driver_output.mode, warnings: driver_output.warnings })
}

pub(crate) fn run_driver(
  ctx: &BuildContext<'_>,
  options: &BuildOptions,
  installer: &dyn Installer,
  bundler: &dyn Bundler,
) -> Result<DriverOutput> {
  validate_entrypoint(ctx.entrypoint)?;
  let entry_directory = entry_directory(ctx.entrypoint);
  let mut warnings = Vec::new();

  let restricted = restrict_to_subtree(ctx.files, entry_directory);
  let reparented = reparent_to_root(&restricted, entry_directory);
  let files_without_lockfiles = exclude_lock_files(&reparented);
  let deployable = exclude_static_directory(&files_without_lockfiles, &options.static_dir);

  let user_dir = ctx.work_dir.join("user");
  let downloaded = download(&deployable, &user_dir)?;

  let package_json = read_package_json(&downloaded)?;
  let version = framework_version(&package_json)?;
  let mode = packaging_mode(version)?;

  match mode {
    PackagingMode::Legacy => {
      remove_lock_files(&user_dir, &mut warnings);
      write_package_json(&user_dir, &normalize_package_json(&package_json))?;
    }
    PackagingMode::Modern => {
      let mut package_json = package_json;
      if ensure_build_script(&mut package_json, MODERN_BUILD_SCRIPT) {
        write_package_json(&user_dir, &package_json)?;
      }
    }
  }

  if let Some(token) = &options.auth_token {
    write_npmrc(&user_dir, token)?;
  }

  installer.install(&user_dir, &["--prefer-offline"])?;
  if options.auth_token.is_some() && mode == PackagingMode::Modern {
    // No further install in modern mode, the credentials go now.
    remove_npmrc(&user_dir)?;
  }

  installer.run_script(&user_dir, NOW_BUILD_SCRIPT)?;

  let override_blob = bundle_override(&downloaded, &user_dir, bundler)?;

  if mode == PackagingMode::Legacy {
    // Prune development-only packages, legacy lambdas ship node_modules.
    installer.install(&user_dir, &["--prefer-offline", "--production"])?;
    if options.auth_token.is_some() {
      remove_npmrc(&user_dir)?;
    }
  }

  let files_after_build = glob_files(&user_dir, "**")?;

  Ok(DriverOutput {
    files_after_build,
    files_without_lockfiles,
    override_blob,
    mode,
    entry_directory: entry_directory.to_string(),
    warnings,
  })
}

pub(crate) fn validate_entrypoint(entrypoint: &str) -> Result<(), BuildError> {
  let basename = entrypoint.rsplit('/').next().unwrap_or(entrypoint);
  if basename == "package.json" || basename == "next.config.js" {
    Ok(())
  } else {
    Err(BuildError::InvalidEntrypoint(entrypoint.to_string()))
  }
}

/// The project root inside the input set. Empty for a top-level project.
pub(crate) fn entry_directory(entrypoint: &str) -> &str {
  entrypoint.rsplit_once('/').map_or("", |(dir, _)| dir)
}

/// A cache restore can resurrect lock files in the scratch directory, and
/// a legacy build must resolve its pinned dependencies fresh. Removal is
/// best-effort.
fn remove_lock_files(user_dir: &Path, warnings: &mut Vec<String>) {
  for name in ["package-lock.json", "yarn.lock"] {
    match std::fs::remove_file(user_dir.join(name)) {
      Ok(()) => {}
      Err(err) if err.kind() == io::ErrorKind::NotFound => {}
      Err(err) => warnings.push(format!("could not remove {name}: {err}")),
    }
  }
}

/// Compile the user's dispatch override when one was deployed. The blob
/// keeps its source name, that is the name the launcher resolves at
/// runtime.
fn bundle_override(
  downloaded: &FileSet,
  user_dir: &Path,
  bundler: &dyn Bundler,
) -> Result<Option<(String, Vec<u8>)>> {
  for source in OVERRIDE_SOURCES {
    if downloaded.contains_key(source) {
      let bundle = bundler.bundle(&user_dir.join(source))?;
      return Ok(Some((source.to_string(), bundle.code.into_bytes())));
    }
  }
  Ok(None)
}
