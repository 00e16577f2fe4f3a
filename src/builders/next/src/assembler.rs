/* src/builders/next/src/assembler.rs */

// Turns the post-build file set into per-route lambdas plus static
// assets. Pure over the driver's output: everything is keyed lookups and
// set transforms, nothing here touches the filesystem.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use rayon::prelude::*;

use now_build_utils::{
  create_lambda, exclude, in_directory, only_static_directory, select_only, BuilderOutput,
  FileRef, FileSet, Lambda,
};

use crate::driver::{BuildOptions, DriverOutput};
use crate::error::BuildError;
use crate::launcher::{
  is_reserved_page, render_legacy_launcher, route_output_path, BRIDGE_FILENAME, BRIDGE_SOURCE,
  LAUNCHER_FILENAME, LAUNCHER_HANDLER, MODERN_LAUNCHER_SOURCE, PAGE_FILENAME, RESERVED_PAGES,
};
use crate::version::PackagingMode;

const BUILD_ID_PATH: &str = ".next/BUILD_ID";
const SERVERLESS_PAGES_DIR: &str = ".next/serverless/pages";
const BUILD_STATIC_PREFIX: &str = ".next/static/";

pub(crate) fn assemble(
  driver_output: &DriverOutput,
  options: &BuildOptions,
) -> Result<IndexMap<String, BuilderOutput>> {
  let lambdas = match driver_output.mode {
    PackagingMode::Legacy => legacy_lambdas(driver_output, options)?,
    PackagingMode::Modern => modern_lambdas(driver_output, options)?,
  };

  let mut outputs: IndexMap<String, BuilderOutput> =
    lambdas.into_iter().map(|(path, lambda)| (path, BuilderOutput::Lambda(lambda))).collect();
  // Merged after the lambdas, so on a colliding key a static asset
  // replaces the route.
  outputs.extend(build_static_files(driver_output));
  outputs.extend(static_directory_files(driver_output, options));
  Ok(outputs)
}

/// The compiler writes its build id once per successful run. Reading it
/// doubles as the check that the build script really compiled something.
fn read_build_id(files_after_build: &FileSet) -> Result<String> {
  let Some(file) = files_after_build.get(BUILD_ID_PATH) else {
    return Err(BuildError::MissingBuildId.into());
  };
  let data = file.read().context("failed to read .next/BUILD_ID")?;
  Ok(String::from_utf8_lossy(&data).trim().to_string())
}

fn legacy_lambdas(
  driver_output: &DriverOutput,
  options: &BuildOptions,
) -> Result<Vec<(String, Lambda)>> {
  let files_after_build = &driver_output.files_after_build;
  let build_id = read_build_id(files_after_build)?;

  // Everything the framework runtime needs at request time, shared by
  // every route.
  let mut shared = exclude(
    &select_only(files_after_build, in_directory("node_modules")),
    in_directory("node_modules/.cache"),
  );
  shared.extend(direct_children_of(files_after_build, ".next"));
  shared.extend(direct_children_of(files_after_build, ".next/server"));
  shared.insert(BRIDGE_FILENAME.to_string(), FileRef::blob(BRIDGE_SOURCE));
  if let Some(config) = files_after_build.get("next.config.js") {
    shared.insert("next.config.js".to_string(), config.clone());
  }
  insert_override(&mut shared, driver_output);

  let pages_dir = format!(".next/server/static/{build_id}/pages");
  let pages = page_modules(files_after_build, &pages_dir);

  pages
    .par_iter()
    .filter(|(page, _)| !is_reserved_page(page))
    .map(|(page, module)| {
      let mut files = shared.clone();
      for reserved in RESERVED_PAGES {
        let key = format!("{pages_dir}/{reserved}");
        if let Some(file) = files_after_build.get(&key) {
          files.insert(key, file.clone());
        }
      }
      files.insert(format!("{pages_dir}/{page}"), module.clone());
      files.insert(LAUNCHER_FILENAME.to_string(), FileRef::blob(render_legacy_launcher(page)));
      let lambda =
        create_lambda(files, LAUNCHER_HANDLER, &options.runtime, options.max_lambda_size)?;
      Ok((join_output(&driver_output.entry_directory, &route_output_path(page)), lambda))
    })
    .collect()
}

fn modern_lambdas(
  driver_output: &DriverOutput,
  options: &BuildOptions,
) -> Result<Vec<(String, Lambda)>> {
  let files_after_build = &driver_output.files_after_build;
  read_build_id(files_after_build)?;

  let pages = page_modules(files_after_build, SERVERLESS_PAGES_DIR);
  if pages.is_empty() {
    // Checked before the reserved filter: an empty directory means the
    // framework build failed or was misconfigured, not an empty app.
    return Err(BuildError::NoServerlessPagesBuilt.into());
  }

  let mut shared = FileSet::new();
  shared.insert(BRIDGE_FILENAME.to_string(), FileRef::blob(BRIDGE_SOURCE));
  shared.insert(LAUNCHER_FILENAME.to_string(), FileRef::blob(MODERN_LAUNCHER_SOURCE));
  insert_override(&mut shared, driver_output);

  pages
    .par_iter()
    .filter(|(page, _)| !is_reserved_page(page))
    .map(|(page, module)| {
      let mut files = shared.clone();
      files.insert(PAGE_FILENAME.to_string(), module.clone());
      let lambda =
        create_lambda(files, LAUNCHER_HANDLER, &options.runtime, options.max_lambda_size)?;
      Ok((join_output(&driver_output.entry_directory, &route_output_path(page)), lambda))
    })
    .collect()
}

/// The override ships only when its source survived the build, under the
/// name the launcher resolves at runtime.
fn insert_override(shared: &mut FileSet, driver_output: &DriverOutput) {
  if let Some((name, code)) = &driver_output.override_blob {
    if driver_output.files_after_build.contains_key(name) {
      shared.insert(name.clone(), FileRef::blob(code.clone()));
    }
  }
}

/// Files directly inside `dir`, not in any subdirectory.
fn direct_children_of(files: &FileSet, dir: &str) -> FileSet {
  let prefix = format!("{dir}/");
  select_only(files, |path: &str| {
    path.strip_prefix(&prefix).is_some_and(|rest| !rest.contains('/'))
  })
}

/// Compiled page modules under `dir`, keyed by their path relative to it.
fn page_modules(files: &FileSet, dir: &str) -> Vec<(String, FileRef)> {
  let prefix = format!("{dir}/");
  files
    .iter()
    .filter_map(|(path, file)| {
      let rel = path.strip_prefix(&prefix)?;
      rel.ends_with(".js").then(|| (rel.to_string(), file.clone()))
    })
    .collect()
}

/// Compiled client assets, exposed under the framework's public URL
/// space.
fn build_static_files(driver_output: &DriverOutput) -> Vec<(String, BuilderOutput)> {
  driver_output
    .files_after_build
    .iter()
    .filter_map(|(path, file)| {
      path.strip_prefix(BUILD_STATIC_PREFIX).map(|rest| {
        let key = join_output(&driver_output.entry_directory, &format!("_next/static/{rest}"));
        (key, BuilderOutput::Static(file.clone()))
      })
    })
    .collect()
}

/// The user's own static directory, set aside before the build and served
/// as-is.
fn static_directory_files(
  driver_output: &DriverOutput,
  options: &BuildOptions,
) -> Vec<(String, BuilderOutput)> {
  only_static_directory(&driver_output.files_without_lockfiles, &options.static_dir)
    .into_iter()
    .map(|(path, file)| {
      (join_output(&driver_output.entry_directory, &path), BuilderOutput::Static(file))
    })
    .collect()
}

/// Output key under the entry directory. A root project contributes no
/// prefix.
fn join_output(entry_directory: &str, path: &str) -> String {
  if entry_directory.is_empty() || entry_directory == "." {
    path.to_string()
  } else {
    format!("{entry_directory}/{path}")
  }
}
