/* src/cli/src/build.rs */

// The build command: snapshot the project, run the pipeline, package
// every output under the output directory.

use std::path::Path;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use now_build_utils::{BuilderOutput, Npm};
use now_next::{BuildContext, BuildOptions, BuildOutput, NccBundler};
use serde::Serialize;

use crate::snapshot::snapshot_project;
use crate::ui;

/// One line of `output-manifest.json`, describing where a deploy path
/// landed on disk.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum OutputEntry {
  Lambda { path: String, handler: String, runtime: String, archive: String, size: u64 },
  Static { path: String, file: String, size: u64 },
}

pub fn run_build(
  project_dir: &Path,
  entrypoint: &str,
  out_dir: &Path,
  work_dir: &Path,
  project_name: Option<&str>,
  options: &BuildOptions,
) -> Result<()> {
  let started = Instant::now();
  ui::banner("build", project_name);
  ui::arrow(&format!("entrypoint {entrypoint}"));
  ui::blank();

  // [1/3] Snapshot
  ui::step(1, 3, "Snapshotting sources");
  let files = snapshot_project(project_dir)?;
  if !files.contains_key(entrypoint) {
    bail!("entrypoint {entrypoint} not found under {}", project_dir.display());
  }
  ui::detail_ok(&format!("{} files", files.len()));
  ui::blank();

  // [2/3] Pipeline
  ui::step(2, 3, "Running the build pipeline");
  std::fs::create_dir_all(work_dir)
    .with_context(|| format!("failed to create {}", work_dir.display()))?;
  let npm = Npm;
  let bundler = NccBundler::new(work_dir.join("ncc"), &npm);
  let ctx = BuildContext { files: &files, entrypoint, work_dir };
  let output = now_next::build(&ctx, options, &npm, &bundler)?;
  for warning in &output.warnings {
    ui::warn(warning);
  }
  ui::detail(&format!("{} packaging", output.mode));
  ui::blank();

  // [3/3] Package
  ui::step(3, 3, "Writing output");
  let entries = write_outputs(&output, out_dir)?;
  let manifest_path = out_dir.join("output-manifest.json");
  let manifest_json =
    serde_json::to_string_pretty(&entries).context("failed to serialize the output manifest")?;
  std::fs::write(&manifest_path, manifest_json)
    .with_context(|| format!("failed to write {}", manifest_path.display()))?;
  ui::detail_ok("output-manifest.json");
  ui::blank();

  // Summary
  let elapsed = started.elapsed().as_secs_f64();
  let lambda_count = entries.iter().filter(|e| matches!(e, OutputEntry::Lambda { .. })).count();
  let static_count = entries.len() - lambda_count;
  ui::ok(&format!("build complete in {elapsed:.1}s"));
  ui::detail(&format!(
    "{lambda_count} lambdas \u{00b7} {static_count} static files \u{00b7} {} packaging",
    output.mode
  ));

  Ok(())
}

/// Write every build output under `out_dir`: lambdas as ZIP archives
/// below `lambdas/`, plain files below `static/`.
fn write_outputs(output: &BuildOutput, out_dir: &Path) -> Result<Vec<OutputEntry>> {
  // The output manifest lands in this directory even when the build
  // produced nothing.
  std::fs::create_dir_all(out_dir)
    .with_context(|| format!("failed to create {}", out_dir.display()))?;
  let mut entries = Vec::new();
  for (path, builder_output) in &output.files {
    match builder_output {
      BuilderOutput::Lambda(lambda) => {
        let archive = format!("lambdas/{path}.zip");
        let data = lambda.zip_contents().with_context(|| format!("failed to package {path}"))?;
        let size = data.len() as u64;
        if size > lambda.max_size {
          bail!(
            "lambda {path} packaged to {}, over the {} limit",
            ui::format_size(size),
            ui::format_size(lambda.max_size)
          );
        }
        write_file(out_dir, &archive, &data)?;
        ui::detail_ok(&format!("{path}  {}", ui::format_size(size)));
        entries.push(OutputEntry::Lambda {
          path: path.clone(),
          handler: lambda.handler.clone(),
          runtime: lambda.runtime.clone(),
          archive,
          size,
        });
      }
      BuilderOutput::Static(file) => {
        let target = format!("static/{path}");
        let data = file.read().with_context(|| format!("failed to read {path}"))?;
        write_file(out_dir, &target, &data)?;
        entries.push(OutputEntry::Static { path: path.clone(), file: target, size: file.size() });
      }
    }
  }
  Ok(entries)
}

fn write_file(out_dir: &Path, relative: &str, data: &[u8]) -> Result<()> {
  let target = out_dir.join(relative);
  if let Some(parent) = target.parent() {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {}", parent.display()))?;
  }
  std::fs::write(&target, data).with_context(|| format!("failed to write {}", target.display()))
}
