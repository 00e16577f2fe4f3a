/* src/build-utils/src/npm.rs */

// The project manifest model plus the npm process wrappers builders drive.

use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::file_ref::FileSet;

const NPMRC_FILENAME: &str = ".npmrc";

/// Parsed package.json. Unknown top-level fields survive a
/// read -> modify -> write round trip through `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageJson {
  #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
  pub dependencies: IndexMap<String, String>,
  #[serde(
    default,
    rename = "devDependencies",
    skip_serializing_if = "IndexMap::is_empty"
  )]
  pub dev_dependencies: IndexMap<String, String>,
  #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
  pub scripts: IndexMap<String, String>,
  #[serde(flatten)]
  pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Read the manifest out of a file set. A project without one gets the
/// empty manifest, matching how the platform treats bare directories.
pub fn read_package_json(files: &FileSet) -> Result<PackageJson> {
  let Some(file) = files.get("package.json") else {
    return Ok(PackageJson::default());
  };
  let data = file.read().context("failed to read package.json")?;
  serde_json::from_slice(&data).context("failed to parse package.json")
}

pub fn write_package_json(dir: &Path, package_json: &PackageJson) -> Result<()> {
  let path = dir.join("package.json");
  let json = serde_json::to_string_pretty(package_json).context("failed to serialize manifest")?;
  fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))
}

/// Registry credentials for the install step. The caller is responsible
/// for removing this again before anything globs the directory.
pub fn write_npmrc(dir: &Path, token: &str) -> Result<()> {
  let path = dir.join(NPMRC_FILENAME);
  fs::write(&path, format!("//registry.npmjs.org/:_authToken={token}"))
    .with_context(|| format!("failed to write {}", path.display()))
}

pub fn remove_npmrc(dir: &Path) -> Result<()> {
  let path = dir.join(NPMRC_FILENAME);
  fs::remove_file(&path).with_context(|| format!("failed to remove {}", path.display()))
}

/// The dependency-installation tool, as the pipeline sees it: mutates a
/// directory in place and reports success or failure. Injected so tests
/// can substitute a fake that fabricates build output.
pub trait Installer {
  fn install(&self, dir: &Path, args: &[&str]) -> Result<()>;
  fn run_script(&self, dir: &Path, name: &str) -> Result<()>;
}

/// Real npm, spawned as a child process.
pub struct Npm;

impl Installer for Npm {
  fn install(&self, dir: &Path, args: &[&str]) -> Result<()> {
    let mut cmd = Command::new("npm");
    cmd.arg("install").args(args).current_dir(dir);
    run_captured(cmd, "npm install")
  }

  fn run_script(&self, dir: &Path, name: &str) -> Result<()> {
    let manifest_path = dir.join("package.json");
    let data = fs::read(&manifest_path)
      .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    let package_json: PackageJson =
      serde_json::from_slice(&data).context("failed to parse package.json")?;
    if !package_json.scripts.contains_key(name) {
      bail!("script {name:?} not found in package.json");
    }
    let mut cmd = Command::new("npm");
    cmd.args(["run-script", name]).current_dir(dir);
    run_captured(cmd, &format!("npm run-script {name}"))
  }
}

/// Run a command with captured output, bail on failure (shows both stdout
/// and stderr in the error).
fn run_captured(mut cmd: Command, label: &str) -> Result<()> {
  let output = cmd.output().with_context(|| format!("failed to run {label}"))?;
  if !output.status.success() {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let mut msg = format!("{label} exited with status {}", output.status);
    if !stderr.is_empty() {
      msg.push('\n');
      msg.push_str(&stderr);
    }
    if !stdout.is_empty() {
      msg.push('\n');
      msg.push_str(&stdout);
    }
    bail!("{msg}");
  }
  Ok(())
}
