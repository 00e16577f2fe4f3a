/* src/builders/next/src/bundler.rs */

// Single-file compilation of the optional dispatch override. The real
// implementation shells out to `@zeit/ncc` through a small node driver
// that prints its result as JSON on stdout.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use serde::Deserialize;

use now_build_utils::{write_package_json, Installer, PackageJson};

/// One compiled module plus any assets the compiler split out.
#[derive(Debug, Clone, Default)]
pub struct BundleOutput {
  pub code: String,
  pub assets: IndexMap<String, String>,
}

/// Compiles one source file and everything it requires into a single
/// module. Injected so the pipeline can run under test without a real
/// compiler toolchain.
pub trait Bundler {
  fn bundle(&self, entry: &Path) -> Result<BundleOutput>;
}

const NCC_VERSION: &str = "0.4.1";
const NCC_DRIVER_FILENAME: &str = "ncc-driver.js";
const NCC_DRIVER_SOURCE: &str = include_str!("../assets/ncc-driver.js");

#[derive(Debug, Deserialize)]
struct NccReport {
  code: String,
  #[serde(default)]
  assets: IndexMap<String, String>,
}

/// Drives `@zeit/ncc` out of a scratch install directory, kept apart from
/// the user directory so the compiler never leaks into the build output.
pub struct NccBundler<'a> {
  install_dir: PathBuf,
  installer: &'a dyn Installer,
}

impl<'a> NccBundler<'a> {
  pub fn new(install_dir: PathBuf, installer: &'a dyn Installer) -> Self {
    Self { install_dir, installer }
  }

  /// Install the compiler into the scratch directory. Only runs when a
  /// build actually has an override to bundle.
  pub fn ensure_installed(&self) -> Result<()> {
    std::fs::create_dir_all(&self.install_dir)
      .with_context(|| format!("failed to create {}", self.install_dir.display()))?;
    let mut package_json = PackageJson::default();
    package_json.dependencies.insert("@zeit/ncc".to_string(), NCC_VERSION.to_string());
    write_package_json(&self.install_dir, &package_json)?;
    let driver_path = self.install_dir.join(NCC_DRIVER_FILENAME);
    std::fs::write(&driver_path, NCC_DRIVER_SOURCE)
      .with_context(|| format!("failed to write {}", driver_path.display()))?;
    self.installer.install(&self.install_dir, &["--prefer-offline"])
  }
}

impl Bundler for NccBundler<'_> {
  fn bundle(&self, entry: &Path) -> Result<BundleOutput> {
    self.ensure_installed()?;
    let output = Command::new("node")
      .arg(NCC_DRIVER_FILENAME)
      .arg(entry)
      .current_dir(&self.install_dir)
      .output()
      .with_context(|| format!("failed to spawn node to bundle {}", entry.display()))?;
    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      bail!("bundling {} failed:\n{stderr}", entry.display());
    }
    let stdout = String::from_utf8(output.stdout).context("invalid UTF-8 from bundler")?;
    let report: NccReport =
      serde_json::from_str(&stdout).context("failed to parse bundler output JSON")?;
    Ok(BundleOutput { code: report.code, assets: report.assets })
  }
}
