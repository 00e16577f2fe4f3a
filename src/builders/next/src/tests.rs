/* src/builders/next/src/tests.rs */

// Pipeline tests. The install tool and the bundler are replaced by fakes:
// the installer fabricates a compiled tree when the build script runs,
// the bundler returns a fixed module. Everything else is real.

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use anyhow::Result;
use indexmap::IndexMap;
use tempfile::TempDir;

use now_build_utils::{BuilderOutput, FileRef, FileSet, Installer, Lambda, PackageJson};

use crate::assembler::assemble;
use crate::bundler::{BundleOutput, Bundler};
use crate::cache::{prepare_cache, CacheContext};
use crate::driver::{build, BuildContext, BuildOptions, BuildOutput, DriverOutput};
use crate::error::BuildError;
use crate::launcher::{BRIDGE_FILENAME, LAUNCHER_FILENAME, PAGE_FILENAME};
use crate::version::PackagingMode;

const MODERN_MANIFEST: &str = r#"{"dependencies":{"next":"latest"}}"#;
const LEGACY_MANIFEST: &str = r#"{"dependencies":{"next":"7.0.0"}}"#;

const MODERN_TREE: &[(&str, &str)] = &[
  (".next/BUILD_ID", "xyz789"),
  (".next/serverless/pages/index.js", "module.exports.render = () => {};"),
  (".next/serverless/pages/about.js", "module.exports.render = () => {};"),
  (".next/serverless/pages/_error.js", "module.exports.render = () => {};"),
  (".next/static/chunks/app-9f8e7d.js", "chunk"),
];

const LEGACY_TREE: &[(&str, &str)] = &[
  (".next/BUILD_ID", "abc123\n"),
  (".next/build-manifest.json", "{}"),
  (".next/server/pages-manifest.json", "{}"),
  (".next/server/static/abc123/pages/index.js", "index page"),
  (".next/server/static/abc123/pages/about.js", "about page"),
  (".next/server/static/abc123/pages/blog/index.js", "blog page"),
  (".next/server/static/abc123/pages/_app.js", "app"),
  (".next/server/static/abc123/pages/_error.js", "error"),
  (".next/server/static/abc123/pages/_document.js", "document"),
  (".next/static/chunks/main-1a2b3c.js", "chunk"),
  ("node_modules/next-server/index.js", "server"),
  ("node_modules/.cache/tmp.txt", "cache"),
];

struct Call {
  label: String,
  npmrc: bool,
  lockfile: bool,
}

struct FakeInstaller {
  build_output: Vec<(&'static str, &'static str)>,
  calls: RefCell<Vec<Call>>,
}

impl FakeInstaller {
  fn new(build_output: &[(&'static str, &'static str)]) -> Self {
    Self { build_output: build_output.to_vec(), calls: RefCell::new(Vec::new()) }
  }

  fn record(&self, dir: &Path, label: String) {
    self.calls.borrow_mut().push(Call {
      label,
      npmrc: dir.join(".npmrc").exists(),
      lockfile: dir.join("package-lock.json").exists(),
    });
  }

  fn labels(&self) -> Vec<String> {
    self.calls.borrow().iter().map(|call| call.label.clone()).collect()
  }
}

impl Installer for FakeInstaller {
  fn install(&self, dir: &Path, args: &[&str]) -> Result<()> {
    self.record(dir, format!("install {}", args.join(" ")));
    Ok(())
  }

  fn run_script(&self, dir: &Path, name: &str) -> Result<()> {
    self.record(dir, format!("run-script {name}"));
    for (path, content) in &self.build_output {
      let dest = dir.join(path);
      if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
      }
      std::fs::write(&dest, content)?;
    }
    Ok(())
  }
}

#[derive(Default)]
struct FakeBundler {
  calls: RefCell<Vec<PathBuf>>,
}

impl Bundler for FakeBundler {
  fn bundle(&self, entry: &Path) -> Result<BundleOutput> {
    self.calls.borrow_mut().push(entry.to_path_buf());
    Ok(BundleOutput { code: "module.exports = 'bundled';".to_string(), assets: IndexMap::new() })
  }
}

fn blob_files(entries: &[(&str, &str)]) -> FileSet {
  entries.iter().map(|(path, data)| (path.to_string(), FileRef::blob(*data))).collect()
}

fn run_build(
  input: &FileSet,
  entrypoint: &str,
  options: &BuildOptions,
  installer: &FakeInstaller,
  bundler: &FakeBundler,
) -> (TempDir, Result<BuildOutput>) {
  let work = TempDir::new().unwrap();
  let ctx = BuildContext { files: input, entrypoint, work_dir: work.path() };
  let result = build(&ctx, options, installer, bundler);
  (work, result)
}

fn lambda<'a>(outputs: &'a IndexMap<String, BuilderOutput>, key: &str) -> &'a Lambda {
  match outputs.get(key) {
    Some(BuilderOutput::Lambda(lambda)) => lambda,
    other => panic!("expected a lambda at {key:?}, got {other:?}"),
  }
}

fn static_file<'a>(outputs: &'a IndexMap<String, BuilderOutput>, key: &str) -> &'a FileRef {
  match outputs.get(key) {
    Some(BuilderOutput::Static(file)) => file,
    other => panic!("expected a static file at {key:?}, got {other:?}"),
  }
}

fn fixture(
  mode: PackagingMode,
  after_build: &[(&str, &str)],
  original: &[(&str, &str)],
) -> DriverOutput {
  DriverOutput {
    files_after_build: blob_files(after_build),
    files_without_lockfiles: blob_files(original),
    override_blob: None,
    mode,
    entry_directory: String::new(),
    warnings: Vec::new(),
  }
}

// -- Full builds --

#[test]
fn modern_build_packages_one_module_per_route() {
  let input = blob_files(&[
    ("package.json", MODERN_MANIFEST),
    ("pages/index.js", "export default () => null;"),
    ("pages/about.js", "export default () => null;"),
    ("static/logo.png", "logo-bytes"),
  ]);
  let installer = FakeInstaller::new(MODERN_TREE);
  let bundler = FakeBundler::default();

  let (_work, result) =
    run_build(&input, "package.json", &BuildOptions::default(), &installer, &bundler);
  let output = result.unwrap();

  assert_eq!(output.mode, PackagingMode::Modern);
  assert_eq!(installer.labels(), ["install --prefer-offline", "run-script now-build"]);
  assert!(bundler.calls.borrow().is_empty());

  let index = lambda(&output.files, "index");
  let keys: Vec<&str> = index.files.keys().map(String::as_str).collect();
  assert_eq!(keys, [BRIDGE_FILENAME, LAUNCHER_FILENAME, PAGE_FILENAME]);
  assert_eq!(index.handler, "now__launcher.launcher");
  assert_eq!(index.runtime, "nodejs8.10");

  let about = lambda(&output.files, "about");
  assert_eq!(about.files[PAGE_FILENAME].read().unwrap(), b"module.exports.render = () => {};");

  // Reserved pages never answer a route of their own.
  assert!(!output.files.contains_key("_error"));

  static_file(&output.files, "_next/static/chunks/app-9f8e7d.js");
  let logo = static_file(&output.files, "static/logo.png");
  assert_eq!(logo.read().unwrap(), b"logo-bytes");
}

#[test]
fn legacy_build_ships_the_runtime_with_every_route() {
  let input = blob_files(&[
    ("package.json", LEGACY_MANIFEST),
    ("pages/index.js", "source"),
    ("pages/about.js", "source"),
    ("next.config.js", "module.exports = {};"),
  ]);
  let installer = FakeInstaller::new(LEGACY_TREE);
  let bundler = FakeBundler::default();

  let (work, result) =
    run_build(&input, "package.json", &BuildOptions::default(), &installer, &bundler);
  let output = result.unwrap();

  assert_eq!(output.mode, PackagingMode::Legacy);
  assert_eq!(
    installer.labels(),
    ["install --prefer-offline", "run-script now-build", "install --prefer-offline --production"]
  );

  // The manifest on disk is the normalized one, written before install.
  let manifest: PackageJson =
    serde_json::from_str(&std::fs::read_to_string(work.path().join("user/package.json")).unwrap())
      .unwrap();
  assert_eq!(manifest.dependencies["next-server"], "7.0.2-canary.49");
  assert_eq!(manifest.dependencies["next"], "7.0.2-canary.49");
  assert_eq!(manifest.scripts["now-build"], "next build --lambdas");

  // Trailing "/index" collapses, the root index keeps its name.
  let about = lambda(&output.files, "about");
  lambda(&output.files, "index");
  lambda(&output.files, "blog");

  assert!(about.files.contains_key("node_modules/next-server/index.js"));
  assert!(!about.files.contains_key("node_modules/.cache/tmp.txt"));
  assert!(about.files.contains_key(".next/BUILD_ID"));
  assert!(about.files.contains_key(".next/server/pages-manifest.json"));
  assert!(about.files.contains_key("next.config.js"));
  assert!(about.files.contains_key(".next/server/static/abc123/pages/_document.js"));
  assert!(about.files.contains_key(".next/server/static/abc123/pages/about.js"));
  // The build-output statics belong to the static mapping, not the lambda.
  assert!(!about.files.contains_key(".next/static/chunks/main-1a2b3c.js"));

  let launcher = String::from_utf8(about.files[LAUNCHER_FILENAME].read().unwrap()).unwrap();
  assert!(launcher.contains("'/about'"));
  let blog_launcher =
    String::from_utf8(lambda(&output.files, "blog").files[LAUNCHER_FILENAME].read().unwrap())
      .unwrap();
  assert!(blog_launcher.contains("'/blog'"));

  static_file(&output.files, "_next/static/chunks/main-1a2b3c.js");
}

#[test]
fn nested_entrypoint_prefixes_every_output_path() {
  let input = blob_files(&[
    ("frontend/package.json", MODERN_MANIFEST),
    ("frontend/static/site.css", "css"),
    ("README.md", "root readme"),
  ]);
  let installer = FakeInstaller::new(MODERN_TREE);
  let bundler = FakeBundler::default();

  let (work, result) =
    run_build(&input, "frontend/package.json", &BuildOptions::default(), &installer, &bundler);
  let output = result.unwrap();

  lambda(&output.files, "frontend/index");
  lambda(&output.files, "frontend/about");
  static_file(&output.files, "frontend/_next/static/chunks/app-9f8e7d.js");
  static_file(&output.files, "frontend/static/site.css");
  assert!(!output.files.contains_key("README.md"));
  // The scratch directory is rooted at the entry directory.
  assert!(work.path().join("user/package.json").exists());
}

#[test]
fn modern_adds_the_default_build_script_when_absent() {
  let input = blob_files(&[("package.json", MODERN_MANIFEST)]);
  let installer = FakeInstaller::new(MODERN_TREE);
  let bundler = FakeBundler::default();

  let (work, result) =
    run_build(&input, "package.json", &BuildOptions::default(), &installer, &bundler);
  result.unwrap();

  let manifest: PackageJson =
    serde_json::from_str(&std::fs::read_to_string(work.path().join("user/package.json")).unwrap())
      .unwrap();
  assert_eq!(manifest.scripts["now-build"], "next build");
  // Modern builds never touch dependency pins.
  assert_eq!(manifest.dependencies.len(), 1);
}

#[test]
fn modern_keeps_a_user_build_script_untouched() {
  let manifest =
    r#"{"dependencies":{"next":"latest"},"scripts":{"now-build":"next build && node post.js"}}"#;
  let input = blob_files(&[("package.json", manifest)]);
  let installer = FakeInstaller::new(MODERN_TREE);
  let bundler = FakeBundler::default();

  let (work, result) =
    run_build(&input, "package.json", &BuildOptions::default(), &installer, &bundler);
  result.unwrap();

  let on_disk = std::fs::read_to_string(work.path().join("user/package.json")).unwrap();
  assert_eq!(on_disk, manifest);
}

#[test]
fn legacy_deletes_restored_lock_files_before_install() {
  let input = blob_files(&[("package.json", LEGACY_MANIFEST)]);
  let installer = FakeInstaller::new(LEGACY_TREE);
  let bundler = FakeBundler::default();
  let work = TempDir::new().unwrap();
  // As if the platform had merged a previous run's cache back in.
  std::fs::create_dir_all(work.path().join("user")).unwrap();
  std::fs::write(work.path().join("user/package-lock.json"), "{}").unwrap();
  std::fs::write(work.path().join("user/yarn.lock"), "").unwrap();

  let ctx = BuildContext { files: &input, entrypoint: "package.json", work_dir: work.path() };
  let output = build(&ctx, &BuildOptions::default(), &installer, &bundler).unwrap();

  assert!(output.warnings.is_empty());
  assert!(!installer.calls.borrow()[0].lockfile);
  assert!(!work.path().join("user/yarn.lock").exists());
}

// -- Credentials --

#[test]
fn modern_removes_credentials_after_the_only_install() {
  let input = blob_files(&[("package.json", MODERN_MANIFEST)]);
  let installer = FakeInstaller::new(MODERN_TREE);
  let bundler = FakeBundler::default();
  let options =
    BuildOptions { auth_token: Some("sekrit".to_string()), ..BuildOptions::default() };

  let (work, result) = run_build(&input, "package.json", &options, &installer, &bundler);
  let output = result.unwrap();

  let calls = installer.calls.borrow();
  assert!(calls[0].npmrc);
  assert!(!calls[1].npmrc);
  assert!(!work.path().join("user/.npmrc").exists());
  assert!(output.files.keys().all(|key| !key.contains(".npmrc")));
}

#[test]
fn legacy_keeps_credentials_until_the_production_install() {
  let input = blob_files(&[("package.json", LEGACY_MANIFEST)]);
  let installer = FakeInstaller::new(LEGACY_TREE);
  let bundler = FakeBundler::default();
  let options =
    BuildOptions { auth_token: Some("sekrit".to_string()), ..BuildOptions::default() };

  let (work, result) = run_build(&input, "package.json", &options, &installer, &bundler);
  let output = result.unwrap();

  let calls = installer.calls.borrow();
  assert_eq!(calls.len(), 3);
  assert!(calls.iter().all(|call| call.npmrc));
  assert!(!work.path().join("user/.npmrc").exists());
  assert!(output.files.keys().all(|key| !key.contains(".npmrc")));
}

// -- Dispatch override --

#[test]
fn override_prefers_the_current_name_and_ships_bundled() {
  let input = blob_files(&[
    ("package.json", MODERN_MANIFEST),
    ("launcher.config.js", "module.exports = { handle: h => h };"),
    ("now.launcher.js", "legacy override"),
  ]);
  let installer = FakeInstaller::new(MODERN_TREE);
  let bundler = FakeBundler::default();

  let (work, result) =
    run_build(&input, "package.json", &BuildOptions::default(), &installer, &bundler);
  let output = result.unwrap();

  assert_eq!(bundler.calls.borrow().as_slice(), [work.path().join("user/launcher.config.js")]);
  let index = lambda(&output.files, "index");
  assert_eq!(index.files["launcher.config.js"].read().unwrap(), b"module.exports = 'bundled';");
  assert!(!index.files.contains_key("now.launcher.js"));
}

#[test]
fn legacy_override_ships_under_its_legacy_name() {
  let input = blob_files(&[
    ("package.json", LEGACY_MANIFEST),
    ("now.launcher.js", "module.exports.launcher = () => {};"),
  ]);
  let installer = FakeInstaller::new(LEGACY_TREE);
  let bundler = FakeBundler::default();

  let (_work, result) =
    run_build(&input, "package.json", &BuildOptions::default(), &installer, &bundler);
  let output = result.unwrap();

  assert_eq!(bundler.calls.borrow().len(), 1);
  let about = lambda(&output.files, "about");
  assert_eq!(about.files["now.launcher.js"].read().unwrap(), b"module.exports = 'bundled';");
}

// -- Fatal configuration errors --

#[test]
fn missing_framework_version_is_fatal() {
  let input = blob_files(&[("package.json", "{}")]);
  let installer = FakeInstaller::new(&[]);
  let bundler = FakeBundler::default();

  let (_work, result) =
    run_build(&input, "package.json", &BuildOptions::default(), &installer, &bundler);
  let err = result.unwrap_err();
  assert_eq!(err.downcast_ref::<BuildError>(), Some(&BuildError::MissingFrameworkVersion));
  // Nothing ran.
  assert!(installer.labels().is_empty());
}

#[test]
fn unrecognized_entrypoint_is_fatal() {
  let input = blob_files(&[("server.js", "code")]);
  let installer = FakeInstaller::new(&[]);
  let bundler = FakeBundler::default();

  let (_work, result) =
    run_build(&input, "server.js", &BuildOptions::default(), &installer, &bundler);
  let err = result.unwrap_err();
  assert_eq!(
    err.downcast_ref::<BuildError>(),
    Some(&BuildError::InvalidEntrypoint("server.js".to_string()))
  );
}

// -- Assembly over fixed file sets --

#[test]
fn assembly_requires_a_build_id() {
  let driver_output =
    fixture(PackagingMode::Modern, &[(".next/serverless/pages/index.js", "x")], &[]);
  let err = assemble(&driver_output, &BuildOptions::default()).unwrap_err();
  assert_eq!(err.downcast_ref::<BuildError>(), Some(&BuildError::MissingBuildId));
}

#[test]
fn empty_serverless_output_is_fatal() {
  let driver_output = fixture(PackagingMode::Modern, &[(".next/BUILD_ID", "x")], &[]);
  let err = assemble(&driver_output, &BuildOptions::default()).unwrap_err();
  assert_eq!(err.downcast_ref::<BuildError>(), Some(&BuildError::NoServerlessPagesBuilt));
}

#[test]
fn reserved_only_output_yields_no_lambdas() {
  let driver_output = fixture(
    PackagingMode::Modern,
    &[(".next/BUILD_ID", "x"), (".next/serverless/pages/_error.js", "err")],
    &[],
  );
  let outputs = assemble(&driver_output, &BuildOptions::default()).unwrap();
  assert!(outputs.is_empty());
}

#[test]
fn colliding_static_path_replaces_the_route() {
  let driver_output = fixture(
    PackagingMode::Modern,
    &[(".next/BUILD_ID", "x"), (".next/serverless/pages/static/x.js", "page")],
    &[("static/x", "static wins")],
  );
  let outputs = assemble(&driver_output, &BuildOptions::default()).unwrap();
  let file = static_file(&outputs, "static/x");
  assert_eq!(file.read().unwrap(), b"static wins");
}

// -- Cache preparation --

#[test]
fn cache_keeps_dependencies_and_never_credentials() {
  let input = blob_files(&[("package.json", MODERN_MANIFEST)]);
  let mut tree = MODERN_TREE.to_vec();
  tree.push(("node_modules/left-pad/index.js", "module.exports = s => s;"));
  tree.push(("package-lock.json", "{}"));
  tree.push((".next/records.json", "{}"));
  let installer = FakeInstaller::new(&tree);
  let bundler = FakeBundler::default();

  let work = TempDir::new().unwrap();
  std::fs::create_dir_all(work.path().join("user")).unwrap();
  std::fs::write(work.path().join("user/stale.txt"), "old").unwrap();
  let cache_dir = TempDir::new().unwrap();

  let ctx = CacheContext {
    files: &input,
    entrypoint: "package.json",
    work_dir: work.path(),
    cache_dir: cache_dir.path(),
  };
  let options =
    BuildOptions { auth_token: Some("sekrit".to_string()), ..BuildOptions::default() };
  let cache = prepare_cache(&ctx, &options, &installer, &bundler).unwrap();

  // The finished build's scratch directory is gone.
  assert!(!work.path().exists());

  assert!(cache.files.contains_key("user/node_modules/left-pad/index.js"));
  assert!(cache.files.contains_key("user/package-lock.json"));
  assert!(cache.files.contains_key("user/.next/records.json"));
  // Only cacheable state is kept, not the whole directory.
  assert!(!cache.files.contains_key("user/package.json"));

  assert!(cache.files.keys().all(|key| !key.contains(".npmrc")));
  assert!(!cache_dir.path().join("user/.npmrc").exists());
}
