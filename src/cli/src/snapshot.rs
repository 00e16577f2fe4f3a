/* src/cli/src/snapshot.rs */

// Builds the input file set from a project directory on disk.

use std::path::Path;

use anyhow::{bail, Context, Result};
use now_build_utils::{FileRef, FileSet};
use walkdir::WalkDir;

/// Directories that never count as project sources: repository metadata,
/// installed dependencies, previous build output and our own scratch space.
const SKIPPED_DIRS: [&str; 4] = [".git", ".now", ".next", "node_modules"];

fn is_skipped(entry: &walkdir::DirEntry) -> bool {
  entry.depth() > 0
    && entry.file_type().is_dir()
    && entry.file_name().to_str().is_some_and(|name| SKIPPED_DIRS.contains(&name))
}

/// Enumerate every file under `dir` as a relative POSIX path, in sorted
/// order so two snapshots of the same tree are identical.
pub fn snapshot_project(dir: &Path) -> Result<FileSet> {
  let mut paths = Vec::new();
  for entry in WalkDir::new(dir).into_iter().filter_entry(|entry| !is_skipped(entry)) {
    let entry = entry.with_context(|| format!("failed to walk {}", dir.display()))?;
    if !entry.file_type().is_file() {
      continue;
    }
    let relative = entry
      .path()
      .strip_prefix(dir)
      .with_context(|| format!("failed to relativize {}", entry.path().display()))?;
    let Some(relative) = relative.to_str() else {
      bail!("non-unicode path under {}", dir.display());
    };
    paths.push((relative.replace(std::path::MAIN_SEPARATOR, "/"), entry.path().to_path_buf()));
  }
  paths.sort_unstable_by(|a, b| a.0.cmp(&b.0));

  let mut files = FileSet::new();
  for (path, fs_path) in paths {
    files.insert(path, FileRef::from_fs_path(&fs_path)?);
  }
  Ok(files)
}
