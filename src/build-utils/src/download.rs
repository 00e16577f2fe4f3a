/* src/build-utils/src/download.rs */

// Moving file sets on and off disk: materialization into a scratch
// directory, and minimatch-style enumeration back into a set.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use glob::{MatchOptions, Pattern};
use walkdir::WalkDir;

use crate::file_ref::{is_clean_path, FileRef, FileSet};

/// Write every entry of `files` under `target_dir` and return a new set of
/// fs-backed refs pointing at the copies. Unclean paths are rejected so a
/// set can never write outside its root.
pub fn download(files: &FileSet, target_dir: &Path) -> Result<FileSet> {
  let mut downloaded = FileSet::new();
  for (path, file) in files {
    if !is_clean_path(path) {
      bail!("refusing to write unclean path {path:?}");
    }
    let dest = target_dir.join(path);
    if let Some(parent) = dest.parent() {
      fs::create_dir_all(parent)
        .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    match file {
      FileRef::Fs { fs_path, .. } => {
        fs::copy(fs_path, &dest).with_context(|| {
          format!("failed to copy {} to {}", fs_path.display(), dest.display())
        })?;
      }
      FileRef::Blob { data } => {
        fs::write(&dest, data).with_context(|| format!("failed to write {}", dest.display()))?;
      }
    }
    if file.is_executable() {
      set_exec_bit(&dest)?;
    }
    downloaded.insert(path.clone(), FileRef::from_fs_path(&dest)?);
  }
  Ok(downloaded)
}

/// Enumerate files under `dir` matching `pattern`: `*` stays within one
/// path component, `**` spans directories, dotfiles are included. Keys are
/// `dir`-relative POSIX paths in sorted order. A missing `dir` yields an
/// empty set.
pub fn glob_files(dir: &Path, pattern: &str) -> Result<FileSet> {
  let matcher =
    Pattern::new(pattern).with_context(|| format!("invalid glob pattern {pattern:?}"))?;
  let options = MatchOptions { require_literal_separator: true, ..MatchOptions::new() };

  let mut found = FileSet::new();
  if !dir.exists() {
    return Ok(found);
  }
  for entry in WalkDir::new(dir).sort_by_file_name() {
    let entry = entry.with_context(|| format!("failed to walk {}", dir.display()))?;
    if !entry.file_type().is_file() {
      continue;
    }
    let rel = entry
      .path()
      .strip_prefix(dir)
      .with_context(|| format!("failed to relativize {}", entry.path().display()))?;
    let rel = rel.to_string_lossy().replace('\\', "/");
    if matcher.matches_with(&rel, options) {
      found.insert(rel, FileRef::from_fs_path(entry.path())?);
    }
  }
  Ok(found)
}

#[cfg(unix)]
fn set_exec_bit(path: &Path) -> Result<()> {
  use std::os::unix::fs::PermissionsExt;
  let mut perms = fs::metadata(path)
    .with_context(|| format!("failed to stat {}", path.display()))?
    .permissions();
  perms.set_mode(perms.mode() | 0o111);
  fs::set_permissions(path, perms).with_context(|| format!("failed to chmod {}", path.display()))
}

#[cfg(not(unix))]
fn set_exec_bit(_path: &Path) -> Result<()> {
  Ok(())
}
