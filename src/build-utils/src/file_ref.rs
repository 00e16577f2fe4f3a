/* src/build-utils/src/file_ref.rs */

// File references and the ordered path -> content mapping every builder
// stage consumes and produces. Sets are value objects: transforms return
// new sets and never mutate their input.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use indexmap::IndexMap;

/// One file inside a build: a pointer to content already on disk, or an
/// in-memory buffer produced by a build step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileRef {
  Fs { fs_path: PathBuf, size: u64, executable: bool },
  Blob { data: Vec<u8> },
}

/// Insertion-ordered mapping from relative POSIX paths to file contents.
pub type FileSet = IndexMap<String, FileRef>;

impl FileRef {
  /// Point at an existing file, capturing its size and mode.
  pub fn from_fs_path(fs_path: impl Into<PathBuf>) -> Result<Self> {
    let fs_path = fs_path.into();
    let meta =
      fs::metadata(&fs_path).with_context(|| format!("failed to stat {}", fs_path.display()))?;
    Ok(FileRef::Fs { size: meta.len(), executable: has_exec_bit(&meta), fs_path })
  }

  /// Wrap an in-memory buffer.
  pub fn blob(data: impl Into<Vec<u8>>) -> Self {
    FileRef::Blob { data: data.into() }
  }

  /// Content size in bytes without touching the filesystem.
  pub fn size(&self) -> u64 {
    match self {
      FileRef::Fs { size, .. } => *size,
      FileRef::Blob { data } => data.len() as u64,
    }
  }

  pub fn is_executable(&self) -> bool {
    match self {
      FileRef::Fs { executable, .. } => *executable,
      FileRef::Blob { .. } => false,
    }
  }

  /// Read the full content into memory.
  pub fn read(&self) -> Result<Vec<u8>> {
    match self {
      FileRef::Fs { fs_path, .. } => {
        fs::read(fs_path).with_context(|| format!("failed to read {}", fs_path.display()))
      }
      FileRef::Blob { data } => Ok(data.clone()),
    }
  }
}

#[cfg(unix)]
fn has_exec_bit(meta: &fs::Metadata) -> bool {
  use std::os::unix::fs::PermissionsExt;
  meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn has_exec_bit(_meta: &fs::Metadata) -> bool {
  false
}

/// A clean path is relative and stays inside its root: no leading slash,
/// no `.` or `..` segments, no empty segments.
pub fn is_clean_path(path: &str) -> bool {
  !path.is_empty()
    && !path.starts_with('/')
    && path.split('/').all(|segment| !segment.is_empty() && segment != "." && segment != "..")
}
