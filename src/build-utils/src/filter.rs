/* src/build-utils/src/filter.rs */

// Pure transforms over file sets. All of them are O(n), keep the input's
// entry order, and return a fresh set.

use crate::file_ref::FileSet;

/// Top-level directory served as-is by the platform when present.
pub const DEFAULT_STATIC_DIR: &str = "static";

/// Keep only entries under `dir`, keys unchanged. `"."` (or an empty
/// string) keeps everything.
pub fn restrict_to_subtree(files: &FileSet, dir: &str) -> FileSet {
  if is_root(dir) {
    return files.clone();
  }
  let prefix = dir_prefix(dir);
  files
    .iter()
    .filter(|(path, _)| path.starts_with(&prefix))
    .map(|(path, file)| (path.clone(), file.clone()))
    .collect()
}

/// Strip the `dir/` prefix from every member. Entries outside `dir` are
/// dropped, so callers pair this with `restrict_to_subtree` on the same
/// directory.
pub fn reparent_to_root(files: &FileSet, dir: &str) -> FileSet {
  if is_root(dir) {
    return files.clone();
  }
  let prefix = dir_prefix(dir);
  files
    .iter()
    .filter_map(|(path, file)| {
      path.strip_prefix(&prefix).map(|rest| (rest.to_string(), file.clone()))
    })
    .collect()
}

/// Drop entries whose path matches the predicate.
pub fn exclude(files: &FileSet, predicate: impl Fn(&str) -> bool) -> FileSet {
  files
    .iter()
    .filter(|(path, _)| !predicate(path))
    .map(|(path, file)| (path.clone(), file.clone()))
    .collect()
}

/// Keep only entries whose path matches the predicate.
pub fn select_only(files: &FileSet, predicate: impl Fn(&str) -> bool) -> FileSet {
  files
    .iter()
    .filter(|(path, _)| predicate(path))
    .map(|(path, file)| (path.clone(), file.clone()))
    .collect()
}

/// Package-manager lock files, matched by exact basename.
pub fn is_lock_file(path: &str) -> bool {
  matches!(basename(path), "package-lock.json" | "yarn.lock")
}

pub fn exclude_lock_files(files: &FileSet) -> FileSet {
  exclude(files, is_lock_file)
}

/// Predicate for entries living under a top-level directory.
pub fn in_directory(dir: &str) -> impl Fn(&str) -> bool {
  let prefix = dir_prefix(dir);
  move |path: &str| path.starts_with(&prefix)
}

pub fn exclude_static_directory(files: &FileSet, static_dir: &str) -> FileSet {
  exclude(files, in_directory(static_dir))
}

pub fn only_static_directory(files: &FileSet, static_dir: &str) -> FileSet {
  select_only(files, in_directory(static_dir))
}

fn is_root(dir: &str) -> bool {
  dir.is_empty() || dir == "."
}

fn dir_prefix(dir: &str) -> String {
  format!("{}/", dir.trim_end_matches('/'))
}

fn basename(path: &str) -> &str {
  path.rsplit('/').next().unwrap_or(path)
}
