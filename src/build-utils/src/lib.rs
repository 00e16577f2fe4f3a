/* src/build-utils/src/lib.rs */

mod download;
mod file_ref;
mod filter;
mod lambda;
mod npm;

pub use download::{download, glob_files};
pub use file_ref::{is_clean_path, FileRef, FileSet};
pub use filter::{
  exclude, exclude_lock_files, exclude_static_directory, in_directory, is_lock_file,
  only_static_directory, reparent_to_root, restrict_to_subtree, select_only, DEFAULT_STATIC_DIR,
};
pub use lambda::{create_lambda, BuilderOutput, Lambda, DEFAULT_MAX_LAMBDA_SIZE};
pub use npm::{
  read_package_json, remove_npmrc, write_npmrc, write_package_json, Installer, Npm, PackageJson,
};
