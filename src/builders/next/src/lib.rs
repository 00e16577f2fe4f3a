/* src/builders/next/src/lib.rs */

// Builds a Next.js project into per-route lambdas plus static assets for
// the deployment platform.

mod assembler;
mod bundler;
mod cache;
mod driver;
mod error;
mod launcher;
mod manifest;
mod version;

#[cfg(test)]
mod tests;

pub use bundler::{BundleOutput, Bundler, NccBundler};
pub use cache::{prepare_cache, CacheContext, CacheOutput};
pub use driver::{build, BuildContext, BuildOptions, BuildOutput, DEFAULT_RUNTIME};
pub use error::BuildError;
pub use manifest::normalize_package_json;
pub use version::{framework_version, packaging_mode, PackagingMode};
