/* src/builders/next/src/error.rs */

use thiserror::Error;

/// Fatal configuration errors. These abort the build immediately and are
/// never retried. External-process failures (install, build script,
/// bundler) are not in here, they propagate as plain errors from the step
/// that ran the process.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
  #[error("entrypoint must point at package.json or next.config.js, got {0:?}")]
  InvalidEntrypoint(String),
  #[error("no `next` version declared in dependencies or devDependencies")]
  MissingFrameworkVersion,
  #[error("invalid `next` version range {0:?}")]
  InvalidFrameworkVersion(String),
  #[error("BUILD_ID not found in .next, the now-build script did not run `next build`")]
  MissingBuildId,
  #[error("no serverless pages were built, the now-build script did not run `next build`")]
  NoServerlessPagesBuilt,
}
