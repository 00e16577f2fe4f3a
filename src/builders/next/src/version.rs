/* src/builders/next/src/version.rs */

// Classifies the declared framework version into a packaging mode. Pure
// and deterministic; malformed ranges fail the build instead of silently
// picking a mode.

use semver::{Version, VersionReq};

use now_build_utils::PackageJson;

use crate::error::BuildError;

/// How routes get packaged. Legacy ships the whole framework runtime with
/// every lambda; modern ships one self-dispatching compiled module per
/// route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackagingMode {
  Legacy,
  Modern,
}

impl std::fmt::Display for PackagingMode {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      PackagingMode::Legacy => write!(f, "legacy"),
      PackagingMode::Modern => write!(f, "modern"),
    }
  }
}

/// Framework releases that predate serverless output. The trailing canary
/// is the cutover: anything resolving to it or beyond builds modern.
const LEGACY_VERSIONS: [&str; 15] = [
  "6.0.0",
  "6.0.1",
  "6.0.2",
  "6.0.3",
  "6.1.0",
  "6.1.1",
  "6.1.2",
  "7.0.0",
  "7.0.1",
  "7.0.2",
  "7.0.2-canary.45",
  "7.0.2-canary.46",
  "7.0.2-canary.47",
  "7.0.2-canary.48",
  "7.0.2-canary.49",
];

const LATEST_LEGACY_CANARY: &str = "7.0.2-canary.49";

/// The declared `next` version, `dependencies` first. An absent or empty
/// declaration is fatal.
pub fn framework_version(package_json: &PackageJson) -> Result<&str, BuildError> {
  package_json
    .dependencies
    .get("next")
    .or_else(|| package_json.dev_dependencies.get("next"))
    .map(String::as_str)
    .filter(|version| !version.trim().is_empty())
    .ok_or(BuildError::MissingFrameworkVersion)
}

/// Classify a version string or range.
pub fn packaging_mode(version: &str) -> Result<PackagingMode, BuildError> {
  // Dist-tags always track the newest release.
  if version == "canary" || version == "latest" {
    return Ok(PackagingMode::Modern);
  }
  if LEGACY_VERSIONS.contains(&version) {
    return Ok(PackagingMode::Legacy);
  }
  // A bare version is an exact requirement, and the table lookup above is
  // its only legacy path. Range matching would read it as a caret bound.
  if Version::parse(version).is_ok() {
    return Ok(PackagingMode::Modern);
  }
  let req = VersionReq::parse(version)
    .map_err(|_| BuildError::InvalidFrameworkVersion(version.to_string()))?;
  let newest_legacy_match = LEGACY_VERSIONS
    .iter()
    .filter_map(|entry| Version::parse(entry).ok())
    .filter(|candidate| req.matches(candidate))
    .max();
  match newest_legacy_match {
    // Satisfied by nothing in the table: newer than every legacy release.
    None => Ok(PackagingMode::Modern),
    Some(matched) if matched.to_string() == LATEST_LEGACY_CANARY => Ok(PackagingMode::Modern),
    Some(_) => Ok(PackagingMode::Legacy),
  }
}
