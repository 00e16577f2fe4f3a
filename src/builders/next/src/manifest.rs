/* src/builders/next/src/manifest.rs */

// Manifest normalization. Monotonic by contract: keys are only added,
// user-supplied values are kept, and only the required runtime pins may
// replace what the user wrote.

use now_build_utils::PackageJson;

/// Runtime version legacy builds are pinned to.
const REQUIRED_NEXT_VERSION: &str = "7.0.2-canary.49";

pub(crate) const NOW_BUILD_SCRIPT: &str = "now-build";
pub(crate) const LEGACY_BUILD_SCRIPT: &str = "next build --lambdas";
pub(crate) const MODERN_BUILD_SCRIPT: &str = "next build";

/// Prepare a legacy project's manifest for the pinned runtime: add the
/// view-rendering libraries if the user declares them nowhere, force the
/// required runtime pins, and default the build script.
pub fn normalize_package_json(package_json: &PackageJson) -> PackageJson {
  let mut normalized = package_json.clone();

  for library in ["react", "react-dom"] {
    let declared = package_json.dependencies.contains_key(library)
      || package_json.dev_dependencies.contains_key(library);
    if !declared {
      normalized.dependencies.insert(library.to_string(), "latest".to_string());
    }
  }

  // Required pins win over user versions, everything else is additive.
  normalized
    .dependencies
    .insert("next-server".to_string(), REQUIRED_NEXT_VERSION.to_string());
  if normalized.dependencies.contains_key("next") {
    normalized.dependencies.insert("next".to_string(), REQUIRED_NEXT_VERSION.to_string());
  }
  normalized
    .dev_dependencies
    .insert("next".to_string(), REQUIRED_NEXT_VERSION.to_string());

  normalized
    .scripts
    .entry(NOW_BUILD_SCRIPT.to_string())
    .or_insert_with(|| LEGACY_BUILD_SCRIPT.to_string());

  normalized
}

/// Add a default build script when the project has none. Returns whether
/// the manifest changed.
pub(crate) fn ensure_build_script(package_json: &mut PackageJson, script: &str) -> bool {
  if package_json.scripts.contains_key(NOW_BUILD_SCRIPT) {
    return false;
  }
  package_json.scripts.insert(NOW_BUILD_SCRIPT.to_string(), script.to_string());
  true
}
