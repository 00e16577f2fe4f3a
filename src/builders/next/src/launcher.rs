/* src/builders/next/src/launcher.rs */

// Runtime shim sources injected next to compiled pages, plus the
// route-path derivation both packaging modes share.

pub const BRIDGE_FILENAME: &str = "now__bridge.js";
pub const LAUNCHER_FILENAME: &str = "now__launcher.js";
pub const PAGE_FILENAME: &str = "page.js";

/// Invocation handle of every generated lambda, `file.export` form.
pub const LAUNCHER_HANDLER: &str = "now__launcher.launcher";

pub(crate) const BRIDGE_SOURCE: &str = include_str!("../assets/bridge.js");
pub(crate) const MODERN_LAUNCHER_SOURCE: &str = include_str!("../assets/launcher.js");
const LEGACY_LAUNCHER_TEMPLATE: &str = include_str!("../assets/legacy-launcher.js");

const PATHNAME_PLACEHOLDER: &str = "PATHNAME_PLACEHOLDER";

/// Pages the framework always compiles but that never answer a route of
/// their own.
pub const RESERVED_PAGES: [&str; 3] = ["_app.js", "_error.js", "_document.js"];

pub fn is_reserved_page(route_file: &str) -> bool {
  RESERVED_PAGES.contains(&route_file)
}

/// Output key for a compiled page, relative to the entry directory. A
/// trailing `index` segment collapses into its parent directory; the root
/// `index.js` keeps its name so the key never goes empty.
pub fn route_output_path(route_file: &str) -> String {
  let stem = route_file.strip_suffix(".js").unwrap_or(route_file);
  match stem.strip_suffix("/index") {
    Some(parent) => parent.to_string(),
    None => stem.to_string(),
  }
}

/// Request pathname substituted into a rendered legacy launcher. Unlike
/// the output key, the root index collapses all the way to `/`.
pub fn route_request_path(route_file: &str) -> String {
  let stem = route_file.strip_suffix(".js").unwrap_or(route_file);
  let collapsed = if stem == "index" {
    ""
  } else {
    stem.strip_suffix("/index").unwrap_or(stem)
  };
  format!("/{collapsed}")
}

/// The legacy launcher with the route's pathname baked in.
pub fn render_legacy_launcher(route_file: &str) -> String {
  LEGACY_LAUNCHER_TEMPLATE.replace(PATHNAME_PLACEHOLDER, &route_request_path(route_file))
}
