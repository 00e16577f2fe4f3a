/* src/cli/src/config.rs */

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Optional project-level settings, read from `now.toml` at the project
/// root when present. Flags override these, defaults fill the rest.
#[derive(Debug, Clone, Deserialize)]
pub struct NowConfig {
  pub project: ProjectSection,
  #[serde(default)]
  pub build: BuildSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectSection {
  pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildSection {
  pub entrypoint: Option<String>,
  pub static_dir: Option<String>,
  pub max_lambda_size: Option<u64>,
  pub runtime: Option<String>,
}

/// A missing `now.toml` is not an error, every setting has a flag or a
/// default.
pub fn load_now_config(project_dir: &Path) -> Result<Option<NowConfig>> {
  let path = project_dir.join("now.toml");
  if !path.is_file() {
    return Ok(None);
  }
  load_config_file(&path).map(Some)
}

/// Parse one config file. Unlike the project-root lookup, the path has to
/// exist here, the user named it.
pub fn load_config_file(path: &Path) -> Result<NowConfig> {
  let content =
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
  toml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}
