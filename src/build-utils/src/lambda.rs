/* src/build-utils/src/lambda.rs */

// Deployable units. A lambda is created once during assembly and never
// mutated afterwards; packaging it as a ZIP buffer is the terminal step.

use std::io::{Cursor, Write};

use anyhow::{bail, Context, Result};

use crate::file_ref::{FileRef, FileSet};

/// Default size budget for a packaged lambda.
pub const DEFAULT_MAX_LAMBDA_SIZE: u64 = 5 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Lambda {
  pub files: FileSet,
  pub handler: String,
  pub runtime: String,
  pub max_size: u64,
}

/// Final output value for one deploy path: a packaged function or a plain
/// file served as-is.
#[derive(Debug, Clone)]
pub enum BuilderOutput {
  Lambda(Lambda),
  Static(FileRef),
}

pub fn create_lambda(
  files: FileSet,
  handler: &str,
  runtime: &str,
  max_size: u64,
) -> Result<Lambda> {
  if files.is_empty() {
    bail!("a lambda needs at least one file");
  }
  if handler.is_empty() {
    bail!("a lambda needs a handler");
  }
  if runtime.is_empty() {
    bail!("a lambda needs a runtime");
  }
  Ok(Lambda {
    files,
    handler: handler.to_string(),
    runtime: runtime.to_string(),
    max_size,
  })
}

impl Lambda {
  /// Package the file set as a ZIP buffer, entries in set order so the
  /// archive is reproducible for identical inputs.
  pub fn zip_contents(&self) -> Result<Vec<u8>> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    // Fixed timestamp, otherwise two builds of the same input differ.
    let options = zip::write::SimpleFileOptions::default()
      .compression_method(zip::CompressionMethod::Deflated)
      .last_modified_time(zip::DateTime::default());
    for (path, file) in &self.files {
      let entry_options =
        if file.is_executable() { options.unix_permissions(0o755) } else { options };
      writer
        .start_file(path.as_str(), entry_options)
        .with_context(|| format!("failed to add {path} to the archive"))?;
      let data = file.read().with_context(|| format!("failed to read {path}"))?;
      writer.write_all(&data).with_context(|| format!("failed to write {path}"))?;
    }
    let cursor = writer.finish().context("failed to finish the archive")?;
    Ok(cursor.into_inner())
  }
}
