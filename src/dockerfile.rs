//! Dockerfile Renderer (C4): renders the fixed two-line Dockerfile used by every
//! builder pod and writes it to a fresh temp file.

use crate::error::Result;
use std::path::PathBuf;

/// Renders `FROM <base_image>\nADD <tar_basename> /\n`.
pub fn render(base_image: &str, tar_basename: &str) -> String {
    format!("FROM {base_image}\nADD {tar_basename} /\n")
}

/// Renders and writes the Dockerfile to a fresh temp file, returning its path.
pub fn render_to_temp_file(base_image: &str, tar_basename: &str) -> Result<PathBuf> {
    let contents = render(base_image, tar_basename);
    let mut file = tempfile::Builder::new()
        .prefix("Dockerfile")
        .tempfile()?;
    use std::io::Write;
    file.write_all(contents.as_bytes())?;
    let (_, path) = file.keep().map_err(|e| e.error)?;
    Ok(path)
}
