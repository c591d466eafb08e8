use anyhow::{Context, Result};
use log::Level;
use std::fs;
use std::path::Path;

/// Size in kilobytes, counted the way a JavaScript string reports its length
/// (UTF-16 code units) so figures match the ones published for earlier releases
pub fn size_kb(content: &str) -> f64 {
    content.encode_utf16().count() as f64 / 1024.0
}

/// Level of progress messages: `info` for command-line runs, `debug` when serving requests
pub const fn progress_level(quiet: bool) -> Level {
    if quiet { Level::Debug } else { Level::Info }
}

/// Write a build artifact, creating missing parent directories
pub fn write_artifact(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {:?}", parent))?;
    }
    fs::write(path, content).with_context(|| format!("Failed to write output file: {:?}", path))
}
