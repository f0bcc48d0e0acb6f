//! Persistence layer for outlines and other run state.
//!
//! Every write goes to a temporary file in the target's directory and is
//! then renamed over the target, so a crash mid-write leaves either the old
//! file or the new one, never a truncated mix.

use crate::error::{DepoIndexError, Result};
use crate::outline::Outline;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Default directory for outlines.
pub const DEFAULT_OUTLINE_DIR: &str = "data";

/// Save format for outlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveFormat {
    /// JSON format (human-readable, larger).
    Json,
    /// Bincode format (binary, compact).
    Bincode,
}

impl SaveFormat {
    /// Determine format from file extension.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => SaveFormat::Json,
            Some("bin") | Some("bincode") => SaveFormat::Bincode,
            _ => SaveFormat::Json,
        }
    }
}

/// Outline path for a transcript: `<dir>/<transcript stem>.json`.
///
/// Each transcript gets its own file, so its checkpoint never collides with
/// another transcript's progress.
pub fn outline_path_for(dir: &Path, transcript: &Path) -> PathBuf {
    let stem = transcript
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("transcript");
    dir.join(format!("{stem}.json"))
}

/// Replace `path` with `data` atomically.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if !parent.exists() {
        fs::create_dir_all(parent).map_err(|e| DepoIndexError::io(parent, e))?;
    }

    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| DepoIndexError::io(parent, e))?;
    tmp.write_all(data).map_err(|e| DepoIndexError::io(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| DepoIndexError::io(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| DepoIndexError::io(path, e.error))?;

    Ok(())
}

/// Save an outline, choosing the format from the extension.
pub fn save_outline(outline: &Outline, path: &Path) -> Result<()> {
    save_outline_with_format(outline, path, SaveFormat::from_path(path))
}

/// Save an outline with a specific format.
pub fn save_outline_with_format(outline: &Outline, path: &Path, format: SaveFormat) -> Result<()> {
    let data = match format {
        SaveFormat::Json => serde_json::to_string_pretty(outline)
            .map_err(|e| DepoIndexError::Serialization(e.to_string()))?
            .into_bytes(),
        SaveFormat::Bincode => {
            let config = bincode::config::standard();
            bincode::encode_to_vec(outline, config)
                .map_err(|e| DepoIndexError::Serialization(e.to_string()))?
        }
    };

    write_atomic(path, &data)
}

/// Load an outline from a file.
pub fn load_outline(path: &Path) -> Result<Outline> {
    if !path.exists() {
        return Err(DepoIndexError::OutlineNotFound(path.to_path_buf()));
    }

    load_outline_with_format(path, SaveFormat::from_path(path))
}

/// Load an outline with a specific format.
pub fn load_outline_with_format(path: &Path, format: SaveFormat) -> Result<Outline> {
    let data = fs::read(path).map_err(|e| DepoIndexError::io(path, e))?;

    let outline = match format {
        SaveFormat::Json => serde_json::from_slice(&data)
            .map_err(|e| DepoIndexError::Serialization(e.to_string()))?,
        SaveFormat::Bincode => {
            let config = bincode::config::standard();
            let (outline, _): (Outline, usize) = bincode::decode_from_slice(&data, config)
                .map_err(|e| DepoIndexError::Serialization(e.to_string()))?;
            outline
        }
    };

    Ok(outline)
}

/// Check if an outline file exists at the given path.
pub fn outline_exists(path: &Path) -> bool {
    path.exists() && path.is_file()
}

/// Get the size of an outline file in bytes.
pub fn outline_size(path: &Path) -> Result<u64> {
    let metadata = fs::metadata(path).map_err(|e| DepoIndexError::io(path, e))?;
    Ok(metadata.len())
}
