//! Durable "last completed unit" marker.

use crate::error::{DepoIndexError, Result};
use crate::persistence::write_atomic;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Persisted checkpoint payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointState {
    /// 1-based index of the last fully processed unit, 0 when none.
    pub last_completed_unit: usize,
}

/// Storage for the resume point of a run.
pub trait CheckpointStore: Send {
    /// Last completed unit, 0 if nothing was completed.
    fn get(&self) -> Result<usize>;

    /// Record `unit` as the last completed unit.
    fn set(&mut self, unit: usize) -> Result<()>;

    /// Forget progress so the next run starts from the beginning.
    fn reset(&mut self) -> Result<()> {
        self.set(0)
    }
}

/// Checkpoint kept in a small JSON file, replaced atomically on every write.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Checkpoint path that sits next to an outline file:
    /// `out/smith.json` → `out/smith.checkpoint.json`.
    pub fn beside(outline_path: &Path) -> Self {
        let stem = outline_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("outline");
        Self::new(outline_path.with_file_name(format!("{stem}.checkpoint.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn get(&self) -> Result<usize> {
        if !self.path.exists() {
            return Ok(0);
        }
        let content =
            std::fs::read_to_string(&self.path).map_err(|e| DepoIndexError::io(&self.path, e))?;
        let state: CheckpointState = serde_json::from_str(&content).map_err(|e| {
            DepoIndexError::Serialization(format!(
                "invalid checkpoint '{}': {}",
                self.path.display(),
                e
            ))
        })?;
        Ok(state.last_completed_unit)
    }

    fn set(&mut self, unit: usize) -> Result<()> {
        let state = CheckpointState {
            last_completed_unit: unit,
        };
        let data = serde_json::to_vec_pretty(&state)
            .map_err(|e| DepoIndexError::Serialization(e.to_string()))?;
        write_atomic(&self.path, &data)
    }
}

/// In-process checkpoint, handy for tests and one-shot runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryCheckpointStore {
    state: CheckpointState,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(unit: usize) -> Self {
        Self {
            state: CheckpointState {
                last_completed_unit: unit,
            },
        }
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn get(&self) -> Result<usize> {
        Ok(self.state.last_completed_unit)
    }

    fn set(&mut self, unit: usize) -> Result<()> {
        self.state.last_completed_unit = unit;
        Ok(())
    }
}
