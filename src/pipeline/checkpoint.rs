use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::Stage;
use crate::content::DocumentRecord;
use crate::qa::QaPair;

/// Output of the last completed stage, as read back from disk.
#[derive(Debug, Deserialize)]
#[serde(tag = "stage", content = "data")]
pub enum Checkpoint {
    Fetching { all_data: Vec<Value> },
    Processing { processed_documents: Vec<DocumentRecord> },
    GeneratingQA { qa_pairs: Vec<QaPair> },
    Saving { saved: usize },
}

/// Borrowed form of [`Checkpoint`] used for writing.
#[derive(Debug, Serialize)]
#[serde(tag = "stage", content = "data")]
pub enum CheckpointRef<'a> {
    Fetching { all_data: &'a [Value] },
    Processing { processed_documents: &'a [DocumentRecord] },
    GeneratingQA { qa_pairs: &'a [QaPair] },
    Saving { saved: usize },
}

impl Checkpoint {
    pub fn stage(&self) -> Stage {
        match self {
            Checkpoint::Fetching { .. } => Stage::Fetching,
            Checkpoint::Processing { .. } => Stage::Processing,
            Checkpoint::GeneratingQA { .. } => Stage::GeneratingQA,
            Checkpoint::Saving { .. } => Stage::Saving,
        }
    }
}

impl CheckpointRef<'_> {
    pub fn stage(&self) -> Stage {
        match self {
            CheckpointRef::Fetching { .. } => Stage::Fetching,
            CheckpointRef::Processing { .. } => Stage::Processing,
            CheckpointRef::GeneratingQA { .. } => Stage::GeneratingQA,
            CheckpointRef::Saving { .. } => Stage::Saving,
        }
    }
}

/// The `{stage, data}` progress file.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The saved checkpoint, or `None` when absent, unreadable, or naming an unknown stage.
    pub fn load(&self) -> Option<Checkpoint> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Cannot read {}: {}. Starting from the beginning.", self.path.display(), e);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(checkpoint) => Some(checkpoint),
            Err(e) => {
                warn!("Invalid progress data in {}: {}. Starting from the beginning.", self.path.display(), e);
                None
            }
        }
    }

    /// Replace the file atomically (write to a sibling, then rename).
    pub fn save(&self, checkpoint: &CheckpointRef<'_>) -> Result<()> {
        let tmp = self.path.with_extension("json.tmp");
        let raw = serde_json::to_string(checkpoint).context("Failed to serialize checkpoint")?;
        fs::write(&tmp, raw).with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        debug!("Checkpoint saved after {}", checkpoint.stage().label());
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", self.path.display())),
        }
    }
}

// ── Tests ──
