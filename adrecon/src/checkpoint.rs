//! Backfill checkpointing: remember the last date that exported cleanly so
//! an interrupted backfill resumes instead of restarting.

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use adrecon_types::AdreconError;

/// Default checkpoint file, relative to the working directory.
pub const DEFAULT_CHECKPOINT_FILE: &str = "backfill_checkpoint.json";

#[derive(Debug, Serialize, Deserialize)]
struct CheckpointRecord {
    last_successful_date: NaiveDate,
    updated_at: String,
}

/// File-backed checkpoint store.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    path: PathBuf,
}

impl Checkpoint {
    /// A checkpoint at an explicit path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The default working-directory checkpoint.
    #[must_use]
    pub fn default_location() -> Self {
        Self::new(DEFAULT_CHECKPOINT_FILE)
    }

    /// Last date that completed, if a readable checkpoint exists. A corrupt
    /// file counts as absent.
    #[must_use]
    pub fn load(&self) -> Option<NaiveDate> {
        let raw = std::fs::read(&self.path).ok()?;
        let record: CheckpointRecord = serde_json::from_slice(&raw).ok()?;
        debug!(date = %record.last_successful_date, "loaded checkpoint");
        Some(record.last_successful_date)
    }

    /// Record `date` as completed.
    ///
    /// # Errors
    /// On write failures.
    pub fn save(&self, date: NaiveDate) -> Result<(), AdreconError> {
        let record = CheckpointRecord {
            last_successful_date: date,
            updated_at: Utc::now().to_rfc3339(),
        };
        std::fs::write(
            &self.path,
            serde_json::to_vec_pretty(&record)
                .map_err(|e| AdreconError::config(format!("checkpoint encode: {e}")))?,
        )?;
        debug!(%date, "checkpoint saved");
        Ok(())
    }

    /// Remove the checkpoint after a clean backfill.
    pub fn clear(&self) {
        if std::fs::remove_file(&self.path).is_ok() {
            info!("checkpoint cleared");
        }
    }

    /// The path this checkpoint writes to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
