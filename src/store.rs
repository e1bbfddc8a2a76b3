//! Durable predictor state: one opaque JSON blob per predictor name plus a
//! small status record the orchestrator reads to choose the ensemble or the
//! rule path without loading anything.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::models::TrainingStatus;

const STATUS_NAME: &str = "status";

#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn blob_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    pub fn save_blob<T: Serialize>(&self, name: &str, value: &T) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating model directory {}", self.dir.display()))?;
        let path = self.blob_path(name);
        let json = serde_json::to_vec_pretty(value)?;
        fs::write(&path, json)
            .with_context(|| format!("writing model blob {}", path.display()))?;
        Ok(())
    }

    /// Read a blob back. Missing or unreadable blobs yield `None` so callers
    /// stay on their untrained path.
    pub fn load_blob<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let path = self.blob_path(name);
        let bytes = fs::read(&path).ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(blob = name, error = %err, "ignoring corrupt model blob");
                None
            }
        }
    }

    pub fn save_status(&self, status: &TrainingStatus) -> anyhow::Result<()> {
        self.save_blob(STATUS_NAME, status)
    }

    pub fn load_status(&self) -> Option<TrainingStatus> {
        self.load_blob(STATUS_NAME)
    }
}
