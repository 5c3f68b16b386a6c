// Persisted timestamp of the last completed cycle
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::StoreError;
use crate::storage::CompanionMirror;

pub const CYCLE_MARKER_FILE: &str = "last_cycle.json";

#[derive(Debug, Serialize, Deserialize)]
struct MarkerDocument {
    last_cycle: DateTime<Utc>,
}

/// Remembers when the controller last finished a cycle, so a process that
/// was suspended can tell it missed one.
#[derive(Debug)]
pub struct CycleMarker {
    storage_path: Option<PathBuf>,
    last_cycle: Mutex<Option<DateTime<Utc>>>,
    mirror: CompanionMirror,
}

impl CycleMarker {
    pub fn new(storage_path: impl Into<PathBuf>, mirror: CompanionMirror) -> Self {
        let storage_path = storage_path.into();
        let last_cycle = match Self::load(&storage_path) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "failed to read last cycle marker");
                None
            }
        };
        Self {
            storage_path: Some(storage_path),
            last_cycle: Mutex::new(last_cycle),
            mirror,
        }
    }

    pub fn in_memory() -> Self {
        Self {
            storage_path: None,
            last_cycle: Mutex::new(None),
            mirror: CompanionMirror::disabled(),
        }
    }

    pub fn last_cycle(&self) -> Option<DateTime<Utc>> {
        *self.last_cycle.lock()
    }

    /// True when no cycle ever ran or the last one is older than `threshold`.
    pub fn needs_catch_up(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        match self.last_cycle() {
            Some(last) => now.signed_duration_since(last) > threshold,
            None => true,
        }
    }

    pub fn store(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        *self.last_cycle.lock() = Some(at);
        let Some(path) = &self.storage_path else {
            return Ok(());
        };
        let content = serde_json::to_string(&MarkerDocument { last_cycle: at })?;
        super::write_atomic(path, &content)?;
        self.mirror.mirror(CYCLE_MARKER_FILE, &content);
        Ok(())
    }

    fn load(path: &Path) -> Result<Option<DateTime<Utc>>, StoreError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        let document: MarkerDocument = serde_json::from_str(&content)?;
        Ok(Some(document.last_cycle))
    }
}
