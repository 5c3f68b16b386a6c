// Persistent store of deferred route-setting intents
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::models::{RouteIntent, VesselId};
use crate::storage::CompanionMirror;

pub const PENDING_SETTINGS_FILE: &str = "pending_settings.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingRouteSetting {
    pub vessel_id: VesselId,
    #[serde(flatten)]
    pub intent: RouteIntent,
    pub saved_at: DateTime<Utc>,
}

pub type SharedPendingSettings = Arc<Mutex<PendingSettingsStore>>;

/// At most one intent per vessel. Every mutation is written through to disk.
pub struct PendingSettingsStore {
    storage_path: Option<PathBuf>,
    entries: HashMap<VesselId, PendingRouteSetting>,
    mirror: CompanionMirror,
}

impl PendingSettingsStore {
    pub fn new(storage_path: impl Into<PathBuf>, mirror: CompanionMirror) -> Self {
        let mut store = Self {
            storage_path: Some(storage_path.into()),
            entries: HashMap::new(),
            mirror,
        };

        if let Err(e) = store.load_from_disk() {
            warn!(error = %e, "failed to load pending settings, starting empty");
        }

        store
    }

    /// Store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self {
            storage_path: None,
            entries: HashMap::new(),
            mirror: CompanionMirror::disabled(),
        }
    }

    pub fn shared(self) -> SharedPendingSettings {
        Arc::new(Mutex::new(self))
    }

    pub fn save(&mut self, vessel_id: VesselId, intent: RouteIntent) -> Result<(), StoreError> {
        let entry = PendingRouteSetting {
            vessel_id,
            intent,
            saved_at: Utc::now(),
        };
        info!(vessel = %vessel_id, speed = entry.intent.speed, guards = entry.intent.guards, "stored pending route settings");
        self.entries.insert(vessel_id, entry);
        self.save_to_disk()
    }

    pub fn get(&self, vessel_id: VesselId) -> Option<&PendingRouteSetting> {
        self.entries.get(&vessel_id)
    }

    pub fn delete(&mut self, vessel_id: VesselId) -> Result<bool, StoreError> {
        if self.entries.remove(&vessel_id).is_some() {
            debug!(vessel = %vessel_id, "removed pending route settings");
            self.save_to_disk()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Snapshot of every entry, ordered by vessel id.
    pub fn entries(&self) -> Vec<PendingRouteSetting> {
        let mut entries: Vec<_> = self.entries.values().cloned().collect();
        entries.sort_by_key(|e| e.vessel_id);
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry for which `keep` is false; returns how many went.
    pub fn retain<F>(&mut self, mut keep: F) -> Result<usize, StoreError>
    where
        F: FnMut(&PendingRouteSetting) -> bool,
    {
        let initial_count = self.entries.len();
        self.entries.retain(|_, entry| keep(entry));

        let removed = initial_count - self.entries.len();
        if removed > 0 {
            self.save_to_disk()?;
        }
        Ok(removed)
    }

    fn load_from_disk(&mut self) -> Result<(), StoreError> {
        let Some(path) = &self.storage_path else {
            return Ok(());
        };
        if !path.exists() {
            return Ok(());
        }

        let content = fs::read_to_string(path)?;
        let entries: Vec<PendingRouteSetting> = serde_json::from_str(&content)?;

        self.entries.clear();
        for entry in entries {
            self.entries.insert(entry.vessel_id, entry);
        }

        info!(count = self.entries.len(), "loaded pending route settings");
        Ok(())
    }

    fn save_to_disk(&self) -> Result<(), StoreError> {
        let Some(path) = &self.storage_path else {
            return Ok(());
        };
        let content = serde_json::to_string_pretty(&self.entries())?;
        super::write_atomic(path, &content)?;
        self.mirror.mirror(PENDING_SETTINGS_FILE, &content);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RoutePrices;

    fn intent(speed: u32) -> RouteIntent {
        RouteIntent {
            speed,
            guards: 1,
            prices: RoutePrices { dry: Some(500.0), ..Default::default() },
        }
    }

    #[test]
    fn survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PENDING_SETTINGS_FILE);

        let mut store = PendingSettingsStore::new(&path, CompanionMirror::disabled());
        store.save(VesselId(3), intent(12)).unwrap();
        store.save(VesselId(9), intent(18)).unwrap();
        drop(store);

        let reloaded = PendingSettingsStore::new(&path, CompanionMirror::disabled());
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.get(VesselId(9)).unwrap().intent, intent(18));
    }

    #[test]
    fn one_entry_per_vessel() {
        let mut store = PendingSettingsStore::in_memory();
        store.save(VesselId(3), intent(12)).unwrap();
        store.save(VesselId(3), intent(20)).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(VesselId(3)).unwrap().intent.speed, 20);
    }

    #[test]
    fn delete_reports_whether_anything_was_removed() {
        let mut store = PendingSettingsStore::in_memory();
        store.save(VesselId(3), intent(12)).unwrap();
        assert!(store.delete(VesselId(3)).unwrap());
        assert!(!store.delete(VesselId(3)).unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PENDING_SETTINGS_FILE);
        std::fs::write(&path, "not json").unwrap();
        let store = PendingSettingsStore::new(&path, CompanionMirror::disabled());
        assert!(store.is_empty());
    }

    #[test]
    fn writes_are_mirrored_to_companion() {
        let dir = tempfile::tempdir().unwrap();
        let companion = dir.path().join("companion");
        let mut store = PendingSettingsStore::new(
            dir.path().join(PENDING_SETTINGS_FILE),
            CompanionMirror::new(Some(companion.clone())),
        );
        store.save(VesselId(4), intent(10)).unwrap();

        let mirrored = std::fs::read_to_string(companion.join(PENDING_SETTINGS_FILE)).unwrap();
        let entries: Vec<PendingRouteSetting> = serde_json::from_str(&mirrored).unwrap();
        assert_eq!(entries[0].vessel_id, VesselId(4));
    }
}
