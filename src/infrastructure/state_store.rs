//! JSON persistence for event lifecycle state

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::event::LifecycleSnapshot;
use crate::shared::errors::AppError;

/// Stores the lifecycle snapshot in a single JSON file
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the last snapshot. A missing file is not an error.
    pub fn load(&self) -> Result<Option<LifecycleSnapshot>, AppError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        let snapshot = serde_json::from_str(&content)
            .map_err(|e| AppError::StateError(format!("corrupt state file {}: {}", self.path.display(), e)))?;
        Ok(Some(snapshot))
    }

    /// Write via a temp file and rename so readers never see a partial file.
    pub fn save(&self, snapshot: &LifecycleSnapshot) -> Result<(), AppError> {
        let json = serde_json::to_string_pretty(snapshot)
            .map_err(|e| AppError::StateError(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::{EventPhase, EventState};
    use chrono::{NaiveDate, TimeZone, Utc};

    fn snapshot() -> LifecycleSnapshot {
        LifecycleSnapshot {
            day: NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
            states: vec![EventState {
                event_id: "US CPI".to_string(),
                phase: EventPhase::Warned,
                pre_price: Some(4550.0),
                warned_at: Some(Utc.with_ymd_and_hms(2026, 3, 10, 13, 5, 0).unwrap()),
            }],
        }
    }

    #[test]
    fn test_missing_file_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        store.save(&snapshot()).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded, snapshot());

        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"WARNED\""));
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{not json").unwrap();
        let err = StateStore::new(path).load().unwrap_err();
        assert!(matches!(err, AppError::StateError(_)));
    }
}
