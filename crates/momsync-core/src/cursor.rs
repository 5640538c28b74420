//! The poller's durable time-window cursor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Boundary of repository changes already considered. The next window is
/// `[last_end, now)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub last_end: DateTime<Utc>,
}

/// YAML-file persistence for [`TimeWindow`], written atomically.
#[derive(Debug, Clone)]
pub struct CursorStore {
    path: PathBuf,
}

impl CursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<TimeWindow>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&self.path)?;
        Ok(Some(serde_yaml::from_str(&data)?))
    }

    pub fn save(&self, window: &TimeWindow) -> Result<()> {
        let data = serde_yaml::to_string(window)?;
        crate::io::atomic_write(&self.path, data.as_bytes())
    }

    /// Load the persisted cursor, or start one at `now` when none exists.
    pub fn load_or_init(&self, now: DateTime<Utc>) -> Result<TimeWindow> {
        if let Some(window) = self.load()? {
            return Ok(window);
        }
        let window = TimeWindow { last_end: now };
        self.save(&window)?;
        tracing::info!(path = %self.path.display(), last_end = %now, "initialized poll cursor");
        Ok(window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn missing_cursor_loads_as_none() {
        let dir = TempDir::new().unwrap();
        let store = CursorStore::new(dir.path().join("cursor.yaml"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = CursorStore::new(dir.path().join("state/cursor.yaml"));
        let window = TimeWindow {
            last_end: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        };
        store.save(&window).unwrap();
        assert_eq!(store.load().unwrap(), Some(window));
    }

    #[test]
    fn load_or_init_keeps_existing_cursor() {
        let dir = TempDir::new().unwrap();
        let store = CursorStore::new(dir.path().join("cursor.yaml"));
        let first = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).unwrap();
        assert_eq!(store.load_or_init(first).unwrap().last_end, first);
        assert_eq!(store.load_or_init(later).unwrap().last_end, first);
    }

    #[test]
    fn corrupt_cursor_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cursor.yaml");
        std::fs::write(&path, "last_end: [not a time").unwrap();
        assert!(CursorStore::new(path).load().is_err());
    }
}
