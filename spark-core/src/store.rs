//! Persistent state: the `{ "habits": [...] }` document and where it lives.
//!
//! The whole document is read and written on every mutation. Nothing guards
//! two processes sharing one file; the last save wins.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::habit::{Habit, repair_habit};
use crate::lenient;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppState {
    #[serde(default, deserialize_with = "lenient::habits")]
    pub habits: Vec<Habit>,
}

impl AppState {
    /// Parse a stored document. A habit that cannot be read is dropped on its
    /// own; a document that is not JSON at all becomes an empty state.
    pub fn from_json(raw: &str) -> Self {
        if raw.trim().is_empty() {
            return Self::default();
        }
        match serde_json::from_str::<AppState>(raw) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(error = %e, "stored habit data is unreadable; starting empty");
                Self::default()
            }
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("serialize habit state")
    }

    /// Repair every habit. Returns whether anything changed.
    pub fn normalize_all(&mut self, today: NaiveDate) -> bool {
        let mut changed = false;
        for habit in &mut self.habits {
            changed |= repair_habit(habit, today);
        }
        changed
    }

    /// Look up by exact id, then by case-insensitive name.
    pub fn position(&self, key: &str) -> Option<usize> {
        let key = key.trim();
        self.habits
            .iter()
            .position(|h| h.id == key)
            .or_else(|| self.habits.iter().position(|h| h.name.eq_ignore_ascii_case(key)))
    }

    pub fn find(&self, key: &str) -> Option<&Habit> {
        self.position(key).map(|i| &self.habits[i])
    }

    pub fn find_mut(&mut self, key: &str) -> Option<&mut Habit> {
        self.position(key).map(move |i| &mut self.habits[i])
    }
}

/// Storage seam for the habit document.
pub trait HabitStore {
    /// Never fails: missing or corrupt data loads as an empty state.
    fn load(&self) -> AppState;
    fn save(&self, state: &AppState) -> Result<()>;
}

/// JSON file on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HabitStore for JsonFileStore {
    fn load(&self) -> AppState {
        match fs::read_to_string(&self.path) {
            Ok(raw) => AppState::from_json(&raw),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => AppState::default(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "cannot read habit data");
                AppState::default()
            }
        }
    }

    fn save(&self, state: &AppState) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        let json = state.to_json()?;

        // temp file in the same directory, then rename over the old document
        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("create temp file in {}", dir.display()))?;
        tmp.write_all(json.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .with_context(|| format!("write {}", tmp.path().display()))?;
        tmp.persist(&self.path)
            .map_err(|e| e.error)
            .with_context(|| format!("replace {}", self.path.display()))?;
        Ok(())
    }
}

/// In-process store holding the serialized document, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    raw: Mutex<String>,
}

impl MemoryStore {
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: Mutex::new(raw.into()),
        }
    }

    pub fn raw(&self) -> String {
        self.raw.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl HabitStore for MemoryStore {
    fn load(&self) -> AppState {
        AppState::from_json(&self.raw())
    }

    fn save(&self, state: &AppState) -> Result<()> {
        let json = state.to_json()?;
        let mut raw = self
            .raw
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        *raw = json;
        Ok(())
    }
}
