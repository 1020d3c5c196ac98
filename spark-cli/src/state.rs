use anyhow::{Context, Result};
use chrono::NaiveDate;
use spark_core::{AppState, HabitStore, JsonFileStore, seed_if_empty};
use std::fs;
use std::path::PathBuf;

/// `$SPARK_HOME`, else `~/.spark`.
pub fn spark_home() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os("SPARK_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".spark"))
}

pub fn ensure_spark_home() -> Result<PathBuf> {
    let dir = spark_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

pub fn habits_path() -> Result<PathBuf> {
    Ok(ensure_spark_home()?.join("habits.json"))
}

pub fn open_store() -> Result<JsonFileStore> {
    Ok(JsonFileStore::new(habits_path()?))
}

/// Load, seed on first launch, repair, and persist only if anything changed.
pub fn load_state(store: &JsonFileStore, today: NaiveDate) -> Result<AppState> {
    let first_launch = !store.path().exists();
    let mut state = store.load();

    let mut changed = first_launch && seed_if_empty(&mut state, today)?;
    changed |= state.normalize_all(today);

    if changed {
        store.save(&state)?;
        tracing::debug!(path = %store.path().display(), "persisted repaired state");
    }
    Ok(state)
}
