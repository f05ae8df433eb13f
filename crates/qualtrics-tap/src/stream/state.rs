//! Replication state persistence
//!
//! The state is a single bookmark: the export timestamp of the last cycle
//! that emitted every record. Stores only see whole states; the driver
//! decides when one is committed.

use crate::error::{Result, TapError};
use chrono::{DateTime, NaiveDate, Utc};
use qualtrics_common::timestamp;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Bookmark carried between cycles
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_key_value: Option<String>,
}

impl ReplicationState {
    /// State bookmarked at `export_date`
    pub fn at(export_date: &DateTime<Utc>) -> Self {
        Self {
            replication_key_value: Some(timestamp::format_export(export_date)),
        }
    }

    /// Start of the next export window.
    ///
    /// The bookmark wins when present; otherwise midnight UTC of `fallback`.
    pub fn effective_start(&self, fallback: NaiveDate) -> Result<DateTime<Utc>> {
        match self.replication_key_value.as_deref().map(str::trim) {
            Some(value) if !value.is_empty() => Ok(timestamp::parse_utc(value)?),
            _ => Ok(timestamp::start_of_day(fallback)),
        }
    }
}

/// Where replication state lives between runs
pub trait StateStore {
    fn load(&self) -> Result<ReplicationState>;
    fn save(&self, state: &ReplicationState) -> Result<()>;
}

/// State kept as a JSON file.
///
/// Writes go to a temp file in the same directory which is then renamed
/// over the target, so a crash never leaves a truncated file behind.
#[derive(Debug, Clone)]
pub struct JsonFileStateStore {
    path: PathBuf,
}

impl JsonFileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for JsonFileStateStore {
    fn load(&self) -> Result<ReplicationState> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No state file, starting fresh");
                return Ok(ReplicationState::default());
            },
            Err(e) => {
                return Err(TapError::state(format!(
                    "cannot read '{}': {}",
                    self.path.display(),
                    e
                )))
            },
        };

        if raw.trim().is_empty() {
            warn!(path = %self.path.display(), "State file is empty, starting fresh");
            return Ok(ReplicationState::default());
        }

        serde_json::from_str(&raw)
            .map_err(|e| TapError::state(format!("invalid state in '{}': {}", self.path.display(), e)))
    }

    fn save(&self, state: &ReplicationState) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| TapError::state(format!("cannot stage state in '{}': {}", dir.display(), e)))?;
        serde_json::to_writer_pretty(&mut tmp, state)?;
        tmp.write_all(b"\n")?;
        tmp.flush()?;

        tmp.persist(&self.path).map_err(|e| {
            TapError::state(format!("cannot write '{}': {}", self.path.display(), e.error))
        })?;

        debug!(path = %self.path.display(), "State saved");
        Ok(())
    }
}

/// State held for the lifetime of the process
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    state: Mutex<ReplicationState>,
}

impl MemoryStateStore {
    pub fn new(initial: ReplicationState) -> Self {
        Self {
            state: Mutex::new(initial),
        }
    }

    /// Current state
    pub fn snapshot(&self) -> ReplicationState {
        match self.state.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<ReplicationState> {
        Ok(self.snapshot())
    }

    fn save(&self, state: &ReplicationState) -> Result<()> {
        let mut guard = self
            .state
            .lock()
            .map_err(|_| TapError::state("in-memory state lock poisoned"))?;
        *guard = state.clone();
        Ok(())
    }
}
