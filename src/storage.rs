use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;

use crate::models::{ExtractionRule, Listing};
use crate::utils::error::{AppError, Result};

/// Durable record of the listings known as of the last completed cycle.
pub trait SnapshotStore: Send + Sync {
    /// A missing snapshot is `Ok(vec![])`; a malformed one is an error.
    fn load(&self) -> Result<Vec<Listing>>;
    /// Replaces the whole snapshot. Never partially applied.
    fn save(&self, listings: &[Listing]) -> Result<()>;
}

/// Where extraction rules come from.
pub trait RuleSource: Send + Sync {
    /// A missing rule file is `Ok(vec![])`; a malformed one is an error.
    fn load_rules(&self) -> Result<Vec<ExtractionRule>>;
}

/// A JSON array on disk.
#[derive(Debug, Clone)]
pub struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_list<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&content).map_err(|e| {
            AppError::Storage(format!("{} is malformed: {}", self.path.display(), e))
        })
    }

    /// Writes to a temp file next to the target, then renames it over the target.
    pub fn write_list<T: Serialize>(&self, items: &[T]) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut tmp, items)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl SnapshotStore for JsonFile {
    fn load(&self) -> Result<Vec<Listing>> {
        self.read_list()
    }

    fn save(&self, listings: &[Listing]) -> Result<()> {
        self.write_list(listings)
    }
}

impl RuleSource for JsonFile {
    fn load_rules(&self) -> Result<Vec<ExtractionRule>> {
        self.read_list()
    }
}

/// In-process snapshot, handy for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    listings: Mutex<Vec<Listing>>,
    saves: Mutex<usize>,
}

impl MemorySnapshotStore {
    pub fn new(listings: Vec<Listing>) -> Self {
        Self {
            listings: Mutex::new(listings),
            saves: Mutex::new(0),
        }
    }

    pub fn listings(&self) -> Vec<Listing> {
        self.listings.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// Number of times `save` has been called.
    pub fn save_count(&self) -> usize {
        self.saves.lock().map(|s| *s).unwrap_or_default()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self) -> Result<Vec<Listing>> {
        self.listings
            .lock()
            .map(|l| l.clone())
            .map_err(|_| AppError::Internal("snapshot lock poisoned".to_string()))
    }

    fn save(&self, listings: &[Listing]) -> Result<()> {
        let mut guard = self
            .listings
            .lock()
            .map_err(|_| AppError::Internal("snapshot lock poisoned".to_string()))?;
        *guard = listings.to_vec();
        if let Ok(mut saves) = self.saves.lock() {
            *saves += 1;
        }
        Ok(())
    }
}

/// Fixed rule set.
impl RuleSource for Vec<ExtractionRule> {
    fn load_rules(&self) -> Result<Vec<ExtractionRule>> {
        Ok(self.clone())
    }
}
