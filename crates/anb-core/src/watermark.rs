//! Last-seen announcement tracking.
//!
//! The watermark is a single persisted `AnnouncementRecord`. A fresh list is
//! split into "new" (everything above the watermark) and the rest.

use std::{
    fs,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use crate::{announcement::AnnouncementRecord, Error, Result};

/// Persistence collaborator for the watermark slot.
pub trait WatermarkStore: Send + Sync {
    /// `Ok(None)` when nothing has been stored yet.
    fn read(&self) -> Result<Option<AnnouncementRecord>>;

    /// Replace the stored value entirely.
    fn write(&self, record: &AnnouncementRecord) -> Result<()>;
}

/// JSON document on disk holding exactly one record.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "watermark".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl WatermarkStore for JsonFileStore {
    fn read(&self) -> Result<Option<AnnouncementRecord>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let txt = fs::read_to_string(&self.path).map_err(|e| Error::persistence(&self.path, e))?;
        if txt.trim().is_empty() {
            return Ok(None);
        }
        let record = serde_json::from_str(&txt).map_err(|e| Error::persistence(&self.path, e))?;
        Ok(Some(record))
    }

    fn write(&self, record: &AnnouncementRecord) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| Error::persistence(dir, e))?;
        }
        let txt = serde_json::to_string(record)?;

        // Write-then-rename so a crash never leaves a half-written document.
        let tmp = self.temp_path();
        fs::write(&tmp, txt).map_err(|e| Error::persistence(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| Error::persistence(&self.path, e))?;
        Ok(())
    }
}

/// In-process store; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slot: Mutex<Option<AnnouncementRecord>>,
}

impl MemoryStore {
    pub fn with(record: AnnouncementRecord) -> Self {
        Self {
            slot: Mutex::new(Some(record)),
        }
    }
}

impl WatermarkStore for MemoryStore {
    fn read(&self) -> Result<Option<AnnouncementRecord>> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| Error::persistence("<memory>", "lock poisoned"))?;
        Ok(slot.clone())
    }

    fn write(&self, record: &AnnouncementRecord) -> Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| Error::persistence("<memory>", "lock poisoned"))?;
        *slot = Some(record.clone());
        Ok(())
    }
}

/// How a fresh list relates to the stored watermark.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiffStatus {
    /// The fetch returned nothing.
    Empty,
    /// No watermark stored yet.
    FirstRun,
    /// The newest entry is the watermark.
    UpToDate,
    /// The watermark was found below one or more entries.
    NewItems,
    /// A watermark exists but no entry matches it (scrolled off or edited upstream).
    WatermarkNotFound,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diff {
    pub status: DiffStatus,
    /// Entries above the watermark, newest first.
    pub new_items: Vec<AnnouncementRecord>,
    /// The fetched list, unchanged.
    pub all_items: Vec<AnnouncementRecord>,
}

impl Diff {
    /// Entries from the watermark downwards (everything that is not new).
    pub fn previous_items(&self) -> &[AnnouncementRecord] {
        &self.all_items[self.new_items.len()..]
    }
}

#[derive(Clone)]
pub struct WatermarkTracker {
    store: Arc<dyn WatermarkStore>,
}

impl WatermarkTracker {
    pub fn new(store: Arc<dyn WatermarkStore>) -> Self {
        Self { store }
    }

    /// Read the stored watermark. Unreadable or corrupt state counts as "none".
    pub fn load(&self) -> Option<AnnouncementRecord> {
        match self.store.read() {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("watermark unreadable, treating as first run: {e}");
                None
            }
        }
    }

    /// Split `fresh` against the stored watermark.
    pub fn diff(&self, fresh: &[AnnouncementRecord]) -> Diff {
        diff_against(self.load().as_ref(), fresh)
    }

    /// Persist the newest entry of `fresh`. An empty list leaves the watermark alone.
    pub fn commit(&self, fresh: &[AnnouncementRecord]) -> Result<()> {
        let Some(newest) = fresh.first() else {
            return Ok(());
        };
        self.store.write(newest)
    }
}

/// Pure diff of `fresh` against an optional watermark.
pub fn diff_against(watermark: Option<&AnnouncementRecord>, fresh: &[AnnouncementRecord]) -> Diff {
    let all_items = fresh.to_vec();

    if fresh.is_empty() {
        return Diff {
            status: DiffStatus::Empty,
            new_items: Vec::new(),
            all_items,
        };
    }

    let Some(mark) = watermark else {
        return Diff {
            status: DiffStatus::FirstRun,
            new_items: Vec::new(),
            all_items,
        };
    };

    match fresh.iter().position(|r| r.same_announcement(mark)) {
        Some(0) => Diff {
            status: DiffStatus::UpToDate,
            new_items: Vec::new(),
            all_items,
        },
        Some(idx) => Diff {
            status: DiffStatus::NewItems,
            new_items: fresh[..idx].to_vec(),
            all_items,
        },
        None => Diff {
            status: DiffStatus::WatermarkNotFound,
            new_items: Vec::new(),
            all_items,
        },
    }
}
