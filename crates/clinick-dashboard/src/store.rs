//! Durable record of reports that have already raised an alarm
//!
//! The file holds `{"version": 1, "ids": [...]}`. Older installs wrote a bare
//! JSON array of ids; that shape is still read and is rewritten in the
//! versioned form on the next save. Anything else loads as an empty set.

use crate::{DashboardError, Result};
use clinick_core::ReportId;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Current on-disk schema version
pub const SCHEMA_VERSION: u32 = 1;

/// Insertion-ordered set of report ids that have alarmed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlarmedIdSet {
    ids: IndexSet<ReportId>,
}

impl AlarmedIdSet {
    /// Create an empty set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `id` has already alarmed
    #[must_use]
    pub fn contains(&self, id: &ReportId) -> bool {
        self.ids.contains(id)
    }

    /// Record `id`; returns `false` if it was already present
    pub fn insert(&mut self, id: ReportId) -> bool {
        self.ids.insert(id)
    }

    /// Number of recorded ids
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether no id has been recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Ids in the order they first alarmed
    pub fn iter(&self) -> impl Iterator<Item = &ReportId> {
        self.ids.iter()
    }
}

impl FromIterator<ReportId> for AlarmedIdSet {
    fn from_iter<I: IntoIterator<Item = ReportId>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

#[derive(Serialize)]
struct StoredIds<'a> {
    version: u32,
    ids: Vec<&'a ReportId>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredFormat {
    Versioned { version: u32, ids: Vec<ReportId> },
    Legacy(Vec<ReportId>),
}

/// File-backed storage for an [`AlarmedIdSet`]
#[derive(Debug, Clone)]
pub struct AlarmedIdStore {
    path: PathBuf,
}

impl AlarmedIdStore {
    /// Store backed by `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the set, degrading to empty on any problem
    #[must_use]
    pub fn load(&self) -> AlarmedIdSet {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No alarmed-id file yet");
                return AlarmedIdSet::new();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read alarmed ids; starting empty");
                return AlarmedIdSet::new();
            }
        };

        match serde_json::from_str::<StoredFormat>(&data) {
            Ok(StoredFormat::Versioned { version, ids }) if version == SCHEMA_VERSION => {
                let set: AlarmedIdSet = ids.into_iter().collect();
                info!(count = set.len(), "Restored alarmed ids");
                set
            }
            Ok(StoredFormat::Versioned { version, .. }) => {
                warn!(version, "Unknown alarmed-id schema version; starting empty");
                AlarmedIdSet::new()
            }
            Ok(StoredFormat::Legacy(ids)) => {
                let set: AlarmedIdSet = ids.into_iter().collect();
                info!(count = set.len(), "Restored alarmed ids from legacy array");
                set
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Corrupt alarmed-id file; starting empty");
                AlarmedIdSet::new()
            }
        }
    }

    /// Write the set through a temporary file and rename it into place
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError::Storage`] if the directory cannot be created
    /// or the file cannot be written.
    pub fn save(&self, set: &AlarmedIdSet) -> Result<()> {
        let stored = StoredIds {
            version: SCHEMA_VERSION,
            ids: set.iter().collect(),
        };
        let data = serde_json::to_string(&stored)
            .map_err(|e| DashboardError::storage(&self.path, e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| DashboardError::storage(parent, e.to_string()))?;
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, data).map_err(|e| DashboardError::storage(&tmp, e.to_string()))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| DashboardError::storage(&self.path, e.to_string()))?;

        debug!(count = set.len(), path = %self.path.display(), "Persisted alarmed ids");
        Ok(())
    }
}
