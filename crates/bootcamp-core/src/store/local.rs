use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::models::{BurpeeVariant, VariantPreference, WorkoutRecord, CURRENT_VARIANT_ID};
use crate::utils::fs::write_atomic;

use super::StoreError;

/// Name of the store directory.
pub const DATABASE_NAME: &str = "BurpeeBootcamp";

/// Schema version this build reads and writes.
/// Version 1 only had the `workouts` collection.
pub const SCHEMA_VERSION: u32 = 2;

const META_FILE: &str = "meta.json";
const WORKOUTS: &str = "workouts";
const BURPEE: &str = "burpee";
const RECORD_EXTENSION: &str = "json";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct StoreMeta {
    version: u32,
}

/// Handle to the open store.
///
/// Every record is its own file, written by atomic rename, and every read
/// goes to disk. Handles on the same directory (in this process or another)
/// never overwrite each other's records; two writers to the same key race
/// last-write-wins.
pub struct LocalStore {
    root: PathBuf,
    closed: AtomicBool,
}

impl LocalStore {
    /// Open the store in `dir`, creating it (and the directory) if absent.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = dir.as_ref().join(DATABASE_NAME);
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| StoreError::unavailable(&root, e))?;

        let meta_path = root.join(META_FILE);
        let meta = match tokio::fs::read_to_string(&meta_path).await {
            Ok(contents) => serde_json::from_str::<StoreMeta>(&contents)?,
            Err(e) if e.kind() == ErrorKind::NotFound => StoreMeta::default(),
            Err(e) => return Err(StoreError::unavailable(&meta_path, e)),
        };

        if meta.version > SCHEMA_VERSION {
            return Err(StoreError::VersionTooNew {
                found: meta.version,
                supported: SCHEMA_VERSION,
            });
        }

        let store = Self {
            root,
            closed: AtomicBool::new(false),
        };
        if meta.version < SCHEMA_VERSION {
            store.upgrade(meta.version).await?;
        }

        info!(path = %store.root.display(), version = SCHEMA_VERSION, "Opened local store");
        Ok(store)
    }

    /// Create whichever collections `from` lacked, then record the new version.
    /// Existing records are kept.
    async fn upgrade(&self, from: u32) -> Result<(), StoreError> {
        debug!(from, to = SCHEMA_VERSION, "Upgrading store schema");
        for collection in [WORKOUTS, BURPEE] {
            let dir = self.root.join(collection);
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| StoreError::unavailable(&dir, e))?;
        }

        let meta_path = self.root.join(META_FILE);
        let contents = serde_json::to_string_pretty(&StoreMeta {
            version: SCHEMA_VERSION,
        })?;
        write_atomic(&meta_path, contents)
            .await
            .map_err(|e| StoreError::unavailable(&meta_path, e))
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// All workouts, oldest first. An empty history is not an error.
    pub async fn list_workouts(&self) -> Result<Vec<WorkoutRecord>, StoreError> {
        let dir = self.collection(WORKOUTS)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::MissingCollection(WORKOUTS))
            }
            Err(e) => return Err(StoreError::unavailable(&dir, e)),
        };

        let mut workouts = BTreeMap::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::unavailable(&dir, e))?
        {
            let name = entry.file_name();
            let Some(timestamp) = name.to_str().and_then(record_key) else {
                continue;
            };
            // A record listed here is never removed, only replaced by rename.
            if let Some(record) = read_record::<WorkoutRecord>(&entry.path()).await? {
                workouts.insert(timestamp, record);
            }
        }
        Ok(workouts.into_values().collect())
    }

    /// Insert or overwrite the workout stored under `record.timestamp`.
    pub async fn put_workout(&self, record: &WorkoutRecord) -> Result<(), StoreError> {
        let dir = self.collection(WORKOUTS)?;
        write_record(&dir, &record.timestamp.to_string(), record).await?;
        debug!(timestamp = record.timestamp, "Stored workout");
        Ok(())
    }

    /// The stored variant, or `None` if it was never set.
    pub async fn variant_preference(&self) -> Result<Option<BurpeeVariant>, StoreError> {
        let dir = self.collection(BURPEE)?;
        if !tokio::fs::try_exists(&dir)
            .await
            .map_err(|e| StoreError::unavailable(&dir, e))?
        {
            return Err(StoreError::MissingCollection(BURPEE));
        }

        let path = dir.join(format!("{}.{}", CURRENT_VARIANT_ID, RECORD_EXTENSION));
        Ok(read_record::<VariantPreference>(&path)
            .await?
            .map(|pref| pref.value)
            .filter(|variant| !variant.is_null()))
    }

    pub async fn put_variant_preference(&self, variant: &BurpeeVariant) -> Result<(), StoreError> {
        let dir = self.collection(BURPEE)?;
        let preference = VariantPreference::current(variant.clone());
        write_record(&dir, &preference.id, &preference).await?;
        debug!("Stored burpee variant");
        Ok(())
    }

    /// Release the handle. Later calls fail with `StoreError::Closed`.
    pub async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!(path = %self.root.display(), "Closed local store");
        }
    }

    fn collection(&self, name: &str) -> Result<PathBuf, StoreError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }
        Ok(self.root.join(name))
    }
}

/// Timestamp key of a workout file name such as `1700000000.json`.
/// Temporary files and anything else in the directory are skipped.
fn record_key(file_name: &str) -> Option<i64> {
    file_name
        .strip_suffix(RECORD_EXTENSION)?
        .strip_suffix('.')?
        .parse()
        .ok()
}

async fn read_record<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>, StoreError> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::unavailable(path, e)),
    }
}

async fn write_record<T: Serialize>(dir: &Path, key: &str, record: &T) -> Result<(), StoreError> {
    let path = dir.join(format!("{}.{}", key, RECORD_EXTENSION));
    let contents = serde_json::to_string_pretty(record)?;
    write_atomic(&path, contents)
        .await
        .map_err(|e| StoreError::unavailable(&path, e))
}

// ============================================================================
// Tests
// ============================================================================
