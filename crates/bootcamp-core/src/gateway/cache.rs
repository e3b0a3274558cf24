//! Versioned response cache on disk.
//!
//! Each generation lives in its own directory named `cache-<version>`:
//!
//! ```text
//! <root>/cache-v18/72f3b2b84816a949.json        url, status, content type, body file
//! <root>/cache-v18/72f3b2b84816a949-<id>.body   raw response body
//! <root>/cache-v18/sealed                       present once fully populated
//! ```
//!
//! Every entry is its own pair of files, so handles on the same root (in this
//! process or another) never overwrite each other's entries. Generations never
//! see each other's entries. Bumping the version gives a fresh, empty generation.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::utils::fs::{unique_suffix, write_atomic};

use super::{FetchedResponse, GatewayError};

/// Prefix shared by every generation directory.
pub const CACHE_PREFIX: &str = "cache-";

const SEALED_MARKER: &str = "sealed";
const ENTRY_EXTENSION: &str = "json";

/// Generations being populated live under a hidden name until promoted.
const STAGING_PREFIX: &str = ".staging-";

/// A concurrent `put` may replace an entry between reading it and reading
/// its body.
const MATCH_ATTEMPTS: usize = 3;

/// Name of the generation for `version`, e.g. `cache-v18`.
pub fn cache_name(version: &str) -> String {
    format!("{}{}", CACHE_PREFIX, version)
}

/// A version becomes part of a directory name, so it must not name a path.
pub fn validate_version(version: &str) -> Result<(), GatewayError> {
    if is_plain_component(version) {
        Ok(())
    } else {
        Err(GatewayError::InvalidName(version.to_string()))
    }
}

fn is_plain_component(value: &str) -> bool {
    !value.is_empty()
        && !value.contains("..")
        && !value.contains(|c: char| c == '/' || c == '\\' || c == '\0')
}

/// Stable file stem for `url`: 64-bit FNV-1a, as hex.
fn entry_key(url: &str) -> String {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in url.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    format!("{:016x}", hash)
}

/// A response read back from a generation.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    pub cached_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntryMeta {
    url: String,
    body: String,
    status: u16,
    content_type: Option<String>,
    cached_at: DateTime<Utc>,
}

/// One named cache generation. Holds no state beyond its directory; every
/// call reads or writes the files directly.
pub struct CacheGeneration {
    name: String,
    dir: PathBuf,
}

impl CacheGeneration {
    fn new(name: &str, dir: PathBuf) -> Self {
        Self {
            name: name.to_string(),
            dir,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn len(&self) -> Result<usize, GatewayError> {
        Ok(self.entry_files().await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool, GatewayError> {
        Ok(self.len().await? == 0)
    }

    /// Every cached URL, sorted.
    pub async fn urls(&self) -> Result<Vec<String>, GatewayError> {
        let mut urls = Vec::new();
        for path in self.entry_files().await? {
            if let Some(meta) = read_entry(&path).await? {
                urls.push(meta.url);
            }
        }
        urls.sort();
        Ok(urls)
    }

    /// Stored response for `url`, verbatim. No freshness check is made.
    pub async fn match_url(&self, url: &str) -> Result<Option<CachedResponse>, GatewayError> {
        let path = self.entry_path(url);

        for _ in 0..MATCH_ATTEMPTS {
            let meta = match read_entry(&path).await? {
                // A different URL with the same key counts as a miss.
                Some(meta) if meta.url == url => meta,
                _ => return Ok(None),
            };

            let body_path = self.dir.join(&meta.body);
            match tokio::fs::read(&body_path).await {
                Ok(body) => {
                    return Ok(Some(CachedResponse {
                        url: meta.url,
                        status: meta.status,
                        content_type: meta.content_type,
                        body,
                        cached_at: meta.cached_at,
                    }))
                }
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(GatewayError::storage(&body_path, e)),
            }
        }

        Err(GatewayError::storage(
            &path,
            std::io::Error::new(ErrorKind::NotFound, "response body missing"),
        ))
    }

    /// Like `match_url`, but absence is `GatewayError::CacheMiss`.
    pub async fn require(&self, url: &str) -> Result<CachedResponse, GatewayError> {
        self.match_url(url)
            .await?
            .ok_or_else(|| GatewayError::CacheMiss(url.to_string()))
    }

    /// Store `response` under `url`, replacing any previous entry.
    ///
    /// The body goes to a file of its own first; renaming the entry file into
    /// place publishes it. Concurrent puts of the same URL race last-write-wins.
    pub async fn put(&self, url: &str, response: &FetchedResponse) -> Result<(), GatewayError> {
        let key = entry_key(url);
        let body = format!("{}-{}.body", key, unique_suffix());
        let contents = serde_json::to_string_pretty(&EntryMeta {
            url: url.to_string(),
            body: body.clone(),
            status: response.status,
            content_type: response.content_type.clone(),
            cached_at: Utc::now(),
        })?;

        let body_path = self.dir.join(&body);
        tokio::fs::write(&body_path, &response.body)
            .await
            .map_err(|e| GatewayError::storage(&body_path, e))?;

        let path = self.entry_path(url);
        let previous = read_entry(&path).await.ok().flatten();
        if let Err(e) = write_atomic(&path, contents).await {
            let _ = tokio::fs::remove_file(&body_path).await;
            return Err(GatewayError::storage(&path, e));
        }

        if let Some(old) = previous.filter(|old| old.body != body) {
            // No entry points at it any more.
            let _ = tokio::fs::remove_file(self.dir.join(old.body)).await;
        }

        debug!(cache = %self.name, url = url, bytes = response.body.len(), "Cached response");
        Ok(())
    }

    /// Mark the generation as completely populated.
    pub async fn seal(&self) -> Result<(), GatewayError> {
        let path = self.dir.join(SEALED_MARKER);
        write_atomic(&path, Utc::now().to_rfc3339())
            .await
            .map_err(|e| GatewayError::storage(&path, e))
    }

    pub async fn is_sealed(&self) -> bool {
        tokio::fs::try_exists(self.dir.join(SEALED_MARKER))
            .await
            .unwrap_or(false)
    }

    fn entry_path(&self, url: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", entry_key(url), ENTRY_EXTENSION))
    }

    async fn entry_files(&self) -> Result<Vec<PathBuf>, GatewayError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(GatewayError::storage(&self.dir, e)),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| GatewayError::storage(&self.dir, e))?
        {
            let name = entry.file_name();
            let is_entry = name.to_str().is_some_and(|name| {
                !name.starts_with('.') && name.ends_with(&format!(".{}", ENTRY_EXTENSION))
            });
            if is_entry {
                files.push(entry.path());
            }
        }
        Ok(files)
    }
}

async fn read_entry(path: &Path) -> Result<Option<EntryMeta>, GatewayError> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(GatewayError::storage(path, e)),
    }
}

/// All generations under one root directory.
pub struct CacheStorage {
    root: PathBuf,
}

impl CacheStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Open (creating if absent) the generation called `name`.
    pub async fn open(&self, name: &str) -> Result<Arc<CacheGeneration>, GatewayError> {
        let dir = self.dir_for(name)?;
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| GatewayError::storage(&dir, e))?;
        Ok(Arc::new(CacheGeneration::new(name, dir)))
    }

    /// Whether a generation called `name` exists on disk.
    pub async fn has(&self, name: &str) -> bool {
        let Ok(dir) = self.dir_for(name) else {
            return false;
        };
        tokio::fs::metadata(dir)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false)
    }

    /// Names of all generations on disk, sorted.
    pub async fn keys(&self) -> Result<Vec<String>, GatewayError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(GatewayError::storage(&self.root, e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| GatewayError::storage(&self.root, e))?
        {
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            if let (true, Some(name)) = (is_dir, entry.file_name().to_str()) {
                if name.starts_with(CACHE_PREFIX) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Delete the generation called `name`. Returns false if it did not exist.
    pub async fn delete(&self, name: &str) -> Result<bool, GatewayError> {
        let dir = self.dir_for(name)?;
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                info!(cache = name, "Deleted cache generation");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(GatewayError::storage(&dir, e)),
        }
    }

    /// A private, empty generation that becomes `name` once promoted.
    /// Invisible to `keys`, `has` and `open` until then.
    pub(crate) async fn stage(&self, name: &str) -> Result<CacheGeneration, GatewayError> {
        self.dir_for(name)?;
        let dir = self
            .root
            .join(format!("{}{}-{}", STAGING_PREFIX, name, unique_suffix()));
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| GatewayError::storage(&dir, e))?;
        Ok(CacheGeneration::new(name, dir))
    }

    /// Replace the generation `staged` was created for with its contents.
    pub(crate) async fn promote(&self, staged: &CacheGeneration) -> Result<(), GatewayError> {
        let target = self.dir_for(&staged.name)?;
        self.delete(&staged.name).await?;
        tokio::fs::rename(&staged.dir, &target)
            .await
            .map_err(|e| GatewayError::storage(&target, e))?;
        debug!(cache = %staged.name, "Promoted staged cache generation");
        Ok(())
    }

    /// Throw away a staged generation that will never be promoted.
    pub(crate) async fn discard(&self, staged: &CacheGeneration) -> Result<(), GatewayError> {
        match tokio::fs::remove_dir_all(&staged.dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(GatewayError::storage(&staged.dir, e)),
        }
    }

    fn dir_for(&self, name: &str) -> Result<PathBuf, GatewayError> {
        if !is_plain_component(name) || name.starts_with('.') {
            return Err(GatewayError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(name))
    }
}

// ============================================================================
// Tests
// ============================================================================
