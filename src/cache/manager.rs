//! Disk-backed named stores of request/response pairs
//!
//! Each store is a directory under the storage root. Each entry is a single JSON
//! file named after the SHA-256 of its cache key, so a put is one atomic rename
//! and concurrent readers never see a half-written entry.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs;

use crate::http::{CacheKey, Request, Response};

/// Suffix shared by every entry file
const ENTRY_EXTENSION: &str = "json";

/// Counter making temporary file names unique within the process
static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Errors raised by the cache storage layer
#[derive(Debug, Error)]
pub enum CacheError {
    /// Filesystem operation failed
    #[error("cache I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Entry could not be encoded
    #[error("failed to serialize cache entry: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Store name cannot be used as a directory name
    #[error("invalid store name: '{0}'")]
    InvalidStoreName(String),
}

/// On-disk representation of one cached pair
#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    key: CacheKey,
    response: Response,
}

/// Root of all named stores
///
/// Uses `~/.cache/meteo/` on Linux by default. Stores survive process restarts
/// since everything lives on disk.
#[derive(Debug, Clone)]
pub struct CacheStorage {
    root: PathBuf,
}

impl CacheStorage {
    /// Creates storage in the XDG-compliant cache directory
    ///
    /// Returns `None` if the cache directory cannot be determined (e.g., no home directory).
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "meteo")?;
        Some(Self::with_dir(project_dirs.cache_dir().join("stores")))
    }

    /// Creates storage rooted at a custom directory
    pub fn with_dir(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn store_dir(&self, name: &str) -> Result<PathBuf, CacheError> {
        validate_store_name(name)?;
        Ok(self.root.join(name))
    }

    /// Opens a named store, creating it if it does not exist
    pub async fn open(&self, name: &str) -> Result<Store, CacheError> {
        let dir = self.store_dir(name)?;
        fs::create_dir_all(&dir).await?;
        Ok(Store {
            name: name.to_string(),
            dir,
        })
    }

    /// Returns true if a store with this name exists
    pub async fn has(&self, name: &str) -> bool {
        match self.store_dir(name) {
            Ok(dir) => fs::metadata(dir).await.map(|m| m.is_dir()).unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Deletes a named store and everything in it
    ///
    /// Returns `Ok(false)` if there was no such store.
    pub async fn delete(&self, name: &str) -> Result<bool, CacheError> {
        let dir = self.store_dir(name)?;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Lists the names of all existing stores, sorted
    pub async fn keys(&self) -> Result<Vec<String>, CacheError> {
        let mut names = Vec::new();
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if validate_store_name(name).is_ok() {
                    names.push(name.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }

    /// Looks a request up in the given stores, in order
    ///
    /// Stores that do not exist are skipped rather than created.
    pub async fn match_in(
        &self,
        stores: &[&str],
        request: &Request,
    ) -> Result<Option<Response>, CacheError> {
        let key = request.key();
        for name in stores {
            let store = Store {
                name: name.to_string(),
                dir: self.store_dir(name)?,
            };
            if let Some(response) = store.match_key(&key).await? {
                return Ok(Some(response));
            }
        }
        Ok(None)
    }
}

/// Handle to one named store
#[derive(Debug, Clone)]
pub struct Store {
    name: String,
    dir: PathBuf,
}

impl Store {
    pub fn name(&self) -> &str {
        &self.name
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(key.method.as_bytes());
        hasher.update(b" ");
        hasher.update(key.url.as_bytes());
        let digest = hex::encode(hasher.finalize());
        self.dir.join(format!("{}.{}", digest, ENTRY_EXTENSION))
    }

    /// Stores a response under the request's key, replacing any previous entry
    pub async fn put(&self, request: &Request, response: &Response) -> Result<(), CacheError> {
        let key = request.key();
        let entry = CacheEntry {
            key: key.clone(),
            response: response.clone(),
        };
        let json = serde_json::to_vec(&entry)?;

        fs::create_dir_all(&self.dir).await?;
        let path = self.entry_path(&key);
        let tmp = self.dir.join(format!(
            ".{}-{}.tmp",
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        if let Err(e) = fs::write(&tmp, json).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        tracing::debug!(store = %self.name, key = %key, "cache put");
        Ok(())
    }

    /// Stores several pairs; each put is atomic on its own
    pub async fn put_all(&self, pairs: &[(Request, Response)]) -> Result<(), CacheError> {
        for (request, response) in pairs {
            self.put(request, response).await?;
        }
        Ok(())
    }

    pub async fn match_request(&self, request: &Request) -> Result<Option<Response>, CacheError> {
        self.match_key(&request.key()).await
    }

    /// Reads the entry for a key
    ///
    /// An entry that cannot be parsed reads as a miss.
    pub async fn match_key(&self, key: &CacheKey) -> Result<Option<Response>, CacheError> {
        let path = self.entry_path(key);
        let content = match fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice::<CacheEntry>(&content) {
            Ok(entry) if entry.key == *key => Ok(Some(entry.response)),
            Ok(_) => Ok(None),
            Err(e) => {
                tracing::warn!(store = %self.name, key = %key, error = %e, "unreadable cache entry");
                Ok(None)
            }
        }
    }

    /// Removes the entry for a key, returning whether one existed
    pub async fn delete(&self, key: &CacheKey) -> Result<bool, CacheError> {
        match fs::remove_file(self.entry_path(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Lists every entry file in the store, parsed where possible
    ///
    /// Files that fail to parse are returned with `entry: None` so callers can
    /// still remove them.
    pub async fn entries(&self) -> Result<Vec<EntryFile>, CacheError> {
        let mut files = Vec::new();
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(files),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            let content = match fs::read(&path).await {
                Ok(content) => content,
                // Deleted between listing and reading
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            let entry = match serde_json::from_slice::<CacheEntry>(&content) {
                Ok(entry) => Some((entry.key, entry.response)),
                Err(e) => {
                    tracing::warn!(store = %self.name, path = %path.display(), error = %e, "unreadable cache entry");
                    None
                }
            };
            files.push(EntryFile { path, entry });
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }

    /// Lists the keys of all readable entries
    pub async fn keys(&self) -> Result<Vec<CacheKey>, CacheError> {
        let mut keys: Vec<CacheKey> = self
            .entries()
            .await?
            .into_iter()
            .filter_map(|file| file.entry.map(|(key, _)| key))
            .collect();
        keys.sort();
        Ok(keys)
    }

    /// Removes an entry file listed by [`Store::entries`], returning whether it existed
    pub async fn remove_entry_file(&self, file: &EntryFile) -> Result<bool, CacheError> {
        match fs::remove_file(&file.path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// One entry file on disk
#[derive(Debug, Clone)]
pub struct EntryFile {
    pub path: PathBuf,
    /// Parsed key and response, `None` if the file is unreadable
    pub entry: Option<(CacheKey, Response)>,
}

/// Store names become directory names, so they must be a single plain path component
fn validate_store_name(name: &str) -> Result<(), CacheError> {
    if name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\'])
        || name.chars().any(char::is_control)
    {
        return Err(CacheError::InvalidStoreName(name.to_string()));
    }
    Ok(())
}
