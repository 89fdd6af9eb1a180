//! On-disk layout of the content cache.
//!
//! ```text
//! cache_dir/
//! ├── index.json              # key -> metadata, rewritten on every flush
//! └── blobs/
//!     ├── 000000000000002a.body
//!     └── 000000000000002b.body
//! ```
//!
//! Both the index and the blobs are written to a temporary file and renamed
//! into place, so a crash leaves either the old or the new file, never a
//! torn one. Blob files are never modified after the rename.

use crate::error::CacheError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const INDEX_VERSION: u32 = 1;
const INDEX_FILE: &str = "index.json";
const BLOB_DIR: &str = "blobs";
const BLOB_EXT: &str = "body";

/// Persisted metadata for one cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub domain: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_access: DateTime<Utc>,
    pub access_seq: u64,
    pub size: u64,
    pub blob: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexFile {
    pub version: u32,
    pub next_seq: u64,
    pub entries: BTreeMap<String, IndexEntry>,
}

impl Default for IndexFile {
    fn default() -> Self {
        Self {
            version: INDEX_VERSION,
            next_seq: 0,
            entries: BTreeMap::new(),
        }
    }
}

pub fn blob_name(seq: u64) -> String {
    format!("{seq:016x}.{BLOB_EXT}")
}

/// Sequence number encoded in a blob name, if it is one of ours.
pub fn blob_seq(name: &str) -> Option<u64> {
    let stem = name.strip_suffix(BLOB_EXT)?.strip_suffix('.')?;
    u64::from_str_radix(stem, 16).ok()
}

#[derive(Debug, Clone)]
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    /// Create the directory layout if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let root = root.into();
        let blobs = root.join(BLOB_DIR);
        fs::create_dir_all(&blobs).map_err(|e| CacheError::persistence(&blobs, e))?;
        Ok(Self { root })
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    fn blob_path(&self, name: &str) -> PathBuf {
        self.root.join(BLOB_DIR).join(name)
    }

    /// Read the index; a missing file is an empty cache.
    pub fn load_index(&self) -> Result<IndexFile, CacheError> {
        let path = self.index_path();
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(IndexFile::default()),
            Err(e) => return Err(CacheError::persistence(path, e)),
        };
        serde_json::from_slice(&bytes).map_err(|source| CacheError::CorruptIndex { path, source })
    }

    pub fn write_index(&self, index: &IndexFile) -> Result<(), CacheError> {
        let path = self.index_path();
        let json = serde_json::to_vec_pretty(index)
            .map_err(|e| CacheError::persistence(&path, io::Error::other(e)))?;
        write_atomic(&path, &json)
    }

    pub fn write_blob(&self, name: &str, payload: &[u8]) -> Result<(), CacheError> {
        write_atomic(&self.blob_path(name), payload)
    }

    pub fn read_blob(&self, name: &str) -> io::Result<Vec<u8>> {
        fs::read(self.blob_path(name))
    }

    /// Delete a blob; one that is already gone counts as deleted.
    pub fn remove_blob(&self, name: &str) -> Result<(), CacheError> {
        let path = self.blob_path(name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::persistence(path, e)),
        }
    }

    /// Remove blob files (and stray temp files) the index does not reference.
    /// Returns how many were removed.
    pub fn sweep_orphans(&self, referenced: &HashSet<&str>) -> usize {
        let dir = self.root.join(BLOB_DIR);
        let read_dir = match fs::read_dir(&dir) {
            Ok(rd) => rd,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "Could not list blob directory");
                return 0;
            }
        };

        let mut removed = 0;
        for entry in read_dir.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if referenced.contains(name) {
                continue;
            }
            match fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) => debug!(file = name, error = %e, "Could not remove orphaned blob"),
            }
        }
        removed
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    let tmp = path.with_extension("tmp");
    let result = (|| -> io::Result<()> {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();
    result.map_err(|e| {
        let _ = fs::remove_file(&tmp);
        CacheError::persistence(path, e)
    })
}
