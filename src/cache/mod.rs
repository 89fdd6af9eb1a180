//! Persistent response cache shared by all fetch tasks.
//!
//! # Semantics
//!
//! - **TTL**: each entry gets `expires_at = created_at + ttl_for(domain)` at
//!   insertion. Expiry is checked lazily on `get`; an expired entry is a miss
//!   but stays in place until it is evicted or replaced.
//! - **Eviction**: least recently *accessed* first. A hit refreshes recency.
//!   Eviction runs before an insert, so the configured bounds on entry count
//!   and total bytes hold at every observable point.
//! - **Persistence**: the index is flushed every `flush_every_entries` puts
//!   or `flush_every_secs` seconds (checked on put), on [`ContentCache::flush`]
//!   and when the cache is dropped. Payload blobs are written once per put.
//! - **Degraded mode**: after a disk failure the cache keeps serving from
//!   memory and stops writing. `stats().degraded` reports it.
//!
//! # Concurrency
//!
//! All state sits behind one mutex, so gets, puts, evictions and flushes on
//! the same store are serialized and never observe a half-evicted entry.

pub mod clock;
pub mod fingerprint;
pub mod lru;
pub mod store;

use crate::config::{self, CacheConfig};
use crate::error::CacheError;
use chrono::{DateTime, Utc};
use clock::Clock;
use lru::AccessOrder;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use store::{DiskStore, IndexEntry, IndexFile};
use tracing::{debug, info, instrument, warn};

pub use fingerprint::fingerprint;

/// Read-only snapshot of cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// Fraction of lookups that hit, `0.0` before the first lookup.
    pub hit_rate: f64,
    pub entry_count: usize,
    pub size_bytes: u64,
    pub degraded: bool,
}

#[derive(Debug)]
struct Slot {
    meta: IndexEntry,
    /// Resident payload; loaded from the blob on first hit after a restart.
    payload: Option<Arc<[u8]>>,
}

#[derive(Debug)]
struct CacheState {
    /// Live entries by fingerprint.
    slots: HashMap<String, Slot>,
    /// Access order over the keys of `slots`, oldest first.
    order: AccessOrder,
    /// Sum of payload sizes in `slots`.
    size_bytes: u64,
    /// On-disk store; `None` when the cache never had one.
    disk: Option<DiskStore>,
    /// Set after a persistence failure; no further disk writes.
    degraded: bool,
    /// The index on disk is behind memory.
    dirty: bool,
    /// Puts since the index was last written.
    puts_since_flush: usize,
    /// When the index was last written (or the cache opened).
    last_flush: DateTime<Utc>,
    /// Lookups that returned a payload.
    hits: u64,
    /// Lookups that found nothing live.
    misses: u64,
    /// Entries removed to respect the bounds.
    evictions: u64,
}

impl CacheState {
    fn empty(disk: Option<DiskStore>, now: DateTime<Utc>) -> Self {
        Self {
            slots: HashMap::new(),
            order: AccessOrder::default(),
            size_bytes: 0,
            degraded: disk.is_none(),
            disk,
            dirty: false,
            puts_since_flush: 0,
            last_flush: now,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    /// Disk handle for writes, `None` once degraded.
    fn writable_disk(&self) -> Option<&DiskStore> {
        if self.degraded {
            None
        } else {
            self.disk.as_ref()
        }
    }

    fn enter_degraded(&mut self, err: &CacheError) {
        if !self.degraded {
            warn!(error = %err, "Cache persistence failed; continuing in memory-only mode");
        }
        self.degraded = true;
    }

    /// Drop an entry from memory and delete its blob.
    fn remove(&mut self, key: &str) -> Option<IndexEntry> {
        let slot = self.slots.remove(key)?;
        self.order.remove(slot.meta.access_seq);
        self.size_bytes -= slot.meta.size;
        self.dirty = true;
        if let Some(disk) = self.writable_disk() {
            if let Err(e) = disk.remove_blob(&slot.meta.blob) {
                warn!(key, error = %e, "Could not delete cache blob");
            }
        }
        Some(slot.meta)
    }

    fn evict_lru(&mut self) -> bool {
        let Some((_, key)) = self.order.oldest() else {
            return false;
        };
        let key = key.to_string();
        self.remove(&key);
        self.evictions += 1;
        debug!(key = %key, "Evicted least recently used entry");
        true
    }

    fn index_snapshot(&self) -> IndexFile {
        IndexFile {
            version: store::INDEX_VERSION,
            next_seq: self.order.next_seq(),
            entries: self
                .slots
                .iter()
                .map(|(key, slot)| (key.clone(), slot.meta.clone()))
                .collect(),
        }
    }

    fn flush(&mut self, now: DateTime<Utc>) -> Result<(), CacheError> {
        if !self.dirty {
            return Ok(());
        }
        let Some(disk) = self.writable_disk() else {
            return Ok(());
        };
        match disk.write_index(&self.index_snapshot()) {
            Ok(()) => {
                debug!(entries = self.slots.len(), "Flushed cache index");
                self.dirty = false;
                self.puts_since_flush = 0;
                self.last_flush = now;
                Ok(())
            }
            Err(e) => {
                self.enter_degraded(&e);
                Err(e)
            }
        }
    }
}

/// Bounded, persistent, LRU + TTL response cache.
#[derive(Debug)]
pub struct ContentCache {
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<CacheState>,
}

impl ContentCache {
    /// Open (or create) the cache under `config.dir` and load its index.
    ///
    /// Entries referencing missing blobs are kept until they are read, at
    /// which point they are repaired. Blob files the index does not know
    /// about are deleted.
    #[instrument(level = "info", skip_all, fields(dir = %config.dir.display()))]
    pub fn open(config: CacheConfig, clock: Arc<dyn Clock>) -> Result<Self, CacheError> {
        let disk = DiskStore::open(&config.dir)?;
        let index = disk.load_index()?;
        let now = clock.now();

        let mut state = CacheState::empty(Some(disk), now);
        state.order.bump_past(index.next_seq.saturating_sub(1));
        if index.version != store::INDEX_VERSION {
            warn!(found = index.version, expected = store::INDEX_VERSION, "Unexpected cache index version");
        }

        // Oldest access first so duplicate sequence numbers lose to the
        // entry that was genuinely used earlier.
        let mut entries: Vec<(String, IndexEntry)> = index.entries.into_iter().collect();
        entries.sort_by_key(|(_, e)| e.access_seq);
        for (key, meta) in entries {
            if !state.order.restore(meta.access_seq, &key) {
                let err = CacheError::CorruptEntry {
                    key: key.clone(),
                    reason: format!("duplicate access sequence {}", meta.access_seq),
                };
                warn!(error = %err, "Dropping cache entry");
                state.dirty = true;
                continue;
            }
            if let Some(seq) = store::blob_seq(&meta.blob) {
                state.order.bump_past(seq);
            }
            state.size_bytes += meta.size;
            state.slots.insert(key, Slot { meta, payload: None });
        }

        if let Some(disk) = &state.disk {
            let referenced: HashSet<&str> =
                state.slots.values().map(|s| s.meta.blob.as_str()).collect();
            let swept = disk.sweep_orphans(&referenced);
            if swept > 0 {
                info!(swept, "Removed orphaned cache blobs");
            }
        }

        // The configured bounds may have shrunk since the index was written.
        while state.slots.len() > config.max_entries || state.size_bytes > config.max_bytes {
            if !state.evict_lru() {
                break;
            }
        }

        info!(
            entries = state.slots.len(),
            size_bytes = state.size_bytes,
            "Loaded cache index"
        );
        Ok(Self {
            config,
            clock,
            state: Mutex::new(state),
        })
    }

    /// Like [`ContentCache::open`], but a failure to open or load degrades to
    /// an empty memory-only cache instead of failing the run.
    pub fn open_or_degraded(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        match Self::open(config.clone(), clock.clone()) {
            Ok(cache) => cache,
            Err(e) => {
                warn!(error = %e, "Cache unavailable on disk; running with a memory-only cache");
                let now = clock.now();
                Self {
                    config,
                    clock,
                    state: Mutex::new(CacheState::empty(None, now)),
                }
            }
        }
    }

    /// Look up a payload. Expired entries and unreadable blobs are misses;
    /// the latter also drop the entry from the index.
    pub fn get(&self, key: &str) -> Option<Arc<[u8]>> {
        let now = self.clock.now();
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let Some(slot) = state.slots.get_mut(key) else {
            state.misses += 1;
            return None;
        };
        if now > slot.meta.expires_at {
            debug!(key, expires_at = %slot.meta.expires_at, "Cache entry expired");
            state.misses += 1;
            return None;
        }

        let payload = match &slot.payload {
            Some(payload) => Ok(payload.clone()),
            None => load_payload(state.disk.as_ref(), key, &slot.meta),
        };
        let payload = match payload {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Repairing cache index");
                state.remove(key);
                state.misses += 1;
                return None;
            }
        };

        slot.payload = Some(payload.clone());
        slot.meta.last_access = now;
        slot.meta.access_seq = state.order.touch(key, Some(slot.meta.access_seq));
        state.dirty = true;
        state.hits += 1;
        Some(payload)
    }

    /// Insert or replace `key`.
    ///
    /// The in-memory insert always happens. An error only reports that the
    /// payload or index could not be persisted; the cache is degraded from
    /// then on.
    pub fn put(&self, key: &str, payload: &[u8], domain: &str) -> Result<(), CacheError> {
        let now = self.clock.now();
        let size = payload.len() as u64;
        let mut guard = self.state.lock();
        let state = &mut *guard;

        // A newer payload supersedes the old one even if it cannot be kept.
        state.remove(key);

        if size > self.config.max_bytes || self.config.max_entries == 0 {
            warn!(key, size, max_bytes = self.config.max_bytes, "Payload exceeds cache capacity; not cached");
            return Ok(());
        }

        while state.slots.len() + 1 > self.config.max_entries
            || state.size_bytes + size > self.config.max_bytes
        {
            if !state.evict_lru() {
                break;
            }
        }

        let mut result = Ok(());
        let blob = store::blob_name(state.order.allocate());
        if let Some(disk) = state.writable_disk() {
            if let Err(e) = disk.write_blob(&blob, payload) {
                state.enter_degraded(&e);
                result = Err(e);
            }
        }

        let ttl = self.config.ttl_for(domain);
        let access_seq = state.order.touch(key, None);
        let meta = IndexEntry {
            domain: domain.to_string(),
            created_at: now,
            expires_at: now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
            last_access: now,
            access_seq,
            size,
            blob,
        };
        state.slots.insert(
            key.to_string(),
            Slot {
                meta,
                payload: Some(Arc::from(payload)),
            },
        );
        state.size_bytes += size;
        state.dirty = true;
        state.puts_since_flush += 1;
        debug_assert_eq!(state.order.len(), state.slots.len());

        if self.flush_due(state, now) {
            if let Err(e) = state.flush(now) {
                result = result.and(Err(e));
            }
        }
        result
    }

    /// Persist the index now.
    pub fn flush(&self) -> Result<(), CacheError> {
        let now = self.clock.now();
        self.state.lock().flush(now)
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        let lookups = state.hits + state.misses;
        CacheStats {
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                state.hits as f64 / lookups as f64
            },
            entry_count: state.slots.len(),
            size_bytes: state.size_bytes,
            degraded: state.degraded,
        }
    }

    fn flush_due(&self, state: &CacheState, now: DateTime<Utc>) -> bool {
        let every = config::secs_to_duration(self.config.flush_every_secs);
        state.puts_since_flush >= self.config.flush_every_entries.max(1)
            || now - state.last_flush >= every
    }
}

impl Drop for ContentCache {
    fn drop(&mut self) {
        let now = self.clock.now();
        if let Err(e) = self.state.get_mut().flush(now) {
            warn!(error = %e, "Final cache flush failed");
        }
    }
}

fn load_payload(
    disk: Option<&DiskStore>,
    key: &str,
    meta: &IndexEntry,
) -> Result<Arc<[u8]>, CacheError> {
    let corrupt = |reason: String| CacheError::CorruptEntry {
        key: key.to_string(),
        reason,
    };
    let disk = disk.ok_or_else(|| corrupt("no payload in memory and no disk store".into()))?;
    let bytes = disk
        .read_blob(&meta.blob)
        .map_err(|e| corrupt(format!("blob {}: {e}", meta.blob)))?;
    if bytes.len() as u64 != meta.size {
        return Err(corrupt(format!(
            "blob {} has {} bytes, index says {}",
            meta.blob,
            bytes.len(),
            meta.size
        )));
    }
    Ok(Arc::from(bytes))
}
