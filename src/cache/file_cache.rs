//! In-memory cache of static file contents.
//!
//! # Responsibilities
//! - Map canonical file paths to their bytes with sliding expiry
//! - Drop entries on filesystem change notifications
//! - Refuse to store content read before a concurrent invalidation
//!
//! # Design Decisions
//! - `DashMap` gives per-shard locking; readers of different files never
//!   contend
//! - Expired entries are evicted lazily on access and swept every
//!   `PURGE_INTERVAL` puts
//! - A global epoch, bumped by every invalidation, stamps each read ticket

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use axum::body::Bytes;
use dashmap::DashMap;

use crate::cache::FsEvent;
use crate::observability::metrics;

/// Puts between opportunistic sweeps of expired entries.
const PURGE_INTERVAL: u64 = 64;

#[derive(Debug, Clone)]
struct CacheEntry {
    content: Bytes,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Token taken before reading a file from disk.
///
/// [`FileCache::put_fresh`] refuses to store content read under a ticket that
/// an invalidation has since outdated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

/// Concurrent map from canonical file path to file content.
#[derive(Debug)]
pub struct FileCache {
    entries: DashMap<PathBuf, CacheEntry>,
    sliding: Option<Duration>,
    epoch: AtomicU64,
    puts: AtomicU64,
}

impl FileCache {
    /// `sliding`: entries not read within this window are dropped. `None` keeps
    /// entries until invalidated.
    pub fn new(sliding: Option<Duration>) -> Self {
        Self {
            entries: DashMap::new(),
            sliding,
            epoch: AtomicU64::new(0),
            puts: AtomicU64::new(0),
        }
    }

    pub fn sliding_window(&self) -> Option<Duration> {
        self.sliding
    }

    pub fn get(&self, path: &Path) -> Option<Bytes> {
        self.get_at(path, Instant::now())
    }

    fn get_at(&self, path: &Path, now: Instant) -> Option<Bytes> {
        let hit = match self.entries.get_mut(path) {
            Some(mut entry) if !entry.is_expired(now) => {
                entry.expires_at = self.sliding.map(|window| now + window);
                Some(entry.content.clone())
            }
            Some(entry) => {
                drop(entry);
                self.entries.remove_if(path, |_, e| e.is_expired(now));
                None
            }
            None => None,
        };

        metrics::record_cache_lookup(hit.is_some());
        hit
    }

    pub fn put(&self, path: impl Into<PathBuf>, content: Bytes) {
        self.insert_at(path.into(), content, Instant::now());
        self.after_put();
    }

    pub fn ticket(&self) -> Ticket {
        Ticket(self.epoch.load(Ordering::Acquire))
    }

    /// Store content read after `ticket` was taken, unless an invalidation
    /// happened in between. Returns whether the content was stored.
    pub fn put_fresh(&self, ticket: Ticket, path: impl Into<PathBuf>, content: Bytes) -> bool {
        let path = path.into();
        let stored = {
            // The shard lock is held across the check and the insert, so an
            // invalidation either bumps the epoch first or removes afterwards.
            let entry = self.entries.entry(path);
            if self.epoch.load(Ordering::Acquire) != ticket.0 {
                false
            } else {
                let expires_at = self.sliding.map(|window| Instant::now() + window);
                entry.insert(CacheEntry { content, expires_at });
                true
            }
        };

        if stored {
            self.after_put();
        }
        stored
    }

    pub fn invalidate(&self, path: &Path) -> bool {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        let removed = self.entries.remove(path).is_some();
        if removed {
            tracing::debug!(path = %path.display(), "File cache entry invalidated");
        }
        removed
    }

    pub fn handle_event(&self, event: &FsEvent) {
        match event {
            FsEvent::Changed(path) | FsEvent::Created(path) | FsEvent::Deleted(path) => {
                self.invalidate(path);
            }
            FsEvent::Renamed { from, to } => {
                self.invalidate(from);
                self.invalidate(to);
            }
        }
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    fn purge_expired_at(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    pub fn clear(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert_at(&self, path: PathBuf, content: Bytes, now: Instant) {
        let expires_at = self.sliding.map(|window| now + window);
        self.entries.insert(path, CacheEntry { content, expires_at });
    }

    fn after_put(&self) {
        let puts = self.puts.fetch_add(1, Ordering::Relaxed) + 1;
        if puts % PURGE_INTERVAL == 0 {
            let purged = self.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, remaining = self.len(), "Expired file cache entries purged");
            }
        }
    }
}
