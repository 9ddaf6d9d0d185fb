//! Lock-free snapshot cache keyed by chain hash.
//!
//! Readers load the current map through `ArcSwap` and never block. Writers
//! derive a new version of the persistent map (structural sharing, so the
//! copy is cheap) and swap it in, serialized by a mutex that readers never
//! touch. The byte total is adjusted inside the same critical
//! section, so it always matches the ready entries of the current snapshot.

use crate::entry::{CacheEntry, EntryState};
use arc_swap::ArcSwap;
use grana_core::{Buffer, TransformError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Persistent map held by each snapshot.
pub type EntryMap = imbl::HashMap<u64, Arc<CacheEntry>>;

/// Content-addressed buffer cache with a byte budget.
pub struct Cache {
    entries: ArcSwap<EntryMap>,
    current_bytes: AtomicU64,
    max_bytes: AtomicU64,
    clock: AtomicU64,
    write_lock: Mutex<()>,
}

impl Cache {
    pub fn new(max_bytes: u64) -> Self {
        Self {
            entries: ArcSwap::from_pointee(EntryMap::new()),
            current_bytes: AtomicU64::new(0),
            max_bytes: AtomicU64::new(max_bytes),
            clock: AtomicU64::new(0),
            write_lock: Mutex::new(()),
        }
    }

    #[inline]
    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    // Lock-free reads

    /// Look up an entry. Ready entries have their access stamp refreshed.
    pub fn get(&self, hash: u64) -> Option<Arc<CacheEntry>> {
        let snapshot = self.entries.load();
        snapshot.get(&hash).map(|entry| {
            if entry.is_ready() {
                entry.touch(self.tick());
            }
            Arc::clone(entry)
        })
    }

    /// The buffer for `hash` if its entry is ready.
    pub fn get_buffer(&self, hash: u64) -> Option<Arc<Buffer>> {
        let snapshot = self.entries.load();
        let entry = snapshot.get(&hash)?;
        let buffer = entry.buffer()?;
        entry.touch(self.tick());
        Some(Arc::clone(buffer))
    }

    /// True if a ready entry exists. Does not count as an access.
    #[inline]
    pub fn is_ready(&self, hash: u64) -> bool {
        self.entries
            .load()
            .get(&hash)
            .is_some_and(|entry| entry.is_ready())
    }

    pub fn contains(&self, hash: u64) -> bool {
        self.entries.load().contains_key(&hash)
    }

    /// Current snapshot of the whole map.
    pub fn snapshot(&self) -> Arc<EntryMap> {
        self.entries.load_full()
    }

    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.load().is_empty()
    }

    /// Bytes held by ready entries.
    pub fn current_bytes(&self) -> u64 {
        self.current_bytes.load(Ordering::Acquire)
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes.load(Ordering::Acquire)
    }

    // Writes

    /// Insert or replace an entry, then evict until the budget holds.
    pub fn put(&self, hash: u64, entry: CacheEntry) {
        let _guard = self.write_lock.lock();
        self.put_locked(hash, entry);
        self.evict_to_budget_locked();
    }

    pub fn mark_loading(&self, hash: u64) {
        self.put(hash, CacheEntry::loading());
    }

    pub fn mark_ready(&self, hash: u64, buffer: Arc<Buffer>) {
        self.put(hash, CacheEntry::ready(buffer));
    }

    pub fn mark_error(&self, hash: u64, error: TransformError) {
        self.put(hash, CacheEntry::error(error));
    }

    /// Remove an entry. Returns false if nothing was stored under `hash`.
    pub fn remove(&self, hash: u64) -> bool {
        let _guard = self.write_lock.lock();
        let current = self.entries.load();
        if !current.contains_key(&hash) {
            return false;
        }
        let mut next = EntryMap::clone(&current);
        let removed = next.remove(&hash);
        self.entries.store(Arc::new(next));
        if let Some(entry) = removed {
            self.current_bytes
                .fetch_sub(ready_size(&entry), Ordering::AcqRel);
        }
        true
    }

    /// Evict the least recently used ready entry.
    ///
    /// Loading and error entries are never evicted. Returns false if no
    /// ready entry exists.
    pub fn evict_one(&self) -> bool {
        let _guard = self.write_lock.lock();
        self.evict_one_locked()
    }

    /// Drop every entry and reset the byte total.
    pub fn clear(&self) {
        let _guard = self.write_lock.lock();
        self.entries.store(Arc::new(EntryMap::new()));
        self.current_bytes.store(0, Ordering::Release);
        tracing::debug!("cache cleared");
    }

    /// Change the byte budget, evicting immediately if it shrank.
    pub fn set_max_bytes(&self, bytes: u64) {
        let _guard = self.write_lock.lock();
        self.max_bytes.store(bytes, Ordering::Release);
        self.evict_to_budget_locked();
    }

    pub fn stats(&self) -> CacheStats {
        let snapshot = self.entries.load();
        let mut stats = CacheStats {
            entries: snapshot.len(),
            bytes: self.current_bytes(),
            max_bytes: self.max_bytes(),
            ..Default::default()
        };
        for entry in snapshot.values() {
            match entry.state() {
                EntryState::Loading => stats.loading_entries += 1,
                EntryState::Ready(_) => stats.ready_entries += 1,
                EntryState::Error(_) => stats.error_entries += 1,
            }
        }
        stats
    }

    fn put_locked(&self, hash: u64, entry: CacheEntry) {
        entry.touch(self.tick());
        let added = ready_size(&entry);

        let current = self.entries.load();
        let mut next = EntryMap::clone(&current);
        let removed = next.insert(hash, Arc::new(entry)).map_or(0, |old| ready_size(&old));
        self.entries.store(Arc::new(next));

        if added >= removed {
            self.current_bytes
                .fetch_add(added - removed, Ordering::AcqRel);
        } else {
            self.current_bytes
                .fetch_sub(removed - added, Ordering::AcqRel);
        }
    }

    fn evict_to_budget_locked(&self) {
        while self.current_bytes() > self.max_bytes() {
            if !self.evict_one_locked() {
                tracing::debug!(
                    "cache over budget ({} > {} bytes) with nothing evictable",
                    self.current_bytes(),
                    self.max_bytes()
                );
                break;
            }
        }
    }

    fn evict_one_locked(&self) -> bool {
        let current = self.entries.load();

        let victim = current
            .iter()
            .filter(|(_, entry)| entry.is_ready())
            .min_by_key(|(_, entry)| entry.last_access())
            .map(|(hash, _)| *hash);

        let Some(hash) = victim else {
            return false;
        };

        let mut next = EntryMap::clone(&current);
        let size = next.remove(&hash).map_or(0, |entry| ready_size(&entry));
        self.entries.store(Arc::new(next));
        self.current_bytes.fetch_sub(size, Ordering::AcqRel);

        tracing::trace!("evicted {:016x} ({} bytes)", hash, size);
        true
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new(crate::CacheConfig::default().max_cache_bytes)
    }
}

#[inline]
fn ready_size(entry: &CacheEntry) -> u64 {
    if entry.is_ready() {
        entry.size_bytes()
    } else {
        0
    }
}

/// Cache statistics snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Total entries in any state
    pub entries: usize,
    pub ready_entries: usize,
    pub loading_entries: usize,
    pub error_entries: usize,
    /// Bytes held by ready entries
    pub bytes: u64,
    /// Byte budget
    pub max_bytes: u64,
}

impl CacheStats {
    /// Fill level (0.0 - 1.0+) based on bytes.
    pub fn byte_fill(&self) -> f32 {
        if self.max_bytes == 0 {
            0.0
        } else {
            self.bytes as f32 / self.max_bytes as f32
        }
    }
}
