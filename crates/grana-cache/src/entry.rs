//! Cache entries.

use grana_core::{Buffer, TransformError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// State held by a cache entry.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryState {
    /// A job for this hash is queued or running.
    Loading,
    /// The buffer is available.
    Ready(Arc<Buffer>),
    /// The chain failed; every waiter sees this error until the entry is replaced.
    Error(TransformError),
}

/// Observable load state of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadState {
    /// No cache entry exists for the hash.
    NotStarted,
    Loading,
    Ready,
    Error,
}

/// One cached result.
///
/// Entries are immutable once inserted apart from the access stamp, which
/// readers refresh atomically without swapping the map.
#[derive(Debug)]
pub struct CacheEntry {
    state: EntryState,
    size_bytes: u64,
    last_access: AtomicU64,
}

impl CacheEntry {
    pub fn new(state: EntryState) -> Self {
        let size_bytes = match &state {
            EntryState::Ready(buffer) => buffer.size_bytes(),
            _ => 0,
        };
        Self {
            state,
            size_bytes,
            last_access: AtomicU64::new(0),
        }
    }

    pub fn loading() -> Self {
        Self::new(EntryState::Loading)
    }

    pub fn ready(buffer: Arc<Buffer>) -> Self {
        Self::new(EntryState::Ready(buffer))
    }

    pub fn error(error: TransformError) -> Self {
        Self::new(EntryState::Error(error))
    }

    pub fn state(&self) -> &EntryState {
        &self.state
    }

    pub fn load_state(&self) -> LoadState {
        match self.state {
            EntryState::Loading => LoadState::Loading,
            EntryState::Ready(_) => LoadState::Ready,
            EntryState::Error(_) => LoadState::Error,
        }
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        matches!(self.state, EntryState::Ready(_))
    }

    #[inline]
    pub fn is_loading(&self) -> bool {
        matches!(self.state, EntryState::Loading)
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(self.state, EntryState::Error(_))
    }

    /// The buffer, present iff the entry is ready.
    pub fn buffer(&self) -> Option<&Arc<Buffer>> {
        match &self.state {
            EntryState::Ready(buffer) => Some(buffer),
            _ => None,
        }
    }

    /// The terminal error, present iff the entry failed.
    pub fn error_value(&self) -> Option<&TransformError> {
        match &self.state {
            EntryState::Error(e) => Some(e),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<String> {
        self.error_value().map(|e| e.to_string())
    }

    /// Bytes counted against the budget. Zero unless ready.
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Logical access time used for LRU eviction.
    pub fn last_access(&self) -> u64 {
        self.last_access.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn touch(&self, tick: u64) {
        self.last_access.store(tick, Ordering::Relaxed);
    }
}

impl Clone for CacheEntry {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            size_bytes: self.size_bytes,
            last_access: AtomicU64::new(self.last_access()),
        }
    }
}

/// Entries compare by state and size; access stamps are ignored.
impl PartialEq for CacheEntry {
    fn eq(&self, other: &Self) -> bool {
        self.state == other.state && self.size_bytes == other.size_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grana_core::DecodeError;

    #[test]
    fn test_ready_entry_size() {
        let buffer = Arc::new(Buffer::from_channels(vec![vec![0.0; 100]; 2], 44100));
        let entry = CacheEntry::ready(buffer.clone());
        assert!(entry.is_ready());
        assert_eq!(entry.size_bytes(), 800);
        assert!(Arc::ptr_eq(entry.buffer().unwrap(), &buffer));
        assert_eq!(entry.load_state(), LoadState::Ready);
        assert!(entry.error_value().is_none());
    }

    #[test]
    fn test_loading_and_error_have_no_size() {
        assert_eq!(CacheEntry::loading().size_bytes(), 0);
        let err = CacheEntry::error(DecodeError::FileNotFound("x.wav".into()).into());
        assert_eq!(err.size_bytes(), 0);
        assert!(err.buffer().is_none());
        assert!(err.error_message().unwrap().contains("does not exist"));
    }

    #[test]
    fn test_equality_ignores_access_time() {
        let a = CacheEntry::loading();
        let b = CacheEntry::loading();
        a.touch(42);
        assert_eq!(a, b);
        assert_eq!(a.clone().last_access(), 42);
    }
}
