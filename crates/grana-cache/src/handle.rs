//! Handle to a submitted chain request.

use crate::cache::Cache;
use crate::entry::{EntryState, LoadState};
use crate::error::{Error, Result};
use crate::loader::LoadResult;
use arc_swap::ArcSwapOption;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use grana_core::Buffer;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Upper bound on a single channel wait, so concurrent blocking callers on
/// one handle notice a result another caller received.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Handle returned by [`crate::Request::execute`].
///
/// Every method except [`RequestHandle::get_blocking`] is lock-free and
/// reads the shared cache, so it reflects evictions and clears.
/// `get_blocking` additionally remembers the result delivered by the loader.
pub struct RequestHandle {
    hash: u64,
    cache: Arc<Cache>,
    rx: Receiver<LoadResult>,
    resolved: ArcSwapOption<LoadResult>,
}

impl RequestHandle {
    pub(crate) fn new(hash: u64, cache: Arc<Cache>, rx: Receiver<LoadResult>) -> Self {
        Self {
            hash,
            cache,
            rx,
            resolved: ArcSwapOption::empty(),
        }
    }

    /// Chain hash this handle resolves.
    pub fn hash(&self) -> u64 {
        self.hash
    }

    /// True iff the cache holds a ready buffer for this hash.
    pub fn exists(&self) -> bool {
        self.cache.is_ready(self.hash)
    }

    /// The ready buffer, if cached. Never blocks.
    pub fn get(&self) -> Option<Arc<Buffer>> {
        self.cache.get_buffer(self.hash)
    }

    pub fn state(&self) -> LoadState {
        self.cache
            .get(self.hash)
            .map_or(LoadState::NotStarted, |entry| entry.load_state())
    }

    /// Error message, present iff [`RequestHandle::state`] is `Error`.
    pub fn error(&self) -> Option<String> {
        self.cache.get(self.hash).and_then(|e| e.error_message())
    }

    /// True once the loader has delivered a result or the entry is terminal.
    pub fn is_done(&self) -> bool {
        if self.resolved.load().is_some() || !self.rx.is_empty() {
            return true;
        }
        matches!(self.state(), LoadState::Ready | LoadState::Error)
    }

    /// Wait up to `timeout` for the buffer.
    ///
    /// Returns [`Error::Timeout`] if the load is still running; the load
    /// itself is not cancelled and a later call can still pick it up.
    pub fn get_blocking(&self, timeout: Duration) -> Result<Arc<Buffer>> {
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(buffer) = self.cache.get_buffer(self.hash) {
                return Ok(buffer);
            }
            if let Some(result) = self.resolved.load_full() {
                return LoadResult::clone(&result).map_err(Error::from);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining.min(POLL_INTERVAL)) {
                Ok(result) => {
                    self.resolved.store(Some(Arc::new(result.clone())));
                    return result.map_err(Error::from);
                }
                Err(RecvTimeoutError::Timeout) if remaining.is_zero() => {
                    return Err(Error::Timeout(timeout));
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    if let Some(result) = self.resolved.load_full() {
                        return LoadResult::clone(&result).map_err(Error::from);
                    }
                    // Another path may still have published the hash.
                    return match self.cache.get(self.hash).map(|e| e.state().clone()) {
                        Some(EntryState::Ready(buffer)) => Ok(buffer),
                        Some(EntryState::Error(e)) => Err(e.into()),
                        _ => Err(Error::LoaderStopped),
                    };
                }
            }
        }
    }
}

impl std::fmt::Debug for RequestHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestHandle")
            .field("hash", &format_args!("{:016x}", self.hash))
            .field("state", &self.state())
            .finish()
    }
}
