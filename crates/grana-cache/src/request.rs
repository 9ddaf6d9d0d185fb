//! Fluent request builder.

use crate::error::Result;
use crate::handle::RequestHandle;
use crate::system::BufferCache;
use grana_core::{Buffer, Chain, SampleRange, Transform};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Builder for a chain request.
///
/// Created via [`BufferCache::request`]. Starts with a single load of the
/// given file.
///
/// # Example
/// ```ignore
/// let handle = cache
///     .request("kick.wav")
///     .range(0, 44100)
///     .channels(1)
///     .transform(Transform::gain(-3.0))
///     .execute();
///
/// // Audio thread, once per block
/// if let Some(buffer) = handle.get() { /* play */ }
/// ```
pub struct Request<'a> {
    system: &'a BufferCache,
    chain: Chain,
}

impl<'a> Request<'a> {
    pub(crate) fn new(system: &'a BufferCache, path: impl Into<PathBuf>) -> Self {
        Self {
            system,
            chain: Chain::new(vec![Transform::load(path)]),
        }
    }

    /// Decode only frames `start..end`. Rewrites the root load.
    pub fn range(mut self, start: usize, end: usize) -> Self {
        if let Some(Transform::Load { range, .. }) = self.chain.transforms_mut().first_mut() {
            *range = Some(SampleRange::new(start, end));
        }
        self
    }

    /// Decode at most `count` channels. Rewrites the root load.
    pub fn channels(mut self, count: usize) -> Self {
        if let Some(Transform::Load { channels, .. }) = self.chain.transforms_mut().first_mut() {
            *channels = Some(count);
        }
        self
    }

    /// Append a transform.
    pub fn transform(mut self, transform: Transform) -> Self {
        self.chain.push(transform);
        self
    }

    /// Never persist intermediate results from `from_index` onwards.
    pub fn nocache(mut self, from_index: usize) -> Self {
        self.chain.set_no_cache_index(from_index);
        self
    }

    /// The chain built so far.
    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn hash(&self) -> u64 {
        self.chain.hash()
    }

    /// Submit without blocking.
    pub fn execute(self) -> RequestHandle {
        self.system.load(self.chain)
    }

    /// Submit and wait up to `timeout` for the buffer.
    pub fn execute_blocking(self, timeout: Duration) -> Result<Arc<Buffer>> {
        self.execute().get_blocking(timeout)
    }
}

impl std::fmt::Debug for Request<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request").field("chain", &self.chain).finish()
    }
}
