//! Buffer cache system - cache, loader thread and listeners behind one API.

use crate::cache::{Cache, CacheStats};
use crate::config::CacheConfig;
use crate::entry::{EntryState, LoadState};
use crate::error::{Error, Result};
use crate::handle::RequestHandle;
use crate::listener::{CacheListener, Listeners};
use crate::loader::{Loader, LoaderStats};
use crate::request::Request;
use grana_core::{Buffer, Chain, Decoder};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Complete buffer cache with its background loader.
pub struct BufferCache {
    cache: Arc<Cache>,
    loader: Loader,
    listeners: Listeners,
    config: CacheConfig,
}

impl BufferCache {
    /// Create a new buffer cache builder.
    pub fn builder() -> BufferCacheBuilder {
        BufferCacheBuilder::default()
    }

    /// Buffer cache with default configuration and the WAV decoder.
    #[cfg(feature = "wav")]
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    // Requests

    /// Start a request for `path`.
    pub fn request(&self, path: impl Into<PathBuf>) -> Request<'_> {
        Request::new(self, path)
    }

    /// Submit a prepared chain without blocking.
    pub fn load(&self, chain: Chain) -> RequestHandle {
        let hash = chain.hash();
        let rx = self.loader.request(chain);
        RequestHandle::new(hash, Arc::clone(&self.cache), rx)
    }

    /// Submit a prepared chain and wait up to `timeout`.
    pub fn load_blocking(&self, chain: Chain, timeout: Duration) -> Result<Arc<Buffer>> {
        self.load(chain).get_blocking(timeout)
    }

    // Lookups

    /// Look up a hash without requesting it.
    ///
    /// `Ok(None)` while loading, [`Error::NotFound`] if nothing was ever
    /// requested (or it was evicted or cleared).
    pub fn get(&self, hash: u64) -> Result<Option<Arc<Buffer>>> {
        let entry = self.cache.get(hash).ok_or(Error::NotFound(hash))?;
        match entry.state() {
            EntryState::Ready(buffer) => Ok(Some(Arc::clone(buffer))),
            EntryState::Loading => Ok(None),
            EntryState::Error(e) => Err(e.clone().into()),
        }
    }

    pub fn state(&self, hash: u64) -> LoadState {
        self.cache
            .get(hash)
            .map_or(LoadState::NotStarted, |entry| entry.load_state())
    }

    /// Forget a hash so the next request runs it again.
    pub fn remove(&self, hash: u64) -> bool {
        self.cache.remove(hash)
    }

    // Budget

    /// Change the byte budget. Shrinking evicts immediately.
    pub fn set_max_cache_size(&self, bytes: u64) -> &Self {
        tracing::info!("cache budget set to {} bytes", bytes);
        self.cache.set_max_bytes(bytes);
        self
    }

    pub fn max_cache_size(&self) -> u64 {
        self.cache.max_bytes()
    }

    /// Drop every entry. Running jobs still publish when they finish.
    pub fn clear_cache(&self) -> &Self {
        self.cache.clear();
        self
    }

    /// Bytes held by ready entries.
    pub fn current_cache_size(&self) -> u64 {
        self.cache.current_bytes()
    }

    // Listeners

    pub fn add_listener(&self, listener: Arc<dyn CacheListener>) -> &Self {
        self.listeners.add(listener);
        self
    }

    /// Unregister by identity. Returns false if it was not registered.
    pub fn remove_listener(&self, listener: &Arc<dyn CacheListener>) -> bool {
        self.listeners.remove(listener)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    // Introspection

    /// The underlying cache, for lock-free reads from real-time code.
    pub fn cache(&self) -> &Arc<Cache> {
        &self.cache
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn loader_stats(&self) -> LoaderStats {
        self.loader.stats()
    }

    /// Distinct chains queued or running.
    pub fn pending_jobs(&self) -> usize {
        self.loader.pending()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.loader.is_running()
    }

    /// Stop the loader thread. Pending requests resolve to
    /// [`Error::LoaderStopped`]; cached entries stay readable.
    pub fn shutdown(&self) {
        self.loader.stop();
    }
}

impl Drop for BufferCache {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Builder for [`BufferCache`].
pub struct BufferCacheBuilder {
    config: CacheConfig,
    decoder: Option<Arc<dyn Decoder>>,
    listeners: Vec<Arc<dyn CacheListener>>,
}

impl Default for BufferCacheBuilder {
    fn default() -> Self {
        Self {
            config: CacheConfig::default(),
            decoder: None,
            listeners: Vec::new(),
        }
    }
}

impl BufferCacheBuilder {
    /// Replace the whole configuration.
    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Byte budget for ready entries (default: 512MB).
    pub fn max_cache_bytes(mut self, bytes: u64) -> Self {
        self.config.max_cache_bytes = bytes;
        self
    }

    /// Loader queue length (default: 256).
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.config.thread_name = name.into();
        self
    }

    /// Persist intermediate chain prefixes (default: true).
    pub fn cache_prefixes(mut self, enabled: bool) -> Self {
        self.config.cache_prefixes = enabled;
        self
    }

    /// Decoder used by load transforms (default: WAV via hound).
    pub fn decoder(mut self, decoder: impl Decoder + 'static) -> Self {
        self.decoder = Some(Arc::new(decoder));
        self
    }

    pub fn listener(mut self, listener: Arc<dyn CacheListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Validate the configuration and start the loader thread.
    pub fn build(self) -> Result<BufferCache> {
        self.config.validate()?;

        let decoder = match self.decoder {
            Some(decoder) => decoder,
            None => default_decoder()?,
        };

        let cache = Arc::new(Cache::new(self.config.max_cache_bytes));
        let listeners = Listeners::default();
        for listener in self.listeners {
            listeners.add(listener);
        }

        let loader = Loader::new(
            Arc::clone(&cache),
            decoder,
            listeners.clone(),
            &self.config,
        );
        loader.start()?;

        tracing::info!(
            "buffer cache ready ({} byte budget, queue {})",
            self.config.max_cache_bytes,
            self.config.queue_capacity
        );

        Ok(BufferCache {
            cache,
            loader,
            listeners,
            config: self.config,
        })
    }
}

#[cfg(feature = "wav")]
fn default_decoder() -> Result<Arc<dyn Decoder>> {
    Ok(Arc::new(grana_core::WavDecoder))
}

#[cfg(not(feature = "wav"))]
fn default_decoder() -> Result<Arc<dyn Decoder>> {
    Err(Error::InvalidConfig(
        "no decoder configured and the wav feature is disabled".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CountingDecoder, FRAMES, SAMPLE_RATE};
    use grana_core::Transform;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const WAIT: Duration = Duration::from_secs(5);

    fn build(decoder: CountingDecoder) -> BufferCache {
        BufferCache::builder()
            .max_cache_bytes(1 << 20)
            .decoder(decoder)
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let result = BufferCache::builder()
            .max_cache_bytes(0)
            .decoder(CountingDecoder::new())
            .build();
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_request_range_and_channels_rewrite_root() {
        let system = build(CountingDecoder::new());
        let request = system.request("a.wav").range(0, 100).channels(1);
        assert_eq!(request.chain().len(), 1);

        let buffer = request.execute_blocking(WAIT).unwrap();
        assert_eq!(buffer.num_channels(), 1);
        assert_eq!(buffer.num_frames(), 100);
        assert_eq!(buffer.sample_rate(), SAMPLE_RATE);
    }

    #[test]
    fn test_handle_polling() {
        let system = build(CountingDecoder::new());
        let handle = system
            .request("a.wav")
            .transform(Transform::gain(-6.0))
            .execute();

        let buffer = handle.get_blocking(WAIT).unwrap();
        assert!(handle.exists());
        assert_eq!(handle.state(), LoadState::Ready);
        assert_eq!(buffer.num_frames(), FRAMES);
        assert!(handle.error().is_none());
        assert_eq!(system.state(handle.hash()), LoadState::Ready);
    }

    #[test]
    fn test_get_not_found() {
        let system = build(CountingDecoder::new());
        assert!(matches!(system.get(42), Err(Error::NotFound(42))));
        assert_eq!(system.state(42), LoadState::NotStarted);
    }

    #[test]
    fn test_remove_allows_retry() {
        let decoder = Arc::new(CountingDecoder::new());
        let system = BufferCache::builder()
            .decoder(decoder.clone())
            .build()
            .unwrap();

        let request = system.request("missing.wav");
        let hash = request.hash();
        assert!(request.execute_blocking(WAIT).is_err());
        assert!(system.get(hash).unwrap_err().is_decode());

        assert!(system.remove(hash));
        assert!(system.request("missing.wav").execute_blocking(WAIT).is_err());
        assert_eq!(decoder.calls(), 2);
    }

    #[test]
    fn test_budget_controls() {
        let system = build(CountingDecoder::new());
        system.request("a.wav").execute_blocking(WAIT).unwrap();
        let size = (FRAMES * 2 * 4) as u64;
        assert_eq!(system.current_cache_size(), size);

        system.set_max_cache_size(size / 2);
        assert_eq!(system.current_cache_size(), 0);
        assert_eq!(system.max_cache_size(), size / 2);

        system.set_max_cache_size(1 << 20);
        system.request("b.wav").execute_blocking(WAIT).unwrap();
        system.clear_cache();
        assert_eq!(system.current_cache_size(), 0);
        assert_eq!(system.stats().entries, 0);
    }

    #[derive(Default)]
    struct Recorder {
        loaded: AtomicUsize,
        errors: AtomicUsize,
        progress: parking_lot::Mutex<Vec<f32>>,
    }

    impl CacheListener for Recorder {
        fn on_loaded(&self, _hash: u64, _buffer: &Arc<Buffer>) {
            self.loaded.fetch_add(1, Ordering::SeqCst);
        }

        fn on_error(&self, _hash: u64, _message: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_progress(&self, _hash: u64, fraction: f32) {
            self.progress.lock().push(fraction);
        }
    }

    #[test]
    fn test_listener_events() {
        let recorder = Arc::new(Recorder::default());
        let system = BufferCache::builder()
            .decoder(CountingDecoder::new())
            .listener(recorder.clone())
            .build()
            .unwrap();

        system
            .request("a.wav")
            .transform(Transform::Normalize)
            .execute_blocking(WAIT)
            .unwrap();
        let _ = system.request("missing.wav").execute_blocking(WAIT);

        // Waiters are resolved after listeners run
        assert_eq!(recorder.loaded.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.errors.load(Ordering::SeqCst), 1);
        assert_eq!(*recorder.progress.lock(), vec![0.5, 1.0]);
    }

    struct PanicOnLoad;

    impl CacheListener for PanicOnLoad {
        fn on_loaded(&self, _hash: u64, _buffer: &Arc<Buffer>) {
            panic!("listener bug");
        }
    }

    #[test]
    fn test_panicking_listener_keeps_loader_alive() {
        let recorder = Arc::new(Recorder::default());
        let system = BufferCache::builder()
            .decoder(CountingDecoder::new())
            .listener(Arc::new(PanicOnLoad))
            .listener(recorder.clone())
            .build()
            .unwrap();

        system.request("a.wav").execute_blocking(WAIT).unwrap();
        assert!(system.is_running());
        system.request("b.wav").execute_blocking(WAIT).unwrap();
        assert_eq!(recorder.loaded.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_full_queue_does_not_block_execute() {
        let system = BufferCache::builder()
            .decoder(CountingDecoder::with_delay(Duration::from_millis(200)))
            .queue_capacity(1)
            .build()
            .unwrap();

        let start = std::time::Instant::now();
        let handles: Vec<_> = ["a.wav", "b.wav", "c.wav", "d.wav"]
            .iter()
            .map(|path| system.request(*path).execute())
            .collect();
        assert!(start.elapsed() < Duration::from_millis(100));

        for handle in handles {
            handle.get_blocking(WAIT).unwrap();
        }
    }

    #[test]
    fn test_shutdown_rejects_new_requests() {
        let system = build(CountingDecoder::new());
        assert!(system.is_running());
        system.request("a.wav").execute_blocking(WAIT).unwrap();

        system.shutdown();
        assert!(!system.is_running());
        assert!(matches!(
            system.request("b.wav").execute_blocking(WAIT),
            Err(Error::LoaderStopped)
        ));
        // Cached entries stay readable
        assert!(system.request("a.wav").execute_blocking(WAIT).is_ok());
    }
}
