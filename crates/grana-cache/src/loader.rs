//! Background loader thread.
//!
//! A single worker drains a bounded job queue; jobs that do not fit wait in
//! an overflow list so callers never block on enqueue. Identical concurrent requests
//! share one job through the in-flight table; each job resumes from the
//! longest prefix of its chain already in the cache and publishes every
//! cacheable intermediate result on the way.

use crate::cache::Cache;
use crate::config::CacheConfig;
use crate::entry::EntryState;
use crate::error::Result;
use crate::listener::Listeners;
use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use grana_core::{Buffer, Chain, Decoder, TransformError};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Terminal result delivered to every waiter of a hash.
pub(crate) type LoadResult = std::result::Result<Arc<Buffer>, TransformError>;

type Waiter = Sender<LoadResult>;

pub(crate) struct Job {
    hash: u64,
    chain: Chain,
}

/// Command sent to the loader thread
pub(crate) enum LoaderCommand {
    /// Run a chain and resolve its waiters
    Load(Job),
    /// Check the overflow list
    Wake,
    /// Stop the loader thread
    Shutdown,
}

impl std::fmt::Debug for LoaderCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoaderCommand::Load(job) => f
                .debug_struct("Load")
                .field("hash", &format_args!("{:016x}", job.hash))
                .field("chain", &job.chain.describe())
                .finish(),
            LoaderCommand::Wake => write!(f, "Wake"),
            LoaderCommand::Shutdown => write!(f, "Shutdown"),
        }
    }
}

/// Loader counters.
#[derive(Default)]
struct LoaderMetrics {
    requests: AtomicU64,
    cache_hits: AtomicU64,
    dedup_hits: AtomicU64,
    prefix_hits: AtomicU64,
    jobs_run: AtomicU64,
    failures: AtomicU64,
}

impl LoaderMetrics {
    #[inline]
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> LoaderStats {
        LoaderStats {
            requests: self.requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            dedup_hits: self.dedup_hits.load(Ordering::Relaxed),
            prefix_hits: self.prefix_hits.load(Ordering::Relaxed),
            jobs_run: self.jobs_run.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// Loader statistics snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoaderStats {
    /// Requests received
    pub requests: u64,
    /// Requests answered straight from a ready or error entry
    pub cache_hits: u64,
    /// Requests attached to an already running job
    pub dedup_hits: u64,
    /// Jobs that resumed from a cached prefix
    pub prefix_hits: u64,
    /// Jobs executed by the worker
    pub jobs_run: u64,
    /// Jobs that ended in an error
    pub failures: u64,
}

/// State shared between callers and the worker.
struct LoaderShared {
    cache: Arc<Cache>,
    decoder: Arc<dyn Decoder>,
    in_flight: Mutex<HashMap<u64, Vec<Waiter>>>,
    overflow: Mutex<VecDeque<Job>>,
    listeners: Listeners,
    metrics: LoaderMetrics,
    cache_prefixes: bool,
}

/// Single background worker executing chain jobs.
pub(crate) struct Loader {
    command_tx: Sender<LoaderCommand>,
    command_rx: Mutex<Option<Receiver<LoaderCommand>>>,
    shared: Arc<LoaderShared>,
    thread_handle: Mutex<Option<JoinHandle<()>>>,
    shutdown: Arc<AtomicBool>,
    thread_name: String,
}

impl Loader {
    pub fn new(
        cache: Arc<Cache>,
        decoder: Arc<dyn Decoder>,
        listeners: Listeners,
        config: &CacheConfig,
    ) -> Self {
        let (tx, rx) = bounded(config.queue_capacity);
        Self {
            command_tx: tx,
            command_rx: Mutex::new(Some(rx)),
            shared: Arc::new(LoaderShared {
                cache,
                decoder,
                in_flight: Mutex::new(HashMap::new()),
                overflow: Mutex::new(VecDeque::new()),
                listeners,
                metrics: LoaderMetrics::default(),
                cache_prefixes: config.cache_prefixes,
            }),
            thread_handle: Mutex::new(None),
            shutdown: Arc::new(AtomicBool::new(false)),
            thread_name: config.thread_name.clone(),
        }
    }

    pub fn start(&self) -> Result<()> {
        let mut thread_handle = self.thread_handle.lock();
        if thread_handle.is_some() {
            return Ok(());
        }
        let Some(rx) = self.command_rx.lock().take() else {
            return Ok(());
        };

        let shared = Arc::clone(&self.shared);
        let shutdown = Arc::clone(&self.shutdown);

        let handle = thread::Builder::new()
            .name(self.thread_name.clone())
            .spawn(move || loader_loop(rx, shared, shutdown))?;

        tracing::debug!("loader thread '{}' started", self.thread_name);
        *thread_handle = Some(handle);
        Ok(())
    }

    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let _ = self.command_tx.try_send(LoaderCommand::Shutdown);

        if let Some(handle) = self.thread_handle.lock().take() {
            let _ = handle.join();
            tracing::debug!("loader thread '{}' stopped", self.thread_name);
        }
        // Never started: nobody will resolve what is pending.
        if self.command_rx.lock().take().is_some() {
            self.shared.abandon_pending();
        }
    }

    pub fn is_running(&self) -> bool {
        let alive = self
            .thread_handle
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished());
        alive && !self.shutdown.load(Ordering::SeqCst)
    }

    /// Request a chain. The returned receiver yields exactly one result,
    /// or disconnects if the loader stops first.
    pub fn request(&self, chain: Chain) -> Receiver<LoadResult> {
        let (tx, rx) = bounded(1);
        let hash = chain.hash();
        let shared = &self.shared;
        LoaderMetrics::bump(&shared.metrics.requests);

        if self.shutdown.load(Ordering::SeqCst) {
            return rx;
        }

        {
            let mut in_flight = shared.in_flight.lock();

            if let Some(entry) = shared.cache.get(hash) {
                let resolved = match entry.state() {
                    EntryState::Ready(buffer) => Some(Ok(Arc::clone(buffer))),
                    EntryState::Error(e) => Some(Err(e.clone())),
                    EntryState::Loading => None,
                };
                if let Some(result) = resolved {
                    LoaderMetrics::bump(&shared.metrics.cache_hits);
                    let _ = tx.send(result);
                    return rx;
                }
            }

            if let Some(waiters) = in_flight.get_mut(&hash) {
                LoaderMetrics::bump(&shared.metrics.dedup_hits);
                tracing::trace!("attached to in-flight job {:016x}", hash);
                waiters.push(tx);
                return rx;
            }

            in_flight.insert(hash, vec![tx]);
            shared.cache.mark_loading(hash);
        }

        tracing::debug!("queued {:016x}: {}", hash, chain);

        match self.command_tx.try_send(LoaderCommand::Load(Job { hash, chain })) {
            Ok(()) => {}
            Err(TrySendError::Full(LoaderCommand::Load(job))) => {
                tracing::debug!("loader queue full, {:016x} goes to overflow", hash);
                shared.overflow.lock().push_back(job);
                // If the queue drained meanwhile the worker may be idle.
                let _ = self.command_tx.try_send(LoaderCommand::Wake);
            }
            Err(_) => {
                tracing::warn!("loader stopped, dropping request {:016x}", hash);
                shared.in_flight.lock().remove(&hash);
                shared.cache.remove(hash);
            }
        }

        rx
    }

    pub fn stats(&self) -> LoaderStats {
        self.shared.metrics.snapshot()
    }

    /// Jobs waiting in the overflow list.
    pub fn overflowed(&self) -> usize {
        self.shared.overflow.lock().len()
    }

    /// Number of distinct hashes currently queued or running.
    pub fn pending(&self) -> usize {
        self.shared.in_flight.lock().len()
    }
}

impl Drop for Loader {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Loader thread main loop.
fn loader_loop(rx: Receiver<LoaderCommand>, shared: Arc<LoaderShared>, shutdown: Arc<AtomicBool>) {
    loop {
        let command = match rx.try_recv() {
            Ok(command) => command,
            Err(TryRecvError::Disconnected) => break,
            Err(TryRecvError::Empty) => {
                let overflowed = shared.overflow.lock().pop_front();
                match overflowed {
                    Some(job) => LoaderCommand::Load(job),
                    None => match rx.recv() {
                        Ok(command) => command,
                        Err(_) => break,
                    },
                }
            }
        };

        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match command {
            LoaderCommand::Load(job) => shared.run_job(job),
            LoaderCommand::Wake => {}
            LoaderCommand::Shutdown => break,
        }
    }
    drop(rx);
    shared.abandon_pending();
}

impl LoaderShared {
    fn run_job(&self, job: Job) {
        let Job { hash, chain } = job;
        LoaderMetrics::bump(&self.metrics.jobs_run);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.execute(hash, &chain)))
            .unwrap_or_else(|payload| {
                let message = panic_message(payload.as_ref());
                tracing::error!("loader job {:016x} panicked: {}", hash, message);
                Err(TransformError::Panicked(message))
            });

        self.publish(hash, &chain, outcome);
    }

    fn execute(&self, hash: u64, chain: &Chain) -> LoadResult {
        let len = chain.len();
        let (start, cached) = self.longest_cached_prefix(chain);

        let mut buffer = match cached {
            Some(buffer) if start == len => return Ok(buffer),
            Some(buffer) => {
                LoaderMetrics::bump(&self.metrics.prefix_hits);
                tracing::debug!("{:016x}: resuming after {} cached transforms", hash, start);
                Buffer::clone(&buffer)
            }
            None => {
                if !chain.get(0).is_some_and(|t| t.is_load()) {
                    return Err(TransformError::MissingRoot);
                }
                Buffer::empty()
            }
        };

        for (index, transform) in chain.transforms().iter().enumerate().skip(start) {
            if let Err(e) = transform.apply(&mut buffer, self.decoder.as_ref()) {
                tracing::debug!("{:016x}: {} failed: {}", hash, transform, e);
                return Err(e);
            }

            let done = index + 1;
            if done == len {
                break;
            }
            if self.cache_prefixes && chain.is_cacheable(index) {
                self.cache
                    .mark_ready(chain.partial_hash(done), Arc::new(buffer.clone()));
            }
            self.listeners.progress(hash, done as f32 / len as f32);
        }

        Ok(Arc::new(buffer))
    }

    /// Longest prefix length `k` whose result is ready, with that buffer.
    fn longest_cached_prefix(&self, chain: &Chain) -> (usize, Option<Arc<Buffer>>) {
        (1..=chain.len())
            .rev()
            .find_map(|k| {
                self.cache
                    .get_buffer(chain.partial_hash(k))
                    .map(|buffer| (k, Some(buffer)))
            })
            .unwrap_or((0, None))
    }

    fn publish(&self, hash: u64, chain: &Chain, outcome: LoadResult) {
        let waiters = {
            let mut in_flight = self.in_flight.lock();
            match &outcome {
                Ok(buffer) => self.cache.mark_ready(hash, Arc::clone(buffer)),
                Err(e) => self.cache.mark_error(hash, e.clone()),
            }
            in_flight.remove(&hash).unwrap_or_default()
        };

        match &outcome {
            Ok(buffer) => {
                tracing::debug!(
                    "loaded {:016x} ({} ch x {} frames): {}",
                    hash,
                    buffer.num_channels(),
                    buffer.num_frames(),
                    chain
                );
                self.listeners.progress(hash, 1.0);
                self.listeners.loaded(hash, buffer);
            }
            Err(e) => {
                LoaderMetrics::bump(&self.metrics.failures);
                tracing::warn!("failed to load {}: {}", chain, e);
                self.listeners.error(hash, &e.to_string());
            }
        }

        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
    }

    /// Drop every pending waiter so blocked callers wake up.
    fn abandon_pending(&self) {
        self.overflow.lock().clear();
        let pending: Vec<u64> = {
            let mut in_flight = self.in_flight.lock();
            in_flight.drain().map(|(hash, _)| hash).collect()
        };
        for hash in pending {
            if self.cache.get(hash).is_some_and(|e| e.is_loading()) {
                self.cache.remove(hash);
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
