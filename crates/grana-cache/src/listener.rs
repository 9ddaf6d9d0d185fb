//! Load notifications for UI feedback.

use grana_core::Buffer;
use parking_lot::RwLock;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Receives loader events. Called from the loader thread.
///
/// All methods default to no-ops. Progress is coarse: one call per applied
/// transform before the last, then a single 1.0 on success. A panicking
/// listener is logged and skipped.
pub trait CacheListener: Send + Sync {
    fn on_loaded(&self, _hash: u64, _buffer: &Arc<Buffer>) {}

    fn on_error(&self, _hash: u64, _message: &str) {}

    fn on_progress(&self, _hash: u64, _fraction: f32) {}
}

/// Registered listeners, shared between the facade and the loader.
#[derive(Default, Clone)]
pub(crate) struct Listeners {
    inner: Arc<RwLock<Vec<Arc<dyn CacheListener>>>>,
}

impl Listeners {
    pub fn add(&self, listener: Arc<dyn CacheListener>) {
        self.inner.write().push(listener);
    }

    /// Remove by identity. Returns true if the listener was registered.
    pub fn remove(&self, listener: &Arc<dyn CacheListener>) -> bool {
        let mut inner = self.inner.write();
        let before = inner.len();
        inner.retain(|l| !Arc::ptr_eq(l, listener));
        inner.len() != before
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn loaded(&self, hash: u64, buffer: &Arc<Buffer>) {
        self.dispatch("on_loaded", |l| l.on_loaded(hash, buffer));
    }

    pub fn error(&self, hash: u64, message: &str) {
        self.dispatch("on_error", |l| l.on_error(hash, message));
    }

    pub fn progress(&self, hash: u64, fraction: f32) {
        self.dispatch("on_progress", |l| l.on_progress(hash, fraction));
    }

    fn dispatch(&self, event: &str, call: impl Fn(&dyn CacheListener)) {
        for listener in self.inner.read().iter() {
            if panic::catch_unwind(AssertUnwindSafe(|| call(listener.as_ref()))).is_err() {
                tracing::warn!("cache listener panicked in {}", event);
            }
        }
    }
}
