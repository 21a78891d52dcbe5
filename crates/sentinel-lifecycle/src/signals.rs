use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, Notify};

/// The three shared signals plus generation counter every long-running task
/// gates on (spec §4.9/§5). Cheap to clone — every field is internally
/// `Arc`-backed or a cloneable `watch` handle.
#[derive(Clone)]
pub struct LifecycleSignals {
    authorized_tx: Arc<watch::Sender<bool>>,
    handshake_open: Arc<AtomicBool>,
    handshake_notify: Arc<Notify>,
    cache_ready_generation: Arc<AtomicU64>,
    cache_ready_notify: Arc<Notify>,
    generation: Arc<AtomicU64>,
}

impl Default for LifecycleSignals {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleSignals {
    pub fn new() -> Self {
        let (authorized_tx, _rx) = watch::channel(false);
        Self {
            authorized_tx: Arc::new(authorized_tx),
            handshake_open: Arc::new(AtomicBool::new(false)),
            handshake_notify: Arc::new(Notify::new()),
            cache_ready_generation: Arc::new(AtomicU64::new(0)),
            cache_ready_notify: Arc::new(Notify::new()),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// True if `expected` is still the current generation — per-generation
    /// handlers call this at loop-top and break out on mismatch (spec §4.9).
    pub fn is_current_generation(&self, expected: u64) -> bool {
        self.generation() == expected
    }

    pub fn is_authorized(&self) -> bool {
        *self.authorized_tx.borrow()
    }

    pub fn mark_authorized(&self) {
        let _ = self.authorized_tx.send(true);
    }

    pub fn clear_authorized(&self) {
        let _ = self.authorized_tx.send(false);
    }

    /// Block until `authorized` becomes true. Returns immediately if it
    /// already is.
    pub async fn wait_for_authorized(&self) {
        let mut rx = self.authorized_tx.subscribe();
        if *rx.borrow() {
            return;
        }
        while !*rx.borrow() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Open the handshake gate (set while connected to the platform).
    pub fn open_handshake_gate(&self) {
        self.handshake_open.store(true, Ordering::SeqCst);
        self.handshake_notify.notify_waiters();
    }

    /// Close the gate during re-login; any code path that touches the
    /// platform client must wait on [`Self::wait_for_handshake_gate`] first.
    pub fn close_handshake_gate(&self) {
        self.handshake_open.store(false, Ordering::SeqCst);
    }

    pub async fn wait_for_handshake_gate(&self) {
        loop {
            if self.handshake_open.load(Ordering::SeqCst) {
                return;
            }
            self.handshake_notify.notified().await;
        }
    }

    /// Mark cache warm-up complete for `generation`. A no-op if a newer
    /// generation has already superseded it.
    pub fn mark_cache_ready(&self, generation: u64) {
        let current = self.cache_ready_generation.load(Ordering::SeqCst);
        if generation >= current {
            self.cache_ready_generation.store(generation, Ordering::SeqCst);
            self.cache_ready_notify.notify_waiters();
        }
    }

    pub async fn wait_for_cache_ready(&self, generation: u64) {
        loop {
            if self.cache_ready_generation.load(Ordering::SeqCst) >= generation {
                return;
            }
            self.cache_ready_notify.notified().await;
        }
    }

    /// Monotonically increments the generation counter on a successful
    /// (re)auth and returns the new value. Stale per-generation handlers
    /// observe the mismatch on their next loop-top check and exit.
    pub fn advance_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_for_authorized_returns_once_marked() {
        let signals = LifecycleSignals::new();
        assert!(!signals.is_authorized());
        signals.mark_authorized();
        signals.wait_for_authorized().await;
        assert!(signals.is_authorized());
    }

    #[test]
    fn advance_generation_is_monotonic() {
        let signals = LifecycleSignals::new();
        assert_eq!(signals.generation(), 0);
        assert_eq!(signals.advance_generation(), 1);
        assert_eq!(signals.advance_generation(), 2);
        assert!(signals.is_current_generation(2));
        assert!(!signals.is_current_generation(1));
    }

    #[tokio::test]
    async fn cache_ready_ignores_stale_generation() {
        let signals = LifecycleSignals::new();
        signals.mark_cache_ready(5);
        signals.mark_cache_ready(3);
        signals.wait_for_cache_ready(5).await;
    }
}
