//! Reachability tracking for the classification collaborator
//!
//! Owns the `Unknown → Loading → { Ready, Unavailable }` state machine,
//! with `Ready ⇄ Unavailable` reachable repeatedly through liveness
//! probes. State lives in a `tokio::sync::watch` channel: readers take
//! non-blocking snapshots, subscribers are notified on actual state
//! changes only (rapid probe flapping that lands on the same state is
//! coalesced), and this monitor is the single writer.

use crate::provider::{probe_with_timeout, ClassificationProvider};
use crate::types::ReachabilityState;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Single-writer reachability state machine
pub struct ReachabilityMonitor {
    tx: watch::Sender<ReachabilityState>,

    /// Monotonic probe counter; a probe result is applied only if no
    /// newer probe started while it was in flight
    probe_epoch: AtomicU64,
}

impl ReachabilityMonitor {
    /// Create a monitor in the `Unknown` state
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ReachabilityState::Unknown);
        Self {
            tx,
            probe_epoch: AtomicU64::new(0),
        }
    }

    /// Current state, read without blocking
    pub fn snapshot(&self) -> ReachabilityState {
        *self.tx.borrow()
    }

    /// Subscribe to state-change notifications
    ///
    /// The receiver observes each actual state change; writes that leave
    /// the state unchanged produce no notification.
    pub fn subscribe(&self) -> watch::Receiver<ReachabilityState> {
        self.tx.subscribe()
    }

    /// Collaborator initialization started
    ///
    /// Only meaningful from `Unknown`; later calls are ignored so a
    /// re-delivered init signal cannot regress an operating state.
    pub fn begin_loading(&self) {
        if self.snapshot() == ReachabilityState::Unknown {
            self.set_state(ReachabilityState::Loading);
        } else {
            tracing::debug!(state = ?self.snapshot(), "Ignoring loading signal");
        }
    }

    /// Collaborator reported itself operational
    pub fn mark_ready(&self) {
        self.set_state(ReachabilityState::Ready);
    }

    /// Collaborator unreachable or failing
    pub fn mark_unavailable(&self) {
        self.set_state(ReachabilityState::Unavailable);
    }

    fn set_state(&self, next: ReachabilityState) {
        let changed = self.tx.send_if_modified(|state| {
            if *state != next {
                *state = next;
                true
            } else {
                false
            }
        });
        if changed {
            tracing::info!(state = ?next, "Reachability changed");
        }
    }

    /// Run one liveness probe against the provider
    ///
    /// Probe success moves to `Ready`, failure or timeout to
    /// `Unavailable`. A result whose epoch was superseded by a newer
    /// probe is discarded — the newer probe owns the state.
    pub async fn probe(
        &self,
        provider: &dyn ClassificationProvider,
        timeout: Duration,
    ) -> ReachabilityState {
        let epoch = self.probe_epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let healthy = probe_with_timeout(provider, timeout).await;

        if self.probe_epoch.load(Ordering::SeqCst) != epoch {
            tracing::debug!(epoch, "Discarding stale probe result");
            return self.snapshot();
        }

        if healthy {
            self.mark_ready();
        } else {
            self.mark_unavailable();
        }
        self.snapshot()
    }

    /// Spawn a periodic probe loop
    ///
    /// Probes immediately, then every `interval`. Abort the returned
    /// handle to stop probing.
    pub fn spawn_probe_loop(
        self: &Arc<Self>,
        provider: Arc<dyn ClassificationProvider>,
        interval: Duration,
        timeout: Duration,
    ) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                monitor.probe(provider.as_ref(), timeout).await;
                tokio::time::sleep(interval).await;
            }
        })
    }
}

impl Default for ReachabilityMonitor {
    fn default() -> Self {
        Self::new()
    }
}
