//! Health state and in-flight tracking for graceful shutdown.
//!
//! Health transitions are lock-free through `ArcSwap`; broker requests are
//! counted with RAII guards so the drain phase knows when the last backend
//! call has returned.

use std::pin::pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::Notify;

/// Lifecycle of the listener: `Starting -> Ready -> Draining -> Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Starting,
    Ready,
    /// The listener stopped accepting; in-flight broker requests are finishing.
    Draining,
    Stopped,
}

impl HealthState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        }
    }
}

/// Broker requests currently inside the dispatch pipeline.
#[derive(Debug, Default)]
struct InFlight {
    count: AtomicU64,
    /// Fired by the guard that brings `count` back to zero.
    idle: Notify,
}

/// Shared by the health handlers, the broker handlers, and the serve loop.
#[derive(Debug)]
pub struct ShutdownController {
    requests: Arc<InFlight>,
    state: ArcSwap<HealthState>,
}

impl ShutdownController {
    #[must_use]
    pub fn new() -> Self {
        Self {
            requests: Arc::new(InFlight::default()),
            state: ArcSwap::from_pointee(HealthState::Starting),
        }
    }

    pub fn set_ready(&self) {
        self.state.store(Arc::new(HealthState::Ready));
    }

    /// Moves to `Draining`; readiness probes fail from here on.
    pub fn trigger_shutdown(&self) {
        self.state.store(Arc::new(HealthState::Draining));
    }

    #[must_use]
    pub fn health_state(&self) -> HealthState {
        **self.state.load()
    }

    /// Counts one broker request until the guard is dropped, unwinding included.
    #[must_use]
    pub fn in_flight_guard(&self) -> InFlightGuard {
        self.requests.count.fetch_add(1, Ordering::AcqRel);
        InFlightGuard {
            requests: Arc::clone(&self.requests),
        }
    }

    #[must_use]
    pub fn in_flight_count(&self) -> u64 {
        self.requests.count.load(Ordering::Acquire)
    }

    /// Waits until no broker request is in flight, or `timeout` passes.
    ///
    /// On success the state becomes `Stopped` and `true` is returned; on
    /// timeout the state stays `Draining`.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let idle = async {
            loop {
                // Register interest before re-checking so a guard dropped in
                // between cannot be missed.
                let mut notified = pin!(self.requests.idle.notified());
                notified.as_mut().enable();
                if self.in_flight_count() == 0 {
                    return;
                }
                notified.await;
            }
        };

        if tokio::time::timeout(timeout, idle).await.is_err() {
            return false;
        }
        self.state.store(Arc::new(HealthState::Stopped));
        true
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the in-flight counter on drop and wakes drain waiters at zero.
#[derive(Debug)]
pub struct InFlightGuard {
    requests: Arc<InFlight>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.requests.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.requests.idle.notify_waiters();
        }
    }
}
