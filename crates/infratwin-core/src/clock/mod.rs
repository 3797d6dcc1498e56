//! Time source abstraction shared by the orchestrator and the gateway.
//!
//! The simulated backend has no execution thread of its own: job readiness is
//! a deterministic clock comparison, and the orchestrator's poll loop is a
//! cooperative sleep-and-retry. Both sides must therefore read the *same*
//! clock. [`SystemClock`] is the production source; [`SimClock`] is a logical
//! clock whose `sleep_ms` advances time instantly, which makes runs fast and
//! bit-reproducible under test.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Monotonic-enough millisecond time source with a cooperative yield point.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current time in milliseconds.
    fn now_ms(&self) -> u64;

    /// Cooperative wait. On the system clock this blocks the calling thread;
    /// on a simulated clock it merely advances logical time.
    fn sleep_ms(&self, ms: u64);
}

/// Wall-clock time source backed by [`SystemTime`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0)
    }

    fn sleep_ms(&self, ms: u64) {
        std::thread::sleep(Duration::from_millis(ms));
    }
}

/// Deterministic logical clock for simulation and tests.
///
/// `sleep_ms` advances the clock without blocking, so a poll loop that would
/// wait minutes of wall time resolves immediately while still observing the
/// same sequence of timestamps on every run.
#[derive(Debug, Default)]
pub struct SimClock {
    now_ms: AtomicU64,
}

impl SimClock {
    /// Creates a simulated clock starting at `start_ms`.
    #[must_use]
    pub fn new(start_ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(start_ms),
        }
    }

    /// Advances the clock by `ms` milliseconds.
    pub fn advance_ms(&self, ms: u64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for SimClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }

    fn sleep_ms(&self, ms: u64) {
        self.advance_ms(ms);
    }
}
