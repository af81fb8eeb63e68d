// Clock - monotonic time source abstraction
// The scheduler and the visual reporter read the same clock, so the step a
// polling UI computes can never disagree with what was actually triggered.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Monotonic time source in seconds.
///
/// Injected into the engine so tests can drive scheduling deterministically
/// with a [`ManualClock`] while production uses [`SystemClock`].
pub trait Clock: Send + Sync {
    /// Current time in seconds. Must be monotonically non-decreasing.
    fn now(&self) -> f64;
}

/// Wall clock backed by `Instant`, anchored at construction.
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Hand-cranked clock for tests. Time only moves when told to.
pub struct ManualClock {
    // f64 seconds stored as bits so advancing never blocks readers
    now_bits: AtomicU64,
    advance_guard: Mutex<()>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now_bits: AtomicU64::new(0f64.to_bits()),
            advance_guard: Mutex::new(()),
        }
    }

    /// Move time forward by `delta` seconds. Negative deltas are ignored.
    pub fn advance(&self, delta: f64) {
        if !delta.is_finite() || delta < 0.0 {
            return;
        }
        let _guard = self.advance_guard.lock().unwrap_or_else(|e| e.into_inner());
        let current = f64::from_bits(self.now_bits.load(Ordering::Acquire));
        self.now_bits
            .store((current + delta).to_bits(), Ordering::Release);
    }

    /// Jump to an absolute time, clamped to never go backwards.
    pub fn set(&self, now: f64) {
        if !now.is_finite() {
            return;
        }
        let _guard = self.advance_guard.lock().unwrap_or_else(|e| e.into_inner());
        let current = f64::from_bits(self.now_bits.load(Ordering::Acquire));
        self.now_bits
            .store(now.max(current).to_bits(), Ordering::Release);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.now_bits.load(Ordering::Acquire))
    }
}
