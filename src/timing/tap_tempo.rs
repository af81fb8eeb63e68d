// Tap tempo - BPM estimation from a short run of tap timestamps

/// Taps needed before a tempo is reported.
pub const REQUIRED_TAPS: usize = 3;

/// A gap longer than this discards the current run and restarts it.
pub const RESET_GAP_SECONDS: f64 = 2.0;

/// A gap shorter than this is treated as switch bounce and ignored.
pub const BOUNCE_GAP_SECONDS: f64 = 0.03;

/// Outcome of a single tap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TapTempoResult {
    /// Enough taps collected; estimated tempo in BPM (rounded).
    Ready { bpm: f64 },
    /// Still collecting; `remaining` more taps needed.
    NeedMore { remaining: usize },
}

/// Small state machine estimating BPM from tap timestamps.
///
/// Idle (0 taps) -> Collecting (1..N-1) -> Ready (N). A long gap restarts
/// the run with the new tap; a near-zero gap is rejected outright. Samples
/// clear on success, so the detector is immediately reusable.
#[derive(Debug, Clone, Default)]
pub struct TapTempoDetector {
    samples: Vec<f64>,
}

impl TapTempoDetector {
    pub fn new() -> Self {
        Self {
            samples: Vec::with_capacity(REQUIRED_TAPS),
        }
    }

    /// Register a tap at `timestamp` seconds (same clock as the engine).
    pub fn tap(&mut self, timestamp: f64) -> TapTempoResult {
        if !timestamp.is_finite() {
            return TapTempoResult::NeedMore {
                remaining: REQUIRED_TAPS - self.samples.len(),
            };
        }

        if let Some(&last) = self.samples.last() {
            let gap = timestamp - last;
            if gap < BOUNCE_GAP_SECONDS {
                // Bounce: state does not advance
                return TapTempoResult::NeedMore {
                    remaining: REQUIRED_TAPS - self.samples.len(),
                };
            }
            if gap > RESET_GAP_SECONDS {
                self.samples.clear();
            }
        }

        self.samples.push(timestamp);

        if self.samples.len() < REQUIRED_TAPS {
            return TapTempoResult::NeedMore {
                remaining: REQUIRED_TAPS - self.samples.len(),
            };
        }

        let intervals: Vec<f64> = self.samples.windows(2).map(|w| w[1] - w[0]).collect();
        let mean = intervals.iter().sum::<f64>() / intervals.len() as f64;
        self.samples.clear();

        TapTempoResult::Ready {
            bpm: (60.0 / mean).round(),
        }
    }

    /// Discard all samples (host-triggered, e.g. on app reset).
    pub fn reset(&mut self) {
        self.samples.clear();
    }

    pub fn tap_count(&self) -> usize {
        self.samples.len()
    }
}
