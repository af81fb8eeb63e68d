// PulseClock - elapsed time to fractional pulse position
// Single source of truth for "where are we in the pattern"; both the
// look-ahead dispatcher and the visual reporter derive from it.

/// Result of a phase recomputation after a mid-flight parameter change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseSnapshot {
    /// Next pulse index to dispatch. Never below the count already emitted.
    pub pulse_cursor: u64,
    /// Pulses left before one-shot completion; `None` in loop mode.
    pub remaining_pulses: Option<u64>,
}

/// Recompute the pulse cursor after tempo/pattern/loop changes mid-flight.
///
/// `elapsed` and `interval` describe the position the clock has naturally
/// reached; `emitted` is the number of pulses already handed to the audio
/// engine. The cursor never rewinds below `emitted` (so nothing re-triggers)
/// and never jumps past the naturally elapsed amount.
///
/// Returns `None` for non-finite or non-positive inputs; the caller keeps
/// its prior phase in that case.
pub fn recompute_phase(
    elapsed: f64,
    interval: f64,
    total_pulses: u32,
    looped: bool,
    emitted: u64,
) -> Option<PhaseSnapshot> {
    if !elapsed.is_finite() || !interval.is_finite() || interval <= 0.0 || total_pulses == 0 {
        return None;
    }

    let pulses_float = (elapsed / interval).max(0.0);
    let pulse_cursor = emitted.max(pulses_float.floor() as u64);

    let remaining_pulses = if looped {
        None
    } else {
        let total = total_pulses as u64;
        let into_bar = pulse_cursor % total;
        // A cursor sitting exactly on a bar boundary gets a full bar.
        let remaining = total - into_bar;
        Some(if remaining == 0 { total } else { remaining })
    };

    Some(PhaseSnapshot {
        pulse_cursor,
        remaining_pulses,
    })
}

/// Maps clock time to fractional pulse position.
///
/// Holds the start reference and the current pulse interval. Reconfiguring
/// the interval preserves the fractional pulse position by moving the start
/// reference, so `current_pulse_float` is continuous across tempo changes.
#[derive(Debug, Clone, Copy)]
pub struct PulseClock {
    start_ref: f64,
    interval: f64,
    running: bool,
}

impl PulseClock {
    pub fn new() -> Self {
        Self {
            start_ref: 0.0,
            interval: 1.0,
            running: false,
        }
    }

    /// Begin tracking at `now` with `interval` seconds per pulse.
    pub fn start(&mut self, now: f64, interval: f64) {
        if !interval.is_finite() || interval <= 0.0 {
            return;
        }
        self.start_ref = now;
        self.interval = interval;
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    pub fn start_ref(&self) -> f64 {
        self.start_ref
    }

    /// Seconds since the start reference.
    pub fn elapsed(&self, now: f64) -> f64 {
        (now - self.start_ref).max(0.0)
    }

    /// Fractional pulse position at `now`.
    pub fn current_pulse_float(&self, now: f64) -> f64 {
        self.elapsed(now) / self.interval
    }

    /// Absolute trigger time of pulse index `k`.
    pub fn time_of_pulse(&self, k: u64) -> f64 {
        self.start_ref + k as f64 * self.interval
    }

    /// Switch to a new interval, keeping the fractional pulse position
    /// continuous. Invalid intervals are ignored and prior phase retained.
    pub fn refresh_interval(&mut self, now: f64, new_interval: f64) {
        if !new_interval.is_finite() || new_interval <= 0.0 {
            return;
        }
        let position = self.current_pulse_float(now);
        self.start_ref = now - position * new_interval;
        self.interval = new_interval;
    }

    /// Fold whole loop periods out of the start reference so pulse indices
    /// stay small in loop mode. Returns the number of pulses folded away.
    pub fn fold_periods(&mut self, now: f64, total_pulses: u32) -> u64 {
        if total_pulses == 0 {
            return 0;
        }
        let period = total_pulses as f64 * self.interval;
        let elapsed = self.elapsed(now);
        let whole = (elapsed / period).floor();
        if whole < 1.0 {
            return 0;
        }
        self.start_ref += whole * period;
        whole as u64 * total_pulses as u64
    }
}

impl Default for PulseClock {
    fn default() -> Self {
        Self::new()
    }
}
