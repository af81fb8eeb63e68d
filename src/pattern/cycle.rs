// Cycle overlay - fractional numerator/denominator subdivision layered on
// top of the base pulse grid, with its own sounds per subdivision

use crate::pattern::state::valid_seconds;

/// One subdivision event of the overlay, positioned by its offset in seconds
/// from the start of the loop period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleEvent {
    pub cycle_index: u32,
    pub subdivision_index: u32,
    /// Flat index across the whole batch.
    pub absolute_index: u32,
    /// Seconds from the start of the bar.
    pub offset: f64,
}

/// Fractional overlay: `numerator` pulses per cycle, `denominator`
/// subdivisions per cycle. Builds one ordered batch of events covering a
/// full bar; the scheduler walks the batch, wrapping per loop period.
///
/// When `floor(total / numerator)` is zero the overlay goes inert: it emits
/// nothing but keeps its configuration so a later pattern change can
/// reactivate it.
#[derive(Debug, Clone)]
pub struct CycleOverlay {
    numerator: u32,
    denominator: u32,
    cycles: u32,
    sub_interval: f64,
    events: Vec<CycleEvent>,

    // Playback cursor
    next_index: usize,
    loop_count: u64,
    // Absolute time of the last dispatched event; realignment never points
    // the cursor back at something already handed to the audio engine.
    last_dispatch_time: f64,
}

impl CycleOverlay {
    /// Create an overlay. Fractions with a zero numerator or denominator are
    /// rejected; an interval that is not a positive finite number is too.
    pub fn new(numerator: u32, denominator: u32, total_pulses: u32, interval: f64) -> Option<Self> {
        if numerator == 0 || denominator == 0 || !valid_seconds(interval) {
            return None;
        }
        let mut overlay = Self {
            numerator,
            denominator,
            cycles: 0,
            sub_interval: 0.0,
            events: Vec::new(),
            next_index: 0,
            loop_count: 0,
            last_dispatch_time: f64::NEG_INFINITY,
        };
        overlay.rebuild(total_pulses, interval);
        Some(overlay)
    }

    pub fn numerator(&self) -> u32 {
        self.numerator
    }

    pub fn denominator(&self) -> u32 {
        self.denominator
    }

    /// Whole cycles fitting in the bar: `floor(total / numerator)`.
    pub fn cycles(&self) -> u32 {
        self.cycles
    }

    /// Seconds per subdivision: `numerator * interval / denominator`.
    pub fn sub_interval(&self) -> f64 {
        self.sub_interval
    }

    pub fn is_inert(&self) -> bool {
        self.events.is_empty()
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn events(&self) -> &[CycleEvent] {
        &self.events
    }

    /// Recompute derived fields and the event batch after the pattern total
    /// or interval changed. Invalid intervals leave the batch untouched.
    pub fn rebuild(&mut self, total_pulses: u32, interval: f64) {
        if !valid_seconds(interval) {
            return;
        }
        self.cycles = total_pulses / self.numerator;
        self.sub_interval = self.numerator as f64 * interval / self.denominator as f64;
        self.events.clear();

        let cycle_duration = self.numerator as f64 * interval;
        for cycle_index in 0..self.cycles {
            for subdivision_index in 0..self.denominator {
                let absolute_index = cycle_index * self.denominator + subdivision_index;
                self.events.push(CycleEvent {
                    cycle_index,
                    subdivision_index,
                    absolute_index,
                    offset: cycle_index as f64 * cycle_duration
                        + subdivision_index as f64 * self.sub_interval,
                });
            }
        }
        if self.next_index > self.events.len() {
            self.next_index = self.events.len();
        }
    }

    /// Rewind the cursor for a fresh session.
    pub fn reset_cursor(&mut self) {
        self.next_index = 0;
        self.loop_count = 0;
        self.last_dispatch_time = f64::NEG_INFINITY;
    }

    /// Point the cursor at the first event not yet reached by `elapsed`,
    /// instead of restarting the batch at zero. Loop mode wraps the phase
    /// modulo the loop period; one-shot mode drops events whose time has
    /// already passed rather than firing them late.
    pub fn realign(&mut self, elapsed: f64, period: f64, looped: bool) {
        if self.events.is_empty() || !valid_seconds(period) {
            return;
        }
        let elapsed = elapsed.max(0.0);

        if looped {
            self.loop_count = (elapsed / period).floor() as u64;
            let phase = elapsed - self.loop_count as f64 * period;
            match self.events.iter().position(|e| e.offset >= phase) {
                Some(index) => self.next_index = index,
                None => {
                    // Past the last event of this period: start of the next
                    self.loop_count += 1;
                    self.next_index = 0;
                }
            }
        } else {
            self.loop_count = 0;
            self.next_index = self
                .events
                .iter()
                .position(|e| e.offset >= elapsed)
                .unwrap_or(self.events.len());
        }
    }

    /// Pop the next event whose trigger time falls before `horizon`.
    /// Returns the event and its absolute trigger time, advancing the
    /// cursor. Events at or before the last dispatched time are skipped so
    /// a realignment at a loop seam can never double-fire a subdivision.
    pub fn next_before(
        &mut self,
        start_ref: f64,
        period: f64,
        horizon: f64,
        looped: bool,
    ) -> Option<(CycleEvent, f64)> {
        loop {
            if self.events.is_empty() {
                return None;
            }
            if self.next_index >= self.events.len() {
                if !looped {
                    return None;
                }
                self.loop_count += 1;
                self.next_index = 0;
            }
            let event = self.events[self.next_index];
            let time = start_ref + self.loop_count as f64 * period + event.offset;
            if time >= horizon {
                return None;
            }
            self.next_index += 1;
            if time <= self.last_dispatch_time {
                continue;
            }
            self.last_dispatch_time = time;
            return Some((event, time));
        }
    }
}
