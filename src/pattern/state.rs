// Pattern state - pulses per bar, tempo-derived interval, accents, loop flag

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Reject non-finite or non-positive intervals/tempos up front so live
/// numeric-field editing can feed transiently invalid values harmlessly.
pub fn valid_seconds(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Accent payload accepted by `set_selected`: either plain pulse indices on
/// the base grid, or indices on a finer grid so accents can land between
/// pulses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccentSelection {
    /// Indices on the base pulse grid.
    Pulses(BTreeSet<u32>),
    /// Indices on a finer grid of `resolution` ticks per bar.
    WithResolution {
        values: BTreeSet<u32>,
        resolution: u32,
    },
}

/// The base pattern: how many pulses per bar, how long each pulse lasts,
/// whether playback loops, and which positions are accented.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternState {
    total_pulses: u32,
    /// Seconds per pulse.
    interval: f64,
    looped: bool,
    accented: BTreeSet<u32>,
    /// Grid the accent indices live on, in ticks per bar. Equal to
    /// `total_pulses` by default, in which case accents coincide with pulses.
    accent_resolution: u32,
}

impl Default for PatternState {
    /// Four looping pulses at 120 BPM.
    fn default() -> Self {
        Self {
            total_pulses: 4,
            interval: 0.5,
            looped: true,
            accented: BTreeSet::new(),
            accent_resolution: 4,
        }
    }
}

impl PatternState {
    /// Create a pattern. Returns `None` for invalid totals or intervals.
    pub fn new(total_pulses: u32, interval: f64, looped: bool) -> Option<Self> {
        if total_pulses == 0 || !valid_seconds(interval) {
            return None;
        }
        Some(Self {
            total_pulses,
            interval,
            looped,
            accented: BTreeSet::new(),
            accent_resolution: total_pulses,
        })
    }

    pub fn total_pulses(&self) -> u32 {
        self.total_pulses
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    pub fn looped(&self) -> bool {
        self.looped
    }

    pub fn accented(&self) -> &BTreeSet<u32> {
        &self.accented
    }

    pub fn accent_resolution(&self) -> u32 {
        self.accent_resolution
    }

    /// Whether accents sit on the base pulse grid (resolved as pulse roles)
    /// or on a finer grid (scheduled as separate accent events).
    pub fn accents_on_pulse_grid(&self) -> bool {
        self.accent_resolution == self.total_pulses
    }

    /// Seconds per accent-grid tick.
    pub fn accent_tick_interval(&self) -> f64 {
        self.total_pulses as f64 * self.interval / self.accent_resolution as f64
    }

    /// Duration of one full bar in seconds.
    pub fn period(&self) -> f64 {
        self.total_pulses as f64 * self.interval
    }

    /// Update the pulse count. Rejects zero, returns whether it applied.
    /// Keeps the accent resolution pinned to the grid when it was on-grid.
    pub fn set_total(&mut self, total_pulses: u32) -> bool {
        if total_pulses == 0 {
            return false;
        }
        if self.accents_on_pulse_grid() {
            self.accent_resolution = total_pulses;
        }
        self.total_pulses = total_pulses;
        true
    }

    /// Update the pulse interval. Rejects invalid values.
    pub fn set_interval(&mut self, interval: f64) -> bool {
        if !valid_seconds(interval) {
            return false;
        }
        self.interval = interval;
        true
    }

    /// Derive and apply an interval from BPM. Rejects invalid values.
    pub fn set_tempo(&mut self, bpm: f64) -> bool {
        if !valid_seconds(bpm) {
            return false;
        }
        self.interval = 60.0 / bpm;
        true
    }

    pub fn set_looped(&mut self, looped: bool) {
        self.looped = looped;
    }

    /// Replace the accented set, optionally with a finer grid resolution.
    /// A zero resolution is rejected.
    pub fn set_selected(&mut self, selection: AccentSelection) -> bool {
        match selection {
            AccentSelection::Pulses(values) => {
                self.accented = values;
                self.accent_resolution = self.total_pulses;
                true
            }
            AccentSelection::WithResolution { values, resolution } => {
                if resolution == 0 {
                    return false;
                }
                self.accented = values;
                self.accent_resolution = resolution;
                true
            }
        }
    }
}
