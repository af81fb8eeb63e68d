// Scheduling configuration - look-ahead window and wake cadence

use crate::pattern::state::valid_seconds;
use serde::{Deserialize, Serialize};

/// Look-ahead/wake-cadence pair driving the dispatcher.
///
/// At every wake the scheduler dispatches everything due within the next
/// `look_ahead` seconds, so timer jitter up to roughly
/// `look_ahead - update_interval` never audibly shifts an event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SchedulingConfig {
    /// Seconds of events pre-computed per wake.
    pub look_ahead: f64,
    /// Seconds between wakes.
    pub update_interval: f64,
}

impl SchedulingConfig {
    pub fn new(look_ahead: f64, update_interval: f64) -> Option<Self> {
        if !valid_seconds(look_ahead) || !valid_seconds(update_interval) {
            return None;
        }
        Some(Self {
            look_ahead,
            update_interval,
        })
    }
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        SchedulingProfile::Balanced.config()
    }
}

/// Built-in scheduling profiles, selectable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulingProfile {
    /// Tight timing for desktop-class timers.
    Desktop,
    /// Middle ground.
    Balanced,
    /// Generous window for throttled mobile timers.
    Mobile,
}

impl SchedulingProfile {
    pub fn config(self) -> SchedulingConfig {
        match self {
            SchedulingProfile::Desktop => SchedulingConfig {
                look_ahead: 0.02,
                update_interval: 0.01,
            },
            SchedulingProfile::Balanced => SchedulingConfig {
                look_ahead: 0.03,
                update_interval: 0.015,
            },
            SchedulingProfile::Mobile => SchedulingConfig {
                look_ahead: 0.06,
                update_interval: 0.03,
            },
        }
    }
}
