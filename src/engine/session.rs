// Playback session - one run of the scheduler, fenced by a generation token

/// State of a single play()..stop() run.
///
/// The generation stamps every dispatch; `stop()` invalidates it, so wake
/// work already in flight self-cancels instead of re-triggering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackSession {
    pub generation: u64,
    /// Next base-grid pulse index to dispatch. Non-decreasing; folded by
    /// whole loop periods only together with the clock's start reference.
    pub pulse_cursor: u64,
    /// Pulses left before one-shot completion; `None` while looping.
    pub remaining_pulses: Option<u64>,
    /// Next fine-grid accent tick to consider (only used when the accent
    /// resolution differs from the base grid).
    pub accent_cursor: u64,
}

impl PlaybackSession {
    pub fn new(generation: u64, total_pulses: u32, looped: bool) -> Self {
        Self {
            generation,
            pulse_cursor: 0,
            remaining_pulses: if looped {
                None
            } else {
                Some(total_pulses as u64)
            },
            accent_cursor: 0,
        }
    }
}
