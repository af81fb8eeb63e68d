// Visual state - point-in-time playback position for polling UIs
// Pure recomputation from elapsed time, never a replay of fired events, so
// a UI that attaches late still reports the correct instantaneous position.

use crate::pattern::cycle::CycleOverlay;
use crate::pattern::state::PatternState;

/// Position inside the cycle overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CyclePosition {
    pub cycle_index: u32,
    pub subdivision_index: u32,
}

/// Instantaneous playback position for the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisualState {
    /// Current step, wrapped into `[0, total_pulses)` in loop mode and
    /// clamped to the last step in one-shot mode.
    pub step: u32,
    pub cycle: Option<CyclePosition>,
}

/// Derive the visual state from elapsed seconds. Returns `None` for an
/// invalid pattern (the not-playing case is the caller's).
pub fn derive_visual_state(
    elapsed: f64,
    pattern: &PatternState,
    overlay: Option<&CycleOverlay>,
) -> Option<VisualState> {
    let total = pattern.total_pulses();
    let interval = pattern.interval();
    if total == 0 || !interval.is_finite() || interval <= 0.0 || !elapsed.is_finite() {
        return None;
    }

    let elapsed = elapsed.max(0.0);
    let raw_step = (elapsed / interval).floor() as u64;
    let step = if pattern.looped() {
        (raw_step % total as u64) as u32
    } else {
        raw_step.min(total as u64 - 1) as u32
    };

    let cycle = overlay
        .filter(|ov| !ov.is_inert())
        .and_then(|ov| derive_cycle_position(elapsed, pattern, ov));

    Some(VisualState { step, cycle })
}

fn derive_cycle_position(
    elapsed: f64,
    pattern: &PatternState,
    overlay: &CycleOverlay,
) -> Option<CyclePosition> {
    let period = pattern.period();
    let phase = if pattern.looped() {
        elapsed % period
    } else {
        elapsed
    };

    let cycle_duration = overlay.numerator() as f64 * pattern.interval();
    let cycle_index = (phase / cycle_duration).floor() as u64;
    if cycle_index >= overlay.cycles() as u64 {
        // Tail of a bar not covered by whole cycles
        return None;
    }

    let into_cycle = phase - cycle_index as f64 * cycle_duration;
    let subdivision_index = ((into_cycle / overlay.sub_interval()).floor() as u64)
        .min(overlay.denominator() as u64 - 1) as u32;

    Some(CyclePosition {
        cycle_index: cycle_index as u32,
        subdivision_index,
    })
}
