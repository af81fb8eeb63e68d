// Engine events - outbound notifications for the host UI
// Replaces captured-closure callbacks: the host drains a queue instead.

use crate::pattern::voice::SoundRole;

/// Notification emitted by the scheduler, stamped with the same absolute
/// time handed to the audio engine so audio and UI stay correlated, and
/// with the session generation so stale consumers can filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineEvent {
    /// A base-grid pulse was dispatched.
    Pulse {
        step: u32,
        role: SoundRole,
        time: f64,
        generation: u64,
    },
    /// A cycle-overlay subdivision was dispatched.
    CycleTick {
        cycle_index: u32,
        subdivision_index: u32,
        time: f64,
        generation: u64,
    },
    /// One-shot playback finished naturally. Fires exactly once per session.
    Completed { generation: u64 },
}

impl EngineEvent {
    pub fn generation(&self) -> u64 {
        match self {
            EngineEvent::Pulse { generation, .. }
            | EngineEvent::CycleTick { generation, .. }
            | EngineEvent::Completed { generation } => *generation,
        }
    }
}
