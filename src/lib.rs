// Compas Engine - Library exports for tests and benchmarks

pub mod audio;
pub mod engine;
pub mod error;
pub mod messaging;
pub mod pattern;
pub mod timing;

// Re-export commonly used types for convenience
pub use audio::{AudioOutputEngine, MemorySoundStore, SoundBuffer, SoundBufferStore, WavFileStore};
pub use engine::{
    CompasEngine, PlayRequest, SchedulingConfig, SchedulingProfile, VisualState,
};
pub use error::EngineError;
pub use messaging::channels::{EventConsumer, create_event_channel};
pub use messaging::event::EngineEvent;
pub use pattern::{AccentSelection, CycleOverlay, PatternState, SoundRole};
pub use timing::{Clock, ManualClock, PulseClock, SystemClock, TapTempoDetector, TapTempoResult};
