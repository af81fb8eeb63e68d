// Audio output - opaque schedule-at-absolute-time collaborator, plus the
// mute/volume context the engine owns instead of a hidden global

use crate::audio::store::SoundBuffer;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// The external audio engine: plays a pre-loaded sound at a requested
/// absolute time (same clock as the scheduler) with sub-millisecond
/// accuracy. Synthesis and mixing internals stay behind this trait.
pub trait AudioOutputEngine: Send + Sync {
    fn schedule(&self, sound: &Arc<SoundBuffer>, time: f64, gain: f32);
}

/// Output path state: the engine, muted flag, and master gain. Mute and
/// volume apply directly here, independent of scheduling state.
pub struct AudioOutputContext {
    engine: Arc<dyn AudioOutputEngine>,
    muted: AtomicBool,
    // f32 gain stored as bits
    volume_bits: AtomicU32,
}

impl AudioOutputContext {
    pub fn new(engine: Arc<dyn AudioOutputEngine>) -> Self {
        Self {
            engine,
            muted: AtomicBool::new(false),
            volume_bits: AtomicU32::new(1.0f32.to_bits()),
        }
    }

    pub fn set_mute(&self, muted: bool) {
        self.muted.store(muted, Ordering::Relaxed);
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }

    /// Set master gain, clamped to `[0.0, 1.0]`. Non-finite values ignored.
    pub fn set_volume(&self, volume: f32) {
        if !volume.is_finite() {
            return;
        }
        self.volume_bits
            .store(volume.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    pub fn volume(&self) -> f32 {
        f32::from_bits(self.volume_bits.load(Ordering::Relaxed))
    }

    /// Hand a sound to the output engine unless muted.
    pub fn dispatch(&self, sound: &Arc<SoundBuffer>, time: f64) {
        if self.is_muted() {
            return;
        }
        self.engine.schedule(sound, time, self.volume());
    }
}
