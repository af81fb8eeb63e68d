pub mod clock;
pub mod pulse_clock;
pub mod tap_tempo;

pub use clock::{Clock, ManualClock, SystemClock};
pub use pulse_clock::{PhaseSnapshot, PulseClock, recompute_phase};
pub use tap_tempo::{REQUIRED_TAPS, TapTempoDetector, TapTempoResult};
