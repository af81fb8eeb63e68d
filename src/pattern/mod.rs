pub mod cycle;
pub mod state;
pub mod voice;

pub use cycle::{CycleEvent, CycleOverlay};
pub use state::{AccentSelection, PatternState, valid_seconds};
pub use voice::{SoundRole, role_for_pulse, role_for_subdivision};
