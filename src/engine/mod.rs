// Module engine - scheduler core, wake thread, and the public control surface

pub mod config;
pub mod control;
pub mod scheduler;
pub mod session;
pub mod visual;

pub use config::{SchedulingConfig, SchedulingProfile};
pub use control::CompasEngine;
pub use scheduler::{CycleRequest, PlayRequest, SchedulerCore};
pub use session::PlaybackSession;
pub use visual::{CyclePosition, VisualState, derive_visual_state};
