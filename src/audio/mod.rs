// Module audio - output path and sound loading collaborators

pub mod bank;
pub mod output;
pub mod store;

pub use bank::{RoleAssignment, SoundBank, SoundSetConfig};
pub use output::{AudioOutputContext, AudioOutputEngine};
pub use store::{MemorySoundStore, SoundBuffer, SoundBufferStore, WavFileStore};
