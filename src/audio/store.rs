// Sound buffer store - load-by-id collaborator feeding the sound bank

use crate::error::EngineError;
use hound::WavReader;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

/// A decoded, play-ready sound.
#[derive(Debug, Clone)]
pub struct SoundBuffer {
    pub id: String,
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl SoundBuffer {
    /// Duration of the buffer in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / (self.sample_rate as f64 * self.channels as f64)
    }
}

/// Loads sounds by id. Loading may be slow (disk, network); the engine calls
/// it from loader threads so playback of other roles is never blocked.
pub trait SoundBufferStore: Send + Sync {
    fn load(&self, id: &str) -> Result<SoundBuffer, EngineError>;
}

/// File-backed store mapping `id` to `<root>/<id>.wav`.
pub struct WavFileStore {
    root: PathBuf,
}

impl WavFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.root.join(format!("{}.wav", id))
    }
}

impl SoundBufferStore for WavFileStore {
    fn load(&self, id: &str) -> Result<SoundBuffer, EngineError> {
        let path = self.path_for(id);
        let reader = WavReader::open(&path).map_err(|e| EngineError::SoundLoadFailure {
            id: id.to_string(),
            reason: e.to_string(),
        })?;
        let spec = reader.spec();

        let samples: Vec<f32> = reader
            .into_samples::<i16>()
            .map(|s| s.map(|v| v as f32 / i16::MAX as f32))
            .collect::<Result<_, _>>()
            .map_err(|e| EngineError::SoundLoadFailure {
                id: id.to_string(),
                reason: e.to_string(),
            })?;

        if samples.is_empty() {
            return Err(EngineError::SoundLoadFailure {
                id: id.to_string(),
                reason: "no samples decoded".to_string(),
            });
        }

        Ok(SoundBuffer {
            id: id.to_string(),
            samples,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
        })
    }
}

/// In-memory store keyed by id. Used by tests and demos; ids registered as
/// failing return `SoundLoadFailure` to exercise the swap discipline.
#[derive(Default)]
pub struct MemorySoundStore {
    sounds: Mutex<HashMap<String, Arc<SoundBuffer>>>,
    failing: Mutex<Vec<String>>,
}

impl MemorySoundStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: &str, buffer: SoundBuffer) {
        let mut sounds = self.sounds.lock().unwrap_or_else(|e| e.into_inner());
        sounds.insert(id.to_string(), Arc::new(buffer));
    }

    /// Register a short synthetic buffer under `id`.
    pub fn insert_stub(&self, id: &str) {
        self.insert(
            id,
            SoundBuffer {
                id: id.to_string(),
                samples: vec![0.0; 64],
                sample_rate: 44_100,
                channels: 1,
            },
        );
    }

    /// Make subsequent loads of `id` fail.
    pub fn fail(&self, id: &str) {
        let mut failing = self.failing.lock().unwrap_or_else(|e| e.into_inner());
        failing.push(id.to_string());
    }
}

impl SoundBufferStore for MemorySoundStore {
    fn load(&self, id: &str) -> Result<SoundBuffer, EngineError> {
        {
            let failing = self.failing.lock().unwrap_or_else(|e| e.into_inner());
            if failing.iter().any(|f| f == id) {
                return Err(EngineError::SoundLoadFailure {
                    id: id.to_string(),
                    reason: "marked as failing".to_string(),
                });
            }
        }
        let sounds = self.sounds.lock().unwrap_or_else(|e| e.into_inner());
        sounds
            .get(id)
            .map(|b| b.as_ref().clone())
            .ok_or_else(|| EngineError::SoundLoadFailure {
                id: id.to_string(),
                reason: "unknown id".to_string(),
            })
    }
}
