// Sound bank - role-to-buffer mapping with race-guarded hot swap

use crate::audio::store::SoundBuffer;
use crate::error::EngineError;
use crate::pattern::voice::SoundRole;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Default)]
struct RoleSlot {
    buffer: Option<Arc<SoundBuffer>>,
    /// Highest request token issued for this role. Only the commit carrying
    /// this token applies; earlier in-flight loads are discarded on arrival.
    token: u64,
}

/// Holds the sound assigned to each role. Hot swaps run asynchronously:
/// `begin_swap` issues a monotonically increasing per-role token, the load
/// happens elsewhere, and `commit` applies the result only if no newer
/// request superseded it in the meantime.
#[derive(Debug, Default)]
pub struct SoundBank {
    slots: [RoleSlot; SoundRole::ALL.len()],
}

impl SoundBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign a buffer immediately (initial synchronous loading).
    pub fn assign(&mut self, role: SoundRole, buffer: SoundBuffer) {
        self.slots[role.index()].buffer = Some(Arc::new(buffer));
    }

    /// Start an asynchronous swap for `role`, returning the token the
    /// eventual `commit` must carry.
    pub fn begin_swap(&mut self, role: SoundRole) -> u64 {
        let slot = &mut self.slots[role.index()];
        slot.token += 1;
        slot.token
    }

    /// Apply the result of a finished load. A stale token is dropped with
    /// `StaleAsyncResult`; a failed load keeps the previous buffer active
    /// and propagates the failure.
    pub fn commit(
        &mut self,
        role: SoundRole,
        token: u64,
        result: Result<SoundBuffer, EngineError>,
    ) -> Result<(), EngineError> {
        let slot = &mut self.slots[role.index()];
        if token != slot.token {
            return Err(EngineError::StaleAsyncResult);
        }
        match result {
            Ok(buffer) => {
                slot.buffer = Some(Arc::new(buffer));
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Buffer assigned to exactly this role, no fallback.
    pub fn get(&self, role: SoundRole) -> Option<&Arc<SoundBuffer>> {
        self.slots[role.index()].buffer.as_ref()
    }

    /// Resolve a role through its fallback chain. Returns the buffer and
    /// the role that actually provided it.
    pub fn resolve(&self, role: SoundRole) -> Option<(SoundRole, &Arc<SoundBuffer>)> {
        role.fallback_chain()
            .iter()
            .find_map(|&candidate| self.get(candidate).map(|buffer| (candidate, buffer)))
    }

    /// The bank is ready once the base role has a sound; every other role
    /// can fall back to it.
    pub fn is_ready(&self) -> bool {
        self.get(SoundRole::Base).is_some()
    }
}

/// Serializable description of a sound set: which store id each role uses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoundSetConfig {
    pub name: String,
    pub version: String,
    pub assignments: Vec<RoleAssignment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub role: SoundRole,
    pub sound_id: String,
}

impl SoundSetConfig {
    pub fn new(name: String) -> Self {
        Self {
            name,
            version: "1.0".to_string(),
            assignments: Vec::new(),
        }
    }

    /// Set the id for a role, replacing any previous assignment.
    pub fn assign(&mut self, role: SoundRole, sound_id: String) {
        self.assignments.retain(|a| a.role != role);
        self.assignments.push(RoleAssignment { role, sound_id });
    }

    pub fn id_for(&self, role: SoundRole) -> Option<&str> {
        self.assignments
            .iter()
            .find(|a| a.role == role)
            .map(|a| a.sound_id.as_str())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), String> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize sound set: {}", e))?;
        std::fs::write(path, json).map_err(|e| format!("Failed to write sound set: {}", e))?;
        Ok(())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read sound set: {}", e))?;
        serde_json::from_str(&json).map_err(|e| format!("Failed to parse sound set: {}", e))
    }
}
