// Voice resolution - maps pulse/subdivision events to sound roles

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Sound role triggered by a scheduled event.
///
/// Matched exhaustively everywhere; adding a variant is a compile-time
/// sweep through the dispatch path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SoundRole {
    /// Ordinary pulse.
    Base,
    /// Accented pulse.
    Accent,
    /// First pulse of the pattern.
    Start,
    /// Cycle-overlay subdivision.
    Cycle,
    /// First subdivision of a cycle.
    CycleStart,
}

impl SoundRole {
    /// All roles, in slot order. Index with [`SoundRole::index`].
    pub const ALL: [SoundRole; 5] = [
        SoundRole::Base,
        SoundRole::Accent,
        SoundRole::Start,
        SoundRole::Cycle,
        SoundRole::CycleStart,
    ];

    pub fn index(self) -> usize {
        match self {
            SoundRole::Base => 0,
            SoundRole::Accent => 1,
            SoundRole::Start => 2,
            SoundRole::Cycle => 3,
            SoundRole::CycleStart => 4,
        }
    }

    /// Substitution order when a role has no sound assigned. The first
    /// entry is the role itself.
    pub fn fallback_chain(self) -> &'static [SoundRole] {
        match self {
            SoundRole::Base => &[SoundRole::Base],
            SoundRole::Accent => &[SoundRole::Accent, SoundRole::Base],
            SoundRole::Start => &[SoundRole::Start, SoundRole::Base],
            SoundRole::Cycle => &[SoundRole::Cycle, SoundRole::Accent, SoundRole::Base],
            SoundRole::CycleStart => &[
                SoundRole::CycleStart,
                SoundRole::Cycle,
                SoundRole::Accent,
                SoundRole::Base,
            ],
        }
    }
}

impl fmt::Display for SoundRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SoundRole::Base => "base",
            SoundRole::Accent => "accent",
            SoundRole::Start => "start",
            SoundRole::Cycle => "cycle",
            SoundRole::CycleStart => "cycle-start",
        };
        write!(f, "{}", name)
    }
}

/// Role for a base-grid pulse.
pub fn role_for_pulse(step: u32, accented: &BTreeSet<u32>) -> SoundRole {
    if step == 0 {
        SoundRole::Start
    } else if accented.contains(&step) {
        SoundRole::Accent
    } else {
        SoundRole::Base
    }
}

/// Role for a cycle-overlay subdivision.
pub fn role_for_subdivision(subdivision_index: u32) -> SoundRole {
    if subdivision_index == 0 {
        SoundRole::CycleStart
    } else {
        SoundRole::Cycle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accents(values: &[u32]) -> BTreeSet<u32> {
        values.iter().copied().collect()
    }

    #[test]
    fn test_step_zero_is_start() {
        assert_eq!(role_for_pulse(0, &accents(&[0, 3])), SoundRole::Start);
    }

    #[test]
    fn test_accented_step() {
        let set = accents(&[3, 6, 8]);
        assert_eq!(role_for_pulse(3, &set), SoundRole::Accent);
        assert_eq!(role_for_pulse(6, &set), SoundRole::Accent);
        assert_eq!(role_for_pulse(4, &set), SoundRole::Base);
    }

    #[test]
    fn test_subdivision_roles() {
        assert_eq!(role_for_subdivision(0), SoundRole::CycleStart);
        assert_eq!(role_for_subdivision(1), SoundRole::Cycle);
        assert_eq!(role_for_subdivision(2), SoundRole::Cycle);
    }

    #[test]
    fn test_fallback_chains() {
        assert_eq!(
            SoundRole::CycleStart.fallback_chain(),
            &[
                SoundRole::CycleStart,
                SoundRole::Cycle,
                SoundRole::Accent,
                SoundRole::Base
            ]
        );
        assert_eq!(
            SoundRole::Cycle.fallback_chain(),
            &[SoundRole::Cycle, SoundRole::Accent, SoundRole::Base]
        );
        assert_eq!(SoundRole::Base.fallback_chain(), &[SoundRole::Base]);
    }

    #[test]
    fn test_role_indices_cover_all_slots() {
        for (i, role) in SoundRole::ALL.iter().enumerate() {
            assert_eq!(role.index(), i);
        }
    }
}
