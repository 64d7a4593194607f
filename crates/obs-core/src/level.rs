use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Requested obfuscation strength. A stage runs when the level reaches the
/// stage's own level; anything above [`Level::MAX`] behaves like `MAX`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Level(pub u8);

impl Level {
    pub const NONE: Level = Level(0);
    pub const RENAME: Level = Level(1);
    pub const STRINGS: Level = Level(2);
    pub const BYTECODE: Level = Level(3);
    pub const MAX: Level = Level::BYTECODE;

    pub fn enables(self, stage: Level) -> bool {
        self >= stage
    }

    pub fn clamp_to_max(self) -> Level {
        self.min(Level::MAX)
    }
}

impl From<u8> for Level {
    fn from(value: u8) -> Self {
        Level(value)
    }
}

impl Display for Level {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_unlock_by_level() {
        assert!(!Level::NONE.enables(Level::RENAME));
        assert!(Level(2).enables(Level::RENAME));
        assert!(Level(2).enables(Level::STRINGS));
        assert!(!Level(2).enables(Level::BYTECODE));
        assert_eq!(Level(9).clamp_to_max(), Level::BYTECODE);
    }
}
