//! Movement capability kinds.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of movement used to reach a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeType {
    /// No movement: the first step of a path
    None,
    Walk,
    Fly,
    Door,
    Dig,
}

impl ModeType {
    /// All movement kinds that can appear in a [`ModeSet`].
    pub const MOVING: [ModeType; 4] = [ModeType::Walk, ModeType::Fly, ModeType::Door, ModeType::Dig];

    fn bit(self) -> u8 {
        match self {
            ModeType::None => 0,
            ModeType::Walk => 1 << 0,
            ModeType::Fly => 1 << 1,
            ModeType::Door => 1 << 2,
            ModeType::Dig => 1 << 3,
        }
    }
}

impl fmt::Display for ModeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModeType::None => "none",
            ModeType::Walk => "walk",
            ModeType::Fly => "fly",
            ModeType::Door => "door",
            ModeType::Dig => "dig",
        };
        f.write_str(name)
    }
}

/// A set of movement kinds.
///
/// [`ModeType::None`] is never stored: every set implicitly permits the
/// zero-movement origin step.
///
/// # Examples
///
/// ```
/// use route_engine::domain::{ModeSet, ModeType};
///
/// let walk = ModeSet::from_iter([ModeType::Walk]);
/// let walk_fly = ModeSet::from_iter([ModeType::Walk, ModeType::Fly]);
/// assert!(walk.is_subset(&walk_fly));
/// assert!(!walk_fly.is_subset(&walk));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModeSet(u8);

impl ModeSet {
    pub const fn empty() -> Self {
        ModeSet(0)
    }

    pub fn insert(&mut self, mode: ModeType) {
        self.0 |= mode.bit();
    }

    pub fn contains(&self, mode: ModeType) -> bool {
        mode == ModeType::None || self.0 & mode.bit() != 0
    }

    /// Returns true if every mode in `self` is also in `other`.
    pub fn is_subset(&self, other: &ModeSet) -> bool {
        self.0 & !other.0 == 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = ModeType> + '_ {
        ModeType::MOVING.into_iter().filter(|mode| self.contains(*mode))
    }
}

impl FromIterator<ModeType> for ModeSet {
    fn from_iter<I: IntoIterator<Item = ModeType>>(iter: I) -> Self {
        let mut set = ModeSet::empty();
        for mode in iter {
            set.insert(mode);
        }
        set
    }
}

impl fmt::Display for ModeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.iter().map(|m| m.to_string()).collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}
