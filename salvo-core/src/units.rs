//! Unit type definitions, players and reserve fleets

use crate::board::Orientation;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// PLAYER
// ============================================================================

/// Side colour; Red moves first from rank 1
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Player {
    Red = 0,
    Blue = 1,
}

impl Player {
    pub const BOTH: [Player; 2] = [Player::Red, Player::Blue];

    pub fn opponent(self) -> Self {
        match self {
            Player::Red => Player::Blue,
            Player::Blue => Player::Red,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Zero-based rank this player deploys onto
    pub fn home_rank(self) -> u8 {
        match self {
            Player::Red => 0,
            Player::Blue => 7,
        }
    }

    /// Default facing for freshly deployed artillery
    pub fn forward(self) -> Orientation {
        match self {
            Player::Red => Orientation::N,
            Player::Blue => Orientation::S,
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Player::Red => f.write_str("red"),
            Player::Blue => f.write_str("blue"),
        }
    }
}

// ============================================================================
// UNIT TYPES
// ============================================================================

/// Unit kind; the first six are deployable from reserves
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UnitKind {
    Infantry = 0,
    ArmoredInfantry = 1,
    Airborne = 2,
    Artillery = 3,
    ArmoredArtillery = 4,
    HeavyArtillery = 5,
    Hq = 6,
}

/// Static capabilities of a unit kind
#[derive(Clone, Debug)]
pub struct UnitStats {
    pub code: char,
    pub name: &'static str,
    pub mobility: u8,
    pub contact: bool,
    pub range: Option<u8>,
    pub parachute: bool,
}

impl UnitStats {
    const fn new(
        code: char,
        name: &'static str,
        mobility: u8,
        contact: bool,
        range: Option<u8>,
        parachute: bool,
    ) -> Self {
        Self {
            code,
            name,
            mobility,
            contact,
            range,
            parachute,
        }
    }
}

/// Capability table indexed by `UnitKind`
pub static UNIT_STATS: [UnitStats; 7] = [
    UnitStats::new('I', "Infantry", 1, true, None, false),
    UnitStats::new('A', "Armored Infantry", 2, true, None, false),
    UnitStats::new('P', "Airborne Infantry", 1, true, None, true),
    UnitStats::new('R', "Artillery", 1, false, Some(2), false),
    UnitStats::new('S', "Armored Artillery", 2, false, Some(2), false),
    UnitStats::new('V', "Heavy Artillery", 1, false, Some(3), false),
    UnitStats::new('H', "HQ", 1, false, None, false),
];

impl UnitKind {
    pub const ALL: [UnitKind; 7] = [
        UnitKind::Infantry,
        UnitKind::ArmoredInfantry,
        UnitKind::Airborne,
        UnitKind::Artillery,
        UnitKind::ArmoredArtillery,
        UnitKind::HeavyArtillery,
        UnitKind::Hq,
    ];

    /// Kinds that may sit in a reserve fleet, in canonical notation order
    pub const DEPLOYABLE: [UnitKind; 6] = [
        UnitKind::Infantry,
        UnitKind::ArmoredInfantry,
        UnitKind::Airborne,
        UnitKind::Artillery,
        UnitKind::ArmoredArtillery,
        UnitKind::HeavyArtillery,
    ];

    pub fn stats(self) -> &'static UnitStats {
        &UNIT_STATS[self as usize]
    }

    /// Uppercase notation letter
    pub fn code(self) -> char {
        self.stats().code
    }

    /// Lookup by notation letter (case-insensitive)
    pub fn from_code(c: char) -> Option<Self> {
        let upper = c.to_ascii_uppercase();
        Self::ALL.into_iter().find(|kind| kind.code() == upper)
    }

    pub fn mobility(self) -> u8 {
        self.stats().mobility
    }

    pub fn can_contact(self) -> bool {
        self.stats().contact
    }

    pub fn range(self) -> Option<u8> {
        self.stats().range
    }

    pub fn can_parachute(self) -> bool {
        self.stats().parachute
    }

    pub fn is_artillery(self) -> bool {
        self.stats().range.is_some()
    }

    pub fn is_deployable(self) -> bool {
        self != UnitKind::Hq
    }
}

// ============================================================================
// PIECE
// ============================================================================

/// A unit on the board. `facing` is set exactly for artillery-class kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Piece {
    pub kind: UnitKind,
    pub owner: Player,
    pub facing: Option<Orientation>,
}

impl Piece {
    /// Piece in its default facing (owner's forward for artillery)
    pub fn new(kind: UnitKind, owner: Player) -> Self {
        Self {
            kind,
            owner,
            facing: kind.is_artillery().then(|| owner.forward()),
        }
    }

    /// Artillery piece with an explicit facing
    pub fn oriented(kind: UnitKind, owner: Player, facing: Orientation) -> Self {
        Self {
            kind,
            owner,
            facing: kind.is_artillery().then_some(facing),
        }
    }

    /// Notation letter, uppercase for Red and lowercase for Blue
    pub fn letter(&self) -> char {
        match self.owner {
            Player::Red => self.kind.code(),
            Player::Blue => self.kind.code().to_ascii_lowercase(),
        }
    }
}

// ============================================================================
// RESERVE FLEET
// ============================================================================

/// Undeployed unit counts for one player
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Reserve {
    counts: [u8; 6],
}

impl Reserve {
    pub const fn empty() -> Self {
        Self { counts: [0; 6] }
    }

    /// Build from (kind, count) pairs; HQ entries are ignored
    pub fn from_counts(entries: &[(UnitKind, u8)]) -> Self {
        let mut reserve = Self::empty();
        for &(kind, count) in entries {
            reserve.set(kind, count);
        }
        reserve
    }

    pub fn count(&self, kind: UnitKind) -> u8 {
        if kind.is_deployable() {
            self.counts[kind as usize]
        } else {
            0
        }
    }

    pub fn set(&mut self, kind: UnitKind, count: u8) {
        if kind.is_deployable() {
            self.counts[kind as usize] = count;
        }
    }

    /// Take one unit out of the fleet; false when none are left
    pub fn take(&mut self, kind: UnitKind) -> bool {
        if !kind.is_deployable() || self.counts[kind as usize] == 0 {
            return false;
        }
        self.counts[kind as usize] -= 1;
        true
    }

    pub fn is_empty(&self) -> bool {
        self.counts.iter().all(|&c| c == 0)
    }

    /// Non-zero entries in canonical order
    pub fn iter(&self) -> impl Iterator<Item = (UnitKind, u8)> + '_ {
        UnitKind::DEPLOYABLE
            .into_iter()
            .map(|kind| (kind, self.count(kind)))
            .filter(|&(_, count)| count > 0)
    }
}
