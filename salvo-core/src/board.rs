//! Board geometry: squares, compass orientations and the 8x8 grid

use crate::units::{Piece, Player, UnitKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Files and ranks per side
pub const BOARD_SIZE: u8 = 8;

/// Total number of squares
pub const SQUARE_COUNT: usize = 64;

// ============================================================================
// SQUARE
// ============================================================================

/// A board square, stored as `rank * 8 + file`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Square(u8);

impl Square {
    /// Square from zero-based file and rank (both must be < 8)
    pub const fn new(file: u8, rank: u8) -> Self {
        Self(rank * BOARD_SIZE + file)
    }

    /// Square from signed coordinates, `None` when off the board
    pub fn try_new(file: i8, rank: i8) -> Option<Self> {
        let size = BOARD_SIZE as i8;
        if (0..size).contains(&file) && (0..size).contains(&rank) {
            Some(Self::new(file as u8, rank as u8))
        } else {
            None
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        (index < SQUARE_COUNT).then_some(Self(index as u8))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn file(self) -> u8 {
        self.0 % BOARD_SIZE
    }

    pub fn rank(self) -> u8 {
        self.0 / BOARD_SIZE
    }

    /// Square displaced by (df, dr), `None` past the edge
    pub fn offset(self, df: i8, dr: i8) -> Option<Self> {
        Self::try_new(self.file() as i8 + df, self.rank() as i8 + dr)
    }

    /// One step along an orientation's unit vector
    pub fn step(self, dir: Orientation) -> Option<Self> {
        let (df, dr) = dir.vector();
        self.offset(df, dr)
    }

    /// The up to eight squares touching this one
    pub fn neighbors(self) -> impl Iterator<Item = Square> {
        Orientation::ALL.into_iter().filter_map(move |dir| self.step(dir))
    }

    pub fn is_adjacent(self, other: Square) -> bool {
        let df = (self.file() as i8 - other.file() as i8).abs();
        let dr = (self.rank() as i8 - other.rank() as i8).abs();
        self != other && df <= 1 && dr <= 1
    }

    /// All 64 squares, a1 first
    pub fn all() -> impl Iterator<Item = Square> {
        (0..SQUARE_COUNT as u8).map(Square)
    }

    /// Parse algebraic form (`e4`)
    pub fn parse(s: &str) -> Option<Self> {
        let mut chars = s.chars();
        let file = chars.next()?;
        let rank = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        if !('a'..='h').contains(&file) || !('1'..='8').contains(&rank) {
            return None;
        }
        Some(Self::new(file as u8 - b'a', rank as u8 - b'1'))
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", (b'a' + self.file()) as char, self.rank() + 1)
    }
}

// ============================================================================
// ORIENTATION
// ============================================================================

/// Compass facing in 45 degree steps, clockwise from north
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Orientation {
    N = 0,
    NE = 1,
    E = 2,
    SE = 3,
    S = 4,
    SW = 5,
    W = 6,
    NW = 7,
}

/// Unit vectors (file, rank) indexed by orientation
const VECTORS: [(i8, i8); 8] = [
    (0, 1),   // N
    (1, 1),   // NE
    (1, 0),   // E
    (1, -1),  // SE
    (0, -1),  // S
    (-1, -1), // SW
    (-1, 0),  // W
    (-1, 1),  // NW
];

/// Notation glyphs indexed by orientation
const GLYPHS: [char; 8] = ['↑', '↗', '→', '↘', '↓', '↙', '←', '↖'];

impl Orientation {
    pub const ALL: [Orientation; 8] = [
        Orientation::N,
        Orientation::NE,
        Orientation::E,
        Orientation::SE,
        Orientation::S,
        Orientation::SW,
        Orientation::W,
        Orientation::NW,
    ];

    pub fn vector(self) -> (i8, i8) {
        VECTORS[self as usize]
    }

    pub fn degrees(self) -> u16 {
        self as u16 * 45
    }

    pub fn glyph(self) -> char {
        GLYPHS[self as usize]
    }

    pub fn from_glyph(c: char) -> Option<Self> {
        GLYPHS.iter().position(|&g| g == c).map(|i| Self::ALL[i])
    }

    pub fn from_degrees(degrees: u16) -> Option<Self> {
        (degrees % 45 == 0 && degrees < 360).then(|| Self::ALL[(degrees / 45) as usize])
    }
}

// ============================================================================
// SQUARE SET
// ============================================================================

/// Bitset over the 64 squares
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SquareSet(u64);

impl SquareSet {
    pub const EMPTY: SquareSet = SquareSet(0);

    pub fn insert(&mut self, sq: Square) {
        self.0 |= 1 << sq.index();
    }

    pub fn contains(self, sq: Square) -> bool {
        self.0 & (1 << sq.index()) != 0
    }

    pub fn union(self, other: SquareSet) -> SquareSet {
        SquareSet(self.0 | other.0)
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Members in index order
    pub fn iter(self) -> impl Iterator<Item = Square> {
        Square::all().filter(move |&sq| self.contains(sq))
    }
}

impl FromIterator<Square> for SquareSet {
    fn from_iter<I: IntoIterator<Item = Square>>(iter: I) -> Self {
        let mut set = SquareSet::EMPTY;
        for sq in iter {
            set.insert(sq);
        }
        set
    }
}

// ============================================================================
// BOARD
// ============================================================================

/// Fixed 8x8 grid; plain value, copy to branch
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Board {
    squares: [Option<Piece>; SQUARE_COUNT],
}

impl Board {
    pub const fn empty() -> Self {
        Self {
            squares: [None; SQUARE_COUNT],
        }
    }

    pub fn get(&self, sq: Square) -> Option<Piece> {
        self.squares[sq.index()]
    }

    pub fn is_empty(&self, sq: Square) -> bool {
        self.squares[sq.index()].is_none()
    }

    /// Place a piece, returning whatever stood there
    pub fn put(&mut self, sq: Square, piece: Piece) -> Option<Piece> {
        self.squares[sq.index()].replace(piece)
    }

    pub fn remove(&mut self, sq: Square) -> Option<Piece> {
        self.squares[sq.index()].take()
    }

    /// Occupied squares in index order
    pub fn pieces(&self) -> impl Iterator<Item = (Square, Piece)> + '_ {
        Square::all().filter_map(move |sq| self.get(sq).map(|piece| (sq, piece)))
    }

    pub fn pieces_of(&self, player: Player) -> impl Iterator<Item = (Square, Piece)> + '_ {
        self.pieces().filter(move |(_, piece)| piece.owner == player)
    }

    /// Location of a player's HQ, if it is still on the board
    pub fn hq(&self, player: Player) -> Option<Square> {
        self.pieces_of(player)
            .find(|(_, piece)| piece.kind == UnitKind::Hq)
            .map(|(sq, _)| sq)
    }

    pub fn is_enemy(&self, sq: Square, player: Player) -> bool {
        self.get(sq).is_some_and(|piece| piece.owner != player)
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::empty()
    }
}
