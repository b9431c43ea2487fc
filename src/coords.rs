use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use shakmaty::{Color, File, Rank, Square};

/// Which side of the board is drawn at the bottom.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    White,
    Black,
}

impl Orientation {
    pub fn from_side(side: Color) -> Self {
        match side {
            Color::White => Orientation::White,
            Color::Black => Orientation::Black,
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            Orientation::White => Orientation::Black,
            Orientation::Black => Orientation::White,
        }
    }
}

/// A cell of the drawn board: row 0 is the top row, column 0 the leftmost column.
///
/// Which square a cell shows depends on the [`Orientation`]. The textual form is `"row-col"`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct GridId {
    row: u8,
    col: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid grid id {0:?}, expected \"row-col\" with both in 0..8")]
pub struct InvalidGridId(pub String);

impl GridId {
    pub fn new(row: u8, col: u8) -> Option<Self> {
        (row < 8 && col < 8).then_some(GridId { row, col })
    }

    /// All 64 cells, top row first.
    pub fn all() -> impl Iterator<Item = GridId> {
        (0..8).flat_map(|row| (0..8).map(move |col| GridId { row, col }))
    }
}

impl fmt::Display for GridId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.row, self.col)
    }
}

impl FromStr for GridId {
    type Err = InvalidGridId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidGridId(s.to_owned());
        let (row, col) = s.split_once('-').ok_or_else(invalid)?;
        let row = row.trim().parse().map_err(|_| invalid())?;
        let col = col.trim().parse().map_err(|_| invalid())?;
        GridId::new(row, col).ok_or_else(invalid)
    }
}

impl TryFrom<String> for GridId {
    type Error = InvalidGridId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<GridId> for String {
    fn from(id: GridId) -> Self {
        id.to_string()
    }
}

/// The square shown in cell `id` when the board is drawn from `orientation`'s side.
pub fn to_square(id: GridId, orientation: Orientation) -> Square {
    let (file, rank) = match orientation {
        Orientation::White => (id.col, 7 - id.row),
        Orientation::Black => (7 - id.col, id.row),
    };
    Square::from_coords(File::new(u32::from(file)), Rank::new(u32::from(rank)))
}

/// The cell that shows `square` when the board is drawn from `orientation`'s side.
pub fn to_grid_id(square: Square, orientation: Orientation) -> GridId {
    let file = square.file().char() as u8 - b'a';
    let rank = square.rank().char() as u8 - b'1';
    match orientation {
        Orientation::White => GridId {
            row: 7 - rank,
            col: file,
        },
        Orientation::Black => GridId {
            row: rank,
            col: 7 - file,
        },
    }
}
