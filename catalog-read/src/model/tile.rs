//! Quad-tree tile addressing.
//!
//! A [`TileKey`] names a cell of the level-based quad tree used by HERE-tile
//! partitioned layers. Level `n` has `2^n x 2^n` tiles. The partition id of a
//! tile is its HERE tile id: the row and column bits interleaved (column on
//! even bits, row on odd bits) with a leading `1` bit marking the level.
//!
//! ```text
//! level 1:   +-----+-----+
//!            | 0,0 | 0,1 |      row,col
//!            +-----+-----+
//!            | 1,0 | 1,1 |
//!            +-----+-----+
//! ```

use std::fmt;

/// Address of one tile in the quad tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    level: u32,
    row: u32,
    column: u32,
}

impl TileKey {
    /// Deepest supported level.
    pub const MAX_LEVEL: u32 = 31;

    /// Creates a tile key, returning `None` if the coordinates are out of
    /// range for `level`.
    pub fn new(level: u32, row: u32, column: u32) -> Option<Self> {
        if level > Self::MAX_LEVEL {
            return None;
        }
        let size = 1u64 << level;
        if u64::from(row) >= size || u64::from(column) >= size {
            return None;
        }
        Some(Self { level, row, column })
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn row(&self) -> u32 {
        self.row
    }

    pub fn column(&self) -> u32 {
        self.column
    }

    /// The enclosing tile one level up, or `None` at level 0.
    pub fn parent(&self) -> Option<TileKey> {
        if self.level == 0 {
            return None;
        }
        Some(TileKey {
            level: self.level - 1,
            row: self.row >> 1,
            column: self.column >> 1,
        })
    }

    /// The enclosing tile at `level`, which must not be deeper than this tile.
    pub fn ancestor(&self, level: u32) -> Option<TileKey> {
        if level > self.level {
            return None;
        }
        let shift = self.level - level;
        Some(TileKey {
            level,
            row: self.row >> shift,
            column: self.column >> shift,
        })
    }

    /// The four tiles one level down, or an empty list at [`Self::MAX_LEVEL`].
    pub fn children(&self) -> Vec<TileKey> {
        if self.level >= Self::MAX_LEVEL {
            return Vec::new();
        }
        let mut children = Vec::with_capacity(4);
        for dr in 0..2 {
            for dc in 0..2 {
                children.push(TileKey {
                    level: self.level + 1,
                    row: self.row * 2 + dr,
                    column: self.column * 2 + dc,
                });
            }
        }
        children
    }

    /// The numeric HERE tile id.
    pub fn to_quad_key(&self) -> u64 {
        let mut key = 0u64;
        for bit in 0..self.level {
            key |= u64::from((self.column >> bit) & 1) << (2 * bit);
            key |= u64::from((self.row >> bit) & 1) << (2 * bit + 1);
        }
        key | (1u64 << (2 * self.level))
    }

    /// Decodes a numeric HERE tile id.
    pub fn from_quad_key(key: u64) -> Option<TileKey> {
        if key == 0 {
            return None;
        }
        let marker = 63 - key.leading_zeros();
        if marker % 2 != 0 {
            return None;
        }
        let level = marker / 2;
        let mut row = 0u32;
        let mut column = 0u32;
        for bit in 0..level {
            column |= (((key >> (2 * bit)) & 1) as u32) << bit;
            row |= (((key >> (2 * bit + 1)) & 1) as u32) << bit;
        }
        TileKey::new(level, row, column)
    }

    /// The partition id of this tile (decimal HERE tile id).
    pub fn to_here_tile(&self) -> String {
        self.to_quad_key().to_string()
    }

    /// Parses a decimal HERE tile id.
    pub fn from_here_tile(id: &str) -> Option<TileKey> {
        id.parse::<u64>().ok().and_then(Self::from_quad_key)
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.level, self.row, self.column)
    }
}
