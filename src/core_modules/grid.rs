// THEORY:
// The `Grid` is the tiling configuration that turns one frame into
// `rows * columns` rectangular tiles. It owns all of the slicing math and none
// of the pixel math: given a frame size it produces the tile rectangles in
// row-major order, and the sampler averages whatever those rectangles cover.
//
// Tile size is `frame / grid` with integer division. What happens to the
// remainder pixels on the right and bottom edges is the `TilingPolicy`:
// - `DropRemainder` (default): every tile has the same size and the
//   remainder is not covered by any tile.
// - `AbsorbRemainder`: the last column and last row grow to reach the frame
//   edge, so every pixel belongs to exactly one tile.

use crate::error::SamplingError;
use serde::{Deserialize, Serialize};

/// How pixels left over by integer division are assigned to tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TilingPolicy {
    #[default]
    DropRemainder,
    AbsorbRemainder,
}

/// A `rows x columns` tiling of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Grid {
    pub rows: u32,
    pub columns: u32,
    pub tiling: TilingPolicy,
}

/// One tile rectangle in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    pub row: u32,
    pub column: u32,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Tile {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self::new(3, 3)
    }
}

impl Grid {
    pub const fn new(rows: u32, columns: u32) -> Self {
        Self {
            rows,
            columns,
            tiling: TilingPolicy::DropRemainder,
        }
    }

    pub const fn with_tiling(mut self, tiling: TilingPolicy) -> Self {
        self.tiling = tiling;
        self
    }

    /// Number of tiles, and therefore of palette entries.
    pub fn cell_count(&self) -> usize {
        self.rows as usize * self.columns as usize
    }

    /// Checks the grid against a frame size.
    pub fn validate(&self, width: u32, height: u32) -> Result<(), SamplingError> {
        if self.rows == 0 || self.columns == 0 || width < self.columns || height < self.rows {
            return Err(SamplingError::InvalidGrid {
                rows: self.rows,
                columns: self.columns,
                width,
                height,
            });
        }
        Ok(())
    }

    /// The tile at `(row, column)` for a frame of the given size.
    ///
    /// Assumes the grid has already been validated against that size.
    pub fn tile(&self, row: u32, column: u32, width: u32, height: u32) -> Tile {
        let tile_width = width / self.columns;
        let tile_height = height / self.rows;
        let x = column * tile_width;
        let y = row * tile_height;

        let (w, h) = match self.tiling {
            TilingPolicy::DropRemainder => (tile_width, tile_height),
            TilingPolicy::AbsorbRemainder => {
                let w = if column + 1 == self.columns { width - x } else { tile_width };
                let h = if row + 1 == self.rows { height - y } else { tile_height };
                (w, h)
            }
        };

        Tile {
            row,
            column,
            x,
            y,
            width: w,
            height: h,
        }
    }

    /// All tiles of one grid row, left to right.
    pub fn row_tiles(&self, row: u32, width: u32, height: u32) -> impl Iterator<Item = Tile> + '_ {
        (0..self.columns).map(move |column| self.tile(row, column, width, height))
    }

    /// All tiles in row-major order.
    pub fn tiles(&self, width: u32, height: u32) -> Result<Vec<Tile>, SamplingError> {
        self.validate(width, height)?;
        Ok((0..self.rows)
            .flat_map(|row| self.row_tiles(row, width, height))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_zero_and_oversized_grids() {
        assert!(Grid::new(0, 3).validate(10, 10).is_err());
        assert!(Grid::new(3, 0).validate(10, 10).is_err());
        assert!(Grid::new(3, 11).validate(10, 10).is_err());
        assert!(Grid::new(11, 3).validate(10, 10).is_err());
        assert!(Grid::new(10, 10).validate(10, 10).is_ok());
    }

    #[test]
    fn drop_remainder_uses_equal_tiles() {
        let tiles = Grid::new(3, 3).tiles(10, 7).unwrap();
        assert_eq!(tiles.len(), 9);
        for tile in &tiles {
            assert_eq!((tile.width, tile.height), (3, 2));
        }
        let last = tiles[8];
        assert_eq!((last.row, last.column, last.x, last.y), (2, 2, 6, 4));
        // Column 9 and row 6 are not covered by any tile.
        assert!(tiles.iter().all(|t| t.x + t.width <= 9 && t.y + t.height <= 6));
    }

    #[test]
    fn tiles_are_row_major() {
        let tiles = Grid::new(2, 3).tiles(6, 4).unwrap();
        let order: Vec<(u32, u32)> = tiles.iter().map(|t| (t.row, t.column)).collect();
        assert_eq!(order, vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)]);
    }

    #[test]
    fn absorb_remainder_covers_every_pixel_once() {
        let grid = Grid::new(3, 4).with_tiling(TilingPolicy::AbsorbRemainder);
        let (width, height) = (11u32, 8u32);
        let tiles = grid.tiles(width, height).unwrap();

        let mut hits = vec![0u8; (width * height) as usize];
        for t in &tiles {
            for y in t.y..t.y + t.height {
                for x in t.x..t.x + t.width {
                    hits[(y * width + x) as usize] += 1;
                }
            }
        }
        assert!(hits.iter().all(|&h| h == 1));
        assert_eq!(tiles.iter().map(Tile::area).sum::<u64>(), 88);
    }

    #[test]
    fn deserializes_with_default_tiling() {
        let grid: Grid = serde_json::from_str(r#"{"rows":2,"columns":5}"#).unwrap();
        assert_eq!(grid, Grid::new(2, 5));
        let grid: Grid =
            serde_json::from_str(r#"{"rows":2,"columns":5,"tiling":"absorb_remainder"}"#)
                .unwrap();
        assert_eq!(grid.tiling, TilingPolicy::AbsorbRemainder);
    }
}
