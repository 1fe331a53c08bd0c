// THEORY:
// Spatial pooling for one tile. A tile is summarized by the arithmetic mean of
// each channel over every pixel it covers, computed in the frame's native
// encoding. Sums accumulate in `u64` so even a full 8K frame in a single tile
// cannot overflow, and the final division rounds to nearest so a uniform tile
// averages back to exactly its own color.
//
// The walk is row by row over contiguous byte spans of the frame, which keeps
// the inner loop a straight pass over memory.

use crate::core_modules::color::{CHANNELS, Color};
use crate::core_modules::frame::Frame;
use crate::core_modules::grid::Tile;

/// Running per-channel totals for a region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelSums {
    pub red: u64,
    pub green: u64,
    pub blue: u64,
    pub alpha: u64,
    pub count: u64,
}

impl ChannelSums {
    /// Adds a span of sequential RGBA bytes.
    pub fn accumulate(&mut self, span: &[u8]) {
        for px in span.chunks_exact(CHANNELS) {
            self.red += px[0] as u64;
            self.green += px[1] as u64;
            self.blue += px[2] as u64;
            self.alpha += px[3] as u64;
        }
        self.count += (span.len() / CHANNELS) as u64;
    }

    /// The rounded mean color, or `None` for an empty region.
    pub fn mean(&self) -> Option<Color> {
        if self.count == 0 {
            return None;
        }
        let n = self.count;
        let avg = |sum: u64| ((sum + n / 2) / n) as u8;
        Some(Color::new(
            avg(self.red),
            avg(self.green),
            avg(self.blue),
            avg(self.alpha),
        ))
    }
}

/// Sums every pixel of `tile` in `frame`.
pub fn tile_sums(frame: &Frame, tile: &Tile) -> ChannelSums {
    let mut sums = ChannelSums::default();
    for y in tile.y..tile.y + tile.height {
        sums.accumulate(frame.row_span(tile.x, y, tile.width));
    }
    sums
}

/// Average color of `tile`, or `None` if the tile covers no pixels.
pub fn average_color(frame: &Frame, tile: &Tile) -> Option<Color> {
    tile_sums(frame, tile).mean()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::grid::Grid;

    #[test]
    fn mean_rounds_to_nearest() {
        let mut sums = ChannelSums::default();
        sums.accumulate(&[0, 0, 0, 255, 1, 255, 3, 255]);
        assert_eq!(sums.count, 2);
        // (0+1)/2 = 0.5 -> 1, (0+255)/2 = 127.5 -> 128, (0+3)/2 = 1.5 -> 2
        assert_eq!(sums.mean(), Some(Color::new(1, 128, 2, 255)));
    }

    #[test]
    fn empty_region_has_no_mean() {
        assert_eq!(ChannelSums::default().mean(), None);
    }

    #[test]
    fn averages_only_inside_the_tile() {
        // 4x2 frame: left half black, right half white.
        let mut bytes = Vec::new();
        for _ in 0..2 {
            bytes.extend_from_slice(&[0, 0, 0, 255, 0, 0, 0, 255]);
            bytes.extend_from_slice(&[255, 255, 255, 255, 255, 255, 255, 255]);
        }
        let frame = Frame::from_rgba(4, 2, bytes).unwrap();
        let grid = Grid::new(1, 2);

        let left = average_color(&frame, &grid.tile(0, 0, 4, 2));
        let right = average_color(&frame, &grid.tile(0, 1, 4, 2));
        assert_eq!(left, Some(Color::opaque(0, 0, 0)));
        assert_eq!(right, Some(Color::opaque(255, 255, 255)));
    }

    #[test]
    fn large_tiles_do_not_overflow() {
        let frame = Frame::filled(512, 512, Color::new(255, 255, 255, 255)).unwrap();
        let tile = Grid::new(1, 1).tile(0, 0, 512, 512);
        let sums = tile_sums(&frame, &tile);
        assert_eq!(sums.red, 255 * 512 * 512);
        assert_eq!(average_color(&frame, &tile), Some(Color::opaque(255, 255, 255)));
    }
}
