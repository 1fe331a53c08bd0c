// THEORY:
// A `Palette` is the only thing the crate publishes. It is the row-major list of
// tile colors for one sampled frame, tagged with the grid shape and the color
// space it was sampled in. Its length always equals `rows * columns`; the
// constructor refuses anything else, so consumers can index it blindly.

use crate::core_modules::color::Color;
use crate::core_modules::frame::ColorSpace;
use serde::{Serialize, Serializer};
use std::sync::Arc;

/// One average color per grid tile, row-major.
///
/// Cloning is cheap: the colors live in a shared slice, so the same palette can
/// go to the callback, every broadcast subscriber and the latest-value handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Palette {
    rows: u32,
    columns: u32,
    color_space: ColorSpace,
    #[serde(serialize_with = "serialize_colors")]
    colors: Arc<[Color]>,
}

fn serialize_colors<S: Serializer>(colors: &Arc<[Color]>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(colors.iter())
}

impl Palette {
    /// Builds a palette, or `None` if `colors` does not hold exactly `rows * columns` entries.
    pub fn new(rows: u32, columns: u32, color_space: ColorSpace, colors: Vec<Color>) -> Option<Self> {
        if colors.len() != rows as usize * columns as usize {
            return None;
        }
        Some(Self {
            rows,
            columns,
            color_space,
            colors: colors.into(),
        })
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn color_space(&self) -> ColorSpace {
        self.color_space
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Color> {
        self.colors.iter()
    }

    pub fn get(&self, row: u32, column: u32) -> Option<Color> {
        if row >= self.rows || column >= self.columns {
            return None;
        }
        self.colors
            .get(row as usize * self.columns as usize + column as usize)
            .copied()
    }
}

impl<'a> IntoIterator for &'a Palette {
    type Item = &'a Color;
    type IntoIter = std::slice::Iter<'a, Color>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_palette() -> Palette {
        let colors = (0..6).map(|i| Color::opaque(i, 0, 0)).collect();
        Palette::new(2, 3, ColorSpace::Srgb, colors).unwrap()
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(Palette::new(2, 2, ColorSpace::Srgb, vec![Color::default(); 3]).is_none());
    }

    #[test]
    fn get_is_row_major() {
        let palette = sample_palette();
        assert_eq!(palette.len(), 6);
        assert_eq!(palette.get(0, 2), Some(Color::opaque(2, 0, 0)));
        assert_eq!(palette.get(1, 0), Some(Color::opaque(3, 0, 0)));
        assert_eq!(palette.get(2, 0), None);
        assert_eq!(palette.get(0, 3), None);
    }

    #[test]
    fn clones_share_colors() {
        let a = sample_palette();
        let b = a.clone();
        assert!(Arc::ptr_eq(&a.colors, &b.colors));
        assert_eq!(a, b);
    }

    #[test]
    fn serializes_as_flat_object() {
        let palette = Palette::new(1, 1, ColorSpace::DisplayP3, vec![Color::new(1, 2, 3, 4)]).unwrap();
        let json = serde_json::to_value(&palette).unwrap();
        assert_eq!(json["rows"], 1);
        assert_eq!(json["color_space"], "display_p3");
        assert_eq!(json["colors"][0]["blue"], 3);
    }
}
