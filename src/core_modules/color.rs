// THEORY:
// The `Color` module is the smallest value in the palette pipeline. It is a
// "dumb" data container for one averaged tile: four 8-bit channels in the
// frame's native encoding, plus a few read-only views of those channels that a
// gradient renderer typically wants (normalized floats, hex, luminance).
//
// Key principles:
// 1.  **Value semantics**: a `Color` has no identity beyond its channel values.
//     It is `Copy`, compares by value and hashes by value.
// 2.  **Native encoding**: channels are stored exactly as averaged. Nothing here
//     gamma-decodes or converts between color spaces; the frame's declared
//     color space travels with the `Palette`, not with each `Color`.
// 3.  **Byte bridge**: `TryFrom<&[u8]>` and `From<Color> for [u8; 4]` are the
//     only places that know about the sequential RGBA byte layout.

use serde::{Deserialize, Serialize};
use std::fmt;

pub type Channel = u8;
pub type NormalizedChannel = f32;
pub type Luminance = f64;

pub const CHANNELS: usize = 4;

/// A single RGBA color, 8 bits per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Color {
    /// The red channel value (0-255).
    pub red: Channel,
    /// The green channel value (0-255).
    pub green: Channel,
    /// The blue channel value (0-255).
    pub blue: Channel,
    /// The alpha (opacity) channel value (0-255).
    pub alpha: Channel,
}

impl Color {
    pub const TRANSPARENT: Color = Color::new(0, 0, 0, 0);

    pub const fn new(red: Channel, green: Channel, blue: Channel, alpha: Channel) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    pub const fn opaque(red: Channel, green: Channel, blue: Channel) -> Self {
        Self::new(red, green, blue, u8::MAX)
    }

    /// Builds a color from normalized `[0, 1]` channels, clamping out-of-range input.
    pub fn from_normalized(red: f32, green: f32, blue: f32, alpha: f32) -> Self {
        let to_byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as Channel;
        Self::new(to_byte(red), to_byte(green), to_byte(blue), to_byte(alpha))
    }

    /// The channels scaled to `[0, 1]`, in `(r, g, b, a)` order.
    pub fn normalized(&self) -> [NormalizedChannel; CHANNELS] {
        [
            self.red as NormalizedChannel / 255.0,
            self.green as NormalizedChannel / 255.0,
            self.blue as NormalizedChannel / 255.0,
            self.alpha as NormalizedChannel / 255.0,
        ]
    }

    /// Luminance estimate (Rec. 601 luma) on the 0..255 scale.
    pub fn luminance(&self) -> Luminance {
        0.299_f64 * self.red as f64 + 0.587_f64 * self.green as f64 + 0.114_f64 * self.blue as f64
    }

    /// `#rrggbbaa`, lowercase.
    pub fn to_hex(&self) -> String {
        format!(
            "#{:02x}{:02x}{:02x}{:02x}",
            self.red, self.green, self.blue, self.alpha
        )
    }

    /// Human readable RGB triple, e.g. `R: 12, G: 200, B: 7`. Alpha is omitted.
    pub fn rgb_description(&self) -> String {
        format!("R: {}, G: {}, B: {}", self.red, self.green, self.blue)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl TryFrom<&[u8]> for Color {
    type Error = usize;

    /// Fails with the offending slice length unless exactly four bytes are given.
    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        match bytes {
            [r, g, b, a] => Ok(Color::new(*r, *g, *b, *a)),
            _ => Err(bytes.len()),
        }
    }
}

impl From<image::Rgba<u8>> for Color {
    fn from(px: image::Rgba<u8>) -> Self {
        let [r, g, b, a] = px.0;
        Color::new(r, g, b, a)
    }
}

impl From<Color> for [u8; CHANNELS] {
    fn from(color: Color) -> Self {
        [color.red, color.green, color.blue, color.alpha]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_spans_unit_interval() {
        assert_eq!(Color::opaque(0, 0, 0).normalized(), [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(
            Color::new(255, 255, 255, 0).normalized(),
            [1.0, 1.0, 1.0, 0.0]
        );
    }

    #[test]
    fn from_normalized_clamps_and_rounds() {
        let c = Color::from_normalized(-1.0, 0.5, 2.0, 1.0);
        assert_eq!(c, Color::new(0, 128, 255, 255));
    }

    #[test]
    fn hex_and_description() {
        let c = Color::new(0x12, 0xab, 0x00, 0xff);
        assert_eq!(c.to_hex(), "#12ab00ff");
        assert_eq!(c.to_string(), "#12ab00ff");
        assert_eq!(c.rgb_description(), "R: 18, G: 171, B: 0");
    }

    #[test]
    fn byte_conversions() {
        let bytes: &[u8] = &[1, 2, 3, 4];
        let c = Color::try_from(bytes).unwrap();
        assert_eq!(<[u8; 4]>::from(c), [1, 2, 3, 4]);
        assert_eq!(Color::try_from(&bytes[..3]), Err(3));
    }

    #[test]
    fn luminance_of_white_is_full_scale() {
        let l = Color::opaque(255, 255, 255).luminance();
        assert!((l - 255.0).abs() < 1e-9);
    }
}
