// THEORY:
// A `Frame` is one decoded raster image taken from the media source at a point
// in time. It is produced by a `FrameDecoder`, moved to a sampling worker, read
// once and dropped. Because it crosses a thread boundary on every tick, the
// pixel surface lives behind an `Arc` so that handing it off never copies
// pixels.
//
// Every constructor validates the surface. A frame that exists is always
// non-empty, sequential RGBA with `width * height * 4` bytes, so the sampler
// never has to re-check the buffer.

use crate::core_modules::color::{CHANNELS, Color};
use crate::error::SamplingError;
use image::{DynamicImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The color space the decoder declared for a frame's channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorSpace {
    #[default]
    Srgb,
    LinearSrgb,
    DisplayP3,
}

/// An immutable, decoded RGBA8 frame.
#[derive(Debug, Clone)]
pub struct Frame {
    surface: Arc<RgbaImage>,
    color_space: ColorSpace,
}

impl Frame {
    /// Wraps a raw sequential RGBA buffer.
    pub fn from_rgba(width: u32, height: u32, bytes: Vec<u8>) -> Result<Self, SamplingError> {
        if width == 0 || height == 0 {
            return Err(SamplingError::decode(format!(
                "empty frame ({width}x{height})"
            )));
        }
        let expected = width as usize * height as usize * CHANNELS;
        if bytes.len() != expected {
            return Err(SamplingError::decode(format!(
                "expected {expected} bytes for a {width}x{height} RGBA frame, got {}",
                bytes.len()
            )));
        }
        let surface = RgbaImage::from_raw(width, height, bytes)
            .ok_or_else(|| SamplingError::decode("pixel buffer does not match dimensions"))?;
        Ok(Self::from_surface(surface))
    }

    /// Decodes an encoded still image (PNG, JPEG, ...) into a frame.
    pub fn decode(encoded: &[u8]) -> Result<Self, SamplingError> {
        if encoded.is_empty() {
            return Err(SamplingError::decode("empty input"));
        }
        let image = image::load_from_memory(encoded)?;
        Self::from_image(image)
    }

    /// Converts any decoded image to RGBA8.
    pub fn from_image(image: DynamicImage) -> Result<Self, SamplingError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(SamplingError::decode("empty frame (0x0)"));
        }
        Ok(Self::from_surface(image.into_rgba8()))
    }

    /// A frame where every pixel has the same color.
    pub fn filled(width: u32, height: u32, color: Color) -> Result<Self, SamplingError> {
        if width == 0 || height == 0 {
            return Err(SamplingError::decode(format!(
                "empty frame ({width}x{height})"
            )));
        }
        Ok(Self::from_surface(RgbaImage::from_pixel(
            width,
            height,
            image::Rgba(color.into()),
        )))
    }

    fn from_surface(surface: RgbaImage) -> Self {
        Self {
            surface: Arc::new(surface),
            color_space: ColorSpace::default(),
        }
    }

    pub fn with_color_space(mut self, color_space: ColorSpace) -> Self {
        self.color_space = color_space;
        self
    }

    pub fn width(&self) -> u32 {
        self.surface.width()
    }

    pub fn height(&self) -> u32 {
        self.surface.height()
    }

    pub fn color_space(&self) -> ColorSpace {
        self.color_space
    }

    /// The raw sequential RGBA bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.surface.as_raw()
    }

    /// The bytes of row `y`, columns `x .. x + len`.
    pub(crate) fn row_span(&self, x: u32, y: u32, len: u32) -> &[u8] {
        let stride = self.width() as usize * CHANNELS;
        let start = y as usize * stride + x as usize * CHANNELS;
        &self.as_bytes()[start..start + len as usize * CHANNELS]
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        self.surface.get_pixel_checked(x, y).map(|px| Color::from(*px))
    }
}
