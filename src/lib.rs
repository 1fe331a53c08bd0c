// THEORY:
// This file is the entry point for the `ambient_palette` library crate. It
// exposes two things: a pure sampler that turns one video frame into a grid of
// average colors, and a scheduler that plays a looping media source and
// publishes a fresh palette at a fixed cadence.
//
// Rendering those palettes (gradients, blur, animation) is deliberately not
// here. Consumers subscribe to palettes and draw them however they like.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod media;
pub mod sampler;
pub mod scheduler;
pub mod ticker;

pub use config::AppConfig;
pub use core_modules::color::Color;
pub use core_modules::frame::{ColorSpace, Frame};
pub use core_modules::grid::{Grid, Tile, TilingPolicy};
pub use core_modules::palette::Palette;
pub use error::{ConfigError, MediaError, SamplingError, SchedulerError};
pub use media::{CaptureJob, ClockedSource, FrameDecoder, ImageSequence, MediaSource};
pub use sampler::FrameColorSampler;
pub use scheduler::{PeriodicSamplingScheduler, SessionConfig, SessionStatus};
pub use ticker::{IntervalTicker, ManualTicker, TickHandle, Ticker};
