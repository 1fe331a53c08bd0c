// THEORY:
// The media layer is everything the scheduler needs from "a video that plays".
// It is split in two so that timing and decoding can be tested separately:
//
// 1.  **`FrameDecoder`**: knows how long the media is and how to produce the
//     frame shown at a given position. It has no notion of time passing.
// 2.  **`MediaSource`**: the transport. It plays, pauses, seeks and reports
//     its position, and captures the frame at that position.
// 3.  **Deferred capture**: the scheduler asks a source for a `CaptureJob`,
//     a snapshot of the playhead that decodes later on the blocking pool.
//     Transport calls stay cheap and decoding never runs on the session task.
//
// `ClockedSource` joins the two. Its position is derived from the tokio clock,
// so under a paused test runtime playback advances exactly as far as the test
// advances time. `ImageSequence` is a decoder over a directory of still images
// played at a fixed frame rate.

use crate::core_modules::frame::Frame;
use crate::error::{MediaError, SamplingError};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

const SEQUENCE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "webp", "gif", "tif", "tiff"];

/// Produces frames for positions within a piece of media.
pub trait FrameDecoder: Send + Sync + 'static {
    fn duration(&self) -> Duration;

    /// The frame displayed at `position`.
    fn decode_at(&self, position: Duration) -> Result<Frame, SamplingError>;
}

/// A frame capture that has been scheduled but not yet decoded.
pub type CaptureJob = Box<dyn FnOnce() -> Result<Frame, SamplingError> + Send>;

/// A continuous, seekable media source.
pub trait MediaSource: Send + 'static {
    fn duration(&self) -> Duration;

    fn position(&self) -> Duration;

    fn is_playing(&self) -> bool;

    fn play(&mut self);

    fn pause(&mut self);

    /// Moves the playhead, clamped to `duration()`.
    fn seek(&mut self, position: Duration);

    /// Captures the frame at the current position.
    fn capture_frame(&mut self) -> Result<Frame, SamplingError>;

    /// Pins the current position and returns the decode as a job that may run
    /// on another thread. The default captures immediately.
    fn capture_job(&mut self) -> CaptureJob {
        let frame = self.capture_frame();
        Box::new(move || frame)
    }

    fn has_ended(&self) -> bool {
        self.position() >= self.duration()
    }

    fn remaining(&self) -> Duration {
        self.duration().saturating_sub(self.position())
    }
}

impl<S: MediaSource + ?Sized> MediaSource for Box<S> {
    fn duration(&self) -> Duration {
        (**self).duration()
    }

    fn position(&self) -> Duration {
        (**self).position()
    }

    fn is_playing(&self) -> bool {
        (**self).is_playing()
    }

    fn play(&mut self) {
        (**self).play()
    }

    fn pause(&mut self) {
        (**self).pause()
    }

    fn seek(&mut self, position: Duration) {
        (**self).seek(position)
    }

    fn capture_frame(&mut self) -> Result<Frame, SamplingError> {
        (**self).capture_frame()
    }

    fn capture_job(&mut self) -> CaptureJob {
        (**self).capture_job()
    }
}

/// Plays a `FrameDecoder` against the tokio clock.
#[derive(Debug)]
pub struct ClockedSource<D> {
    decoder: Arc<D>,
    /// Position at the moment playback last started or was paused.
    anchor: Duration,
    playing_since: Option<Instant>,
}

impl<D: FrameDecoder> ClockedSource<D> {
    /// A paused source at position zero.
    pub fn new(decoder: D) -> Self {
        Self {
            decoder: Arc::new(decoder),
            anchor: Duration::ZERO,
            playing_since: None,
        }
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }
}

impl<D: FrameDecoder> MediaSource for ClockedSource<D> {
    fn duration(&self) -> Duration {
        self.decoder.duration()
    }

    fn position(&self) -> Duration {
        let elapsed = self
            .playing_since
            .map(|since| since.elapsed())
            .unwrap_or_default();
        (self.anchor + elapsed).min(self.duration())
    }

    fn is_playing(&self) -> bool {
        self.playing_since.is_some()
    }

    fn play(&mut self) {
        if self.playing_since.is_none() {
            self.playing_since = Some(Instant::now());
        }
    }

    fn pause(&mut self) {
        self.anchor = self.position();
        self.playing_since = None;
    }

    fn seek(&mut self, position: Duration) {
        self.anchor = position.min(self.duration());
        if self.playing_since.is_some() {
            self.playing_since = Some(Instant::now());
        }
    }

    fn capture_frame(&mut self) -> Result<Frame, SamplingError> {
        self.decoder.decode_at(self.position())
    }

    fn capture_job(&mut self) -> CaptureJob {
        let decoder = Arc::clone(&self.decoder);
        let position = self.position();
        Box::new(move || decoder.decode_at(position))
    }
}

/// A sequence of still frames played back at a fixed rate.
#[derive(Debug, Clone)]
pub struct ImageSequence {
    frames: Vec<Frame>,
    fps: f64,
    duration: Duration,
}

impl ImageSequence {
    pub fn new(frames: Vec<Frame>, fps: f64) -> Result<Self, MediaError> {
        if !(fps.is_finite() && fps > 0.0) {
            return Err(MediaError::InvalidFrameRate(fps));
        }
        if frames.is_empty() {
            return Err(MediaError::Empty("frame list".into()));
        }
        let duration = Duration::try_from_secs_f64(frames.len() as f64 / fps)
            .map_err(|_| MediaError::InvalidFrameRate(fps))?;
        Ok(Self {
            frames,
            fps,
            duration,
        })
    }

    /// Loads every image in `dir`, ordered by file name.
    pub fn open_dir(dir: impl AsRef<Path>, fps: f64) -> Result<Self, MediaError> {
        let dir = dir.as_ref();
        let io_err = |source| MediaError::Io {
            path: dir.display().to_string(),
            source,
        };

        let mut paths: Vec<_> = std::fs::read_dir(dir)
            .map_err(io_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(io_err)?
            .into_iter()
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| SEQUENCE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            })
            .collect();
        paths.sort();

        let mut frames = Vec::with_capacity(paths.len());
        for path in &paths {
            let image = image::open(path).map_err(|source| MediaError::Decode {
                path: path.display().to_string(),
                source,
            })?;
            match Frame::from_image(image) {
                Ok(frame) => frames.push(frame),
                Err(err) => debug!(path = %path.display(), %err, "skipping empty image"),
            }
        }

        if frames.is_empty() {
            return Err(MediaError::Empty(dir.display().to_string()));
        }
        info!(dir = %dir.display(), frames = frames.len(), fps, "loaded image sequence");
        Self::new(frames, fps)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Index of the frame displayed at `position`.
    pub fn index_at(&self, position: Duration) -> usize {
        let index = (position.as_secs_f64() * self.fps).floor() as usize;
        index.min(self.frames.len() - 1)
    }
}

impl FrameDecoder for ImageSequence {
    fn duration(&self) -> Duration {
        self.duration
    }

    fn decode_at(&self, position: Duration) -> Result<Frame, SamplingError> {
        self.frames
            .get(self.index_at(position))
            .cloned()
            .ok_or_else(|| SamplingError::decode("no frame at position"))
    }
}
