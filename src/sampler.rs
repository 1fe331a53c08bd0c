// THEORY:
// The `FrameColorSampler` is the algorithmic core: one frame and one grid in,
// one palette out. It is the bridge between a raw pixel surface and the
// palette that the rest of the system publishes.
//
// Key architectural principles:
// 1.  **Pure function**: `sample` reads the frame and nothing else. The same
//     frame and grid always produce the same palette, bit for bit.
// 2.  **All or nothing**: the grid is validated before any pixel is touched,
//     and a tile that cannot be averaged fails the whole call. There is no
//     partial palette.
// 3.  **One pool per sampler**: large frames are averaged one grid row per
//     job on a rayon pool built once with the sampler. Rows are collected back
//     in order, so the parallel path returns exactly what the single-threaded
//     path returns.

use crate::core_modules::average::average_color;
use crate::core_modules::color::Color;
use crate::core_modules::frame::Frame;
use crate::core_modules::grid::Grid;
use crate::core_modules::palette::Palette;
use crate::error::SamplingError;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{trace, warn};

/// Frames smaller than this many pixels are always sampled on the calling thread.
const PARALLEL_PIXEL_THRESHOLD: u64 = 1 << 18;

/// Computes per-tile average colors for a frame.
#[derive(Debug, Clone)]
pub struct FrameColorSampler {
    workers: usize,
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl Default for FrameColorSampler {
    fn default() -> Self {
        Self::new(num_cpus::get())
    }
}

impl FrameColorSampler {
    /// A sampler that splits large frames across a pool of `workers` threads.
    ///
    /// If the pool cannot be built the sampler falls back to the calling
    /// thread.
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        let pool = if workers > 1 {
            build_thread_pool(workers)
        } else {
            None
        };
        Self {
            workers: if pool.is_some() { workers } else { 1 },
            pool,
        }
    }

    /// A sampler that never spawns threads.
    pub fn single_threaded() -> Self {
        Self::new(1)
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Averages every tile of `grid` over `frame`, row-major.
    pub fn sample(&self, frame: &Frame, grid: Grid) -> Result<Palette, SamplingError> {
        let (width, height) = (frame.width(), frame.height());
        grid.validate(width, height)?;

        let pixels = width as u64 * height as u64;
        let pool = self
            .pool
            .as_deref()
            .filter(|_| pixels >= PARALLEL_PIXEL_THRESHOLD && grid.rows > 1);

        let colors = match pool {
            Some(pool) => sample_parallel(pool, frame, grid)?,
            None => sample_rows(frame, grid, 0..grid.rows)?,
        };

        trace!(
            rows = grid.rows,
            columns = grid.columns,
            width,
            height,
            parallel = pool.is_some(),
            "sampled frame"
        );

        Palette::new(grid.rows, grid.columns, frame.color_space(), colors).ok_or_else(|| {
            SamplingError::decode("tile count does not match grid shape")
        })
    }

    /// Decodes an encoded still image and samples it.
    pub fn sample_encoded(&self, encoded: &[u8], grid: Grid) -> Result<Palette, SamplingError> {
        let frame = Frame::decode(encoded)?;
        self.sample(&frame, grid)
    }
}

fn sample_rows(
    frame: &Frame,
    grid: Grid,
    rows: std::ops::Range<u32>,
) -> Result<Vec<Color>, SamplingError> {
    let (width, height) = (frame.width(), frame.height());
    let mut colors = Vec::with_capacity(rows.len() * grid.columns as usize);
    for row in rows {
        for tile in grid.row_tiles(row, width, height) {
            let color = average_color(frame, &tile).ok_or_else(|| {
                SamplingError::decode(format!(
                    "tile ({}, {}) covers no pixels",
                    tile.row, tile.column
                ))
            })?;
            colors.push(color);
        }
    }
    Ok(colors)
}

fn sample_parallel(
    pool: &rayon::ThreadPool,
    frame: &Frame,
    grid: Grid,
) -> Result<Vec<Color>, SamplingError> {
    let rows: Vec<Vec<Color>> = pool.install(|| {
        (0..grid.rows)
            .into_par_iter()
            .map(|row| sample_rows(frame, grid, row..row + 1))
            .collect::<Result<Vec<Vec<Color>>, SamplingError>>()
    })?;
    Ok(rows.into_iter().flatten().collect())
}

fn build_thread_pool(workers: usize) -> Option<Arc<rayon::ThreadPool>> {
    match rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|index| format!("palette-sampler-{index}"))
        .build()
    {
        Ok(pool) => Some(Arc::new(pool)),
        Err(err) => {
            warn!(%err, workers, "failed to build sampling pool, sampling on the calling thread");
            None
        }
    }
}
