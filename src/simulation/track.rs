//! Binary collision surface the cars drive on.
//!
//! A track is rasterised once from a drawing into an occupancy grid and is
//! never modified afterwards. Every coordinate outside the grid counts as an
//! obstacle.

use ndarray::Array2;
use thiserror::Error;

/// Errors raised when building or probing a [`Track`].
#[derive(Debug, Error, PartialEq)]
pub enum TrackError {
    /// A sample point lies outside the representable track coordinates.
    #[error("coordinate ({x}, {y}) lies outside the track")]
    OutOfRange {
        /// Sampled x coordinate.
        x: f32,
        /// Sampled y coordinate.
        y: f32,
    },
    /// The raw pixel buffer does not match the declared dimensions.
    #[error("pixel buffer holds {actual} bytes, expected {expected}")]
    PixelBufferSize {
        /// Expected byte count (`width * height * 4`).
        expected: usize,
        /// Actual byte count.
        actual: usize,
    },
    /// The occupancy grid has no cells.
    #[error("track grid must not be empty")]
    EmptyGrid,
}

/// Immutable occupancy grid. `true` cells are obstacles (off-road).
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    /// Occupancy indexed as `[y, x]`.
    cells: Array2<bool>,
}

impl Track {
    /// Creates a track from an occupancy grid indexed `[y, x]`.
    pub fn new(cells: Array2<bool>) -> Result<Self, TrackError> {
        if cells.is_empty() {
            return Err(TrackError::EmptyGrid);
        }
        Ok(Self { cells })
    }

    /// Creates a track by evaluating `is_obstacle(x, y)` for every pixel.
    pub fn from_fn(
        width: usize,
        height: usize,
        mut is_obstacle: impl FnMut(usize, usize) -> bool,
    ) -> Result<Self, TrackError> {
        Self::new(Array2::from_shape_fn((height, width), |(y, x)| {
            is_obstacle(x, y)
        }))
    }

    /// Converts a row-major RGBA raster into a track.
    ///
    /// Pixels matching `colour_key` (the drawing tool's background colour) and
    /// fully transparent pixels are drivable; anything painted is an obstacle.
    pub fn from_rgba(
        width: usize,
        height: usize,
        pixels: &[u8],
        colour_key: [u8; 3],
    ) -> Result<Self, TrackError> {
        let expected = width * height * 4;
        if pixels.len() != expected {
            return Err(TrackError::PixelBufferSize {
                expected,
                actual: pixels.len(),
            });
        }

        Self::from_fn(width, height, |x, y| {
            let offset = (y * width + x) * 4;
            let rgba = &pixels[offset..offset + 4];
            let keyed = rgba[..3] == colour_key;
            let transparent = rgba[3] == 0;
            !(keyed || transparent)
        })
    }

    /// Track width in pixels.
    pub fn width(&self) -> usize {
        self.cells.ncols()
    }

    /// Track height in pixels.
    pub fn height(&self) -> usize {
        self.cells.nrows()
    }

    /// Returns `true` when `(x, y)` lies inside `[0, width) × [0, height)`.
    #[inline]
    pub fn in_bounds(&self, x: f32, y: f32) -> bool {
        self.cell_index(x, y).is_some()
    }

    /// Looks up the pixel under `(x, y)`.
    ///
    /// Unlike [`Track::is_obstacle`] an out-of-range coordinate is reported as
    /// an error so callers can tell "off the map" apart from "hit a wall".
    #[inline]
    pub fn probe(&self, x: f32, y: f32) -> Result<bool, TrackError> {
        self.cell_index(x, y)
            .map(|index| self.cells[index])
            .ok_or(TrackError::OutOfRange { x, y })
    }

    /// Returns `true` for obstacles and for every coordinate off the track.
    #[inline]
    pub fn is_obstacle(&self, x: f32, y: f32) -> bool {
        self.probe(x, y).unwrap_or(true)
    }

    /// Returns the obstacle flag of an integer pixel, or `None` off the grid.
    #[inline]
    pub fn pixel(&self, x: i64, y: i64) -> Option<bool> {
        if x < 0 || y < 0 {
            return None;
        }
        self.cells.get((y as usize, x as usize)).copied()
    }

    #[inline]
    fn cell_index(&self, x: f32, y: f32) -> Option<(usize, usize)> {
        if !x.is_finite() || !y.is_finite() {
            return None;
        }
        let (col, row) = (x.floor(), y.floor());
        if col < 0.0 || row < 0.0 {
            return None;
        }
        let (col, row) = (col as usize, row as usize);
        (col < self.width() && row < self.height()).then_some((row, col))
    }
}
