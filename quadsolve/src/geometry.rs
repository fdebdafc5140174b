//! Image dimensions and the tile grid used to cut a frame into quadrants.
//!
//! Tiles use half-open pixel ranges: a tile at `(x, y)` of size `w × h`
//! covers columns `[x, x + w)` and rows `[y, y + h)`. Rows follow FITS
//! storage order, row 0 being the first NAXIS2 row. With dimensions that
//! divide evenly by the grid the tiles are contiguous, never overlap and
//! cover the whole frame.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::error::{Error, Result};

/// Width and height of a 2-D image in pixels (NAXIS1 × NAXIS2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageDimensions {
    /// Image width in pixels
    pub width: usize,
    /// Image height in pixels
    pub height: usize,
}

impl ImageDimensions {
    /// Size of the TAROT frames this tool was written for.
    pub const TAROT: ImageDimensions = ImageDimensions {
        width: 2048,
        height: 2048,
    };

    pub fn new(width: usize, height: usize) -> Self {
        assert!(width > 0, "Width must be positive");
        assert!(height > 0, "Height must be positive");
        Self { width, height }
    }

    /// Builds dimensions from a fitsio image shape, which is row-major
    /// (`[NAXIS2, NAXIS1]`).
    pub fn from_shape(shape: &[usize]) -> Option<Self> {
        match shape {
            [height, width] if *width > 0 && *height > 0 => Some(Self::new(*width, *height)),
            _ => None,
        }
    }

    /// Shape in fitsio's row-major order.
    pub fn shape(&self) -> [usize; 2] {
        [self.height, self.width]
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }
}

impl fmt::Display for ImageDimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("expected <width>x<height> with positive integers, got '{0}'")]
pub struct ParseSizeError(String);

fn parse_pair(s: &str) -> std::result::Result<(usize, usize), ParseSizeError> {
    let err = || ParseSizeError(s.to_string());
    let (a, b) = s
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(err)?;
    let a: usize = a.trim().parse().map_err(|_| err())?;
    let b: usize = b.trim().parse().map_err(|_| err())?;
    if a == 0 || b == 0 {
        return Err(err());
    }
    Ok((a, b))
}

impl FromStr for ImageDimensions {
    type Err = ParseSizeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (width, height) = parse_pair(s)?;
        Ok(Self::new(width, height))
    }
}

/// A `cols × rows` subdivision of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileGrid {
    pub cols: usize,
    pub rows: usize,
}

impl Default for TileGrid {
    fn default() -> Self {
        Self::QUADRANTS
    }
}

impl fmt::Display for TileGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.cols, self.rows)
    }
}

impl FromStr for TileGrid {
    type Err = ParseSizeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (cols, rows) = parse_pair(s)?;
        Ok(Self { cols, rows })
    }
}

impl TileGrid {
    /// The 2×2 quadrant split.
    pub const QUADRANTS: TileGrid = TileGrid { cols: 2, rows: 2 };

    pub fn tile_count(&self) -> usize {
        self.cols * self.rows
    }

    /// Size of every tile for an image of `dimensions`.
    pub fn tile_dimensions(&self, dimensions: ImageDimensions) -> Result<ImageDimensions> {
        if self.cols == 0
            || self.rows == 0
            || dimensions.width % self.cols != 0
            || dimensions.height % self.rows != 0
        {
            return Err(Error::IndivisibleDimensions {
                dimensions,
                grid: *self,
            });
        }
        Ok(ImageDimensions::new(
            dimensions.width / self.cols,
            dimensions.height / self.rows,
        ))
    }

    /// All tiles in row-major order, indexed from 1.
    ///
    /// For the quadrant grid: 1 = first rows / first columns, 2 = first rows /
    /// last columns, 3 = last rows / first columns, 4 = last rows / last columns.
    /// Numbering that walks columns first (FITS section scripts often do)
    /// swaps 2 and 3, so a `C2_` file from such a tool holds this tile 3.
    pub fn tiles(&self, dimensions: ImageDimensions) -> Result<Vec<Tile>> {
        let size = self.tile_dimensions(dimensions)?;
        let tiles = (0..self.rows)
            .flat_map(|row| (0..self.cols).map(move |col| (row, col)))
            .enumerate()
            .map(|(i, (row, col))| Tile {
                index: i + 1,
                row,
                col,
                x: col * size.width,
                y: row * size.height,
                width: size.width,
                height: size.height,
            })
            .collect();
        Ok(tiles)
    }
}

/// One cell of a [`TileGrid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tile {
    /// 1-based row-major position, used in the output file prefix.
    pub index: usize,
    pub row: usize,
    pub col: usize,
    /// First column.
    pub x: usize,
    /// First row.
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Tile {
    pub fn dimensions(&self) -> ImageDimensions {
        ImageDimensions::new(self.width, self.height)
    }

    pub fn columns(&self) -> std::ops::Range<usize> {
        self.x..self.x + self.width
    }

    pub fn rows(&self) -> std::ops::Range<usize> {
        self.y..self.y + self.height
    }
}

/// Copies the pixels of `tile` out of a row-major `pixels` buffer.
pub fn extract_tile<T: Copy>(pixels: &[T], dimensions: ImageDimensions, tile: &Tile) -> Vec<T> {
    assert_eq!(
        pixels.len(),
        dimensions.pixel_count(),
        "Pixel count mismatch"
    );
    assert!(
        tile.x + tile.width <= dimensions.width && tile.y + tile.height <= dimensions.height,
        "Tile {tile:?} exceeds {dimensions}"
    );

    let mut out = Vec::with_capacity(tile.width * tile.height);
    for row in tile.rows() {
        let start = row * dimensions.width + tile.x;
        out.extend_from_slice(&pixels[start..start + tile.width]);
    }
    out
}
