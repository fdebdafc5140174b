//! Cutting a frame into quadrant files.

use std::path::{Path, PathBuf};

use common::file_utils::{is_fits_file, prefixed_file_name};

use crate::config::SplitConfig;
use crate::error::{Error, Result};
use crate::fits;
use crate::geometry::Tile;

/// A tile written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuadrantFile {
    pub tile: Tile,
    pub path: PathBuf,
}

/// Output path for tile `index`: `{prefix}{index}_{file name}` next to `source`.
pub fn quadrant_path(source: &Path, prefix: &str, index: usize) -> Result<PathBuf> {
    prefixed_file_name(source, &format!("{prefix}{index}_")).ok_or_else(|| Error::InvalidPath {
        path: source.to_path_buf(),
    })
}

/// Writes every tile of `source` to its own FITS file and returns them in
/// index order. The source is not modified; existing outputs are overwritten.
pub fn split_image(source: &Path, config: &SplitConfig) -> Result<Vec<QuadrantFile>> {
    config.validate()?;

    if !is_fits_file(source) {
        tracing::warn!(
            "{} does not have a FITS extension, trying anyway",
            source.display()
        );
    }

    let layout = fits::read_layout(source)?;
    if let Some(expected) = config.expected_dimensions {
        if layout.dimensions != expected {
            return Err(Error::DimensionMismatch {
                path: source.to_path_buf(),
                expected,
                actual: layout.dimensions,
            });
        }
    }

    let quadrants = config
        .grid
        .tiles(layout.dimensions)?
        .into_iter()
        .map(|tile| {
            Ok(QuadrantFile {
                tile,
                path: quadrant_path(source, &config.prefix, tile.index)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    tracing::info!(
        "Splitting {} ({}, {:?}) into {} tiles of {}x{}",
        source.display(),
        layout.dimensions,
        layout.pixel_type,
        quadrants.len(),
        quadrants[0].tile.width,
        quadrants[0].tile.height
    );

    let targets: Vec<(Tile, &Path)> = quadrants
        .iter()
        .map(|q| (q.tile, q.path.as_path()))
        .collect();
    fits::write_tiles(source, layout, &targets)?;

    Ok(quadrants)
}
