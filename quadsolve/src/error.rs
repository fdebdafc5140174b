use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use thiserror::Error;

use crate::geometry::{ImageDimensions, TileGrid};

/// Errors produced while splitting, sanitizing or solving quadrants.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Path has no file name: '{}'", .path.display())]
    InvalidPath { path: PathBuf },

    #[error("FITS operation failed on '{}': {source}", .path.display())]
    Fits {
        path: PathBuf,
        #[source]
        source: fitsio::errors::Error,
    },

    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Primary HDU of '{}' is not an image", .path.display())]
    NotAnImage { path: PathBuf },

    #[error("'{}' has {naxis} axes, only 2-D images can be split", .path.display())]
    UnsupportedShape { path: PathBuf, naxis: usize },

    #[error("'{}' is {actual}, expected {expected}", .path.display())]
    DimensionMismatch {
        path: PathBuf,
        expected: ImageDimensions,
        actual: ImageDimensions,
    },

    #[error("{dimensions} image cannot be divided evenly into a {grid} grid")]
    IndivisibleDimensions {
        dimensions: ImageDimensions,
        grid: TileGrid,
    },

    #[error("'{}' is missing header keys: {}", .path.display(), .keys.join(", "))]
    MissingKeys { path: PathBuf, keys: Vec<String> },

    #[error(
        "'{}' has no pointing (tried CRVAL1/CRVAL2, RA/DEC, OBJCTRA/OBJCTDEC)",
        .path.display()
    )]
    MissingPointing { path: PathBuf },

    #[error("Pointing out of range in '{}': RA={ra}, Dec={dec}", .path.display())]
    InvalidPointing { path: PathBuf, ra: f64, dec: f64 },

    #[error("Failed to launch plate solver '{}': {source}", .program.display())]
    SolverSpawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Plate solver {status} for '{}': {stderr}", .path.display())]
    SolverFailed {
        path: PathBuf,
        status: ExitStatus,
        stderr: String,
    },

    #[error(
        "Plate solver left no {} for '{}'",
        display_paths(.missing),
        .path.display()
    )]
    MissingOutputs { path: PathBuf, missing: Vec<PathBuf> },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn fits(path: &Path) -> impl FnOnce(fitsio::errors::Error) -> Error + '_ {
        move |source| Error::Fits {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn io(path: &Path) -> impl FnOnce(io::Error) -> Error + '_ {
        move |source| Error::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
