//! Files `solve-field` writes next to the image it solves.

use std::path::{Path, PathBuf};

use common::file_utils::sibling_with_suffix;

use crate::error::{Error, Result};

/// Auxiliary outputs, in the order they are removed.
pub const AUXILIARY_SUFFIXES: [&str; 7] = [
    "-indx.xyls", // index stars
    ".axy",       // extracted sources
    ".corr",      // correspondences
    ".match",     // matched quad
    ".rdls",      // sky positions
    ".solved",    // success flag
    ".wcs",       // WCS header
];

/// The calibrated copy of the input image.
pub const NEW_IMAGE_SUFFIX: &str = ".new";

/// Byproduct paths for one solved image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Byproducts {
    image: PathBuf,
    auxiliary: Vec<PathBuf>,
    new_image: PathBuf,
}

impl Byproducts {
    pub fn for_image(image: &Path) -> Result<Self> {
        let sibling = |suffix: &str| {
            sibling_with_suffix(image, suffix).ok_or_else(|| Error::InvalidPath {
                path: image.to_path_buf(),
            })
        };
        Ok(Self {
            image: image.to_path_buf(),
            auxiliary: AUXILIARY_SUFFIXES
                .iter()
                .copied()
                .map(&sibling)
                .collect::<Result<_>>()?,
            new_image: sibling(NEW_IMAGE_SUFFIX)?,
        })
    }

    pub fn image(&self) -> &Path {
        &self.image
    }

    pub fn auxiliary(&self) -> &[PathBuf] {
        &self.auxiliary
    }

    pub fn new_image(&self) -> &Path {
        &self.new_image
    }

    /// Every byproduct name: the auxiliary files plus the calibrated image.
    pub fn all(&self) -> impl Iterator<Item = &Path> {
        self.auxiliary
            .iter()
            .map(PathBuf::as_path)
            .chain(std::iter::once(self.new_image.as_path()))
    }

    /// Expected outputs that are not on disk.
    pub fn missing(&self) -> Vec<PathBuf> {
        self.all()
            .filter(|p| !p.exists())
            .map(Path::to_path_buf)
            .collect()
    }

    /// Byproducts currently on disk.
    pub fn present(&self) -> Vec<PathBuf> {
        self.all()
            .filter(|p| p.exists())
            .map(Path::to_path_buf)
            .collect()
    }

    /// Deletes the auxiliary files and moves the calibrated image over the input.
    ///
    /// Call only after [`Byproducts::missing`] came back empty: a missing
    /// file here is an I/O error.
    pub fn promote(&self) -> Result<()> {
        for path in &self.auxiliary {
            std::fs::remove_file(path).map_err(Error::io(path))?;
            tracing::trace!("Removed {}", path.display());
        }
        std::fs::rename(&self.new_image, &self.image).map_err(Error::io(&self.new_image))?;
        tracing::debug!(
            "Replaced {} with {}",
            self.image.display(),
            self.new_image.display()
        );
        Ok(())
    }
}
