//! Helpers shared by unit tests: synthetic FITS frames and a fake solver.

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use fitsio::images::{ImageDescription, ImageType, WriteImage};
use fitsio::FitsFile;

use crate::error::{Error, Result};
use crate::fits::{self, Pointing};
use crate::geometry::ImageDimensions;
use crate::solver::{PlateSolver, SolveRequest, AUXILIARY_SUFFIXES, NEW_IMAGE_SUFFIX};

/// Initialize tracing subscriber for tests.
/// Safe to call multiple times - will only initialize once.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Header card for a synthetic frame.
#[derive(Debug, Clone)]
pub enum TestKey {
    Float(&'static str, f64),
    Text(&'static str, String),
}

impl TestKey {
    pub fn float(name: &'static str, value: f64) -> Self {
        TestKey::Float(name, value)
    }

    pub fn text(name: &'static str, value: &str) -> Self {
        TestKey::Text(name, value.to_string())
    }
}

fn create_fits(path: &Path, data_type: ImageType, dims: ImageDimensions) -> FitsFile {
    // fitsio won't overwrite
    if path.exists() {
        std::fs::remove_file(path).unwrap();
    }
    let shape = dims.shape();
    let description = ImageDescription {
        data_type,
        dimensions: &shape,
    };
    FitsFile::create(path)
        .with_custom_primary(&description)
        .open()
        .unwrap()
}

fn write_keys(fptr: &mut FitsFile, keys: &[TestKey]) {
    let hdu = fptr.primary_hdu().unwrap();
    for key in keys {
        match key {
            TestKey::Float(name, value) => hdu.write_key(fptr, name, *value).unwrap(),
            TestKey::Text(name, value) => hdu.write_key(fptr, name, value.as_str()).unwrap(),
        }
    }
}

/// Writes a float frame whose pixel at (x, y) is `y * 1000 + x` and returns
/// the pixels in row-major order.
pub fn write_test_fits(path: &Path, dims: ImageDimensions, keys: &[TestKey]) -> Vec<f32> {
    let pixels: Vec<f32> = (0..dims.height)
        .flat_map(|y| (0..dims.width).map(move |x| (y * 1000 + x) as f32))
        .collect();

    let mut fptr = create_fits(path, ImageType::Float, dims);
    let hdu = fptr.primary_hdu().unwrap();
    hdu.write_image(&mut fptr, &pixels).unwrap();
    write_keys(&mut fptr, keys);
    pixels
}

/// Writes a frame of the given storage type, e.g. `UnsignedShort` for
/// BITPIX 16 with BZERO 32768 or `Byte` for BITPIX 8 with BZERO -128.
pub fn write_test_image<T: WriteImage>(
    path: &Path,
    dims: ImageDimensions,
    data_type: ImageType,
    pixels: &[T],
) {
    assert_eq!(pixels.len(), dims.pixel_count());
    let mut fptr = create_fits(path, data_type, dims);
    let hdu = fptr.primary_hdu().unwrap();
    hdu.write_image(&mut fptr, pixels).unwrap();
}

pub fn read_f32_pixels(path: &Path) -> Vec<f32> {
    let mut fptr = FitsFile::open(path).unwrap();
    let hdu = fptr.primary_hdu().unwrap();
    hdu.read_image(&mut fptr).unwrap()
}

pub fn has_key(path: &Path, key: &str) -> bool {
    let mut fptr = FitsFile::open(path).unwrap();
    let hdu = fptr.primary_hdu().unwrap();
    hdu.read_key::<f64>(&mut fptr, key).is_ok() || hdu.read_key::<String>(&mut fptr, key).is_ok()
}

/// A fresh 4x4 quadrant file carrying a full coarse WCS.
pub fn write_quadrant(path: &Path, ra: f64, dec: f64) {
    write_test_fits(
        path,
        ImageDimensions::new(4, 4),
        &[
            TestKey::float("CRVAL1", ra),
            TestKey::float("CRVAL2", dec),
            TestKey::float("CRPIX1", 2.5),
            TestKey::float("CRPIX2", 2.5),
        ],
    );
}

// =============================================================================
// Fake solver
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FakeMode {
    /// Writes every byproduct; the `.new` image carries this solution.
    Solve { ra: f64, dec: f64 },
    /// Reports success but only writes the `.axy` file.
    Partial,
    /// Fails like an executable that cannot be launched.
    Broken,
}

/// In-process stand-in for `solve-field`.
#[derive(Debug)]
pub struct FakeSolver {
    pub mode: FakeMode,
    /// Quadrants handed to the solver, in call order.
    pub calls: RefCell<Vec<(PathBuf, Pointing)>>,
    /// Solve calls for these file names fail like `Broken`.
    pub fail_on: Vec<String>,
}

impl FakeSolver {
    pub fn new(mode: FakeMode) -> Self {
        Self {
            mode,
            calls: RefCell::new(Vec::new()),
            fail_on: Vec::new(),
        }
    }

    pub fn solving(ra: f64, dec: f64) -> Self {
        Self::new(FakeMode::Solve { ra, dec })
    }

    pub fn failing_on(mut self, file_name: &str) -> Self {
        self.fail_on.push(file_name.to_string());
        self
    }

    pub fn called_paths(&self) -> Vec<PathBuf> {
        self.calls.borrow().iter().map(|(p, _)| p.clone()).collect()
    }
}

fn spawn_error() -> Error {
    Error::SolverSpawn {
        program: PathBuf::from("fake-solve-field"),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "not installed"),
    }
}

impl PlateSolver for FakeSolver {
    fn solve(&self, request: &SolveRequest<'_>) -> Result<()> {
        self.calls
            .borrow_mut()
            .push((request.image.to_path_buf(), request.hint));

        let name = request
            .image
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.fail_on.contains(&name) {
            return Err(spawn_error());
        }

        let sibling =
            |suffix: &str| common::file_utils::sibling_with_suffix(request.image, suffix).unwrap();

        match self.mode {
            FakeMode::Broken => Err(spawn_error()),
            FakeMode::Partial => {
                std::fs::write(sibling(".axy"), b"sources").unwrap();
                Ok(())
            }
            FakeMode::Solve { ra, dec } => {
                for suffix in AUXILIARY_SUFFIXES {
                    std::fs::write(sibling(suffix), suffix.as_bytes()).unwrap();
                }
                let new_image = sibling(NEW_IMAGE_SUFFIX);
                std::fs::copy(request.image, &new_image).unwrap();

                let mut fptr = FitsFile::edit(&new_image).unwrap();
                let hdu = fptr.primary_hdu().unwrap();
                for (key, value) in [("CRVAL1", ra), ("CRVAL2", dec), ("CRPIX1", 2.5), ("CRPIX2", 2.5)]
                {
                    fits::delete_key(&mut fptr, &new_image, key).unwrap();
                    hdu.write_key(&mut fptr, key, value).unwrap();
                }
                Ok(())
            }
        }
    }
}

/// Writes an executable shell script standing in for `solve-field`.
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}
