//! FITS access on top of `fitsio`.
//!
//! Every function opens its own handle and drops it before returning, so no
//! file stays open across pipeline stages.

use std::ffi::CString;
use std::os::raw::{c_int, c_long};
use std::fmt;
use std::path::Path;

use fitsio::hdu::{FitsHdu, HduInfo};
use fitsio::images::{ReadImage, WriteImage};
use fitsio::FitsFile;

use crate::error::{Error, Result};
use crate::geometry::{extract_tile, ImageDimensions, Tile};

/// cfitsio status for a keyword that is not in the header.
const KEY_NO_EXIST: i32 = 202;

/// Pixel storage type of an image HDU.
///
/// This is the BZERO/BSCALE-equivalent type, so the usual camera frame with
/// `BITPIX = 16, BZERO = 32768` is `UInt16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelType {
    UInt8,
    Int8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
}

impl PixelType {
    /// Maps a cfitsio `*_IMG` code.
    fn from_img_code(code: i32) -> Option<Self> {
        match code {
            8 => Some(PixelType::UInt8),
            10 => Some(PixelType::Int8),
            16 => Some(PixelType::Int16),
            20 => Some(PixelType::UInt16),
            32 => Some(PixelType::Int32),
            40 => Some(PixelType::UInt32),
            64 => Some(PixelType::Int64),
            80 => Some(PixelType::UInt64),
            -32 => Some(PixelType::Float32),
            -64 => Some(PixelType::Float64),
            _ => None,
        }
    }
}

/// Shape and type of the primary image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageLayout {
    pub dimensions: ImageDimensions,
    pub pixel_type: PixelType,
}

pub(crate) fn open(path: &Path) -> Result<FitsFile> {
    FitsFile::open(path).map_err(Error::fits(path))
}

pub(crate) fn edit(path: &Path) -> Result<FitsFile> {
    FitsFile::edit(path).map_err(Error::fits(path))
}

pub(crate) fn primary_hdu(fptr: &mut FitsFile, path: &Path) -> Result<FitsHdu> {
    fptr.primary_hdu().map_err(Error::fits(path))
}

/// Reads the primary HDU's dimensions and pixel type. Only 2-D images qualify.
pub fn read_layout(path: &Path) -> Result<ImageLayout> {
    let mut fptr = open(path)?;
    let hdu = primary_hdu(&mut fptr, path)?;

    let dimensions = match &hdu.info {
        HduInfo::ImageInfo { shape, .. } => {
            ImageDimensions::from_shape(shape).ok_or_else(|| Error::UnsupportedShape {
                path: path.to_path_buf(),
                naxis: shape.len(),
            })?
        }
        _ => {
            return Err(Error::NotAnImage {
                path: path.to_path_buf(),
            })
        }
    };

    // fitsio's ImageType follows BITPIX alone; the equivalent type also
    // accounts for BZERO, which is what the pixels must be read as.
    let mut code = 0;
    let mut status = 0;
    // SAFETY: `fptr` is open and positioned on the primary HDU.
    unsafe {
        fitsio::sys::ffgiet(fptr.as_raw(), &mut code, &mut status);
    }
    fitsio::errors::check_status(status).map_err(Error::fits(path))?;
    let pixel_type = PixelType::from_img_code(code).ok_or_else(|| Error::NotAnImage {
        path: path.to_path_buf(),
    })?;

    Ok(ImageLayout {
        dimensions,
        pixel_type,
    })
}

/// Reads an optional header key, `None` if absent or not convertible.
pub fn read_key_optional<T: fitsio::headers::ReadsKey>(path: &Path, key: &str) -> Result<Option<T>> {
    let mut fptr = open(path)?;
    let hdu = primary_hdu(&mut fptr, path)?;
    Ok(hdu.read_key(&mut fptr, key).ok())
}

/// Deletes `key` from the current HDU. Returns `false` if it was not present.
///
/// The safe `fitsio` API has no keyword deletion, so this goes through
/// cfitsio's `ffdkey` directly.
pub(crate) fn delete_key(fptr: &mut FitsFile, path: &Path, key: &str) -> Result<bool> {
    let c_key = CString::new(key)
        .map_err(|_| Error::InvalidConfig(format!("keyword '{key}' contains a NUL byte")))?;
    let mut status = 0;
    // SAFETY: `fptr` is an open handle positioned on the HDU to edit and
    // `c_key` outlives the call.
    unsafe {
        fitsio::sys::ffdkey(fptr.as_raw(), c_key.as_ptr(), &mut status);
    }
    match status {
        0 => Ok(true),
        KEY_NO_EXIST => Ok(false),
        _ => fitsio::errors::check_status(status)
            .map(|_| false)
            .map_err(Error::fits(path)),
    }
}

// =============================================================================
// Tile writing
// =============================================================================

/// Writes each tile of `source` to its destination path.
///
/// Every destination starts as a byte copy of the source, so the whole
/// header and the pixel type survive; the primary image is then resized to
/// the tile and overwritten with the tile's pixels.
pub fn write_tiles(source: &Path, layout: ImageLayout, tiles: &[(Tile, &Path)]) -> Result<()> {
    match layout.pixel_type {
        PixelType::UInt8 => write_tiles_as::<u8>(source, layout.dimensions, tiles),
        PixelType::Int8 => write_tiles_as::<i8>(source, layout.dimensions, tiles),
        PixelType::Int16 => write_tiles_as::<i16>(source, layout.dimensions, tiles),
        PixelType::UInt16 => write_tiles_as::<u16>(source, layout.dimensions, tiles),
        PixelType::Int32 => write_tiles_as::<i32>(source, layout.dimensions, tiles),
        PixelType::UInt32 => write_tiles_as::<u32>(source, layout.dimensions, tiles),
        PixelType::Int64 => write_tiles_as::<i64>(source, layout.dimensions, tiles),
        PixelType::UInt64 => write_tiles_as::<u64>(source, layout.dimensions, tiles),
        PixelType::Float32 => write_tiles_as::<f32>(source, layout.dimensions, tiles),
        PixelType::Float64 => write_tiles_as::<f64>(source, layout.dimensions, tiles),
    }
}

fn write_tiles_as<T>(source: &Path, dimensions: ImageDimensions, tiles: &[(Tile, &Path)]) -> Result<()>
where
    Vec<T>: ReadImage,
    T: WriteImage + Copy,
{
    let pixels: Vec<T> = {
        let mut fptr = open(source)?;
        let hdu = primary_hdu(&mut fptr, source)?;
        hdu.read_image(&mut fptr).map_err(Error::fits(source))?
    };
    assert_eq!(
        pixels.len(),
        dimensions.pixel_count(),
        "Pixel count mismatch"
    );

    for (tile, dest) in tiles {
        let data = extract_tile(&pixels, dimensions, tile);

        std::fs::copy(source, dest).map_err(Error::io(dest))?;
        if let Err(err) = overwrite_image(dest, tile.dimensions(), &data) {
            // A failed tile must not leave a full-size copy of the source behind.
            if let Err(e) = std::fs::remove_file(dest) {
                tracing::warn!("Failed to remove partial tile {}: {}", dest.display(), e);
            }
            return Err(err);
        }

        tracing::debug!(
            "Wrote tile {} ({}x{} at {},{}) to {}",
            tile.index,
            tile.width,
            tile.height,
            tile.x,
            tile.y,
            dest.display()
        );
    }
    Ok(())
}

/// Shrinks the primary image of `path` to `dimensions` and writes `data` into it.
fn overwrite_image<T: WriteImage>(path: &Path, dimensions: ImageDimensions, data: &[T]) -> Result<()> {
    let mut fptr = edit(path)?;
    let hdu = primary_hdu(&mut fptr, path)?;
    resize_primary(&mut fptr, path, dimensions)?;
    hdu.write_image(&mut fptr, data).map_err(Error::fits(path))
}

/// Resizes the current image HDU keeping its on-disk BITPIX.
///
/// `FitsHdu::resize` passes the BZERO-equivalent type, which cfitsio refuses
/// for signed bytes. The raw BITPIX leaves BZERO/BSCALE in the header alone.
fn resize_primary(fptr: &mut FitsFile, path: &Path, dimensions: ImageDimensions) -> Result<()> {
    let mut naxes = [dimensions.width as c_long, dimensions.height as c_long];
    let mut bitpix = 0;
    let mut status = 0;
    // SAFETY: `fptr` is open read-write on the primary HDU and `naxes`
    // outlives both calls.
    unsafe {
        fitsio::sys::ffgidt(fptr.as_raw(), &mut bitpix, &mut status);
        fitsio::sys::ffrsim(
            fptr.as_raw(),
            bitpix,
            naxes.len() as c_int,
            naxes.as_mut_ptr(),
            &mut status,
        );
    }
    fitsio::errors::check_status(status).map_err(Error::fits(path))
}

// =============================================================================
// Pointing
// =============================================================================

/// Header convention a pointing was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointingSource {
    /// `CRVAL1` / `CRVAL2` WCS reference values.
    Wcs,
    /// `RA` / `DEC` in degrees (NINA, SGP).
    Mount,
    /// `OBJCTRA` / `OBJCTDEC` sexagesimal strings (MaximDL, ASCOM).
    Object,
}

/// Sky position in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pointing {
    pub ra_deg: f64,
    pub dec_deg: f64,
    pub source: PointingSource,
}

impl fmt::Display for Pointing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RA={:.5} Dec={:+.5}", self.ra_deg, self.dec_deg)
    }
}

/// Reads the approximate field center from the primary header.
///
/// Tries `CRVAL1`/`CRVAL2`, then `RA`/`DEC`, then `OBJCTRA`/`OBJCTDEC`.
pub fn read_pointing(path: &Path) -> Result<Pointing> {
    let mut fptr = open(path)?;
    let hdu = primary_hdu(&mut fptr, path)?;
    let mut read_f64 = |key: &str| hdu.read_key::<f64>(&mut fptr, key).ok();

    let found = if let (Some(ra), Some(dec)) = (read_f64("CRVAL1"), read_f64("CRVAL2")) {
        Some((ra, dec, PointingSource::Wcs))
    } else if let (Some(ra), Some(dec)) = (read_f64("RA"), read_f64("DEC")) {
        Some((ra, dec, PointingSource::Mount))
    } else {
        let ra = hdu.read_key::<String>(&mut fptr, "OBJCTRA").ok();
        let dec = hdu.read_key::<String>(&mut fptr, "OBJCTDEC").ok();
        match (
            ra.as_deref().and_then(parse_hms_to_deg),
            dec.as_deref().and_then(parse_dms_to_deg),
        ) {
            (Some(ra), Some(dec)) => Some((ra, dec, PointingSource::Object)),
            _ => None,
        }
    };

    let (ra_deg, dec_deg, source) = found.ok_or_else(|| Error::MissingPointing {
        path: path.to_path_buf(),
    })?;

    if !(0.0..=360.0).contains(&ra_deg) || !(-90.0..=90.0).contains(&dec_deg) {
        return Err(Error::InvalidPointing {
            path: path.to_path_buf(),
            ra: ra_deg,
            dec: dec_deg,
        });
    }

    Ok(Pointing {
        ra_deg,
        dec_deg,
        source,
    })
}

/// Parse HMS string "HH MM SS.ss" to degrees.
/// Accepts both space-delimited and colon-delimited formats.
fn parse_hms_to_deg(s: &str) -> Option<f64> {
    parse_sexagesimal(s).map(|hours| hours * 15.0)
}

/// Parse DMS string "±DD MM SS.ss" to degrees.
fn parse_dms_to_deg(s: &str) -> Option<f64> {
    parse_sexagesimal(s)
}

fn parse_sexagesimal(s: &str) -> Option<f64> {
    let s = s.trim();
    let parts: Vec<f64> = s
        .split([' ', ':'])
        .filter(|p| !p.is_empty())
        .map(|p| p.trim().parse().ok())
        .collect::<Option<Vec<_>>>()?;
    if parts.len() != 3 {
        return None;
    }
    // Sign taken from the text so "-00 30 00" stays negative.
    let sign = if s.starts_with('-') { -1.0 } else { 1.0 };
    Some(sign * (parts[0].abs() + parts[1] / 60.0 + parts[2] / 3600.0))
}
