//! Path helpers for FITS files and the sibling files tools write next to them.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Supported FITS file extensions.
pub const FITS_EXTENSIONS: &[&str] = &["fit", "fits", "fts"];

/// Returns true if the path has one of the given extensions.
/// Extensions are matched case-insensitively.
pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
    extensions.contains(&ext.to_lowercase().as_str())
}

/// Returns true if the path looks like a FITS file.
pub fn is_fits_file(path: &Path) -> bool {
    has_extension(path, FITS_EXTENSIONS)
}

/// Returns `path` with `prefix` prepended to its file name, in the same directory.
///
/// Returns `None` when the path has no file name (e.g. `..` or `/`).
pub fn prefixed_file_name(path: &Path, prefix: &str) -> Option<PathBuf> {
    let name = path.file_name()?;
    let mut prefixed = OsString::from(prefix);
    prefixed.push(name);
    Some(path.with_file_name(prefixed))
}

/// Returns the sibling of `path` formed from its stem plus `suffix`.
///
/// `suffix` carries its own separator: `sibling_with_suffix("a/x.fits", ".wcs")`
/// is `a/x.wcs`, and `"-indx.xyls"` gives `a/x-indx.xyls`.
pub fn sibling_with_suffix(path: &Path, suffix: &str) -> Option<PathBuf> {
    let mut name = path.file_stem()?.to_os_string();
    name.push(suffix);
    Some(path.with_file_name(name))
}
