//! Erasing the coarse WCS keys a frame carries before it is plate solved.

use std::path::Path;

use crate::config::{HeaderPolicy, SanitizeConfig};
use crate::error::{Error, Result};
use crate::fits;

/// Which configured keys were removed and which were already absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SanitizeReport {
    pub removed: Vec<String>,
    pub missing: Vec<String>,
}

impl SanitizeReport {
    /// True if the header was left unchanged.
    pub fn is_noop(&self) -> bool {
        self.removed.is_empty()
    }
}

/// Deletes `config.keys` from the primary header of `path`, rewriting the file.
///
/// Every key is attempted. Under [`HeaderPolicy::Strict`] any absent key turns
/// the call into [`Error::MissingKeys`] once all present keys are gone; under
/// [`HeaderPolicy::Permissive`] absent keys only show up in the report.
pub fn sanitize_header(path: &Path, config: &SanitizeConfig) -> Result<SanitizeReport> {
    let mut report = SanitizeReport::default();
    {
        let mut fptr = fits::edit(path)?;
        fits::primary_hdu(&mut fptr, path)?;

        for key in &config.keys {
            if fits::delete_key(&mut fptr, path, key)? {
                report.removed.push(key.clone());
            } else {
                report.missing.push(key.clone());
            }
        }
    }

    tracing::debug!(
        "Sanitized {}: removed [{}], absent [{}]",
        path.display(),
        report.removed.join(", "),
        report.missing.join(", ")
    );

    if !report.missing.is_empty() && config.policy == HeaderPolicy::Strict {
        return Err(Error::MissingKeys {
            path: path.to_path_buf(),
            keys: report.missing,
        });
    }
    Ok(report)
}
