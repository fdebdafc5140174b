//! Configuration types for the quadrant pipeline.
//!
//! Defaults reproduce the TAROT workflow: a 2048×2048 frame cut into four
//! `C1_`..`C4_` quadrants, coarse WCS keys erased strictly, and
//! `solve-field` run with a 1° search radius and a 0.8–1.2° field width.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::geometry::{ImageDimensions, TileGrid};

// =============================================================================
// Splitter
// =============================================================================

#[derive(Debug, Clone)]
pub struct SplitConfig {
    /// Prefix put in front of the tile index, e.g. `C` gives `C1_`.
    pub prefix: String,
    pub grid: TileGrid,
    /// Reject sources of any other size. `None` accepts any size the grid divides.
    pub expected_dimensions: Option<ImageDimensions>,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            prefix: "C".to_string(),
            grid: TileGrid::QUADRANTS,
            expected_dimensions: Some(ImageDimensions::TAROT),
        }
    }
}

impl SplitConfig {
    pub fn validate(&self) -> Result<()> {
        if self.prefix.is_empty() {
            return Err(Error::InvalidConfig("prefix must not be empty".into()));
        }
        if self.prefix.contains(['/', '\\']) {
            return Err(Error::InvalidConfig(format!(
                "prefix '{}' must not contain path separators",
                self.prefix
            )));
        }
        if self.grid.cols == 0 || self.grid.rows == 0 {
            return Err(Error::InvalidConfig(format!(
                "grid {} must have at least one column and row",
                self.grid
            )));
        }
        if let Some(expected) = self.expected_dimensions {
            self.grid.tile_dimensions(expected)?;
        }
        Ok(())
    }
}

// =============================================================================
// Header sanitizer
// =============================================================================

/// What to do when a key scheduled for removal is not in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeaderPolicy {
    /// Absent keys are an error.
    #[default]
    Strict,
    /// Absent keys are reported and skipped.
    Permissive,
}

/// Coarse WCS keys erased before solving.
pub const DEFAULT_SANITIZED_KEYS: [&str; 4] = ["CRVAL1", "CRVAL2", "CRPIX1", "CRPIX2"];

#[derive(Debug, Clone)]
pub struct SanitizeConfig {
    /// Run the sanitizer at all before solving.
    pub enabled: bool,
    pub keys: Vec<String>,
    pub policy: HeaderPolicy,
}

impl Default for SanitizeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            keys: DEFAULT_SANITIZED_KEYS.iter().map(|k| k.to_string()).collect(),
            policy: HeaderPolicy::default(),
        }
    }
}

impl SanitizeConfig {
    pub fn validate(&self) -> Result<()> {
        for key in &self.keys {
            // FITS keywords are at most 8 characters; longer ones need HIERARCH.
            if key.is_empty() || key.len() > 8 || !key.is_ascii() {
                return Err(Error::InvalidConfig(format!(
                    "'{key}' is not a valid FITS keyword"
                )));
            }
        }
        Ok(())
    }
}

// =============================================================================
// solve-field
// =============================================================================

/// Units for `--scale-low` / `--scale-high`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScaleUnits {
    /// Image width in degrees.
    #[default]
    DegWidth,
    /// Image width in arcminutes.
    ArcMinWidth,
    /// Pixel scale in arcseconds per pixel.
    ArcSecPerPix,
    /// 35mm-equivalent focal length.
    FocalMm,
}

impl ScaleUnits {
    pub fn as_arg(&self) -> &'static str {
        match self {
            ScaleUnits::DegWidth => "degwidth",
            ScaleUnits::ArcMinWidth => "arcminwidth",
            ScaleUnits::ArcSecPerPix => "arcsecperpix",
            ScaleUnits::FocalMm => "focalmm",
        }
    }
}

impl fmt::Display for ScaleUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_arg())
    }
}

impl FromStr for ScaleUnits {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "degwidth" | "degw" | "dw" => Ok(ScaleUnits::DegWidth),
            "arcminwidth" | "amw" | "aw" => Ok(ScaleUnits::ArcMinWidth),
            "arcsecperpix" | "app" => Ok(ScaleUnits::ArcSecPerPix),
            "focalmm" => Ok(ScaleUnits::FocalMm),
            other => Err(format!(
                "unknown scale units '{other}' (expected degwidth, arcminwidth, arcsecperpix or focalmm)"
            )),
        }
    }
}

/// Arguments for astrometry.net's `solve-field`.
#[derive(Debug, Clone)]
pub struct SolveFieldConfig {
    pub executable: PathBuf,
    /// Search radius around the pointing hint, in degrees.
    pub radius_deg: f64,
    pub scale_units: ScaleUnits,
    pub scale_low: f64,
    pub scale_high: f64,
    /// Pass `--no-plots`.
    pub no_plots: bool,
    /// Pass `--overwrite`.
    pub overwrite: bool,
    /// Appended verbatim after the standard arguments.
    pub extra_args: Vec<String>,
}

impl Default for SolveFieldConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("solve-field"),
            radius_deg: 1.0,
            scale_units: ScaleUnits::DegWidth,
            scale_low: 0.8,
            scale_high: 1.2,
            no_plots: true,
            overwrite: true,
            extra_args: Vec::new(),
        }
    }
}

impl SolveFieldConfig {
    pub fn validate(&self) -> Result<()> {
        if self.executable.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("solver executable is empty".into()));
        }
        if !(self.radius_deg.is_finite() && self.radius_deg > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "search radius must be positive, got {}",
                self.radius_deg
            )));
        }
        if !(self.scale_low.is_finite() && self.scale_high.is_finite())
            || self.scale_low <= 0.0
            || self.scale_low > self.scale_high
        {
            return Err(Error::InvalidConfig(format!(
                "scale range {}..{} must satisfy 0 < low <= high",
                self.scale_low, self.scale_high
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Pipeline
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub split: SplitConfig,
    pub sanitize: SanitizeConfig,
    pub solver: SolveFieldConfig,
    /// Continue with the remaining quadrants after one fails.
    pub keep_going: bool,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        self.split.validate()?;
        self.sanitize.validate()?;
        self.solver.validate()
    }
}
