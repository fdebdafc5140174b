//! Quadrant plate solving for wide-field FITS frames.
//!
//! A frame (2048x2048 by default) is cut into a grid of tiles, each tile is
//! written next to the source as `C1_<name>`, `C2_<name>`, ..., its coarse
//! WCS keys are erased and astrometry.net's `solve-field` calibrates it in
//! place.
//!
//! ```no_run
//! use quadsolve::{Pipeline, PipelineConfig};
//!
//! let pipeline = Pipeline::new(PipelineConfig::default())?;
//! let report = pipeline.run("tarot.fits".as_ref())?;
//! report.print_summary();
//! # Ok::<(), quadsolve::Error>(())
//! ```

pub mod config;
pub mod error;
pub mod fits;
pub mod geometry;
pub mod header;
pub mod pipeline;
pub mod solver;
pub mod split;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{
    HeaderPolicy, PipelineConfig, SanitizeConfig, ScaleUnits, SolveFieldConfig, SplitConfig,
};
pub use error::{Error, Result};
pub use fits::{Pointing, PointingSource};
pub use geometry::{ImageDimensions, Tile, TileGrid};
pub use header::{sanitize_header, SanitizeReport};
pub use pipeline::{Pipeline, PipelineReport, QuadrantReport, QuadrantStatus};
pub use solver::{PlateSolver, SolveField, SolveRequest, SolvedQuadrant, SolverInvoker};
pub use split::{quadrant_path, split_image, QuadrantFile};
