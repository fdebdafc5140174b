use std::path::{Path, PathBuf};

use crate::config::SanitizeConfig;
use crate::error::{Error, Result};
use crate::fits::{self, Pointing};
use crate::header::sanitize_header;

use super::{Byproducts, PlateSolver, SolveRequest};

/// A quadrant whose file now carries the solver's calibration.
#[derive(Debug, Clone, PartialEq)]
pub struct SolvedQuadrant {
    pub path: PathBuf,
    /// Pointing the solver was seeded with.
    pub hint: Pointing,
    /// `CRVAL1`/`CRVAL2` written by the solver.
    pub solved: Pointing,
}

/// Seeds, runs and cleans up after a [`PlateSolver`] for one quadrant file.
pub struct SolverInvoker<'a, S> {
    solver: &'a S,
    sanitize: &'a SanitizeConfig,
}

impl<'a, S: PlateSolver> SolverInvoker<'a, S> {
    pub fn new(solver: &'a S, sanitize: &'a SanitizeConfig) -> Self {
        Self { solver, sanitize }
    }

    /// Solves `path` in place.
    ///
    /// Reads the pointing hint, erases the coarse WCS keys, runs the solver,
    /// checks that every byproduct exists, then deletes the auxiliary files
    /// and moves the calibrated `.new` image over `path`. On any failure the
    /// byproducts are left where the solver put them.
    pub fn solve_quadrant(&self, path: &Path) -> Result<SolvedQuadrant> {
        let hint = fits::read_pointing(path)?;
        tracing::debug!("Hint for {}: {} from {:?}", path.display(), hint, hint.source);

        if self.sanitize.enabled && sanitize_header(path, self.sanitize)?.is_noop() {
            tracing::debug!("{} has no coarse WCS keys to remove", path.display());
        }

        let byproducts = Byproducts::for_image(path)?;
        self.solver.solve(&SolveRequest { image: path, hint })?;

        let missing = byproducts.missing();
        if !missing.is_empty() {
            tracing::warn!(
                "Solver left {} of {} outputs for {}; keeping {:?}",
                missing.len(),
                byproducts.all().count(),
                path.display(),
                byproducts.present()
            );
            return Err(Error::MissingOutputs {
                path: path.to_path_buf(),
                missing,
            });
        }

        byproducts.promote()?;

        let solved = read_solution(path)?;
        tracing::info!("Solved {}: {}", path.display(), solved);

        Ok(SolvedQuadrant {
            path: path.to_path_buf(),
            hint,
            solved,
        })
    }
}

fn read_solution(path: &Path) -> Result<Pointing> {
    let ra = fits::read_key_optional::<f64>(path, "CRVAL1")?;
    let dec = fits::read_key_optional::<f64>(path, "CRVAL2")?;
    match (ra, dec) {
        (Some(ra_deg), Some(dec_deg)) => Ok(Pointing {
            ra_deg,
            dec_deg,
            source: fits::PointingSource::Wcs,
        }),
        (ra, dec) => Err(Error::MissingKeys {
            path: path.to_path_buf(),
            keys: [("CRVAL1", ra.is_none()), ("CRVAL2", dec.is_none())]
                .into_iter()
                .filter(|(_, absent)| *absent)
                .map(|(key, _)| key.to_string())
                .collect(),
        }),
    }
}
