//! Plate solving through astrometry.net's `solve-field`.

mod byproducts;
mod invoker;

pub use byproducts::{Byproducts, AUXILIARY_SUFFIXES, NEW_IMAGE_SUFFIX};
pub use invoker::{SolvedQuadrant, SolverInvoker};

use std::path::Path;
use std::process::Command;

use crate::config::SolveFieldConfig;
use crate::error::{Error, Result};
use crate::fits::Pointing;

/// One image to solve and the hint to start from.
#[derive(Debug, Clone, Copy)]
pub struct SolveRequest<'a> {
    pub image: &'a Path,
    pub hint: Pointing,
}

/// Something that plate-solves an image in place, astrometry.net style.
///
/// On `Ok` the implementation is expected to have written the byproducts
/// listed in [`Byproducts`] next to the image; the caller verifies that.
/// The call blocks until the solver is done.
pub trait PlateSolver {
    fn solve(&self, request: &SolveRequest<'_>) -> Result<()>;
}

/// Runs the local `solve-field` executable.
#[derive(Debug, Clone, Default)]
pub struct SolveField {
    config: SolveFieldConfig,
}

impl SolveField {
    pub fn new(config: SolveFieldConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SolveFieldConfig {
        &self.config
    }

    /// Check if the executable can be launched.
    pub fn is_available(&self) -> bool {
        Command::new(&self.config.executable)
            .arg("--help")
            .output()
            .is_ok()
    }

    /// The full command line for `request`.
    pub fn command(&self, request: &SolveRequest<'_>) -> Command {
        let config = &self.config;
        let mut cmd = Command::new(&config.executable);
        cmd.arg(request.image)
            .arg("--ra")
            .arg(request.hint.ra_deg.to_string())
            .arg("--dec")
            .arg(request.hint.dec_deg.to_string())
            .arg("--radius")
            .arg(config.radius_deg.to_string())
            .arg("--scale-units")
            .arg(config.scale_units.as_arg())
            .arg("--scale-low")
            .arg(config.scale_low.to_string())
            .arg("--scale-high")
            .arg(config.scale_high.to_string());
        if config.no_plots {
            cmd.arg("--no-plots");
        }
        if config.overwrite {
            cmd.arg("--overwrite");
        }
        cmd.args(&config.extra_args);
        cmd
    }
}

impl PlateSolver for SolveField {
    fn solve(&self, request: &SolveRequest<'_>) -> Result<()> {
        let mut cmd = self.command(request);

        tracing::info!(
            "Running {} on {} ({})",
            self.config.executable.display(),
            request.image.display(),
            request.hint
        );
        tracing::debug!("Command: {:?}", cmd);

        let output = cmd.output().map_err(|source| Error::SolverSpawn {
            program: self.config.executable.clone(),
            source,
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        tracing::trace!("solve-field stdout:\n{}", stdout);

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::error!(
                "solve-field failed on {}:\nstdout: {}\nstderr: {}",
                request.image.display(),
                stdout,
                stderr
            );
            return Err(Error::SolverFailed {
                path: request.image.to_path_buf(),
                status: output.status,
                stderr,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
