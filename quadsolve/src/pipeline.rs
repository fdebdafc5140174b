//! Split a frame, then solve each quadrant in order.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::fits::Pointing;
use crate::solver::{PlateSolver, SolveField, SolverInvoker};
use crate::split::{split_image, QuadrantFile};

/// Outcome for one quadrant.
#[derive(Debug, Clone, PartialEq)]
pub enum QuadrantStatus {
    /// Calibrated in place; carries the solved field center.
    Solved(Pointing),
    /// The solver could not be launched or exited with an error.
    SolverFailed(String),
    /// The solver reported success without writing these outputs.
    FilesMissing(Vec<PathBuf>),
    /// Any other error, such as a header without a pointing.
    Failed(String),
}

impl QuadrantStatus {
    fn from_error(err: &Error) -> Self {
        match err {
            Error::SolverSpawn { .. } | Error::SolverFailed { .. } => {
                QuadrantStatus::SolverFailed(err.to_string())
            }
            Error::MissingOutputs { missing, .. } => QuadrantStatus::FilesMissing(missing.clone()),
            _ => QuadrantStatus::Failed(err.to_string()),
        }
    }

    pub fn is_solved(&self) -> bool {
        matches!(self, QuadrantStatus::Solved(_))
    }

    fn label(&self) -> &'static str {
        match self {
            QuadrantStatus::Solved(_) => "solved",
            QuadrantStatus::SolverFailed(_) => "solver failed",
            QuadrantStatus::FilesMissing(_) => "files missing",
            QuadrantStatus::Failed(_) => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuadrantReport {
    pub index: usize,
    pub path: PathBuf,
    pub status: QuadrantStatus,
}

/// Every quadrant the pipeline attempted, in index order.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    pub source: PathBuf,
    pub quadrants: Vec<QuadrantReport>,
}

impl PipelineReport {
    pub fn is_success(&self) -> bool {
        self.quadrants.iter().all(|q| q.status.is_solved())
    }

    pub fn solved_count(&self) -> usize {
        self.quadrants.iter().filter(|q| q.status.is_solved()).count()
    }

    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "=== {}: {}/{} quadrants solved ===",
            self.source.display(),
            self.solved_count(),
            self.quadrants.len()
        );
        for q in &self.quadrants {
            let name = q
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let detail = match &q.status {
                QuadrantStatus::Solved(p) => p.to_string(),
                QuadrantStatus::SolverFailed(msg) | QuadrantStatus::Failed(msg) => msg.clone(),
                QuadrantStatus::FilesMissing(missing) => format!("{} outputs missing", missing.len()),
            };
            let _ = writeln!(
                out,
                "{:>3}  {:<28} {:<14} {}",
                q.index,
                name,
                q.status.label(),
                detail
            );
        }
        out
    }

    pub fn print_summary(&self) {
        print!("{}", self.summary());
    }
}

/// Splitter plus Solver Invoker, run strictly in sequence.
#[derive(Debug)]
pub struct Pipeline<S> {
    config: PipelineConfig,
    solver: S,
}

impl Pipeline<SolveField> {
    /// A pipeline driving the `solve-field` executable from `config.solver`.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let solver = SolveField::new(config.solver.clone());
        Self::with_solver(config, solver)
    }
}

impl<S: PlateSolver> Pipeline<S> {
    pub fn with_solver(config: PipelineConfig, solver: S) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, solver })
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    /// Only writes the quadrant files.
    pub fn split(&self, source: &Path) -> Result<Vec<QuadrantFile>> {
        split_image(source, &self.config.split)
    }

    /// Splits `source` and solves every quadrant in index order.
    ///
    /// Without `keep_going` the first quadrant error is returned as is and
    /// later quadrants are not attempted. With it, every quadrant is tried
    /// and failures are recorded in the report.
    pub fn run(&self, source: &Path) -> Result<PipelineReport> {
        let quadrants = self.split(source)?;
        let invoker = SolverInvoker::new(&self.solver, &self.config.sanitize);

        let mut report = PipelineReport {
            source: source.to_path_buf(),
            quadrants: Vec::with_capacity(quadrants.len()),
        };

        for quadrant in quadrants {
            let index = quadrant.tile.index;
            let status = match invoker.solve_quadrant(&quadrant.path) {
                Ok(solved) => QuadrantStatus::Solved(solved.solved),
                Err(err) if self.config.keep_going => {
                    tracing::error!("Quadrant {} failed: {}", index, err);
                    QuadrantStatus::from_error(&err)
                }
                Err(err) => {
                    tracing::error!("Quadrant {} failed, stopping: {}", index, err);
                    return Err(err);
                }
            };
            report.quadrants.push(QuadrantReport {
                index,
                path: quadrant.path,
                status,
            });
        }

        tracing::info!(
            "{}: {}/{} quadrants solved",
            source.display(),
            report.solved_count(),
            report.quadrants.len()
        );
        Ok(report)
    }
}
