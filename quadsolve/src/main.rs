use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;
use quadsolve::{
    HeaderPolicy, ImageDimensions, Pipeline, PipelineConfig, SanitizeConfig, ScaleUnits,
    SolveFieldConfig, SplitConfig, TileGrid,
};

#[derive(Parser, Debug)]
#[command(name = "quadsolve")]
#[command(about = "Split a FITS frame into quadrants and plate-solve each one")]
struct Cli {
    /// Source FITS image
    file: PathBuf,

    /// Quadrant file name prefix
    #[arg(long, default_value = "C")]
    prefix: String,

    /// Tile grid as COLSxROWS
    #[arg(long, default_value = "2x2")]
    grid: TileGrid,

    /// Expected source size as WIDTHxHEIGHT
    #[arg(long, default_value = "2048x2048")]
    size: ImageDimensions,

    /// Accept any source size the grid divides evenly
    #[arg(long, conflicts_with = "size")]
    any_size: bool,

    /// solve-field executable
    #[arg(long, default_value = "solve-field")]
    solve_field: PathBuf,

    /// Search radius around the header pointing, degrees
    #[arg(long, default_value_t = 1.0)]
    radius: f64,

    /// Scale units: degwidth, arcminwidth, arcsecperpix or focalmm
    #[arg(long, default_value = "degwidth")]
    scale_units: ScaleUnits,

    #[arg(long, default_value_t = 0.8)]
    scale_low: f64,

    #[arg(long, default_value_t = 1.2)]
    scale_high: f64,

    /// Keep CRVAL/CRPIX in the quadrant headers
    #[arg(long)]
    keep_wcs: bool,

    /// Tolerate already-sanitized headers
    #[arg(long)]
    permissive: bool,

    /// Continue with the next quadrant after a failure
    #[arg(long)]
    keep_going: bool,

    /// Write the quadrants without solving them
    #[arg(long)]
    split_only: bool,

    /// Log level (RUST_LOG takes precedence)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Also write daily log files to this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

impl Cli {
    fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            split: SplitConfig {
                prefix: self.prefix.clone(),
                grid: self.grid,
                expected_dimensions: (!self.any_size).then_some(self.size),
            },
            sanitize: SanitizeConfig {
                enabled: !self.keep_wcs,
                policy: if self.permissive {
                    HeaderPolicy::Permissive
                } else {
                    HeaderPolicy::Strict
                },
                ..Default::default()
            },
            solver: SolveFieldConfig {
                executable: self.solve_field.clone(),
                radius_deg: self.radius,
                scale_units: self.scale_units,
                scale_low: self.scale_low,
                scale_high: self.scale_high,
                ..Default::default()
            },
            keep_going: self.keep_going,
        }
    }
}

fn run(cli: &Cli) -> Result<bool> {
    let pipeline =
        Pipeline::new(cli.pipeline_config()).context("Invalid command line configuration")?;

    if cli.split_only {
        let quadrants = pipeline
            .split(&cli.file)
            .with_context(|| format!("Failed to split {}", cli.file.display()))?;
        for q in &quadrants {
            println!("{}", q.path.display());
        }
        return Ok(true);
    }

    if !pipeline.solver().is_available() {
        bail!(
            "Cannot launch '{}'; is astrometry.net installed?",
            pipeline.solver().config().executable.display()
        );
    }

    let report = pipeline
        .run(&cli.file)
        .with_context(|| format!("Failed to solve {}", cli.file.display()))?;
    report.print_summary();
    Ok(report.is_success())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = common::log_setup::setup_logging(&cli.log_level, cli.log_dir.as_deref()) {
        eprintln!("Failed to set up logging: {e:#}");
        return ExitCode::FAILURE;
    }

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
