use std::path::{Path, PathBuf};

use super::*;
use crate::config::{HeaderPolicy, SanitizeConfig};
use crate::fits::PointingSource;
use crate::geometry::ImageDimensions;
use crate::testing::{
    has_key, init_tracing, write_quadrant, write_test_fits, FakeMode, FakeSolver, TestKey,
};

fn hint(ra_deg: f64, dec_deg: f64) -> Pointing {
    Pointing {
        ra_deg,
        dec_deg,
        source: PointingSource::Wcs,
    }
}

fn args(cmd: &Command) -> Vec<String> {
    cmd.get_args()
        .map(|a| a.to_string_lossy().into_owned())
        .collect()
}

fn leftovers(image: &Path) -> Vec<PathBuf> {
    Byproducts::for_image(image).unwrap().present()
}

// =============================================================================
// Command line
// =============================================================================

#[test]
fn test_command_line_matches_solve_field_usage() {
    let solver = SolveField::default();
    let request = SolveRequest {
        image: Path::new("C1_tarot.fits"),
        hint: hint(83.82, -5.39),
    };

    let cmd = solver.command(&request);

    assert_eq!(cmd.get_program(), "solve-field");
    assert_eq!(
        args(&cmd),
        vec![
            "C1_tarot.fits",
            "--ra",
            "83.82",
            "--dec",
            "-5.39",
            "--radius",
            "1",
            "--scale-units",
            "degwidth",
            "--scale-low",
            "0.8",
            "--scale-high",
            "1.2",
            "--no-plots",
            "--overwrite",
        ]
    );
}

#[test]
fn test_command_line_optional_flags_and_extra_args() {
    let solver = SolveField::new(SolveFieldConfig {
        executable: PathBuf::from("/opt/astrometry/bin/solve-field"),
        radius_deg: 2.5,
        no_plots: false,
        overwrite: false,
        extra_args: vec!["--cpulimit".to_string(), "30".to_string()],
        ..Default::default()
    });
    let request = SolveRequest {
        image: Path::new("C4_tarot.fits"),
        hint: hint(10.0, 20.0),
    };

    let args = args(&solver.command(&request));

    assert!(!args.iter().any(|a| a == "--no-plots" || a == "--overwrite"));
    assert_eq!(args[6], "2.5");
    assert_eq!(&args[args.len() - 2..], ["--cpulimit", "30"]);
}

// =============================================================================
// Invoker
// =============================================================================

#[test]
fn test_solve_quadrant_promotes_new_image() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("C1_tarot.fits");
    write_quadrant(&path, 10.0, 20.0);
    let solver = FakeSolver::solving(10.25, 20.5);
    let sanitize = SanitizeConfig::default();

    let solved = SolverInvoker::new(&solver, &sanitize)
        .solve_quadrant(&path)
        .unwrap();

    assert_eq!(solved.path, path);
    assert_eq!(solved.hint, hint(10.0, 20.0));
    assert_eq!((solved.solved.ra_deg, solved.solved.dec_deg), (10.25, 20.5));
    assert!(path.exists());
    assert!(leftovers(&path).is_empty(), "byproducts left: {:?}", leftovers(&path));
    assert_eq!(
        crate::fits::read_layout(&path).unwrap().dimensions,
        ImageDimensions::new(4, 4)
    );

    let calls = solver.calls.borrow();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0], (path.clone(), hint(10.0, 20.0)));
}

#[test]
fn test_solve_quadrant_keeps_byproducts_when_outputs_missing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("C2_tarot.fits");
    write_quadrant(&path, 10.0, 20.0);
    let solver = FakeSolver::new(FakeMode::Partial);
    let sanitize = SanitizeConfig::default();

    let err = SolverInvoker::new(&solver, &sanitize)
        .solve_quadrant(&path)
        .unwrap_err();

    match err {
        Error::MissingOutputs { missing, .. } => {
            assert_eq!(missing.len(), 7);
            assert!(missing.contains(&dir.path().join("C2_tarot.new")));
            assert!(!missing.contains(&dir.path().join("C2_tarot.axy")));
        }
        other => panic!("expected MissingOutputs, got {other:?}"),
    }
    assert!(path.exists());
    assert!(dir.path().join("C2_tarot.axy").exists());
}

#[test]
fn test_solve_quadrant_solver_error_leaves_quadrant() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("C3_tarot.fits");
    write_quadrant(&path, 10.0, 20.0);
    let solver = FakeSolver::new(FakeMode::Broken);
    let sanitize = SanitizeConfig::default();

    let err = SolverInvoker::new(&solver, &sanitize)
        .solve_quadrant(&path)
        .unwrap_err();

    assert!(matches!(err, Error::SolverSpawn { .. }));
    assert!(path.exists());
    assert!(!has_key(&path, "CRVAL1"), "header was sanitized before solving");
}

#[test]
fn test_solve_quadrant_without_pointing_skips_solver() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("C1_blind.fits");
    write_test_fits(&path, ImageDimensions::new(4, 4), &[]);
    let solver = FakeSolver::solving(1.0, 2.0);
    let sanitize = SanitizeConfig::default();

    let err = SolverInvoker::new(&solver, &sanitize)
        .solve_quadrant(&path)
        .unwrap_err();

    assert!(matches!(err, Error::MissingPointing { .. }));
    assert!(solver.calls.borrow().is_empty());
}

#[test]
fn test_solve_quadrant_strict_header_stops_before_solver() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("C1_nopix.fits");
    write_test_fits(
        &path,
        ImageDimensions::new(4, 4),
        &[TestKey::float("CRVAL1", 10.0), TestKey::float("CRVAL2", 20.0)],
    );
    let solver = FakeSolver::solving(1.0, 2.0);

    let strict = SanitizeConfig::default();
    let err = SolverInvoker::new(&solver, &strict)
        .solve_quadrant(&path)
        .unwrap_err();
    assert!(matches!(err, Error::MissingKeys { .. }));
    assert!(solver.calls.borrow().is_empty());

    // The pointing is gone now, so even a permissive rerun has nothing to seed from.
    let permissive = SanitizeConfig {
        policy: HeaderPolicy::Permissive,
        ..Default::default()
    };
    let err = SolverInvoker::new(&solver, &permissive)
        .solve_quadrant(&path)
        .unwrap_err();
    assert!(matches!(err, Error::MissingPointing { .. }));
}

#[test]
fn test_permissive_solve_of_already_clean_quadrant() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("C1_mount.fits");
    write_test_fits(
        &path,
        ImageDimensions::new(4, 4),
        &[TestKey::float("RA", 150.0), TestKey::float("DEC", 45.0)],
    );
    let solver = FakeSolver::solving(150.2, 45.1);
    let sanitize = SanitizeConfig {
        policy: HeaderPolicy::Permissive,
        ..Default::default()
    };

    let solved = SolverInvoker::new(&solver, &sanitize)
        .solve_quadrant(&path)
        .unwrap();

    assert_eq!(solved.hint.source, PointingSource::Mount);
    assert_eq!((solved.solved.ra_deg, solved.solved.dec_deg), (150.2, 45.1));
    assert!(leftovers(&path).is_empty());
}

#[test]
fn test_solve_quadrant_with_sanitizing_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("C4_tarot.fits");
    write_quadrant(&path, 10.0, 20.0);
    let solver = FakeSolver::solving(10.5, 19.5);
    let sanitize = SanitizeConfig {
        enabled: false,
        ..Default::default()
    };

    let solved = SolverInvoker::new(&solver, &sanitize)
        .solve_quadrant(&path)
        .unwrap();

    assert_eq!((solved.solved.ra_deg, solved.solved.dec_deg), (10.5, 19.5));
    assert!(leftovers(&path).is_empty());
}

// =============================================================================
// solve-field process
// =============================================================================

#[test]
fn test_missing_executable_is_spawn_error() {
    let solver = SolveField::new(SolveFieldConfig {
        executable: PathBuf::from("/nonexistent/solve-field"),
        ..Default::default()
    });
    assert!(!solver.is_available());

    let err = solver
        .solve(&SolveRequest {
            image: Path::new("C1_tarot.fits"),
            hint: hint(10.0, 20.0),
        })
        .unwrap_err();

    assert!(matches!(err, Error::SolverSpawn { .. }));
}

#[cfg(unix)]
mod process {
    use super::*;
    use crate::testing::write_script;

    fn solve_field(script: PathBuf) -> SolveField {
        SolveField::new(SolveFieldConfig {
            executable: script,
            ..Default::default()
        })
    }

    #[test]
    fn test_script_solver_success() {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(
            dir.path(),
            "solve-field",
            r#"[ "$1" = "--help" ] && exit 0
stem="${1%.fits}"
for s in -indx.xyls .axy .corr .match .rdls .solved .wcs; do
  echo done > "$stem$s"
done
cp "$1" "$stem.new""#,
        );
        let path = dir.path().join("C1_tarot.fits");
        write_quadrant(&path, 33.0, 44.0);
        let solver = solve_field(script);
        assert!(solver.is_available());

        let sanitize = SanitizeConfig {
            enabled: false,
            ..Default::default()
        };
        let solved = SolverInvoker::new(&solver, &sanitize)
            .solve_quadrant(&path)
            .unwrap();

        assert_eq!((solved.solved.ra_deg, solved.solved.dec_deg), (33.0, 44.0));
        assert!(leftovers(&path).is_empty());
    }

    #[test]
    fn test_script_solver_nonzero_exit() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(
            dir.path(),
            "solve-field",
            "echo 'no index files' >&2\nexit 3",
        );

        let err = solve_field(script)
            .solve(&SolveRequest {
                image: &dir.path().join("C1_tarot.fits"),
                hint: hint(10.0, 20.0),
            })
            .unwrap_err();

        match err {
            Error::SolverFailed { status, stderr, .. } => {
                assert_eq!(status.code(), Some(3));
                assert_eq!(stderr, "no index files");
            }
            other => panic!("expected SolverFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_script_solver_exit_zero_without_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "solve-field", "exit 0");
        let path = dir.path().join("C2_tarot.fits");
        write_quadrant(&path, 10.0, 20.0);
        let solver = solve_field(script);
        let sanitize = SanitizeConfig::default();

        let err = SolverInvoker::new(&solver, &sanitize)
            .solve_quadrant(&path)
            .unwrap_err();

        assert!(matches!(err, Error::MissingOutputs { ref missing, .. } if missing.len() == 8));
        assert!(path.exists());
    }
}
