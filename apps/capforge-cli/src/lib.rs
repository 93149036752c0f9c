//! # CapForge CLI
//!
//! The `capforge` command: capacitor drawing, sizing and comparison
//! workflows on top of the CapForge crates.

/// Print a line unless the session is quiet.
macro_rules! say {
    ($session:expr) => {
        if !$session.quiet {
            println!();
        }
    };
    ($session:expr, $($arg:tt)*) => {
        if !$session.quiet {
            println!($($arg)*);
        }
    };
}

pub mod args;
pub mod commands;
pub mod session;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;

use capforge_pdk::Pdk;

use crate::args::{Args, Command};
use crate::session::Session;

pub fn run() -> Result<()> {
    run_with(Args::parse())
}

pub fn run_with(args: Args) -> Result<()> {
    let pdk = load_pdk(args.pdk.as_deref())?;

    match args.command {
        Command::Size { target } => commands::sizing::size(&pdk, target),
        Command::Capacitance { width, length } => commands::sizing::capacitance(&pdk, width, length),
        Command::Draw => {
            let mut session = Session::new(pdk, &args.output_dir)?;
            commands::draw::run(&mut session)?;
            session.finish()
        }
        Command::Sizes => {
            let mut session = Session::new(pdk, &args.output_dir)?;
            commands::sizes::run(&mut session)?;
            session.finish()
        }
        Command::Compare(compare) => {
            let mut session = Session::new(pdk, &args.output_dir)?;
            session.quiet = compare.json;
            commands::compare::run(&mut session, &compare)?;
            session.finish()
        }
        Command::Visualize => {
            let mut session = Session::new(pdk, &args.output_dir)?;
            commands::visualize::run(&mut session)?;
            session.finish()
        }
    }
}

fn load_pdk(path: Option<&Path>) -> Result<Pdk> {
    match path {
        Some(path) => Pdk::from_toml_file(path)
            .with_context(|| format!("failed to load process config {}", path.display())),
        None => Ok(Pdk::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args(out: &Path, command: Command) -> Args {
        Args {
            pdk: None,
            output_dir: out.to_path_buf(),
            command,
        }
    }

    #[test]
    fn test_draw_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        run_with(args(dir.path(), Command::Draw)).unwrap();
        for name in [
            "output_cmim_reference.gds",
            "output_cmim_custom.gds",
            "output_rfcmim.gds",
            "output_capacitor_grid.gds",
        ] {
            assert!(dir.path().join(name).is_file(), "missing {name}");
        }
    }

    #[test]
    fn test_compare_against_exported_reference() {
        let dir = tempfile::tempdir().unwrap();
        run_with(args(dir.path(), Command::Sizes)).unwrap();

        let compare = crate::args::CompareArgs {
            reference: Some(dir.path().join("output_cmim_5x5.gds")),
            reference_cell: None,
            width: 5.0,
            length: 5.0,
            json: true,
        };
        run_with(args(dir.path(), Command::Compare(compare))).unwrap();
        for name in [
            "output_comparison.gds",
            "output_xor_difference.gds",
            "output_reference_only.gds",
            "output_custom_only.gds",
        ] {
            assert!(dir.path().join(name).is_file(), "missing {name}");
        }

        // The XOR of a cell with itself is empty but still written
        let xor = capforge_io::read_gds_file(dir.path().join("output_xor_difference.gds")).unwrap();
        let top = xor.top_cell.unwrap();
        assert_eq!(xor.get_cell(&top).unwrap().geometry_count(), 0);
    }

    #[test]
    fn test_missing_pdk_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = args(dir.path(), Command::Capacitance { width: 5.0, length: 5.0 });
        a.pdk = Some(PathBuf::from("/nonexistent/ihp.toml"));
        let err = run_with(a).unwrap_err();
        assert!(format!("{err:#}").contains("failed to load process config"));
    }

    #[test]
    fn test_visualize_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        run_with(args(dir.path(), Command::Visualize)).unwrap();
        for name in [
            "viz_annotated_capacitor.gds",
            "viz_size_comparison.gds",
            "viz_reference_comparison.gds",
            "viz_complete_demo.gds",
        ] {
            assert!(dir.path().join(name).is_file(), "missing {name}");
        }
    }
}
