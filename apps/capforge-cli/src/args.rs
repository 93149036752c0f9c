use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    long_about = "Draw, size and compare MIM capacitor layouts.\n\nEvery workflow writes its GDS files into the output directory.",
    help_template(
        "{before-help}{name} {version}\n{author-with-newline}{about-with-newline}\n{usage-heading} {usage}\n\n{all-args}{after-help}"
    )
)]
pub struct Args {
    /// Path to a TOML process configuration. Defaults to IHP SG13G2.
    #[arg(long, global = true)]
    pub pdk: Option<PathBuf>,

    /// Directory to which output files should be saved.
    #[arg(short, long, global = true, default_value = ".")]
    pub output_dir: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Reference, custom and RF capacitors plus a grid of sizes.
    Draw,
    /// Capacitors across sizes, a target-capacitance design and a bbox comparison.
    Sizes,
    /// Compare a custom capacitor against the reference cell.
    Compare(CompareArgs),
    /// Annotated layouts for viewing.
    Visualize,
    /// Square side length for a target capacitance.
    Size {
        /// Target capacitance in fF.
        #[arg(long)]
        target: f64,
    },
    /// Capacitance and area of a width x length capacitor.
    Capacitance {
        #[arg(long)]
        width: f64,
        #[arg(long)]
        length: f64,
    },
}

#[derive(ClapArgs, Debug, PartialEq)]
pub struct CompareArgs {
    /// Reference GDS file. Defaults to the built-in reference cell.
    #[arg(long)]
    pub reference: Option<PathBuf>,

    /// Cell to use from the reference file. Defaults to its top cell.
    #[arg(long, requires = "reference")]
    pub reference_cell: Option<String>,

    /// Width of the custom capacitor in µm.
    #[arg(long, default_value_t = 5.0)]
    pub width: f64,

    /// Length of the custom capacitor in µm.
    #[arg(long, default_value_t = 5.0)]
    pub length: f64,

    /// Print the comparison report as JSON.
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_compare() {
        let args = Args::try_parse_from([
            "capforge",
            "compare",
            "--reference",
            "ref.gds",
            "--reference-cell",
            "cmim",
            "--width",
            "8",
            "--json",
            "-o",
            "out",
        ])
        .unwrap();
        assert_eq!(args.output_dir, PathBuf::from("out"));
        assert_eq!(
            args.command,
            Command::Compare(CompareArgs {
                reference: Some(PathBuf::from("ref.gds")),
                reference_cell: Some("cmim".into()),
                width: 8.0,
                length: 5.0,
                json: true,
            })
        );
    }

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["capforge", "draw"]).unwrap();
        assert_eq!(args.output_dir, PathBuf::from("."));
        assert!(args.pdk.is_none());
        assert_eq!(args.command, Command::Draw);
    }

    #[test]
    fn test_reference_cell_needs_reference() {
        assert!(Args::try_parse_from(["capforge", "compare", "--reference-cell", "x"]).is_err());
    }

    #[test]
    fn test_size_requires_target() {
        assert!(Args::try_parse_from(["capforge", "size"]).is_err());
        let args = Args::try_parse_from(["capforge", "--pdk", "ihp.toml", "size", "--target", "100"]).unwrap();
        assert_eq!(args.pdk, Some(PathBuf::from("ihp.toml")));
        assert_eq!(args.command, Command::Size { target: 100.0 });
    }
}
