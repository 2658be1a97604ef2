use clap::Parser;
use std::error::Error;
use std::path::{Path, PathBuf};

use picmask::{config, placement, report, vprintln};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Layout configuration (JSON or YAML)
    config: PathBuf,

    /// Output GDS file; defaults to the configured path or a
    /// date-stamped name
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write the per-device solve metrics as CSV
    #[arg(short, long)]
    report: Option<PathBuf>,

    /// Solve and verify every device without writing the GDS
    #[arg(short, long)]
    dry_run: bool,

    #[arg(short, long)]
    quiet: bool,
}

fn expand(path: &Path) -> PathBuf {
    shellexpand::path::tilde(path).into_owned()
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let verbose = !args.quiet;

    vprintln!(verbose, "picmask {}", picmask::VER);
    vprintln!(verbose, "Reading configuration...");
    let config = config::read(&expand(&args.config))?;

    vprintln!(verbose, "Assembling chip...");
    let (top, metrics) = placement::assemble_chip(&config, verbose)?;

    let report_path = args
        .report
        .clone()
        .or_else(|| config.output.report_path.clone());
    match report_path {
        Some(path) => report::write_csv(&metrics, &expand(&path), verbose)?,
        None if verbose && !metrics.is_empty() => report::print_table(&metrics),
        None => {}
    }

    if !args.dry_run {
        let output = args
            .output
            .clone()
            .or_else(|| config.output.gds_path.clone())
            .unwrap_or_else(|| PathBuf::from(placement::default_gds_name()));
        placement::write_gds(top, &expand(&output), verbose)?;
    }

    Ok(())
}
