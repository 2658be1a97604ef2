//! Solve metrics reporting.
//!
//! Every solver-backed device on the chip yields one record comparing
//! its targets against the assembled path. The report prints as an
//! aligned table on stdout, or exports as CSV when a path is given.

use csv::Writer;
use std::fs::metadata;
use std::path::Path;
use terminal_size::{terminal_size, Width};

use crate::device::DeviceMetrics;
use crate::{infoln, query, PicmaskError, QueryDefault};

/// Prints the metrics as a human-readable table.
///
/// The device column shrinks on narrow terminals.
pub fn print_table(metrics: &[DeviceMetrics]) {
    let columns = terminal_size()
        .map(|(Width(w), _)| w as usize)
        .unwrap_or(120);
    let name_width = if columns < 120 { 12 } else { 20 };

    println!(
        "\n{:<8} | {:<name_width$} | {:>6} | {:>6} | {:>12} | {:>9} | {:>12} | {:>9}",
        "Die", "Device", "Width", "r", "Length (μm)", "ΔL", "Span (μm)", "ΔD",
    );
    println!(
        "{:-<8}-|-{:-<name_width$}-|-{:->6}-|-{:->6}-|-{:->12}-|-{:->9}-|-{:->12}-|-{:->9}",
        "", "", "", "", "", "", "", "",
    );

    for m in metrics {
        let device: String = m.device.chars().take(name_width).collect();
        println!(
            "{:<8} | {:<name_width$} | {:>6.3} | {:>6} | {:>12.3} | {:>9.2e} | {:>12.3} | {:>9.2e}",
            m.die,
            device,
            m.width,
            m.bend_radius,
            m.length,
            (m.length - m.target_length).abs(),
            m.span,
            (m.span - m.target_span).abs(),
        );
    }
}

/// Exports the metrics as CSV, confirming before overwriting.
///
/// # Arguments
/// * `metrics` - Records to export
/// * `filename` - Output path
/// * `verbose` - Whether to report the written file
pub fn write_csv(
    metrics: &[DeviceMetrics],
    filename: &Path,
    verbose: bool,
) -> Result<(), PicmaskError> {
    if metadata(filename).is_ok() {
        let allow = query(
            format!("'{}' already exists. Overwrite?", filename.display()).as_str(),
            QueryDefault::Yes,
        )?;

        if !allow {
            infoln!("Aborting...");
            return Ok(());
        }
    }

    let mut writer = Writer::from_path(filename)?;
    writer.write_record([
        "die",
        "device",
        "width",
        "bend_radius",
        "target_length",
        "length",
        "target_span",
        "span",
        "a",
        "u",
    ])?;

    for m in metrics {
        writer.write_record([
            m.die.clone(),
            m.device.clone(),
            m.width.to_string(),
            m.bend_radius.to_string(),
            m.target_length.to_string(),
            m.length.to_string(),
            m.target_span.to_string(),
            m.span.to_string(),
            m.solved[0].to_string(),
            m.solved[1].to_string(),
        ])?;
    }
    writer.flush()?;

    if verbose {
        infoln!("Wrote {} metric records to {}", metrics.len(), filename.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<DeviceMetrics> {
        vec![DeviceMetrics {
            die: String::from("Die 1"),
            device: String::from("w556r20"),
            width: 0.556,
            bend_radius: 20.0,
            target_length: 10000.0,
            length: 10000.0,
            target_span: 3300.0,
            span: 3300.0,
            solved: [1475.18, 1005.0],
        }]
    }

    #[test]
    fn csv_carries_header_and_rows() {
        let out = std::env::temp_dir().join(format!("picmask_report_{}.csv", std::process::id()));
        let _ = std::fs::remove_file(&out);

        write_csv(&sample(), &out, false).unwrap();
        let content = std::fs::read_to_string(&out).unwrap();

        assert!(content.starts_with("die,device,width"));
        assert!(content.contains("w556r20"));
        assert_eq!(content.lines().count(), 2);

        let _ = std::fs::remove_file(&out);
    }

    #[test]
    fn table_prints_without_panicking() {
        print_table(&sample());
    }
}
