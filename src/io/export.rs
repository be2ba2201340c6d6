//! CSV export for persisted simulation steps.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::storage::SimulationStepRecord;

/// Column header for CSV telemetry export.
const HEADER: &str = "simulation_step,power_from_main_w,power_from_main_var,\
                      distribution_loss_w,total_pv_power_w,agents";

/// Exports simulation steps to a CSV file at the given path.
///
/// Writes a header row followed by one data row per step. Produces
/// deterministic output for identical inputs.
///
/// # Arguments
///
/// * `steps` - Persisted steps, in the order they should appear
/// * `path` - Output file path
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_csv(steps: &[SimulationStepRecord], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_csv(steps, buf)
}

/// Writes simulation steps as CSV to any writer.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_csv(steps: &[SimulationStepRecord], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    wtr.write_record(HEADER.split(',').map(str::trim))?;

    for s in steps {
        let power = s.simulation_result.power_from_main();
        wtr.write_record(&[
            s.simulation_step.to_string(),
            format!("{:.4}", power.re),
            format!("{:.4}", power.im),
            format!("{:.4}", s.simulation_result.distribution_loss()),
            format!("{:.4}", s.total_pv_power),
            s.agents_states.len().to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
