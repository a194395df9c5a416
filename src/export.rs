//! Writing sweep results for external plotting.

use crate::sweep::SweepResults;
use anyhow::{Context, Result};
use log::info;
use noc_sweep_common::{MetricSeries, OutputConfig, OutputFormat, METRIC_NAMES};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Writes one `<key>.csv` per series and a `sweep_results.<ext>` archive of
/// all of them into the output directory. Returns the paths written.
pub fn export_results(results: &SweepResults, output: &OutputConfig) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(&output.directory).with_context(|| {
        format!("Failed to create output directory '{}'", output.directory.display())
    })?;

    let mut written = Vec::with_capacity(results.len() + 1);
    for (key, series) in results {
        let path = output.directory.join(format!("{}.csv", key));
        write_csv(series, &path)?;
        written.push(path);
    }

    let archive = output.directory.join(format!("sweep_results.{}", output.format.extension()));
    write_archive(results, output.format, &archive)?;
    written.push(archive);

    info!("Saved {} series to {}", results.len(), output.directory.display());
    Ok(written)
}

/// One row per independent value: the value, then every metric in
/// [`METRIC_NAMES`] order.
pub fn write_csv(series: &MetricSeries, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV file '{}'", path.display()))?;

    let mut header = vec![series.independent_variable.as_str()];
    header.extend(METRIC_NAMES.iter().copied());
    writer.write_record(&header)?;

    for (row, value) in series.independent_values.iter().enumerate() {
        let mut record = vec![value.to_string()];
        for name in METRIC_NAMES {
            let cell = series.metric(name).and_then(|values| values.get(row));
            record.push(cell.map(f64::to_string).unwrap_or_default());
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_archive(results: &SweepResults, format: OutputFormat, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create results file '{}'", path.display()))?;
    let mut writer = BufWriter::new(file);
    match format {
        OutputFormat::Json => serde_json::to_writer(&mut writer, results)
            .context("Failed to serialize results to JSON")?,
        OutputFormat::Bincode => bincode::serialize_into(&mut writer, results)
            .context("Failed to serialize results to bincode")?,
        OutputFormat::MessagePack => rmp_serde::encode::write(&mut writer, results)
            .context("Failed to serialize results to MessagePack")?,
    }
    writer.flush()?;
    Ok(())
}
