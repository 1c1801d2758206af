use crate::{error::Result, metrics::MetricRecord, sample::SoundingSample};
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};
use tracing::debug;

/// Default name of the output file.
pub const DEFAULT_OUTPUT: &str = "weather_data.json";

/// Write the records to `path` as a JSON array, replacing anything already there.
///
/// The JSON goes to a temporary file next to `path` first and is then renamed into place, so a
/// failure leaves any existing file untouched.
pub fn write_records(path: &Path, records: &[MetricRecord]) -> Result<()> {
    let json = serde_json::to_vec(records)?;

    let tmp_path = temporary_path(path);
    {
        let mut output = BufWriter::new(File::create(&tmp_path)?);
        output.write_all(&json)?;
        output.flush()?;
    }

    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err.into());
    }

    debug!(path = %path.display(), records = records.len(), "wrote records");
    Ok(())
}

/// Compute the metrics for a sample and write them to `path` as a single record array.
pub fn export(sample: &SoundingSample, path: &Path) -> Result<MetricRecord> {
    let record = crate::metrics::compute_metrics(sample)?;
    write_records(path, &[record])?;
    Ok(record)
}

fn temporary_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
