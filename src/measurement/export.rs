use super::buffer::MeasurementRecord;
use crate::error::ExportError;
use std::fmt::Write as _;
use std::path::Path;
use tokio::fs;
use tracing::debug;

/// Column order of the exported table
pub const CSV_HEADER: [&str; 10] = [
    "timestamp", "hip_x", "hip_y", "knee_x", "knee_y", "ankle_x", "ankle_y", "angle", "stage",
    "counter",
];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Render records as CSV text, one row per record in the order given.
///
/// Output depends only on the records, so identical sessions export byte-identical files.
pub fn render_csv(records: &[MeasurementRecord]) -> String {
    let mut out = String::with_capacity(64 * (records.len() + 1));
    out.push_str(&CSV_HEADER.join(","));
    out.push('\n');

    for record in records {
        let joints = &record.sample.joints;
        // Writing into a String cannot fail
        let _ = writeln!(
            out,
            "{},{},{},{},{},{},{},{},{},{}",
            record.sample.timestamp.format(TIMESTAMP_FORMAT),
            joints.hip.x,
            joints.hip.y,
            joints.knee.x,
            joints.knee.y,
            joints.ankle.x,
            joints.ankle.y,
            record.sample.angle_degrees,
            record.stage.label(),
            record.count,
        );
    }

    out
}

/// Write records as CSV to `path`, creating parent directories.
///
/// An empty record set is rejected before anything touches the filesystem.
pub async fn write_csv(path: &Path, records: &[MeasurementRecord]) -> Result<u64, ExportError> {
    if records.is_empty() {
        return Err(ExportError::EmptyExportRequest);
    }

    let body = render_csv(records);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|source| ExportError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
    }

    fs::write(path, body.as_bytes())
        .await
        .map_err(|source| ExportError::Write {
            path: path.to_path_buf(),
            source,
        })?;

    debug!("Wrote {} rows to {}", records.len(), path.display());
    Ok(body.len() as u64)
}
