use std::io::Write;

use serde::Serialize;

use super::domain::LogEntry;

pub const EXPORT_FILE_NAME: &str = "happiness_log.csv";

#[derive(Debug, Serialize)]
struct ExportRow {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Score")]
    score: String,
}

/// Writes `Date,Score` followed by one row per entry in the given order.
pub fn write_csv<W: Write>(entries: &[LogEntry], writer: W) -> Result<(), ExportError> {
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    csv_writer.write_record(["Date", "Score"])?;
    for entry in entries {
        csv_writer.serialize(ExportRow {
            date: entry.date().format("%Y-%m-%d").to_string(),
            score: entry.score.to_string(),
        })?;
    }

    csv_writer.flush()?;
    Ok(())
}

pub fn export_csv(entries: &[LogEntry]) -> Result<Vec<u8>, ExportError> {
    let mut buffer = Vec::new();
    write_csv(entries, &mut buffer)?;
    Ok(buffer)
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to encode history as CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to write history export: {0}")]
    Io(#[from] std::io::Error),
}
