// src/export.rs

use anyhow::{Context, Result};
use std::io;
use std::path::Path;
use tracing::info;

use crate::recap::RecapRow;

const HEADER: [&str; 7] = [
    "subject_id",
    "subject_name",
    "date",
    "morning_check_in",
    "midday_check_in",
    "evening_check_in",
    "status",
];

/// Writes evaluated recap rows as CSV. Verdicts are rendered with their
/// display strings; an unevaluable record exports an empty status cell.
pub fn write_recap_rows<W: io::Write>(rows: &[RecapRow], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer
        .write_record(HEADER)
        .context("Failed to write CSV header")?;

    for row in rows {
        let date = row
            .record
            .date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        let status = row
            .verdict
            .map(|v| v.to_string())
            .unwrap_or_default();
        csv_writer
            .write_record([
                row.subject_id.as_str(),
                row.subject_name.as_deref().unwrap_or(""),
                date.as_str(),
                row.record.morning_check_in.as_deref().unwrap_or(""),
                row.record.midday_check_in.as_deref().unwrap_or(""),
                row.record.evening_check_in.as_deref().unwrap_or(""),
                status.as_str(),
            ])
            .with_context(|| format!("Failed to write CSV row for '{}'", row.subject_id))?;
    }

    csv_writer.flush().context("Failed to flush CSV output")?;
    Ok(())
}

pub fn export_recap_to_file(rows: &[RecapRow], path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create export file {:?}", path))?;
    write_recap_rows(rows, file)?;
    info!("Exported {} rows to {:?}", rows.len(), path);
    Ok(())
}
