//! Text output for the `list` and `status` commands.

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use super::OutputFormat;
use crate::error::Result;
use crate::presenter::RowFormatter;
use crate::record::LocationRecord;
use crate::storage::StorageStats;

/// Write `records` in `format`.
///
/// # Errors
///
/// Returns an error if writing or JSON encoding fails.
pub fn write_records<W: Write>(
    out: &mut W,
    records: &[LocationRecord],
    format: OutputFormat,
    formatter: &RowFormatter,
) -> Result<()> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, records)?;
            writeln!(out)?;
        }
        OutputFormat::Plain => {
            for row in formatter.rows(records) {
                writeln!(out, "{}\t{}", row.coordinate, row.timestamps)?;
            }
        }
        OutputFormat::Table => {
            let rows = formatter.rows(records);
            let width = rows
                .iter()
                .map(|r| r.coordinate.len())
                .max()
                .unwrap_or(0)
                .max("COORDINATE".len());
            writeln!(out, "{:<width$}  TIMESTAMPS", "COORDINATE")?;
            writeln!(out, "{:-<width$}  {:-<10}", "", "")?;
            for row in rows {
                writeln!(out, "{:<width$}  {}", row.coordinate, row.timestamps)?;
            }
        }
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct StatusReport<'a> {
    database_path: &'a Path,
    total_locations: i64,
    oldest_location: Option<String>,
    newest_location: Option<String>,
    db_size_bytes: u64,
}

/// Write store statistics as text or JSON.
///
/// # Errors
///
/// Returns an error if writing or JSON encoding fails.
pub fn write_status<W: Write>(
    out: &mut W,
    stats: &StorageStats,
    database_path: &Path,
    json: bool,
    formatter: &RowFormatter,
) -> Result<()> {
    let oldest = stats.oldest_location.map(|t| formatter.format_timestamp(t));
    let newest = stats.newest_location.map(|t| formatter.format_timestamp(t));

    if json {
        let report = StatusReport {
            database_path,
            total_locations: stats.total_locations,
            oldest_location: stats.oldest_location.map(|t| t.to_rfc3339()),
            newest_location: stats.newest_location.map(|t| t.to_rfc3339()),
            db_size_bytes: stats.db_size_bytes,
        };
        serde_json::to_writer_pretty(&mut *out, &report)?;
        writeln!(out)?;
        return Ok(());
    }

    writeln!(out, "backtrail status")?;
    writeln!(out, "----------------")?;
    writeln!(out, "Database:      {}", database_path.display())?;
    writeln!(out, "Locations:     {}", stats.total_locations)?;
    writeln!(out, "Oldest:        {}", oldest.as_deref().unwrap_or("-"))?;
    writeln!(out, "Newest:        {}", newest.as_deref().unwrap_or("-"))?;
    writeln!(out, "Size:          {} bytes", stats.db_size_bytes)?;
    Ok(())
}
