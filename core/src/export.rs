//! CSV export of a successful query result.

use crate::{error::AssistantResult, store::TabularResult};
use chrono::Local;
use std::{
    io::Write,
    path::{Path, PathBuf},
};

/// `bank_query_<rows>rows_<YYYYmmdd_HHMMSS>.csv`
pub fn export_file_name(table: &TabularResult) -> String {
    format!(
        "bank_query_{}rows_{}.csv",
        table.row_count(),
        Local::now().format("%Y%m%d_%H%M%S")
    )
}

/// Header row, then one record per result row. Nulls are empty cells.
pub fn write_csv<W: Write>(table: &TabularResult, writer: W) -> AssistantResult<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(&table.columns)?;
    for row in &table.rows {
        wtr.write_record(row.iter().map(|c| c.to_string()))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write `table` into `dir` and return the file path.
pub fn export_csv(table: &TabularResult, dir: impl AsRef<Path>) -> AssistantResult<PathBuf> {
    let path = dir.as_ref().join(export_file_name(table));
    let file = std::fs::File::create(&path)?;
    write_csv(table, file)?;
    log::info!("export: saved {} rows to {}", table.row_count(), path.display());
    Ok(path)
}
