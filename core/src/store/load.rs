use super::{quote_ident, BankStore};
use crate::{
    error::{AssistantError, AssistantResult},
    schema::{BankTable, SchemaDescriptor},
};
use rusqlite::{params_from_iter, types::Value};
use std::{io::Read, path::Path};

/// Column affinity inferred from the CSV cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Affinity {
    Integer,
    Real,
    Text,
}

impl Affinity {
    fn sql(&self) -> &'static str {
        match self {
            Affinity::Integer => "INTEGER",
            Affinity::Real    => "REAL",
            Affinity::Text    => "TEXT",
        }
    }

    fn infer<'a>(cells: impl Iterator<Item = &'a str>) -> Self {
        let mut affinity = Affinity::Integer;
        for cell in cells.map(str::trim).filter(|c| !c.is_empty()) {
            if affinity == Affinity::Integer && cell.parse::<i64>().is_err() {
                affinity = Affinity::Real;
            }
            if affinity == Affinity::Real && cell.parse::<f64>().is_err() {
                return Affinity::Text;
            }
        }
        affinity
    }

    fn value(&self, cell: &str) -> Value {
        let trimmed = cell.trim();
        if trimmed.is_empty() {
            return Value::Null;
        }
        match self {
            Affinity::Integer => trimmed.parse().map(Value::Integer).unwrap_or(Value::Null),
            Affinity::Real    => trimmed.parse().map(Value::Real).unwrap_or(Value::Null),
            Affinity::Text    => Value::Text(cell.to_string()),
        }
    }
}

impl BankStore {
    /// Build a store from the four CSV files in `data_dir` and return it
    /// together with the schema read from their headers.
    pub fn load(data_dir: impl AsRef<Path>) -> AssistantResult<(Self, SchemaDescriptor)> {
        let data_dir = data_dir.as_ref();
        let store = Self::in_memory()?;
        let mut schema = SchemaDescriptor::new();

        for table in BankTable::ALL {
            let path = data_dir.join(table.file_name());
            if !path.exists() {
                return Err(AssistantError::DatasetMissing {
                    table: table.name().to_string(),
                    path: path.display().to_string(),
                });
            }
            let file = std::fs::File::open(&path)?;
            let columns = store.load_table(table, file)?;
            schema.insert(table, columns);
        }

        log::info!("store: loaded {} tables from {}", BankTable::ALL.len(), data_dir.display());
        Ok((store, schema))
    }

    /// Replace `table` with the contents of a CSV stream. Returns the
    /// header, which becomes the table's column list.
    pub fn load_table<R: Read>(&self, table: BankTable, reader: R) -> AssistantResult<Vec<String>> {
        let mut rdr = csv::Reader::from_reader(reader);
        let columns: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();
        let records = rdr.records().collect::<Result<Vec<_>, _>>()?;

        let affinities: Vec<Affinity> = (0..columns.len())
            .map(|i| Affinity::infer(records.iter().filter_map(|r| r.get(i))))
            .collect();

        let name = quote_ident(table.sql_name());
        let column_defs = columns
            .iter()
            .zip(&affinities)
            .map(|(c, a)| format!("{} {}", quote_ident(c), a.sql()))
            .collect::<Vec<_>>()
            .join(", ");

        let tx = self.conn.unchecked_transaction()?;
        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS {name}; CREATE TABLE {name} ({column_defs});"
        ))?;
        {
            let placeholders = (1..=columns.len())
                .map(|i| format!("?{i}"))
                .collect::<Vec<_>>()
                .join(", ");
            let mut insert = tx.prepare(&format!("INSERT INTO {name} VALUES ({placeholders})"))?;
            for record in &records {
                let values = affinities
                    .iter()
                    .enumerate()
                    .map(|(i, a)| a.value(record.get(i).unwrap_or("")));
                insert.execute(params_from_iter(values))?;
            }
        }
        tx.commit()?;

        log::debug!("store: {} <- {} rows, {} columns", table.sql_name(), records.len(), columns.len());
        Ok(columns)
    }
}
