//! SQLite relational store.
//!
//! RULE: Only the store talks to the database.
//! The pipeline hands it SQL text and gets back either a table or a
//! `StoreError` carrying SQLite's own message. Nothing is retried.

use crate::{error::AssistantResult, schema::BankTable};
use rusqlite::{types::Value, Connection, Statement};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

mod load;

/// Execution failure for a single statement. `message` is the engine's
/// text, surfaced to the user verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("SQL Error: {message}")]
pub struct StoreError {
    pub message: String,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// One value in a result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Cell {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Integer(n) => Some(*n as f64),
            Cell::Real(f)    => Some(*f),
            Cell::Text(s)    => s.trim().parse().ok(),
            _                => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _             => None,
        }
    }
}

impl From<Value> for Cell {
    fn from(v: Value) -> Self {
        match v {
            Value::Null       => Cell::Null,
            Value::Integer(n) => Cell::Integer(n),
            Value::Real(f)    => Cell::Real(f),
            Value::Text(s)    => Cell::Text(s),
            Value::Blob(b)    => Cell::Blob(b),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null       => Ok(()),
            Cell::Integer(n) => write!(f, "{n}"),
            Cell::Real(x)    => write!(f, "{x}"),
            Cell::Text(s)    => f.write_str(s),
            Cell::Blob(b)    => write!(f, "[BLOB {} bytes]", b.len()),
        }
    }
}

/// Ordered columns plus zero or more rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TabularResult {
    pub columns: Vec<String>,
    pub rows:    Vec<Vec<Cell>>,
}

impl TabularResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Index of `name`, matched case-insensitively.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Keep only the named columns (those that exist), in the given order.
    pub fn project(&self, names: &[&str]) -> TabularResult {
        let picks: Vec<(usize, String)> = names
            .iter()
            .filter_map(|n| self.column_index(n).map(|i| (i, self.columns[i].clone())))
            .collect();
        TabularResult {
            columns: picks.iter().map(|(_, c)| c.clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|r| picks.iter().map(|(i, _)| r[*i].clone()).collect())
                .collect(),
        }
    }
}

pub struct BankStore {
    conn: Connection,
}

impl BankStore {
    /// Open an empty in-memory database.
    pub fn in_memory() -> AssistantResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Execute generated SQL. Only statements that read and return rows
    /// are run; anything that would change the tables is refused unexecuted.
    pub fn execute(&self, sql: &str) -> Result<TabularResult, StoreError> {
        if !has_statement(sql) {
            return Err(StoreError::new("no SQL statement to execute"));
        }
        let mut stmt = self.conn.prepare(sql).map_err(|e| StoreError::new(e.to_string()))?;
        if !stmt.readonly() || stmt.column_count() == 0 {
            log::warn!("store: refused non-query statement");
            return Err(StoreError::new("only read-only queries can run against the banking tables"));
        }
        collect_rows(&mut stmt).map_err(|e| StoreError::new(e.to_string()))
    }

    /// All rows of the transaction table, for the anomaly check.
    pub fn transactions(&self) -> AssistantResult<TabularResult> {
        let sql = format!("SELECT * FROM {}", BankTable::Transaction.sql_name());
        Ok(self.run(&sql)?)
    }

    pub fn row_count(&self, table: BankTable) -> AssistantResult<i64> {
        let count = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_ident(table.sql_name())),
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn run(&self, sql: &str) -> rusqlite::Result<TabularResult> {
        let mut stmt = self.conn.prepare(sql)?;
        collect_rows(&mut stmt)
    }
}

fn collect_rows(stmt: &mut Statement<'_>) -> rusqlite::Result<TabularResult> {
    let columns: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();
    let width = columns.len();
    let rows = stmt
        .query_map([], |row| {
            (0..width)
                .map(|i| row.get::<_, Value>(i).map(Cell::from))
                .collect::<Result<Vec<_>, _>>()
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(TabularResult { columns, rows })
}

/// False when `sql` is only whitespace, `;` and comments.
fn has_statement(sql: &str) -> bool {
    let mut rest = sql;
    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ';');
        if let Some(after) = rest.strip_prefix("--") {
            rest = after.split_once('\n').map_or("", |(_, tail)| tail);
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.split_once("*/").map_or("", |(_, tail)| tail);
        } else {
            return !rest.is_empty();
        }
    }
}

/// Double-quote an identifier for SQLite.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
