//! Result filter — restricts generated SQL to an uploaded customer list.
//!
//! RULE: This is a textual rewrite, not a SQL rewrite. It only looks for
//! substrings, so subqueries, trailing semicolons, comments, GROUP BY /
//! ORDER BY tails, or `where` inside a literal can all be mis-rewritten.
//! A broken rewrite surfaces later as an ordinary SQL execution error.

use crate::{
    error::{AssistantError, AssistantResult},
    types::CustomerId,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, io::Read};

/// Customer IDs a session's results are restricted to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowList {
    ids: Vec<CustomerId>,
}

impl AllowList {
    /// Duplicates are dropped; first occurrence keeps its position.
    pub fn new(ids: impl IntoIterator<Item = CustomerId>) -> AssistantResult<Self> {
        let mut seen = HashSet::new();
        let unique: Vec<CustomerId> = ids.into_iter().filter(|id| seen.insert(*id)).collect();
        if unique.is_empty() {
            return Err(AssistantError::EmptyAllowList);
        }
        Ok(Self { ids: unique })
    }

    /// Parse an uploaded CSV. A `customer_id` header is mandatory.
    pub fn from_csv_reader<R: Read>(reader: R) -> AssistantResult<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let col = rdr
            .headers()?
            .iter()
            .position(|h| h.trim() == "customer_id")
            .ok_or(AssistantError::MissingCustomerIdColumn)?;

        let mut ids = Vec::new();
        for (i, record) in rdr.records().enumerate() {
            let record = record?;
            let cell = record.get(col).unwrap_or("").trim();
            if cell.is_empty() {
                continue;
            }
            let id = parse_id(cell).ok_or_else(|| AssistantError::InvalidCustomerId {
                row:   i + 1,
                value: cell.to_string(),
            })?;
            ids.push(id);
        }
        Self::new(ids)
    }

    pub fn from_csv_path(path: impl AsRef<std::path::Path>) -> AssistantResult<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_csv_reader(file)
    }

    pub fn ids(&self) -> &[CustomerId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// `1,2,3` — the body of the IN list.
    pub fn joined(&self) -> String {
        self.ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Sentence appended to the question so the model scopes the query
    /// itself when it can.
    pub fn prompt_context(&self) -> String {
        format!(
            "Only include rows for customer_id IN ({}).",
            self.joined()
        )
    }
}

/// Whole numbers, also accepting spreadsheet-style `42.0`.
fn parse_id(cell: &str) -> Option<CustomerId> {
    if let Ok(id) = cell.parse::<CustomerId>() {
        return Some(id);
    }
    let f: f64 = cell.parse().ok()?;
    (f.fract() == 0.0 && f.is_finite()).then_some(f as CustomerId)
}

/// Append a `customer_id IN (...)` restriction to `sql` unless it
/// already has one.
pub fn apply_allowlist(sql: &str, ids: Option<&[CustomerId]>) -> String {
    let ids = match ids {
        Some(ids) if !ids.is_empty() => ids,
        _ => return sql.to_string(),
    };
    let lower = sql.to_lowercase();
    if lower.contains("customer_id in") {
        return sql.to_string();
    }
    let list = ids
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",");
    let keyword = if lower.contains("where") { "AND" } else { "WHERE" };
    format!("{sql} {keyword} customer_id IN ({list})")
}
