//! Recent-query history for one session. Most recent first.

use crate::types::EntryId;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

const PREVIEW_CHARS: usize = 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id:       EntryId,
    pub asked_at: DateTime<Local>,
    pub question: String,
    pub sql:      Option<String>,
    pub rows:     usize,
}

impl HistoryEntry {
    /// `HH:MM — question preview (n rows)`
    pub fn label(&self) -> String {
        format!(
            "{} — {} ({} rows)",
            self.asked_at.format("%H:%M"),
            preview(&self.question),
            self.rows
        )
    }
}

fn preview(question: &str) -> String {
    if question.chars().count() > PREVIEW_CHARS {
        let head: String = question.chars().take(PREVIEW_CHARS).collect();
        format!("{head}...")
    } else {
        question.to_string()
    }
}

#[derive(Debug, Clone)]
pub struct QueryHistory {
    entries: Vec<HistoryEntry>,
    limit:   usize,
}

impl QueryHistory {
    /// Keeps at most `limit` entries; the oldest go first.
    pub fn new(limit: usize) -> Self {
        Self { entries: Vec::new(), limit }
    }

    pub fn record(&mut self, question: &str, sql: Option<&str>, rows: usize) {
        let entry = HistoryEntry {
            id:       uuid::Uuid::new_v4().to_string(),
            asked_at: Local::now(),
            question: question.to_string(),
            sql:      sql.map(str::to_string),
            rows,
        };
        self.entries.insert(0, entry);
        self.entries.truncate(self.limit);
    }

    pub fn recent(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Entry by position in `recent()`.
    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        self.recent().get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
