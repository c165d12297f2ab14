//! Schema registry — the four banking tables and their column names.
//!
//! RULE: The table set is fixed. Column names come from the CSV headers
//! at startup and never change afterwards.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The four banking datasets.
/// Order here is the order tables appear in prompts and load logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BankTable {
    Customer,
    Account,
    Loan,
    Transaction,
}

impl BankTable {
    pub const ALL: [BankTable; 4] = [
        BankTable::Customer,
        BankTable::Account,
        BankTable::Loan,
        BankTable::Transaction,
    ];

    /// Logical name used by the schema descriptor.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Customer    => "customer",
            Self::Account     => "account",
            Self::Loan        => "loan",
            Self::Transaction => "transaction",
        }
    }

    /// Name of the table inside SQLite. `transaction` is a reserved word,
    /// so that dataset lives in `transactions`.
    pub fn sql_name(&self) -> &'static str {
        match self {
            Self::Transaction => "transactions",
            other             => other.name(),
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Customer    => "customer.csv",
            Self::Account     => "account.csv",
            Self::Loan        => "loan.csv",
            Self::Transaction => "transaction.csv",
        }
    }
}

/// Table → ordered column names. Built once, shared read-only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    tables: BTreeMap<BankTable, Vec<String>>,
}

impl SchemaDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: BankTable, columns: Vec<String>) -> Self {
        self.tables.insert(table, columns);
        self
    }

    pub fn insert(&mut self, table: BankTable, columns: Vec<String>) {
        self.tables.insert(table, columns);
    }

    /// Columns of `table`, empty if the table was never registered.
    pub fn columns(&self, table: BankTable) -> &[String] {
        self.tables.get(&table).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `col_a, col_b, col_c` — the form embedded in prompts.
    pub fn column_list(&self, table: BankTable) -> String {
        self.columns(table).join(", ")
    }

    pub fn has_column(&self, table: BankTable, column: &str) -> bool {
        self.columns(table)
            .iter()
            .any(|c| c.eq_ignore_ascii_case(column))
    }

    pub fn is_complete(&self) -> bool {
        BankTable::ALL.iter().all(|t| self.tables.contains_key(t))
    }
}
