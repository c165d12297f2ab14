//! Shared primitive types used across the assistant.

/// Primary key of a row in the `customer` table.
pub type CustomerId = i64;

/// Identifier of one entry in the query history.
pub type EntryId = String;
