//! Banking query assistant: natural-language questions over four CSV
//! banking tables, answered through generated SQL on in-memory SQLite.

pub mod anomaly;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod filter;
pub mod guard;
pub mod history;
pub mod pipeline;
pub mod rng;
pub mod schema;
pub mod store;
pub mod translator;
pub mod types;
