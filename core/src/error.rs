use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Dataset '{table}' not found at {path}")]
    DatasetMissing { table: String, path: String },

    #[error("Uploaded file must contain a 'customer_id' column")]
    MissingCustomerIdColumn,

    #[error("Invalid customer_id '{value}' on row {row}")]
    InvalidCustomerId { row: usize, value: String },

    #[error("Uploaded file contains no customer IDs")]
    EmptyAllowList,

    #[error("No successful result to export")]
    NothingToExport,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type AssistantResult<T> = Result<T, AssistantError>;
