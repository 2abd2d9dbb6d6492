use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContasError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Spreadsheet error: {0}")]
    Sheet(String),

    #[error("Unsupported document '{name}': {reason}")]
    UnsupportedDocument { name: String, reason: String },

    #[error("Unknown account: {0}")]
    UnknownAccount(String),

    #[error("Import cancelled")]
    Cancelled,

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ContasError>;
