use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Record {0} already exists")]
    AlreadyExists(Uuid),
    #[error("Record {0} is terminal and can no longer be replaced")]
    TerminalRecord(Uuid),
    #[error("Failed to (de)serialize record: {0}")]
    Serde(#[from] serde_json::Error),
    #[cfg(feature = "sql")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("{0}")]
    Custom(String),
}
