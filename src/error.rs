use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Redb(#[from] redb::Error),

    #[error("database open error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("database storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("database transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("database table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("database commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("payload encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A source row failed shape or range checks before reaching the store.
    #[error("invalid record at line {line}: {field}: {reason}")]
    Validation {
        line: u64,
        field: &'static str,
        reason: String,
    },

    /// A commit group was rejected. `group` is zero-based, so it is also the
    /// number of earlier groups that stay durable.
    #[error("write failed in commit group {group}: {reason}")]
    WriteFailure { group: usize, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("data directory is not a directory and could not be created: {0}")]
    DataDir(PathBuf),
}
