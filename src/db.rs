use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;

use crate::error::StoreError;

/// Open a pool on one knowledge base generation file.
///
/// Generations are written once and then only read, so writers create the
/// file and readers open it read-only.
pub async fn connect(db_path: &Path, writable: bool) -> Result<SqlitePool, StoreError> {
    let options = if writable {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Delete)
    } else {
        SqliteConnectOptions::new()
            .filename(db_path)
            .read_only(true)
    };

    let pool = SqlitePoolOptions::new()
        .max_connections(if writable { 1 } else { 4 })
        .connect_with(options)
        .await?;

    Ok(pool)
}
