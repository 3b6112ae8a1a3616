pub mod round_store;

pub use round_store::{RoundRecord, RoundStore};

use crate::error::{CoreError, Result};
use rusqlite::Connection;
use std::path::Path;
use tokio::sync::Mutex;

pub struct Storage {
    conn: Mutex<Connection>,
}

impl Storage {
    pub async fn new(db_path: &Path) -> Result<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CoreError::internal(format!("Failed to create directory: {}", e)))?;
        }

        let conn = Connection::open(db_path)?;
        let storage = Self {
            conn: Mutex::new(conn),
        };

        storage.init_schema().await?;
        Ok(storage)
    }

    async fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().await;

        // Resolved rounds table
        conn.execute(
            "CREATE TABLE IF NOT EXISTS rounds (
                round_id TEXT PRIMARY KEY,
                resolved_at INTEGER NOT NULL,
                winning_side TEXT NOT NULL,
                winner_count INTEGER NOT NULL,
                prize_value INTEGER NOT NULL,
                pool_carried INTEGER NOT NULL,
                random_value TEXT NOT NULL
            )",
            [],
        )?;

        // Fee withdrawals table
        conn.execute(
            "CREATE TABLE IF NOT EXISTS fee_withdrawals (
                id TEXT PRIMARY KEY,
                amount INTEGER NOT NULL,
                withdrawn_at INTEGER NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    pub async fn get_connection(&self) -> tokio::sync::MutexGuard<'_, Connection> {
        self.conn.lock().await
    }
}
