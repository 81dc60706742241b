pub mod game_store;
pub mod player_store;

pub use game_store::{GameStore, GameSummary};
pub use player_store::PlayerStore;

use crate::error::{DoppelError, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Transaction, TransactionBehavior};
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
                .map_err(|e| DoppelError::internal(format!("Failed to create directory: {}", e)))?;
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

        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")?;

        // Games table
        conn.execute(
            "CREATE TABLE IF NOT EXISTS games (
                id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                resolved_at INTEGER,
                winning_bet TEXT,
                has_birthday_match INTEGER
            )",
            [],
        )?;

        // Players table
        conn.execute(
            "CREATE TABLE IF NOT EXISTS players (
                id TEXT PRIMARY KEY,
                fid INTEGER NOT NULL,
                wallet TEXT NOT NULL,
                birthday TEXT NOT NULL,
                bet TEXT,
                paid INTEGER NOT NULL DEFAULT 0,
                payment_proof TEXT,
                payout INTEGER,
                game_id TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                active INTEGER NOT NULL DEFAULT 1,
                FOREIGN KEY (game_id) REFERENCES games(id)
            )",
            [],
        )?;

        // One seat per fid across all unresolved games
        conn.execute(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_players_active_fid
             ON players(fid) WHERE active = 1",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_players_game ON players(game_id)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_games_status ON games(status, created_at)",
            [],
        )?;

        Ok(())
    }

    pub async fn get_connection(&self) -> tokio::sync::MutexGuard<'_, Connection> {
        self.conn.lock().await
    }

    /// Runs `f` inside a `BEGIN IMMEDIATE` transaction. The write lock is taken
    /// up front, so reads made inside `f` stay valid until commit. An `Err`
    /// from `f` rolls everything back.
    pub async fn with_transaction<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> std::result::Result<T, E>,
        E: From<DoppelError>,
    {
        let mut conn = self.conn.lock().await;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(DoppelError::from)?;
        let value = f(&tx)?;
        tx.commit().map_err(DoppelError::from)?;
        Ok(value)
    }
}

pub(crate) fn to_millis(ts: &DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

pub(crate) fn from_millis(idx: usize, millis: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, millis))
}

pub(crate) fn parse_column<T: std::str::FromStr>(
    idx: usize,
    name: &str,
    value: &str,
) -> rusqlite::Result<T> {
    value.parse().map_err(|_| {
        rusqlite::Error::InvalidColumnType(idx, name.to_string(), rusqlite::types::Type::Text)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("doppel.db");

        let storage = Storage::new(&path).await.unwrap();
        storage.init_schema().await.unwrap();
        drop(storage);

        // reopening an existing database keeps working
        Storage::new(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_transaction_rolls_back_on_error() {
        let temp_dir = tempdir().unwrap();
        let storage = Storage::new(&temp_dir.path().join("doppel.db")).await.unwrap();

        let result: Result<()> = storage
            .with_transaction(|tx| {
                tx.execute(
                    "INSERT INTO games (id, status, created_at) VALUES ('g1', 'open', 0)",
                    [],
                )?;
                Err(DoppelError::internal("abort"))
            })
            .await;
        assert!(result.is_err());

        let conn = storage.get_connection().await;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM games", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
