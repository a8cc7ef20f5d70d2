pub mod challenge_store;
pub mod memory;
pub mod payout_store;

pub use challenge_store::{ChallengeStore, SqliteChallengeStore};
pub use memory::MemoryChallengeStore;
pub use payout_store::{NewPayout, PayoutStore};

use crate::error::{GoalieError, Result};
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
                .map_err(|e| GoalieError::internal(format!("Failed to create directory: {}", e)))?;
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

        // Users table
        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                wallet TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;

        // Challenges table
        conn.execute(
            "CREATE TABLE IF NOT EXISTS challenges (
                id TEXT PRIMARY KEY,
                creator_wallet TEXT NOT NULL,
                target_grid INTEGER NOT NULL,
                total_amount INTEGER NOT NULL,
                creation_proof TEXT NOT NULL,
                selected_grid INTEGER,
                correct_guess_proofs TEXT NOT NULL,
                incorrect_guess_proofs TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                completed_at INTEGER,
                FOREIGN KEY (creator_wallet) REFERENCES users(wallet)
            )",
            [],
        )?;

        // Challenger relation
        conn.execute(
            "CREATE TABLE IF NOT EXISTS challenge_challengers (
                challenge_id TEXT NOT NULL,
                wallet TEXT NOT NULL,
                joined_at INTEGER NOT NULL,
                FOREIGN KEY (challenge_id) REFERENCES challenges(id),
                FOREIGN KEY (wallet) REFERENCES users(wallet),
                PRIMARY KEY (challenge_id, wallet)
            )",
            [],
        )?;

        // Payout transactions
        conn.execute(
            "CREATE TABLE IF NOT EXISTS payouts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                challenge_id TEXT NOT NULL,
                from_wallet TEXT NOT NULL,
                to_wallet TEXT NOT NULL,
                amount INTEGER NOT NULL,
                token TEXT NOT NULL,
                state TEXT NOT NULL,
                tx_hash TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                confirmed_at INTEGER,
                FOREIGN KEY (challenge_id) REFERENCES challenges(id)
            )",
            [],
        )?;

        Ok(())
    }

    pub async fn get_connection(&self) -> tokio::sync::MutexGuard<'_, Connection> {
        self.conn.lock().await
    }
}
