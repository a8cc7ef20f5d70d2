use crate::error::Result;
use crate::storage::Storage;
use crate::types::{PayoutRecord, PayoutState};
use chrono::{DateTime, Utc};
use rusqlite::params;

/// Fields for a payout row before it is assigned an id.
#[derive(Debug, Clone)]
pub struct NewPayout {
    pub challenge_id: String,
    pub from_wallet: String,
    pub to_wallet: String,
    pub amount: u64,
    pub token: String,
}

/// Payout transaction records: one row per recipient, Pending until the
/// transfer reference is known.
pub struct PayoutStore<'a> {
    storage: &'a Storage,
}

impl<'a> PayoutStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub async fn create(&self, new: &NewPayout) -> Result<i64> {
        let conn = self.storage.get_connection().await;

        conn.execute(
            "INSERT INTO payouts
                 (challenge_id, from_wallet, to_wallet, amount, token, state, tx_hash, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, '', ?7)",
            params![
                new.challenge_id,
                new.from_wallet,
                new.to_wallet,
                new.amount as i64,
                new.token,
                serde_json::to_string(&PayoutState::Pending)?,
                Utc::now().timestamp(),
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    pub async fn confirm(&self, payout_id: i64, tx_hash: &str, when: DateTime<Utc>) -> Result<()> {
        let conn = self.storage.get_connection().await;

        conn.execute(
            "UPDATE payouts SET state = ?1, tx_hash = ?2, confirmed_at = ?3 WHERE id = ?4",
            params![
                serde_json::to_string(&PayoutState::Confirmed)?,
                tx_hash,
                when.timestamp(),
                payout_id,
            ],
        )?;

        Ok(())
    }

    pub async fn mark_failed(&self, payout_id: i64) -> Result<()> {
        let conn = self.storage.get_connection().await;

        conn.execute(
            "UPDATE payouts SET state = ?1 WHERE id = ?2",
            params![serde_json::to_string(&PayoutState::Failed)?, payout_id],
        )?;

        Ok(())
    }

    pub async fn list_for_challenge(&self, challenge_id: &str) -> Result<Vec<PayoutRecord>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(
            "SELECT id, challenge_id, from_wallet, to_wallet, amount, token, state, tx_hash,
                    created_at, confirmed_at
             FROM payouts WHERE challenge_id = ?1 ORDER BY created_at ASC",
        )?;

        let payout_iter = stmt.query_map(params![challenge_id], |row| {
            let state_json: String = row.get(6)?;
            let state: PayoutState = serde_json::from_str(&state_json).map_err(|_| {
                rusqlite::Error::InvalidColumnType(
                    6,
                    "state".to_string(),
                    rusqlite::types::Type::Text,
                )
            })?;
            let confirmed_at: Option<i64> = row.get(9)?;

            Ok(PayoutRecord {
                id: row.get(0)?,
                challenge_id: row.get(1)?,
                from_wallet: row.get(2)?,
                to_wallet: row.get(3)?,
                amount: row.get::<_, i64>(4)? as u64,
                token: row.get(5)?,
                state,
                tx_hash: row.get(7)?,
                created_at: DateTime::from_timestamp(row.get(8)?, 0).unwrap_or_else(Utc::now),
                confirmed_at: confirmed_at.and_then(|t| DateTime::from_timestamp(t, 0)),
            })
        })?;

        let mut payouts = Vec::new();
        for payout in payout_iter {
            payouts.push(payout?);
        }

        Ok(payouts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_payout_lifecycle() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(&dir.path().join("goalie.db")).await.unwrap();
        let store = PayoutStore::new(&storage);

        let payout_id = store
            .create(&NewPayout {
                challenge_id: "challenge-1".to_string(),
                from_wallet: "bob".to_string(),
                to_wallet: "alice".to_string(),
                amount: 2_000_000,
                token: "SOL".to_string(),
            })
            .await
            .unwrap();

        let pending = store.list_for_challenge("challenge-1").await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].state, PayoutState::Pending);
        assert!(pending[0].tx_hash.is_empty());
        assert!(pending[0].confirmed_at.is_none());

        store.confirm(payout_id, "tx-abc", Utc::now()).await.unwrap();

        let confirmed = store.list_for_challenge("challenge-1").await.unwrap();
        assert_eq!(confirmed[0].state, PayoutState::Confirmed);
        assert_eq!(confirmed[0].tx_hash, "tx-abc");
        assert_eq!(confirmed[0].amount, 2_000_000);
        assert!(confirmed[0].confirmed_at.is_some());
    }
}
