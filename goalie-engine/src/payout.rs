use async_trait::async_trait;
use chrono::Utc;
use goalie_core::{ChallengeStore, NewPayout, PayoutStore, SqliteChallengeStore, Storage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// A winning party and the amount it receives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipient {
    pub wallet: String,
    pub amount: u64,
}

/// Moves committed funds to the settlement winners.
///
/// The engine invokes this at most once per challenge, so implementations do
/// not need their own idempotency.
#[async_trait]
pub trait PayoutService: Send + Sync {
    async fn pay(&self, challenge_id: &str, recipients: &[Recipient]) -> anyhow::Result<()>;
}

const PAPER_TOKEN: &str = "SOL";

/// Simulated-ledger payout: records a confirmed payout row per recipient with
/// a synthetic transfer reference instead of touching a chain.
pub struct PaperPayout {
    storage: Arc<Storage>,
}

impl PaperPayout {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl PayoutService for PaperPayout {
    async fn pay(&self, challenge_id: &str, recipients: &[Recipient]) -> anyhow::Result<()> {
        let challenge_store = SqliteChallengeStore::new(self.storage.clone());
        let challenge = challenge_store
            .get_challenge(challenge_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("challenge {} not found", challenge_id))?;

        let payout_store = PayoutStore::new(&self.storage);
        for recipient in recipients {
            // The losing side funds the winner.
            let from_wallet = if recipient.wallet == challenge.creator_wallet {
                challenge
                    .challengers
                    .first()
                    .cloned()
                    .unwrap_or_else(|| challenge.creator_wallet.clone())
            } else {
                challenge.creator_wallet.clone()
            };

            let payout_id = payout_store
                .create(&NewPayout {
                    challenge_id: challenge_id.to_string(),
                    from_wallet,
                    to_wallet: recipient.wallet.clone(),
                    amount: recipient.amount,
                    token: PAPER_TOKEN.to_string(),
                })
                .await?;

            let tx_hash = format!("paper-{}", Uuid::new_v4());
            payout_store.confirm(payout_id, &tx_hash, Utc::now()).await?;

            tracing::info!(
                "Paper payout of {} {} to {} for challenge {}: {}",
                recipient.amount,
                PAPER_TOKEN,
                recipient.wallet,
                challenge_id,
                tx_hash
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use goalie_core::{GuessRecord, NewChallenge, PayoutState};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_paper_payout_records_confirmed_rows() {
        let dir = tempdir().unwrap();
        let storage = Arc::new(Storage::new(&dir.path().join("goalie.db")).await.unwrap());
        let store = SqliteChallengeStore::new(storage.clone());

        store.ensure_user("alice", "User").await.unwrap();
        store.ensure_user("bob", "User").await.unwrap();
        let challenge_id = store
            .create_challenge(NewChallenge {
                creator_wallet: "alice".to_string(),
                target_grid: 4,
                total_amount: 1_000,
                creation_proof: "sig-create".to_string(),
            })
            .await
            .unwrap();
        store
            .record_guess(
                &challenge_id,
                GuessRecord {
                    challenger_wallet: "bob".to_string(),
                    selected_grid: 4,
                    guess_proof: "sig-guess".to_string(),
                    correct: true,
                },
            )
            .await
            .unwrap();

        let payout = PaperPayout::new(storage.clone());
        payout
            .pay(
                &challenge_id,
                &[Recipient {
                    wallet: "bob".to_string(),
                    amount: 2_000,
                }],
            )
            .await
            .unwrap();

        let records = PayoutStore::new(&storage)
            .list_for_challenge(&challenge_id)
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].state, PayoutState::Confirmed);
        assert_eq!(records[0].to_wallet, "bob");
        assert_eq!(records[0].from_wallet, "alice");
        assert_eq!(records[0].amount, 2_000);
        assert!(records[0].tx_hash.starts_with("paper-"));
    }
}
