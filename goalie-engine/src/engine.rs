use crate::error::{EngineError, Result};
use crate::grid::GRID_CELLS;
use crate::payout::{PayoutService, Recipient};
use chrono::Utc;
use goalie_core::{Challenge, ChallengeFilter, ChallengeStore, GuessRecord, NewChallenge, UpdateOutcome};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// Pot is twice the stake; cap so it cannot overflow.
const MAX_STAKE: u64 = u64::MAX / 2;

// A challenge holds a single guess slot (`selected_grid` and its store
// guard), so capacity is fixed here; widening it means widening the store
// first.
const CHALLENGER_CAPACITY: usize = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Display name given to wallets seen for the first time.
    pub placeholder_user_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            placeholder_user_name: "User".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.placeholder_user_name.is_empty() {
            return Err(EngineError::Config(
                "Placeholder user name cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Result of an accepted guess.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuessOutcome {
    pub challenge: Challenge,
    pub correct: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementWinner {
    Creator,
    Challenger,
}

/// A completed settlement: who won and what was paid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settlement {
    pub challenge_id: String,
    pub winner: SettlementWinner,
    pub recipients: Vec<Recipient>,
    pub total_pot: u64,
}

/// The challenge state machine: creation, guess evaluation and settlement.
///
/// Correctness under concurrent callers rests on the store's conditional
/// updates, not on any lock held here; the engine itself is stateless apart
/// from its configuration.
pub struct SettlementEngine {
    store: Arc<dyn ChallengeStore>,
    payout: Arc<dyn PayoutService>,
    config: EngineConfig,
}

impl SettlementEngine {
    pub fn new(store: Arc<dyn ChallengeStore>, payout: Arc<dyn PayoutService>) -> Self {
        Self {
            store,
            payout,
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(
        store: Arc<dyn ChallengeStore>,
        payout: Arc<dyn PayoutService>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            payout,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Create a challenge for a hidden target cell. Returns the new id.
    pub async fn create_challenge(
        &self,
        creator_wallet: &str,
        target_grid: u8,
        total_amount: u64,
        creation_proof: &str,
    ) -> Result<String> {
        validate_grid_index(target_grid)?;
        if total_amount == 0 || total_amount > MAX_STAKE {
            return Err(EngineError::InvalidAmount(total_amount));
        }

        self.store
            .ensure_user(creator_wallet, &self.config.placeholder_user_name)
            .await?;

        let challenge_id = self
            .store
            .create_challenge(NewChallenge {
                creator_wallet: creator_wallet.to_string(),
                target_grid,
                total_amount,
                creation_proof: creation_proof.to_string(),
            })
            .await?;

        tracing::info!(
            "Wallet {} created challenge {} at {} per side",
            creator_wallet,
            challenge_id,
            total_amount
        );
        Ok(challenge_id)
    }

    /// Evaluate and record a challenger's guess.
    ///
    /// At most one guess ever lands: the store write is conditional on
    /// `selected_grid` still being unset, so the loser of a race gets
    /// [`EngineError::ChallengeFull`] instead of a second proof.
    pub async fn submit_guess(
        &self,
        challenge_id: &str,
        challenger_wallet: &str,
        guessed_grid: u8,
        guess_proof: &str,
    ) -> Result<GuessOutcome> {
        validate_grid_index(guessed_grid)?;

        let challenge = self
            .store
            .get_challenge(challenge_id)
            .await?
            .ok_or_else(|| EngineError::ChallengeNotFound(challenge_id.to_string()))?;

        if challenge.selected_grid.is_some() {
            return Err(EngineError::ChallengeFull(challenge_id.to_string()));
        }
        if challenge.is_completed() {
            return Err(EngineError::ChallengeCompleted(challenge_id.to_string()));
        }

        self.store
            .ensure_user(challenger_wallet, &self.config.placeholder_user_name)
            .await?;

        let correct = guessed_grid == challenge.target_grid;
        let outcome = self
            .store
            .record_guess(
                challenge_id,
                GuessRecord {
                    challenger_wallet: challenger_wallet.to_string(),
                    selected_grid: guessed_grid,
                    guess_proof: guess_proof.to_string(),
                    correct,
                },
            )
            .await?;

        if outcome == UpdateOutcome::Conflict {
            // Lost the race against a concurrent guess or settlement.
            return Err(EngineError::ChallengeFull(challenge_id.to_string()));
        }

        let challenge = self
            .store
            .get_challenge(challenge_id)
            .await?
            .ok_or_else(|| EngineError::ChallengeNotFound(challenge_id.to_string()))?;

        tracing::info!(
            "Wallet {} guessed cell {} on challenge {} ({})",
            challenger_wallet,
            guessed_grid,
            challenge_id,
            if correct { "correct" } else { "incorrect" }
        );

        Ok(GuessOutcome { challenge, correct })
    }

    /// Whether the challenge has received its full complement of guesses.
    pub fn is_full(&self, challenge: &Challenge) -> bool {
        challenge.guess_count() >= CHALLENGER_CAPACITY
    }

    /// All challenges not yet settled.
    pub async fn open_challenges(&self) -> Result<Vec<Challenge>> {
        Ok(self.store.list_challenges(ChallengeFilter::Open).await?)
    }

    /// Determine the winner of a full challenge, trigger the payout and mark
    /// the challenge complete.
    ///
    /// The conditional completion stamp doubles as the settlement claim: it
    /// is taken before the payout, so concurrent triggers cannot both reach
    /// the payout collaborator, and it is rolled back if the payout fails,
    /// leaving the challenge open for a later retry.
    pub async fn try_settle(&self, challenge_id: &str) -> Result<Settlement> {
        let challenge = self
            .store
            .get_challenge(challenge_id)
            .await?
            .ok_or_else(|| EngineError::ChallengeNotFound(challenge_id.to_string()))?;

        if challenge.is_completed() {
            return Err(EngineError::AlreadySettled(challenge_id.to_string()));
        }
        if !self.is_full(&challenge) {
            return Err(EngineError::NotFull(challenge_id.to_string()));
        }

        let total_pot = challenge.total_amount * 2;
        let (winner, recipients) = if challenge.correct_guess_proofs.is_empty() {
            // Wrong guess: the creator takes the pot.
            (
                SettlementWinner::Creator,
                vec![Recipient {
                    wallet: challenge.creator_wallet.clone(),
                    amount: total_pot,
                }],
            )
        } else {
            let challenger_wallet = challenge.challengers.first().cloned().ok_or_else(|| {
                goalie_core::GoalieError::internal(format!(
                    "challenge {} has a recorded guess but no challenger",
                    challenge_id
                ))
            })?;
            (
                SettlementWinner::Challenger,
                vec![Recipient {
                    wallet: challenger_wallet,
                    amount: total_pot,
                }],
            )
        };

        // Claim the challenge before paying; the loser of a concurrent
        // settlement race stops here and never reaches the payout.
        if self.store.mark_completed(challenge_id, Utc::now()).await? == UpdateOutcome::Conflict {
            return Err(EngineError::AlreadySettled(challenge_id.to_string()));
        }

        if let Err(e) = self.payout.pay(challenge_id, &recipients).await {
            // Roll the claim back so a later pass can retry.
            self.store.reopen(challenge_id).await?;
            return Err(EngineError::PayoutFailed(e.to_string()));
        }

        tracing::info!(
            "Settled challenge {}: {:?} takes pot of {}",
            challenge_id,
            winner,
            total_pot
        );

        Ok(Settlement {
            challenge_id: challenge_id.to_string(),
            winner,
            recipients,
            total_pot,
        })
    }
}

pub(crate) fn validate_grid_index(index: u8) -> Result<()> {
    if !(1..=GRID_CELLS).contains(&index) {
        return Err(EngineError::InvalidGridIndex(index));
    }
    Ok(())
}
