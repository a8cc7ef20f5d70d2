use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One grid-wager challenge between a creator and a challenger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    pub id: String,
    pub creator_wallet: String,
    /// Hidden target cell, 1-9. Immutable once the row is written.
    pub target_grid: u8,
    /// Stake each side commits, in base token units.
    pub total_amount: u64,
    /// Reference to the creator's funding commitment.
    pub creation_proof: String,
    /// The challenger's guess. `None` until a guess is recorded; set at most once.
    pub selected_grid: Option<u8>,
    pub correct_guess_proofs: Vec<String>,
    pub incorrect_guess_proofs: Vec<String>,
    /// Wallets that have joined as challengers.
    pub challengers: Vec<String>,
    pub created_at: DateTime<Utc>,
    /// Terminal once set; no further guesses or payouts are accepted.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Challenge {
    pub fn guess_count(&self) -> usize {
        self.correct_guess_proofs.len() + self.incorrect_guess_proofs.len()
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    pub fn is_open(&self) -> bool {
        self.completed_at.is_none()
    }
}

/// Fields for a challenge row at creation time.
#[derive(Debug, Clone)]
pub struct NewChallenge {
    pub creator_wallet: String,
    pub target_grid: u8,
    pub total_amount: u64,
    pub creation_proof: String,
}

/// A guess ready to be recorded against an open challenge.
#[derive(Debug, Clone)]
pub struct GuessRecord {
    pub challenger_wallet: String,
    pub selected_grid: u8,
    pub guess_proof: String,
    pub correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub wallet: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeFilter {
    All,
    Open,
}

/// Outcome of a conditional challenge update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied,
    /// The guarded column was no longer in its expected state.
    Conflict,
}

/// A fund movement triggered by settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutRecord {
    pub id: i64,
    pub challenge_id: String,
    pub from_wallet: String,
    pub to_wallet: String,
    pub amount: u64,
    pub token: String,
    pub state: PayoutState,
    pub tx_hash: String,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayoutState {
    Pending,
    Confirmed,
    Failed,
}
