use crate::error::Result;
use crate::types::{Challenge, ChallengeFilter, GuessRecord, NewChallenge, UpdateOutcome, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use super::challenge_store::ChallengeStore;

/// In-memory [`ChallengeStore`] with the same conditional-update semantics as
/// the SQLite store. Backs engine tests and light embedding; nothing survives
/// the process.
#[derive(Default)]
pub struct MemoryChallengeStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    challenges: HashMap<String, Challenge>,
    users: HashMap<String, User>,
}

impl MemoryChallengeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChallengeStore for MemoryChallengeStore {
    async fn create_challenge(&self, new: NewChallenge) -> Result<String> {
        let challenge_id = Uuid::new_v4().to_string();
        let challenge = Challenge {
            id: challenge_id.clone(),
            creator_wallet: new.creator_wallet,
            target_grid: new.target_grid,
            total_amount: new.total_amount,
            creation_proof: new.creation_proof,
            selected_grid: None,
            correct_guess_proofs: Vec::new(),
            incorrect_guess_proofs: Vec::new(),
            challengers: Vec::new(),
            created_at: Utc::now(),
            completed_at: None,
        };

        self.inner.write().challenges.insert(challenge_id.clone(), challenge);
        Ok(challenge_id)
    }

    async fn get_challenge(&self, challenge_id: &str) -> Result<Option<Challenge>> {
        Ok(self.inner.read().challenges.get(challenge_id).cloned())
    }

    async fn list_challenges(&self, filter: ChallengeFilter) -> Result<Vec<Challenge>> {
        let inner = self.inner.read();
        let mut challenges: Vec<Challenge> = inner
            .challenges
            .values()
            .filter(|c| filter == ChallengeFilter::All || c.is_open())
            .cloned()
            .collect();
        challenges.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(challenges)
    }

    async fn challenges_by_creator(&self, wallet: &str) -> Result<Vec<Challenge>> {
        let inner = self.inner.read();
        let mut challenges: Vec<Challenge> = inner
            .challenges
            .values()
            .filter(|c| c.creator_wallet == wallet)
            .cloned()
            .collect();
        challenges.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(challenges)
    }

    async fn challenges_by_challenger(&self, wallet: &str) -> Result<Vec<Challenge>> {
        let inner = self.inner.read();
        let mut challenges: Vec<Challenge> = inner
            .challenges
            .values()
            .filter(|c| c.challengers.iter().any(|w| w == wallet))
            .cloned()
            .collect();
        challenges.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(challenges)
    }

    async fn record_guess(
        &self,
        challenge_id: &str,
        guess: GuessRecord,
    ) -> Result<UpdateOutcome> {
        let mut inner = self.inner.write();

        let Some(challenge) = inner.challenges.get_mut(challenge_id) else {
            return Ok(UpdateOutcome::Conflict);
        };
        if challenge.selected_grid.is_some() || challenge.is_completed() {
            return Ok(UpdateOutcome::Conflict);
        }

        challenge.selected_grid = Some(guess.selected_grid);
        if guess.correct {
            challenge.correct_guess_proofs.push(guess.guess_proof);
        } else {
            challenge.incorrect_guess_proofs.push(guess.guess_proof);
        }
        if !challenge.challengers.contains(&guess.challenger_wallet) {
            challenge.challengers.push(guess.challenger_wallet);
        }

        Ok(UpdateOutcome::Applied)
    }

    async fn mark_completed(
        &self,
        challenge_id: &str,
        when: DateTime<Utc>,
    ) -> Result<UpdateOutcome> {
        let mut inner = self.inner.write();

        let Some(challenge) = inner.challenges.get_mut(challenge_id) else {
            return Ok(UpdateOutcome::Conflict);
        };
        if challenge.is_completed() {
            return Ok(UpdateOutcome::Conflict);
        }

        challenge.completed_at = Some(when);
        Ok(UpdateOutcome::Applied)
    }

    async fn reopen(&self, challenge_id: &str) -> Result<UpdateOutcome> {
        let mut inner = self.inner.write();

        let Some(challenge) = inner.challenges.get_mut(challenge_id) else {
            return Ok(UpdateOutcome::Conflict);
        };
        if challenge.completed_at.is_none() {
            return Ok(UpdateOutcome::Conflict);
        }

        challenge.completed_at = None;
        Ok(UpdateOutcome::Applied)
    }

    async fn ensure_user(&self, wallet: &str, default_name: &str) -> Result<User> {
        let mut inner = self.inner.write();

        let user = inner
            .users
            .entry(wallet.to_string())
            .or_insert_with(|| User {
                wallet: wallet.to_string(),
                name: default_name.to_string(),
                created_at: Utc::now(),
            });

        Ok(user.clone())
    }

    async fn get_user(&self, wallet: &str) -> Result<Option<User>> {
        Ok(self.inner.read().users.get(wallet).cloned())
    }
}
