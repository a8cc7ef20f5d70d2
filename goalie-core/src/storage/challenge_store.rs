use crate::error::Result;
use crate::storage::Storage;
use crate::types::{Challenge, ChallengeFilter, GuessRecord, NewChallenge, UpdateOutcome, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Arc;
use uuid::Uuid;

/// Persistence contract for challenges and users.
///
/// The `selected_grid` and `completed_at` transitions are only reachable
/// through [`record_guess`](ChallengeStore::record_guess) and
/// [`mark_completed`](ChallengeStore::mark_completed), whose updates are
/// conditional on the current column state. Callers that lose a race get
/// [`UpdateOutcome::Conflict`] back instead of a second write.
#[async_trait]
pub trait ChallengeStore: Send + Sync {
    async fn create_challenge(&self, new: NewChallenge) -> Result<String>;

    async fn get_challenge(&self, challenge_id: &str) -> Result<Option<Challenge>>;

    async fn list_challenges(&self, filter: ChallengeFilter) -> Result<Vec<Challenge>>;

    /// Challenges created by the given wallet.
    async fn challenges_by_creator(&self, wallet: &str) -> Result<Vec<Challenge>>;

    /// Challenges the given wallet has joined as challenger.
    async fn challenges_by_challenger(&self, wallet: &str) -> Result<Vec<Challenge>>;

    /// Record a guess: set `selected_grid`, append the proof to the matching
    /// sequence and join the challenger, in one atomic update guarded on
    /// `selected_grid` still being unset.
    async fn record_guess(&self, challenge_id: &str, guess: GuessRecord)
        -> Result<UpdateOutcome>;

    /// Set `completed_at`, guarded on it still being unset.
    async fn mark_completed(
        &self,
        challenge_id: &str,
        when: DateTime<Utc>,
    ) -> Result<UpdateOutcome>;

    /// Clear `completed_at`, guarded on it being set. Rolls back a
    /// settlement claim whose payout failed.
    async fn reopen(&self, challenge_id: &str) -> Result<UpdateOutcome>;

    /// Create the user on first contact. Idempotent; concurrent calls for the
    /// same wallet all succeed.
    async fn ensure_user(&self, wallet: &str, default_name: &str) -> Result<User>;

    async fn get_user(&self, wallet: &str) -> Result<Option<User>>;
}

pub struct SqliteChallengeStore {
    storage: Arc<Storage>,
}

impl SqliteChallengeStore {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }
}

const CHALLENGE_COLUMNS: &str = "id, creator_wallet, target_grid, total_amount, creation_proof, \
     selected_grid, correct_guess_proofs, incorrect_guess_proofs, created_at, completed_at";

fn row_to_challenge(row: &rusqlite::Row<'_>) -> rusqlite::Result<Challenge> {
    let correct_json: String = row.get(6)?;
    let incorrect_json: String = row.get(7)?;

    let correct_guess_proofs: Vec<String> = serde_json::from_str(&correct_json).map_err(|_| {
        rusqlite::Error::InvalidColumnType(
            6,
            "correct_guess_proofs".to_string(),
            rusqlite::types::Type::Text,
        )
    })?;

    let incorrect_guess_proofs: Vec<String> =
        serde_json::from_str(&incorrect_json).map_err(|_| {
            rusqlite::Error::InvalidColumnType(
                7,
                "incorrect_guess_proofs".to_string(),
                rusqlite::types::Type::Text,
            )
        })?;

    let completed_at: Option<i64> = row.get(9)?;

    Ok(Challenge {
        id: row.get(0)?,
        creator_wallet: row.get(1)?,
        target_grid: row.get(2)?,
        total_amount: row.get::<_, i64>(3)? as u64,
        creation_proof: row.get(4)?,
        selected_grid: row.get(5)?,
        correct_guess_proofs,
        incorrect_guess_proofs,
        challengers: Vec::new(),
        created_at: DateTime::from_timestamp(row.get(8)?, 0).unwrap_or_else(Utc::now),
        completed_at: completed_at.and_then(|t| DateTime::from_timestamp(t, 0)),
    })
}

fn load_challengers(conn: &Connection, challenge_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT wallet FROM challenge_challengers WHERE challenge_id = ?1 ORDER BY joined_at ASC",
    )?;

    let wallet_iter = stmt.query_map(params![challenge_id], |row| row.get::<_, String>(0))?;

    let mut wallets = Vec::new();
    for wallet in wallet_iter {
        wallets.push(wallet?);
    }

    Ok(wallets)
}

fn query_challenges(
    conn: &Connection,
    sql: &str,
    sql_params: &[&dyn rusqlite::ToSql],
) -> Result<Vec<Challenge>> {
    let mut stmt = conn.prepare(sql)?;
    let challenge_iter = stmt.query_map(sql_params, row_to_challenge)?;

    let mut challenges = Vec::new();
    for challenge in challenge_iter {
        challenges.push(challenge?);
    }
    drop(stmt);

    for challenge in &mut challenges {
        challenge.challengers = load_challengers(conn, &challenge.id)?;
    }

    Ok(challenges)
}

#[async_trait]
impl ChallengeStore for SqliteChallengeStore {
    async fn create_challenge(&self, new: NewChallenge) -> Result<String> {
        let conn = self.storage.get_connection().await;
        let challenge_id = Uuid::new_v4().to_string();

        conn.execute(
            "INSERT INTO challenges
                 (id, creator_wallet, target_grid, total_amount, creation_proof,
                  selected_grid, correct_guess_proofs, incorrect_guess_proofs,
                  created_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, NULL, '[]', '[]', ?6, NULL)",
            params![
                challenge_id,
                new.creator_wallet,
                new.target_grid,
                new.total_amount as i64,
                new.creation_proof,
                Utc::now().timestamp(),
            ],
        )?;

        tracing::info!(
            "Created challenge {} for wallet {}",
            challenge_id,
            new.creator_wallet
        );
        Ok(challenge_id)
    }

    async fn get_challenge(&self, challenge_id: &str) -> Result<Option<Challenge>> {
        let conn = self.storage.get_connection().await;

        let challenge = conn
            .query_row(
                &format!("SELECT {} FROM challenges WHERE id = ?1", CHALLENGE_COLUMNS),
                params![challenge_id],
                row_to_challenge,
            )
            .optional()?;

        let Some(mut challenge) = challenge else {
            return Ok(None);
        };
        challenge.challengers = load_challengers(&conn, challenge_id)?;

        Ok(Some(challenge))
    }

    async fn list_challenges(&self, filter: ChallengeFilter) -> Result<Vec<Challenge>> {
        let conn = self.storage.get_connection().await;

        let sql = match filter {
            ChallengeFilter::All => format!(
                "SELECT {} FROM challenges ORDER BY created_at DESC",
                CHALLENGE_COLUMNS
            ),
            ChallengeFilter::Open => format!(
                "SELECT {} FROM challenges WHERE completed_at IS NULL ORDER BY created_at DESC",
                CHALLENGE_COLUMNS
            ),
        };

        query_challenges(&conn, &sql, &[])
    }

    async fn challenges_by_creator(&self, wallet: &str) -> Result<Vec<Challenge>> {
        let conn = self.storage.get_connection().await;

        let sql = format!(
            "SELECT {} FROM challenges WHERE creator_wallet = ?1 ORDER BY created_at DESC",
            CHALLENGE_COLUMNS
        );

        query_challenges(&conn, &sql, &[&wallet])
    }

    async fn challenges_by_challenger(&self, wallet: &str) -> Result<Vec<Challenge>> {
        let conn = self.storage.get_connection().await;

        let sql = format!(
            "SELECT {} FROM challenges c
             JOIN challenge_challengers cc ON cc.challenge_id = c.id
             WHERE cc.wallet = ?1 ORDER BY c.created_at DESC",
            "c.id, c.creator_wallet, c.target_grid, c.total_amount, c.creation_proof, \
             c.selected_grid, c.correct_guess_proofs, c.incorrect_guess_proofs, \
             c.created_at, c.completed_at"
        );

        query_challenges(&conn, &sql, &[&wallet])
    }

    async fn record_guess(
        &self,
        challenge_id: &str,
        guess: GuessRecord,
    ) -> Result<UpdateOutcome> {
        let mut conn = self.storage.get_connection().await;
        let tx = conn.transaction()?;

        let proofs = tx
            .query_row(
                "SELECT correct_guess_proofs, incorrect_guess_proofs
                 FROM challenges WHERE id = ?1",
                params![challenge_id],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        let Some((correct_json, incorrect_json)) = proofs else {
            return Ok(UpdateOutcome::Conflict);
        };

        let mut correct: Vec<String> = serde_json::from_str(&correct_json)?;
        let mut incorrect: Vec<String> = serde_json::from_str(&incorrect_json)?;
        if guess.correct {
            correct.push(guess.guess_proof.clone());
        } else {
            incorrect.push(guess.guess_proof.clone());
        }

        // The guard is the linearization point: only one guess can ever see
        // selected_grid unset.
        let updated = tx.execute(
            "UPDATE challenges
             SET selected_grid = ?1, correct_guess_proofs = ?2, incorrect_guess_proofs = ?3
             WHERE id = ?4 AND selected_grid IS NULL AND completed_at IS NULL",
            params![
                guess.selected_grid,
                serde_json::to_string(&correct)?,
                serde_json::to_string(&incorrect)?,
                challenge_id,
            ],
        )?;

        if updated == 0 {
            return Ok(UpdateOutcome::Conflict);
        }

        tx.execute(
            "INSERT OR IGNORE INTO challenge_challengers (challenge_id, wallet, joined_at)
             VALUES (?1, ?2, ?3)",
            params![
                challenge_id,
                guess.challenger_wallet,
                Utc::now().timestamp()
            ],
        )?;

        tx.commit()?;

        tracing::info!(
            "Recorded {} guess by {} on challenge {}",
            if guess.correct { "correct" } else { "incorrect" },
            guess.challenger_wallet,
            challenge_id
        );
        Ok(UpdateOutcome::Applied)
    }

    async fn mark_completed(
        &self,
        challenge_id: &str,
        when: DateTime<Utc>,
    ) -> Result<UpdateOutcome> {
        let conn = self.storage.get_connection().await;

        let updated = conn.execute(
            "UPDATE challenges SET completed_at = ?1 WHERE id = ?2 AND completed_at IS NULL",
            params![when.timestamp(), challenge_id],
        )?;

        if updated == 0 {
            return Ok(UpdateOutcome::Conflict);
        }

        tracing::info!("Marked challenge {} as complete", challenge_id);
        Ok(UpdateOutcome::Applied)
    }

    async fn reopen(&self, challenge_id: &str) -> Result<UpdateOutcome> {
        let conn = self.storage.get_connection().await;

        let updated = conn.execute(
            "UPDATE challenges SET completed_at = NULL
             WHERE id = ?1 AND completed_at IS NOT NULL",
            params![challenge_id],
        )?;

        if updated == 0 {
            return Ok(UpdateOutcome::Conflict);
        }

        tracing::info!("Reopened challenge {}", challenge_id);
        Ok(UpdateOutcome::Applied)
    }

    async fn ensure_user(&self, wallet: &str, default_name: &str) -> Result<User> {
        let conn = self.storage.get_connection().await;

        conn.execute(
            "INSERT OR IGNORE INTO users (wallet, name, created_at) VALUES (?1, ?2, ?3)",
            params![wallet, default_name, Utc::now().timestamp()],
        )?;

        let user = conn.query_row(
            "SELECT wallet, name, created_at FROM users WHERE wallet = ?1",
            params![wallet],
            row_to_user,
        )?;

        Ok(user)
    }

    async fn get_user(&self, wallet: &str) -> Result<Option<User>> {
        let conn = self.storage.get_connection().await;

        let user = conn
            .query_row(
                "SELECT wallet, name, created_at FROM users WHERE wallet = ?1",
                params![wallet],
                row_to_user,
            )
            .optional()?;

        Ok(user)
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        wallet: row.get(0)?,
        name: row.get(1)?,
        created_at: DateTime::from_timestamp(row.get(2)?, 0).unwrap_or_else(Utc::now),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn open_store() -> (tempfile::TempDir, SqliteChallengeStore) {
        let dir = tempdir().unwrap();
        let storage = Arc::new(Storage::new(&dir.path().join("goalie.db")).await.unwrap());
        (dir, SqliteChallengeStore::new(storage))
    }

    fn new_challenge(creator: &str) -> NewChallenge {
        NewChallenge {
            creator_wallet: creator.to_string(),
            target_grid: 5,
            total_amount: 1_000_000,
            creation_proof: "sig-create".to_string(),
        }
    }

    fn guess(wallet: &str, correct: bool) -> GuessRecord {
        GuessRecord {
            challenger_wallet: wallet.to_string(),
            selected_grid: if correct { 5 } else { 3 },
            guess_proof: "sig-guess".to_string(),
            correct,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_roundtrip() {
        let (_dir, store) = open_store().await;
        store.ensure_user("alice", "User").await.unwrap();

        let id = store.create_challenge(new_challenge("alice")).await.unwrap();
        let challenge = store.get_challenge(&id).await.unwrap().unwrap();

        assert_eq!(challenge.id, id);
        assert_eq!(challenge.creator_wallet, "alice");
        assert_eq!(challenge.target_grid, 5);
        assert_eq!(challenge.total_amount, 1_000_000);
        assert_eq!(challenge.selected_grid, None);
        assert!(challenge.correct_guess_proofs.is_empty());
        assert!(challenge.incorrect_guess_proofs.is_empty());
        assert!(challenge.challengers.is_empty());
        assert!(challenge.is_open());
    }

    #[tokio::test]
    async fn test_get_unknown_challenge_is_none() {
        let (_dir, store) = open_store().await;
        assert!(store.get_challenge("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ensure_user_is_idempotent() {
        let (_dir, store) = open_store().await;

        let first = store.ensure_user("alice", "User").await.unwrap();
        let second = store.ensure_user("alice", "Someone Else").await.unwrap();

        assert_eq!(first.wallet, second.wallet);
        // The second call must not overwrite the existing row.
        assert_eq!(second.name, "User");
    }

    #[tokio::test]
    async fn test_record_guess_sets_grid_and_joins_challenger() {
        let (_dir, store) = open_store().await;
        store.ensure_user("alice", "User").await.unwrap();
        store.ensure_user("bob", "User").await.unwrap();
        let id = store.create_challenge(new_challenge("alice")).await.unwrap();

        let outcome = store.record_guess(&id, guess("bob", true)).await.unwrap();
        assert_eq!(outcome, UpdateOutcome::Applied);

        let challenge = store.get_challenge(&id).await.unwrap().unwrap();
        assert_eq!(challenge.selected_grid, Some(5));
        assert_eq!(challenge.correct_guess_proofs, vec!["sig-guess"]);
        assert!(challenge.incorrect_guess_proofs.is_empty());
        assert_eq!(challenge.challengers, vec!["bob"]);
    }

    #[tokio::test]
    async fn test_second_guess_conflicts() {
        let (_dir, store) = open_store().await;
        store.ensure_user("alice", "User").await.unwrap();
        store.ensure_user("bob", "User").await.unwrap();
        store.ensure_user("carol", "User").await.unwrap();
        let id = store.create_challenge(new_challenge("alice")).await.unwrap();

        assert_eq!(
            store.record_guess(&id, guess("bob", false)).await.unwrap(),
            UpdateOutcome::Applied
        );
        assert_eq!(
            store.record_guess(&id, guess("carol", true)).await.unwrap(),
            UpdateOutcome::Conflict
        );

        let challenge = store.get_challenge(&id).await.unwrap().unwrap();
        assert_eq!(challenge.guess_count(), 1);
        assert_eq!(challenge.challengers, vec!["bob"]);
    }

    #[tokio::test]
    async fn test_mark_completed_only_once() {
        let (_dir, store) = open_store().await;
        store.ensure_user("alice", "User").await.unwrap();
        let id = store.create_challenge(new_challenge("alice")).await.unwrap();

        assert_eq!(
            store.mark_completed(&id, Utc::now()).await.unwrap(),
            UpdateOutcome::Applied
        );
        assert_eq!(
            store.mark_completed(&id, Utc::now()).await.unwrap(),
            UpdateOutcome::Conflict
        );

        let challenge = store.get_challenge(&id).await.unwrap().unwrap();
        assert!(challenge.is_completed());
    }

    #[tokio::test]
    async fn test_reopen_clears_completion() {
        let (_dir, store) = open_store().await;
        store.ensure_user("alice", "User").await.unwrap();
        let id = store.create_challenge(new_challenge("alice")).await.unwrap();

        // Nothing to roll back on an open challenge.
        assert_eq!(store.reopen(&id).await.unwrap(), UpdateOutcome::Conflict);

        store.mark_completed(&id, Utc::now()).await.unwrap();
        assert_eq!(store.reopen(&id).await.unwrap(), UpdateOutcome::Applied);

        let challenge = store.get_challenge(&id).await.unwrap().unwrap();
        assert!(challenge.is_open());

        // The completion transition is available again after the rollback.
        assert_eq!(
            store.mark_completed(&id, Utc::now()).await.unwrap(),
            UpdateOutcome::Applied
        );
    }

    #[tokio::test]
    async fn test_guess_after_completion_conflicts() {
        let (_dir, store) = open_store().await;
        store.ensure_user("alice", "User").await.unwrap();
        store.ensure_user("bob", "User").await.unwrap();
        let id = store.create_challenge(new_challenge("alice")).await.unwrap();

        store.mark_completed(&id, Utc::now()).await.unwrap();
        assert_eq!(
            store.record_guess(&id, guess("bob", true)).await.unwrap(),
            UpdateOutcome::Conflict
        );
    }

    #[tokio::test]
    async fn test_list_filters_and_wallet_queries() {
        let (_dir, store) = open_store().await;
        store.ensure_user("alice", "User").await.unwrap();
        store.ensure_user("bob", "User").await.unwrap();

        let open_id = store.create_challenge(new_challenge("alice")).await.unwrap();
        let done_id = store.create_challenge(new_challenge("alice")).await.unwrap();
        store.record_guess(&done_id, guess("bob", false)).await.unwrap();
        store.mark_completed(&done_id, Utc::now()).await.unwrap();

        let open = store.list_challenges(ChallengeFilter::Open).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, open_id);

        let all = store.list_challenges(ChallengeFilter::All).await.unwrap();
        assert_eq!(all.len(), 2);

        let by_creator = store.challenges_by_creator("alice").await.unwrap();
        assert_eq!(by_creator.len(), 2);
        assert!(store.challenges_by_creator("bob").await.unwrap().is_empty());

        let by_challenger = store.challenges_by_challenger("bob").await.unwrap();
        assert_eq!(by_challenger.len(), 1);
        assert_eq!(by_challenger[0].id, done_id);
        assert_eq!(by_challenger[0].challengers, vec!["bob"]);
    }
}
