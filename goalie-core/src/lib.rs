//! Goalie core - data model and persistence for the grid-wager game
//!
//! A challenge commits a stake against a hidden cell of a 3x3 grid; a
//! challenger joins with a matching stake and one guess. This crate owns the
//! records and the store contract; game rules live in `goalie-engine`.

pub mod error;
pub mod storage;
pub mod types;

pub use error::{GoalieError, Result};
pub use storage::{
    ChallengeStore, MemoryChallengeStore, NewPayout, PayoutStore, SqliteChallengeStore, Storage,
};
pub use types::{
    Challenge, ChallengeFilter, GuessRecord, NewChallenge, PayoutRecord, PayoutState,
    UpdateOutcome, User,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_storage_setup() {
        let temp_dir = tempdir().unwrap();
        let storage = Arc::new(
            Storage::new(&temp_dir.path().join("goalie.db"))
                .await
                .unwrap(),
        );
        let store = SqliteChallengeStore::new(storage);

        let user = store.ensure_user("wallet-1", "User").await.unwrap();
        assert_eq!(user.wallet, "wallet-1");
        assert_eq!(user.name, "User");
    }
}
