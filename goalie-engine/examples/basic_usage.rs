use goalie_core::{SqliteChallengeStore, Storage};
use goalie_engine::{grid_index_from_labels, FullnessScanner, PaperPayout, SettlementEngine};
use std::sync::Arc;
use tempfile::tempdir;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // Create temp dir
    let temp_dir = tempdir()?;
    println!("Using temporary directory: {:?}", temp_dir.path());

    let storage = Arc::new(Storage::new(&temp_dir.path().join("goalie.db")).await?);
    let store = Arc::new(SqliteChallengeStore::new(storage.clone()));
    let payout = Arc::new(PaperPayout::new(storage.clone()));
    let engine = Arc::new(SettlementEngine::new(store, payout));

    println!("Creating challenge...");
    let target = grid_index_from_labels("middle", "center")?;
    let challenge_id = engine
        .create_challenge("alice-wallet", target, 1_000_000, "sig-create")
        .await?;
    println!("Challenge ID: {}", challenge_id);

    println!("\nSubmitting a guess...");
    let guess = grid_index_from_labels("top", "left")?;
    let outcome = engine
        .submit_guess(&challenge_id, "bob-wallet", guess, "sig-guess")
        .await?;
    println!("Guess correct: {}", outcome.correct);

    // One manual scan pass settles the now-full challenge
    let scanner = FullnessScanner::new(engine.clone());
    let settled = scanner.tick().await?;
    println!("\nSettled {} challenge(s)", settled);

    let open = engine.open_challenges().await?;
    println!("Open challenges remaining: {}", open.len());

    println!("\nExample completed successfully!");

    Ok(())
}
