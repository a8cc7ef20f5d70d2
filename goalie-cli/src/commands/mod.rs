use comfy_table::{presets::UTF8_FULL, Table};
use goalie_core::{Challenge, ChallengeFilter, ChallengeStore, PayoutStore, SqliteChallengeStore, Storage};
use goalie_engine::{
    grid_index_from_labels, FullnessScanner, SettlementEngine, SettlementWinner,
};
use std::sync::Arc;
use std::time::Duration;

type CommandResult = Result<(), Box<dyn std::error::Error>>;

pub async fn create_challenge(
    engine: &SettlementEngine,
    wallet: &str,
    vertical: &str,
    horizontal: &str,
    amount: u64,
    proof: &str,
) -> CommandResult {
    let target_grid = grid_index_from_labels(vertical, horizontal)?;
    let challenge_id = engine
        .create_challenge(wallet, target_grid, amount, proof)
        .await?;

    println!("Created challenge!");
    println!("Challenge ID: {}", challenge_id);
    println!(
        "Target cell: {} {} (grid index {}) - keep it to yourself",
        vertical.to_lowercase(),
        horizontal.to_lowercase(),
        target_grid
    );
    println!("Stake: {} per side", amount);
    println!();
    println!("Share this command with a challenger:");
    println!(
        "goalie guess <their-wallet> {} <vertical> <horizontal> --proof <sig>",
        challenge_id
    );

    Ok(())
}

pub async fn submit_guess(
    engine: &SettlementEngine,
    wallet: &str,
    challenge_id: &str,
    vertical: &str,
    horizontal: &str,
    proof: &str,
) -> CommandResult {
    let guessed_grid = grid_index_from_labels(vertical, horizontal)?;
    let outcome = engine
        .submit_guess(challenge_id, wallet, guessed_grid, proof)
        .await?;

    if outcome.correct {
        println!("Goal! Cell {} was the target.", guessed_grid);
    } else {
        println!("Saved! Cell {} was not the target.", guessed_grid);
    }
    println!(
        "Challenge {} is full; it settles on the next scan pass.",
        challenge_id
    );
    println!("Or settle it now: goalie settle {}", challenge_id);

    Ok(())
}

pub async fn settle(engine: &SettlementEngine, challenge_id: &str) -> CommandResult {
    let settlement = engine.try_settle(challenge_id).await?;

    let winner = match settlement.winner {
        SettlementWinner::Creator => "creator",
        SettlementWinner::Challenger => "challenger",
    };
    println!("Settled challenge {}", settlement.challenge_id);
    println!("Winner: {}", winner);
    for recipient in &settlement.recipients {
        println!("Paid {} to {}", recipient.amount, recipient.wallet);
    }

    Ok(())
}

pub async fn show_status(
    store: &SqliteChallengeStore,
    storage: &Arc<Storage>,
    challenge_id: &str,
) -> CommandResult {
    let Some(challenge) = store.get_challenge(challenge_id).await? else {
        println!("Challenge not found: {}", challenge_id);
        return Ok(());
    };

    println!("Challenge: {}", challenge.id);
    println!("Creator: {}", challenge.creator_wallet);
    println!("Stake: {} per side", challenge.total_amount);
    println!("State: {}", challenge_state(&challenge));
    println!(
        "Created: {}",
        challenge.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if let Some(completed_at) = challenge.completed_at {
        println!("Completed: {}", completed_at.format("%Y-%m-%d %H:%M:%S UTC"));
        // Only reveal the hidden cell once the game is over.
        println!("Target cell was: {}", challenge.target_grid);
    }
    if let Some(selected) = challenge.selected_grid {
        println!("Guessed cell: {}", selected);
    }
    for wallet in &challenge.challengers {
        println!("Challenger: {}", wallet);
    }

    let payouts = PayoutStore::new(storage).list_for_challenge(challenge_id).await?;
    if !payouts.is_empty() {
        println!();
        println!("Payouts:");
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["To", "Amount", "Token", "State", "Tx"]);
        for payout in &payouts {
            table.add_row(vec![
                payout.to_wallet.clone(),
                payout.amount.to_string(),
                payout.token.clone(),
                format!("{:?}", payout.state),
                payout.tx_hash.clone(),
            ]);
        }
        println!("{}", table);
    }

    Ok(())
}

pub async fn list_challenges(
    store: &SqliteChallengeStore,
    creator: Option<&str>,
    challenger: Option<&str>,
    all: bool,
) -> CommandResult {
    let challenges = if let Some(wallet) = creator {
        store.challenges_by_creator(wallet).await?
    } else if let Some(wallet) = challenger {
        store.challenges_by_challenger(wallet).await?
    } else if all {
        store.list_challenges(ChallengeFilter::All).await?
    } else {
        store.list_challenges(ChallengeFilter::Open).await?
    };

    if challenges.is_empty() {
        println!("No challenges.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["ID", "Creator", "State", "Stake", "Guesses", "Created"]);

    for challenge in &challenges {
        table.add_row(vec![
            challenge.id[..8].to_string(),
            challenge.creator_wallet.clone(),
            challenge_state(challenge).to_string(),
            challenge.total_amount.to_string(),
            challenge.guess_count().to_string(),
            challenge.created_at.format("%Y-%m-%d %H:%M").to_string(),
        ]);
    }

    println!("{}", table);

    Ok(())
}

pub async fn watch(engine: Arc<SettlementEngine>, period: u64) -> CommandResult {
    let scanner = FullnessScanner::with_period(engine, Duration::from_secs(period));
    let handle = scanner.start();

    println!(
        "Scanning for full challenges every {}s (Ctrl-C to stop)...",
        period
    );
    tokio::signal::ctrl_c().await?;

    handle.stop().await;
    println!("Scanner stopped.");

    Ok(())
}

fn challenge_state(challenge: &Challenge) -> &'static str {
    if challenge.is_completed() {
        "settled"
    } else if challenge.guess_count() > 0 {
        "full"
    } else {
        "open"
    }
}
