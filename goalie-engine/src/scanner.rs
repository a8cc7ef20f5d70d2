use crate::engine::SettlementEngine;
use crate::error::{EngineError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Default time between scan passes.
pub const DEFAULT_SCAN_PERIOD: Duration = Duration::from_secs(60);

/// Background process that settles challenges once they have received their
/// full complement of guesses.
///
/// The scan period bounds the worst-case latency between a challenge filling
/// up and its payout. A failed settlement leaves the challenge open, so it is
/// simply picked up again on a later pass.
pub struct FullnessScanner {
    engine: Arc<SettlementEngine>,
    period: Duration,
}

impl FullnessScanner {
    pub fn new(engine: Arc<SettlementEngine>) -> Self {
        Self::with_period(engine, DEFAULT_SCAN_PERIOD)
    }

    pub fn with_period(engine: Arc<SettlementEngine>, period: Duration) -> Self {
        Self { engine, period }
    }

    /// Run one scan pass: settle every open challenge that is full.
    ///
    /// Returns how many challenges were settled. Per-challenge settlement
    /// failures are logged and skipped rather than aborting the pass.
    pub async fn tick(&self) -> Result<usize> {
        let open = self.engine.open_challenges().await?;
        let mut settled = 0;

        for challenge in open {
            if !self.engine.is_full(&challenge) {
                continue;
            }

            match self.engine.try_settle(&challenge.id).await {
                Ok(settlement) => {
                    settled += 1;
                    tracing::info!(
                        "Scanner settled challenge {}: {:?} takes {}",
                        settlement.challenge_id,
                        settlement.winner,
                        settlement.total_pot
                    );
                }
                // A concurrent caller settled it between the list and here.
                Err(EngineError::AlreadySettled(_)) => {}
                Err(e) => {
                    tracing::warn!(
                        "Settlement of challenge {} failed, will retry next pass: {}",
                        challenge.id,
                        e
                    );
                }
            }
        }

        Ok(settled)
    }

    /// Spawn the recurring scan task. The loop runs until
    /// [`ScannerHandle::stop`] is called.
    pub fn start(&self) -> ScannerHandle {
        let scanner = FullnessScanner {
            engine: self.engine.clone(),
            period: self.period,
        };
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(scanner.period);
            loop {
                tokio::select! {
                    biased;
                    _ = stop_rx.changed() => {
                        tracing::info!("Fullness scanner shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = scanner.tick().await {
                            tracing::warn!("Scan pass failed: {}", e);
                        }
                    }
                }
            }
        });

        ScannerHandle {
            stop: stop_tx,
            task,
        }
    }
}

/// Stops the scan loop spawned by [`FullnessScanner::start`].
pub struct ScannerHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ScannerHandle {
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        let _ = self.task.await;
    }
}
