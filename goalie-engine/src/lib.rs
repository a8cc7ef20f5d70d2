//! Challenge lifecycle and settlement engine for the Goalie grid-wager game
//!
//! A creator hides a target cell of a 3x3 goal grid behind a stake; a
//! challenger matches the stake with a single guess. The engine evaluates
//! guesses, detects challenges that have filled up and settles each one
//! exactly once through a payout collaborator.

pub mod engine;
pub mod error;
pub mod grid;
pub mod payout;
pub mod scanner;

pub use engine::{EngineConfig, GuessOutcome, Settlement, SettlementEngine, SettlementWinner};
pub use error::{EngineError, ErrorKind, Result};
pub use grid::{cell_index, grid_index, grid_index_from_labels, Horizontal, Vertical, GRID_CELLS};
pub use payout::{PaperPayout, PayoutService, Recipient};
pub use scanner::{FullnessScanner, ScannerHandle, DEFAULT_SCAN_PERIOD};
