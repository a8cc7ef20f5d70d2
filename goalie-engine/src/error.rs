use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Broad classification a transport layer can map to user-facing responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    StateConflict,
    DependencyFailure,
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Goalie core error: {0}")]
    Core(#[from] goalie_core::GoalieError),

    #[error("Grid index must be between 1 and 9, got {0}")]
    InvalidGridIndex(u8),

    #[error("Invalid stake amount: {0}")]
    InvalidAmount(u64),

    #[error("Unrecognized grid label: {0}")]
    InvalidCoordinate(String),

    #[error("Challenge not found: {0}")]
    ChallengeNotFound(String),

    #[error("Challenge already has its guess: {0}")]
    ChallengeFull(String),

    #[error("Challenge already completed: {0}")]
    ChallengeCompleted(String),

    #[error("Challenge has not received its guess yet: {0}")]
    NotFull(String),

    #[error("Challenge already settled: {0}")]
    AlreadySettled(String),

    #[error("Payout failed: {0}")]
    PayoutFailed(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidGridIndex(_)
            | Self::InvalidAmount(_)
            | Self::InvalidCoordinate(_)
            | Self::Config(_) => ErrorKind::InvalidInput,
            Self::ChallengeNotFound(_) => ErrorKind::NotFound,
            Self::ChallengeFull(_)
            | Self::ChallengeCompleted(_)
            | Self::NotFull(_)
            | Self::AlreadySettled(_) => ErrorKind::StateConflict,
            Self::Core(_) | Self::PayoutFailed(_) => ErrorKind::DependencyFailure,
        }
    }
}
