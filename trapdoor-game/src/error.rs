use crate::side::Side;
use thiserror::Error;
use trapdoor_core::{CoreError, UsdValue};

pub type Result<T> = std::result::Result<T, GameError>;

#[derive(Error, Debug)]
pub enum GameError {
    #[error("Entry below the {required} fee floor (worth {actual})")]
    InvalidEntryFee {
        required: UsdValue,
        actual: UsdValue,
    },

    #[error("Game is closed")]
    GameIsClosed,

    #[error("Invalid choice: {0}")]
    InvalidChoice(String),

    #[error("Maximum players reached on side {0}")]
    MaxPlayersReached(Side),

    #[error("Not enough time passed: {remaining_secs}s remaining")]
    NotEnoughTimePassed { remaining_secs: i64 },

    #[error("Trapdoors are empty")]
    TrapdoorsAreEmpty,

    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    #[error("Caller is not the administrator")]
    Unauthorized,

    #[error("No randomness request outstanding")]
    NoPendingRequest,

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}
