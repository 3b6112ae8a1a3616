//! Two-Sided Wagering Round Engine
//!
//! Participants pay an entry amount to join one of two sides (Left/Right).
//! Once a minimum interval has elapsed and at least one participant is in,
//! anyone may close the round, which issues a randomness request. The
//! asynchronous fulfillment picks the winning side by parity and the
//! accumulated prize pool is split evenly among its participants.

pub mod error;
pub mod events;
pub mod game;
pub mod side;

pub use error::{GameError, Result};
pub use events::GameEvent;
pub use game::{GameSnapshot, RoundResolution, RoundState, TrapdoorGame};
pub use side::Side;

use std::sync::Arc;
use trapdoor_core::{GameConfig, PriceOracle, RandomnessOracle, Treasury};

/// Create a new game instance from deployment configuration and the
/// injected oracle and treasury collaborators.
pub fn create_game(
    config: GameConfig,
    price_oracle: Arc<dyn PriceOracle>,
    randomness_oracle: Arc<dyn RandomnessOracle>,
    treasury: Arc<dyn Treasury>,
) -> Result<TrapdoorGame> {
    TrapdoorGame::new(config, price_oracle, randomness_oracle, treasury)
}
