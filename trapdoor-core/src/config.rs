use crate::error::{CoreError, Result};
use crate::types::UsdValue;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Immutable deployment-time parameters for a game instance, read once at
/// construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    /// The only identity allowed to withdraw accumulated fees.
    pub admin: Uuid,
    /// Minimum USD-equivalent value a payment must meet to be accepted.
    pub entry_fee_floor: UsdValue,
    /// Maximum participants per side.
    pub max_players_per_side: usize,
    /// Minimum elapsed time before an open round may be closed.
    pub round_interval: Duration,
    pub randomness: RandomnessParams,
}

/// Fixed parameters attached to every randomness request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomnessParams {
    pub confirmation_depth: u8,
    pub num_values: u8,
    /// Oracle identifier supplied by deployment tooling.
    pub key_hash: String,
    pub subscription_id: u64,
}

impl Default for RandomnessParams {
    fn default() -> Self {
        Self {
            confirmation_depth: 3,
            num_values: 1,
            key_hash: String::new(),
            subscription_id: 0,
        }
    }
}

impl GameConfig {
    pub fn new(admin: Uuid) -> Self {
        Self {
            admin,
            entry_fee_floor: UsdValue::from_usd(10),
            max_players_per_side: 100,
            round_interval: Duration::from_secs(600), // 10 minutes
            randomness: RandomnessParams::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_players_per_side == 0 {
            return Err(CoreError::config(
                "Max players per side must be greater than 0",
            ));
        }

        if self.entry_fee_floor == UsdValue::ZERO {
            return Err(CoreError::config("Entry fee floor cannot be zero"));
        }

        if self.randomness.num_values != 1 {
            return Err(CoreError::config(
                "Exactly one random value per request is supported",
            ));
        }

        Ok(())
    }
}
