//! Trapdoor core - shared foundation for the two-sided wagering engine
//!
//! This crate provides the integer money types, the consumed oracle
//! interfaces (price conversion and verifiable randomness), the treasury
//! transfer abstraction and the sqlite-backed round history used by the
//! game engine and its hosts.

pub mod config;
pub mod error;
pub mod oracle;
pub mod storage;
pub mod treasury;
pub mod types;

pub use config::{GameConfig, RandomnessParams};
pub use error::{CoreError, Result};
pub use oracle::{
    FixedPriceOracle, LocalRandomnessOracle, PriceOracle, RandomnessOracle, RandomnessRequest,
};
pub use storage::{RoundRecord, RoundStore, Storage};
pub use treasury::{InMemoryTreasury, Treasury};
pub use types::{Amount, RandomValue, RequestToken, UsdValue};
