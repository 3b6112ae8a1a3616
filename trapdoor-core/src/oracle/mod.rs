pub mod price;
pub mod randomness;

pub use price::FixedPriceOracle;
pub use randomness::LocalRandomnessOracle;

use crate::error::Result;
use crate::types::{Amount, RequestToken, UsdValue};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Price conversion between the native currency and USD, using the latest
/// published price. The engine trusts the most recent reading and performs
/// no staleness validation.
pub trait PriceOracle: Send + Sync {
    /// USD-equivalent value of a native payment amount.
    fn usd_value(&self, amount: Amount) -> Result<UsdValue>;

    /// Native amount currently worth the given USD value.
    fn native_value(&self, usd: UsdValue) -> Result<Amount>;
}

/// Request descriptor handed to the randomness oracle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomnessRequest {
    pub confirmation_depth: u8,
    pub num_values: u8,
}

/// Verifiable randomness with a two-phase protocol: `request` acknowledges
/// synchronously with a correlation token; the oracle infrastructure later
/// delivers exactly one random value for that token to the fulfillment
/// entry point of the consumer. No upper bound on the delay is guaranteed.
#[async_trait]
pub trait RandomnessOracle: Send + Sync {
    async fn request(&self, request: RandomnessRequest) -> Result<RequestToken>;
}
