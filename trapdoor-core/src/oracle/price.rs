use crate::error::{CoreError, Result};
use crate::oracle::PriceOracle;
use crate::types::{Amount, UsdValue, UNITS_PER_COIN};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

/// Price oracle backed by a single updatable reading: the USD price of one
/// whole native coin, at the fixed 10^8 scale.
pub struct FixedPriceOracle {
    price: RwLock<PriceReading>,
}

#[derive(Debug, Clone, Copy)]
struct PriceReading {
    /// USD per whole coin, scaled by 10^8.
    usd_per_coin: u64,
    published_at: DateTime<Utc>,
}

impl FixedPriceOracle {
    pub fn new(usd_per_coin: u64) -> Self {
        Self {
            price: RwLock::new(PriceReading {
                usd_per_coin,
                published_at: Utc::now(),
            }),
        }
    }

    /// Publish a new price. Consumers always read the latest value.
    pub fn set_price(&self, usd_per_coin: u64) {
        let mut reading = self.price.write();
        reading.usd_per_coin = usd_per_coin;
        reading.published_at = Utc::now();
        tracing::debug!("Price updated to {} (scaled) per coin", usd_per_coin);
    }

    pub fn latest_price(&self) -> u64 {
        self.price.read().usd_per_coin
    }

    pub fn published_at(&self) -> DateTime<Utc> {
        self.price.read().published_at
    }
}

impl PriceOracle for FixedPriceOracle {
    fn usd_value(&self, amount: Amount) -> Result<UsdValue> {
        let price = self.price.read().usd_per_coin;

        let scaled = (amount.to_units() as u128 * price as u128) / UNITS_PER_COIN as u128;
        let scaled = u64::try_from(scaled)
            .map_err(|_| CoreError::oracle("USD value overflows 64 bits"))?;

        Ok(UsdValue::from_scaled(scaled))
    }

    fn native_value(&self, usd: UsdValue) -> Result<Amount> {
        let price = self.price.read().usd_per_coin;
        if price == 0 {
            return Err(CoreError::oracle("No published price"));
        }

        let units = (usd.to_scaled() as u128 * UNITS_PER_COIN as u128) / price as u128;
        let units =
            u64::try_from(units).map_err(|_| CoreError::oracle("Native value overflows 64 bits"))?;

        Ok(Amount::from_units(units))
    }
}
