use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};
use uuid::Uuid;

/// Base units per whole native coin (9 decimals).
pub const UNITS_PER_COIN: u64 = 1_000_000_000;

/// Scale factor for USD-denominated values (8 decimals).
pub const USD_SCALE: u64 = 100_000_000;

/// A payment or balance in the smallest native currency unit.
///
/// All financial arithmetic in the engine is integer-only; truncation and
/// remainder behavior is part of the accounting contract.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn from_units(units: u64) -> Self {
        Self(units)
    }

    pub fn from_coins(coins: u64) -> Self {
        Self(coins * UNITS_PER_COIN)
    }

    pub fn to_units(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, other: Amount) -> Amount {
        Amount(self.0 + other.0)
    }
}

impl Sub for Amount {
    type Output = Amount;

    fn sub(self, other: Amount) -> Amount {
        Amount(self.0 - other.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} units", self.0)
    }
}

/// A USD-denominated value at a fixed decimal scale of 10^8.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct UsdValue(u64);

impl UsdValue {
    pub const ZERO: UsdValue = UsdValue(0);

    pub fn from_scaled(scaled: u64) -> Self {
        Self(scaled)
    }

    pub fn from_usd(whole_dollars: u64) -> Self {
        Self(whole_dollars * USD_SCALE)
    }

    pub fn to_scaled(self) -> u64 {
        self.0
    }
}

impl fmt::Display for UsdValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "${}.{:08}",
            self.0 / USD_SCALE,
            self.0 % USD_SCALE
        )
    }
}

/// A 256-bit random value delivered by the randomness oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomValue([u8; 32]);

impl RandomValue {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Parity of the value interpreted as a big-endian integer.
    pub fn is_odd(&self) -> bool {
        self.0[31] & 1 == 1
    }
}

impl From<u64> for RandomValue {
    fn from(value: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }
}

impl fmt::Display for RandomValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Correlation token returned by the randomness oracle for an accepted
/// request; the matching fulfillment carries it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestToken(Uuid);

impl RequestToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RequestToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
