use crate::error::{CoreError, Result};
use crate::types::Amount;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

/// Executes outbound fund movements for the game engine.
///
/// `payout` must be atomic: either every payee is credited or none is. The
/// engine relies on this to keep round resolution all-or-nothing.
#[async_trait]
pub trait Treasury: Send + Sync {
    async fn payout(&self, payouts: &[(Uuid, Amount)]) -> Result<()>;

    async fn withdraw(&self, to: Uuid, amount: Amount) -> Result<()>;
}

/// In-process treasury keeping per-identity balances. All credits of a
/// payout batch are applied under a single write lock, after the whole
/// batch has been validated.
pub struct InMemoryTreasury {
    balances: RwLock<HashMap<Uuid, u64>>,
}

impl InMemoryTreasury {
    pub fn new() -> Self {
        Self {
            balances: RwLock::new(HashMap::new()),
        }
    }

    /// Restore a treasury from previously saved balances.
    pub fn with_balances(balances: HashMap<Uuid, u64>) -> Self {
        Self {
            balances: RwLock::new(balances),
        }
    }

    pub fn balance(&self, id: Uuid) -> Amount {
        Amount::from_units(self.balances.read().get(&id).copied().unwrap_or(0))
    }

    pub fn balances(&self) -> HashMap<Uuid, u64> {
        self.balances.read().clone()
    }
}

impl Default for InMemoryTreasury {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Treasury for InMemoryTreasury {
    async fn payout(&self, payouts: &[(Uuid, Amount)]) -> Result<()> {
        let mut balances = self.balances.write();

        // Validate the whole batch before touching any balance.
        for (id, amount) in payouts {
            let current = balances.get(id).copied().unwrap_or(0);
            if current.checked_add(amount.to_units()).is_none() {
                return Err(CoreError::transfer(format!(
                    "Balance overflow crediting {}",
                    id
                )));
            }
        }

        for (id, amount) in payouts {
            *balances.entry(*id).or_insert(0) += amount.to_units();
        }

        tracing::info!("Paid out {} transfers", payouts.len());
        Ok(())
    }

    async fn withdraw(&self, to: Uuid, amount: Amount) -> Result<()> {
        let mut balances = self.balances.write();

        let current = balances.entry(to).or_insert(0);
        *current = current.checked_add(amount.to_units()).ok_or_else(|| {
            CoreError::transfer(format!("Balance overflow withdrawing to {}", to))
        })?;

        tracing::info!("Withdrew {} to {}", amount, to);
        Ok(())
    }
}
