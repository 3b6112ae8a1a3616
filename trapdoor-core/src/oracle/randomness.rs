use crate::error::Result;
use crate::oracle::{RandomnessOracle, RandomnessRequest};
use crate::types::{RandomValue, RequestToken};
use async_trait::async_trait;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Local randomness oracle for tests and single-process deployments.
///
/// Values are derived by hashing an instance seed with the correlation
/// token, so a given oracle instance is deterministic per request while
/// remaining unpredictable to callers who do not know the seed. The pending
/// fulfillment is parked until a driver collects it and delivers it to the
/// consumer, mirroring the asynchronous request/fulfill protocol of a real
/// randomness service.
pub struct LocalRandomnessOracle {
    seed: [u8; 32],
    pending: RwLock<HashMap<RequestToken, RandomValue>>,
}

impl LocalRandomnessOracle {
    pub fn new(seed: [u8; 32]) -> Self {
        Self {
            seed,
            pending: RwLock::new(HashMap::new()),
        }
    }

    pub fn new_random() -> Self {
        let mut seed = [0u8; 32];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut seed);
        Self::new(seed)
    }

    /// Collect the fulfillment for a request, removing it. Each accepted
    /// request yields its value exactly once.
    pub fn take_fulfillment(&self, token: &RequestToken) -> Option<RandomValue> {
        self.pending.write().remove(token)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.read().len()
    }

    /// Re-derive the value for a token without consuming the pending entry.
    /// For drivers that restart between request and delivery and cannot
    /// keep the pending map alive.
    pub fn value_for(&self, token: &RequestToken) -> RandomValue {
        self.derive_value(token)
    }

    fn derive_value(&self, token: &RequestToken) -> RandomValue {
        let mut hasher = Sha256::new();
        hasher.update(self.seed);
        hasher.update(token.as_uuid().as_bytes());
        let digest: [u8; 32] = hasher.finalize().into();
        RandomValue::from_bytes(digest)
    }
}

#[async_trait]
impl RandomnessOracle for LocalRandomnessOracle {
    async fn request(&self, request: RandomnessRequest) -> Result<RequestToken> {
        let token = RequestToken::new();
        let value = self.derive_value(&token);

        self.pending.write().insert(token, value);

        tracing::info!(
            "Randomness requested (token {}, depth {}, values {})",
            token,
            request.confirmation_depth,
            request.num_values
        );
        Ok(token)
    }
}
