use crate::error::{GameError, Result};
use crate::events::GameEvent;
use crate::side::Side;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use trapdoor_core::{
    Amount, CoreError, GameConfig, PriceOracle, RandomValue, RandomnessOracle, RandomnessRequest,
    RequestToken, Treasury,
};
use uuid::Uuid;

/// Fee taken from every accepted payment: 30 / 1000 = 3%.
const FEE_NUMERATOR: u128 = 30;
const FEE_DENOMINATOR: u128 = 1000;

/// Round lifecycle state. Closed spans the window between a successful
/// reveal trigger and the matching randomness fulfillment; it blocks new
/// entries and further reveal triggers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RoundState {
    Open,
    Closed,
}

/// Summary of one resolved round, returned to the host for recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundResolution {
    pub winning_side: Side,
    pub winners: Vec<Uuid>,
    pub prize_value: Amount,
    /// Pool remainder left after distribution; carries into the next round.
    pub pool_carried: Amount,
    pub random_value: RandomValue,
    pub resolved_at: DateTime<Utc>,
}

/// Serializable snapshot of all mutable game state, for hosts that persist
/// the engine between invocations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub state: RoundState,
    pub left: Vec<Uuid>,
    pub right: Vec<Uuid>,
    pub total_prize_pool: Amount,
    pub total_fees: Amount,
    pub interval_ms: u64,
    pub last_opened_at: DateTime<Utc>,
    pub pending_request: Option<RequestToken>,
    pub last_winners: Vec<Uuid>,
    pub last_side: Option<Side>,
    pub last_prize_value: Amount,
}

/// The single stateful game engine: validates entries, accounts fees and
/// pool balances, gates round closure, consumes the randomness fulfillment
/// and distributes the pool.
pub struct TrapdoorGame {
    config: GameConfig,
    price_oracle: Arc<dyn PriceOracle>,
    randomness_oracle: Arc<dyn RandomnessOracle>,
    treasury: Arc<dyn Treasury>,

    state: RoundState,
    left: Vec<Uuid>,
    right: Vec<Uuid>,
    total_prize_pool: Amount,
    total_fees: Amount,
    interval: Duration,
    last_opened_at: DateTime<Utc>,
    pending_request: Option<RequestToken>,

    last_winners: Vec<Uuid>,
    last_side: Option<Side>,
    last_prize_value: Amount,

    events: Vec<GameEvent>,
}

impl TrapdoorGame {
    pub fn new(
        config: GameConfig,
        price_oracle: Arc<dyn PriceOracle>,
        randomness_oracle: Arc<dyn RandomnessOracle>,
        treasury: Arc<dyn Treasury>,
    ) -> Result<Self> {
        config.validate()?;

        let interval = Duration::from_std(config.round_interval)
            .map_err(|e| CoreError::config(format!("Round interval out of range: {}", e)))?;

        tracing::info!(
            "Game created (floor {}, capacity {}, interval {}s)",
            config.entry_fee_floor,
            config.max_players_per_side,
            interval.num_seconds()
        );

        Ok(Self {
            config,
            price_oracle,
            randomness_oracle,
            treasury,
            state: RoundState::Open,
            left: Vec::new(),
            right: Vec::new(),
            total_prize_pool: Amount::ZERO,
            total_fees: Amount::ZERO,
            interval,
            last_opened_at: Utc::now(),
            pending_request: None,
            last_winners: Vec::new(),
            last_side: None,
            last_prize_value: Amount::ZERO,
            events: Vec::new(),
        })
    }

    /// Restore an engine from a previously taken snapshot.
    pub fn from_snapshot(
        snapshot: GameSnapshot,
        config: GameConfig,
        price_oracle: Arc<dyn PriceOracle>,
        randomness_oracle: Arc<dyn RandomnessOracle>,
        treasury: Arc<dyn Treasury>,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            price_oracle,
            randomness_oracle,
            treasury,
            state: snapshot.state,
            left: snapshot.left,
            right: snapshot.right,
            total_prize_pool: snapshot.total_prize_pool,
            total_fees: snapshot.total_fees,
            interval: Duration::milliseconds(snapshot.interval_ms as i64),
            last_opened_at: snapshot.last_opened_at,
            pending_request: snapshot.pending_request,
            last_winners: snapshot.last_winners,
            last_side: snapshot.last_side,
            last_prize_value: snapshot.last_prize_value,
            events: Vec::new(),
        })
    }

    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            state: self.state,
            left: self.left.clone(),
            right: self.right.clone(),
            total_prize_pool: self.total_prize_pool,
            total_fees: self.total_fees,
            interval_ms: self.interval.num_milliseconds().max(0) as u64,
            last_opened_at: self.last_opened_at,
            pending_request: self.pending_request,
            last_winners: self.last_winners.clone(),
            last_side: self.last_side,
            last_prize_value: self.last_prize_value,
        }
    }

    /// Enter the current round on the chosen side with an attached payment.
    ///
    /// The payment must be worth at least the USD fee floor at the latest
    /// oracle price. 3% of the payment accrues to the fee balance and the
    /// rest to the prize pool. Any failure leaves all state unchanged.
    pub fn enter_game(&mut self, participant: Uuid, side: Side, payment: Amount) -> Result<()> {
        if self.state != RoundState::Open {
            return Err(GameError::GameIsClosed);
        }

        let usd = self.price_oracle.usd_value(payment)?;
        if usd < self.config.entry_fee_floor {
            return Err(GameError::InvalidEntryFee {
                required: self.config.entry_fee_floor,
                actual: usd,
            });
        }

        if self.side_count(side) >= self.config.max_players_per_side {
            return Err(GameError::MaxPlayersReached(side));
        }

        let fee = Amount::from_units(
            (payment.to_units() as u128 * FEE_NUMERATOR / FEE_DENOMINATOR) as u64,
        );
        let pool_credit = payment - fee;

        self.total_fees = self
            .total_fees
            .checked_add(fee)
            .ok_or_else(|| CoreError::internal("Fee accumulator overflow"))?;
        self.total_prize_pool = self
            .total_prize_pool
            .checked_add(pool_credit)
            .ok_or_else(|| CoreError::internal("Prize pool overflow"))?;

        self.side_mut(side).push(participant);
        self.events.push(GameEvent::ChoiceMade {
            participant,
            side,
            payment,
        });

        tracing::info!(
            "Participant {} entered {} with {} (fee {})",
            participant,
            side,
            payment,
            fee
        );
        Ok(())
    }

    /// Close the round and request a random value. Unrestricted: any caller
    /// may trigger once the interval has elapsed and a participant exists;
    /// intended to be driven by an autonomous scheduler.
    pub async fn trigger_reveal(&mut self, caller: Uuid) -> Result<RequestToken> {
        if self.state != RoundState::Open {
            return Err(GameError::GameIsClosed);
        }

        let elapsed = Utc::now() - self.last_opened_at;
        if elapsed < self.interval {
            return Err(GameError::NotEnoughTimePassed {
                remaining_secs: (self.interval - elapsed).num_seconds(),
            });
        }

        if self.left.is_empty() && self.right.is_empty() {
            return Err(GameError::TrapdoorsAreEmpty);
        }

        let token = self
            .randomness_oracle
            .request(RandomnessRequest {
                confirmation_depth: self.config.randomness.confirmation_depth,
                num_values: self.config.randomness.num_values,
            })
            .await?;

        self.state = RoundState::Closed;
        self.pending_request = Some(token);
        self.events.push(GameEvent::StateChanged {
            state: RoundState::Closed,
        });
        self.events.push(GameEvent::RandomnessRequested { token });

        tracing::info!("Round closed by {} (request {})", caller, token);
        Ok(token)
    }

    /// Consume the randomness fulfillment, resolve the round and distribute
    /// the pool.
    ///
    /// Resolution is all-or-nothing: payouts are staged and committed as a
    /// single treasury batch, and no game state mutates unless the batch
    /// succeeds. On `TransferFailed` the round stays Closed and a later
    /// fulfillment delivery may resolve it.
    pub async fn on_randomness_fulfilled(
        &mut self,
        token: RequestToken,
        value: RandomValue,
    ) -> Result<RoundResolution> {
        let expected = self.pending_request.ok_or(GameError::NoPendingRequest)?;
        if expected != token {
            // Accepted anyway; the correlation token is not part of the
            // resolution computation.
            tracing::warn!(
                "Fulfillment token {} does not match outstanding request {}",
                token,
                expected
            );
        }

        let winning_side = Side::from_random(&value);
        let winners = self.side_ref(winning_side).to_vec();

        let prize = if winners.is_empty() {
            Amount::ZERO
        } else {
            Amount::from_units(self.total_prize_pool.to_units() / winners.len() as u64)
        };

        // Stage every transfer in sequence order and commit as one batch.
        let staged: Vec<(Uuid, Amount)> = winners.iter().map(|w| (*w, prize)).collect();
        if !staged.is_empty() {
            self.treasury
                .payout(&staged)
                .await
                .map_err(|e| GameError::TransferFailed(e.to_string()))?;
        }

        let distributed = Amount::from_units(prize.to_units() * winners.len() as u64);
        // The division remainder stays in the pool and carries forward.
        self.total_prize_pool = self.total_prize_pool - distributed;

        let resolved_at = Utc::now();
        // A winnerless round leaves the previous result snapshot in place.
        if !winners.is_empty() {
            self.last_winners = winners.clone();
            self.last_side = Some(winning_side);
            self.last_prize_value = prize;
        }
        self.left.clear();
        self.right.clear();
        self.state = RoundState::Open;
        self.last_opened_at = resolved_at;
        self.pending_request = None;

        self.events.push(GameEvent::TrapdoorOpened { side: winning_side });
        self.events.push(GameEvent::WinnersChosen {
            winners: winners.clone(),
        });
        self.events.push(GameEvent::StateChanged {
            state: RoundState::Open,
        });

        tracing::info!(
            "Round resolved: {} wins, {} winner(s), prize {} each, {} carried",
            winning_side,
            winners.len(),
            prize,
            self.total_prize_pool
        );

        Ok(RoundResolution {
            winning_side,
            winners,
            prize_value: prize,
            pool_carried: self.total_prize_pool,
            random_value: value,
            resolved_at,
        })
    }

    /// Transfer the accumulated fee balance to the administrator. The
    /// balance resets to zero only after the transfer succeeds.
    pub async fn withdraw_fees(&mut self, caller: Uuid) -> Result<Amount> {
        if caller != self.config.admin {
            return Err(GameError::Unauthorized);
        }

        let amount = self.total_fees;
        self.treasury
            .withdraw(self.config.admin, amount)
            .await
            .map_err(|e| GameError::TransferFailed(e.to_string()))?;

        self.total_fees = Amount::ZERO;
        tracing::info!("Fees withdrawn: {}", amount);
        Ok(amount)
    }

    /// Change the minimum round interval. Restricted to the administrator.
    pub fn update_interval(&mut self, caller: Uuid, new_interval: std::time::Duration) -> Result<()> {
        if caller != self.config.admin {
            return Err(GameError::Unauthorized);
        }

        self.interval = Duration::from_std(new_interval)
            .map_err(|e| CoreError::config(format!("Round interval out of range: {}", e)))?;

        tracing::info!("Interval updated to {}s", self.interval.num_seconds());
        Ok(())
    }

    // Read-only queries

    pub fn state(&self) -> RoundState {
        self.state
    }

    pub fn prize_pool(&self) -> Amount {
        self.total_prize_pool
    }

    pub fn fees(&self) -> Amount {
        self.total_fees
    }

    pub fn side_count(&self, side: Side) -> usize {
        self.side_ref(side).len()
    }

    pub fn participants(&self, side: Side) -> &[Uuid] {
        self.side_ref(side)
    }

    pub fn last_winners(&self) -> &[Uuid] {
        &self.last_winners
    }

    pub fn last_side(&self) -> Option<Side> {
        self.last_side
    }

    pub fn last_prize_value(&self) -> Amount {
        self.last_prize_value
    }

    pub fn last_opened_at(&self) -> DateTime<Utc> {
        self.last_opened_at
    }

    pub fn interval(&self) -> std::time::Duration {
        self.interval.to_std().unwrap_or_default()
    }

    pub fn pending_request(&self) -> Option<RequestToken> {
        self.pending_request
    }

    pub fn admin(&self) -> Uuid {
        self.config.admin
    }

    /// Entry fee floor expressed in native units at the latest oracle price.
    pub fn entry_price_native(&self) -> Result<Amount> {
        Ok(self.price_oracle.native_value(self.config.entry_fee_floor)?)
    }

    pub fn events(&self) -> &[GameEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    fn side_ref(&self, side: Side) -> &Vec<Uuid> {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut Vec<Uuid> {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }
}

impl std::fmt::Debug for TrapdoorGame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrapdoorGame")
            .field("state", &self.state)
            .field("left", &self.left.len())
            .field("right", &self.right.len())
            .field("total_prize_pool", &self.total_prize_pool)
            .field("total_fees", &self.total_fees)
            .field("pending_request", &self.pending_request)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use trapdoor_core::types::{UNITS_PER_COIN, USD_SCALE};
    use trapdoor_core::{FixedPriceOracle, InMemoryTreasury, LocalRandomnessOracle};

    struct Fixture {
        game: TrapdoorGame,
        treasury: Arc<InMemoryTreasury>,
        price_oracle: Arc<FixedPriceOracle>,
        admin: Uuid,
    }

    /// Game at $1.00/coin with the given interval. The 10 USD floor is
    /// exactly 10 coins.
    fn fixture(interval: std::time::Duration) -> Fixture {
        let admin = Uuid::new_v4();
        let mut config = GameConfig::new(admin);
        config.round_interval = interval;

        let price_oracle = Arc::new(FixedPriceOracle::new(USD_SCALE));
        let treasury = Arc::new(InMemoryTreasury::new());
        let game = TrapdoorGame::new(
            config,
            price_oracle.clone(),
            Arc::new(LocalRandomnessOracle::new([9u8; 32])),
            treasury.clone(),
        )
        .unwrap();

        Fixture {
            game,
            treasury,
            price_oracle,
            admin,
        }
    }

    fn floor_payment() -> Amount {
        Amount::from_coins(10)
    }

    struct FailingTreasury;

    #[async_trait]
    impl Treasury for FailingTreasury {
        async fn payout(&self, _payouts: &[(Uuid, Amount)]) -> trapdoor_core::Result<()> {
            Err(CoreError::transfer("payout rejected"))
        }

        async fn withdraw(&self, _to: Uuid, _amount: Amount) -> trapdoor_core::Result<()> {
            Err(CoreError::transfer("withdraw rejected"))
        }
    }

    #[test]
    fn test_entry_splits_fee_and_pool_exactly() {
        let mut f = fixture(std::time::Duration::ZERO);
        let payment = floor_payment();

        f.game
            .enter_game(Uuid::new_v4(), Side::Left, payment)
            .unwrap();

        let expected_fee = payment.to_units() * 30 / 1000;
        assert_eq!(f.game.fees(), Amount::from_units(expected_fee));
        assert_eq!(
            f.game.prize_pool(),
            Amount::from_units(payment.to_units() - expected_fee)
        );
        assert_eq!(f.game.fees() + f.game.prize_pool(), payment);
    }

    #[test]
    fn test_fee_truncates_to_integer_units() {
        let mut f = fixture(std::time::Duration::ZERO);
        // 33 extra units: 33 * 30 / 1000 truncates to 0 extra fee
        let payment = Amount::from_units(10 * UNITS_PER_COIN + 33);

        f.game
            .enter_game(Uuid::new_v4(), Side::Right, payment)
            .unwrap();

        let expected_fee = payment.to_units() * 30 / 1000;
        assert_eq!(f.game.fees(), Amount::from_units(expected_fee));
        assert_eq!(f.game.fees() + f.game.prize_pool(), payment);
    }

    #[test]
    fn test_entry_at_floor_passes_one_unit_below_fails() {
        let mut f = fixture(std::time::Duration::ZERO);

        f.game
            .enter_game(Uuid::new_v4(), Side::Left, floor_payment())
            .unwrap();

        let below = Amount::from_units(floor_payment().to_units() - 1);
        let err = f
            .game
            .enter_game(Uuid::new_v4(), Side::Left, below)
            .unwrap_err();
        assert!(matches!(err, GameError::InvalidEntryFee { .. }));

        // Failed entry left the accounting untouched
        assert_eq!(f.game.side_count(Side::Left), 1);
        assert_eq!(f.game.fees() + f.game.prize_pool(), floor_payment());
    }

    #[test]
    fn test_price_change_moves_the_floor() {
        let mut f = fixture(std::time::Duration::ZERO);

        // At $0.50/coin, 10 coins are worth $5 and no longer clear the floor
        f.price_oracle.set_price(USD_SCALE / 2);
        let err = f
            .game
            .enter_game(Uuid::new_v4(), Side::Left, floor_payment())
            .unwrap_err();
        assert!(matches!(err, GameError::InvalidEntryFee { .. }));

        f.game
            .enter_game(Uuid::new_v4(), Side::Left, Amount::from_coins(20))
            .unwrap();
    }

    #[test]
    fn test_capacity_enforced_per_side() {
        let mut f = fixture(std::time::Duration::ZERO);

        for _ in 0..100 {
            f.game
                .enter_game(Uuid::new_v4(), Side::Left, floor_payment())
                .unwrap();
        }

        let err = f
            .game
            .enter_game(Uuid::new_v4(), Side::Left, floor_payment())
            .unwrap_err();
        assert!(matches!(err, GameError::MaxPlayersReached(Side::Left)));
        assert_eq!(f.game.side_count(Side::Left), 100);

        // Other side is unaffected
        f.game
            .enter_game(Uuid::new_v4(), Side::Right, floor_payment())
            .unwrap();
        assert_eq!(f.game.side_count(Side::Right), 1);
    }

    #[tokio::test]
    async fn test_reveal_requires_elapsed_interval() {
        let mut f = fixture(std::time::Duration::from_secs(600));
        f.game
            .enter_game(Uuid::new_v4(), Side::Left, floor_payment())
            .unwrap();

        let err = f.game.trigger_reveal(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, GameError::NotEnoughTimePassed { .. }));
        assert_eq!(f.game.state(), RoundState::Open);
    }

    #[tokio::test]
    async fn test_reveal_requires_a_participant() {
        let mut f = fixture(std::time::Duration::ZERO);

        let err = f.game.trigger_reveal(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, GameError::TrapdoorsAreEmpty));
    }

    #[tokio::test]
    async fn test_closed_round_blocks_entries_and_reveals() {
        let mut f = fixture(std::time::Duration::ZERO);
        f.game
            .enter_game(Uuid::new_v4(), Side::Left, floor_payment())
            .unwrap();
        f.game.trigger_reveal(Uuid::new_v4()).await.unwrap();

        assert_eq!(f.game.state(), RoundState::Closed);
        assert!(matches!(
            f.game
                .enter_game(Uuid::new_v4(), Side::Right, floor_payment())
                .unwrap_err(),
            GameError::GameIsClosed
        ));
        assert!(matches!(
            f.game.trigger_reveal(Uuid::new_v4()).await.unwrap_err(),
            GameError::GameIsClosed
        ));
    }

    #[tokio::test]
    async fn test_even_value_resolves_left_odd_right() {
        for (raw, expected) in [(4u64, Side::Left), (7u64, Side::Right)] {
            let mut f = fixture(std::time::Duration::ZERO);
            f.game
                .enter_game(Uuid::new_v4(), Side::Left, floor_payment())
                .unwrap();
            f.game
                .enter_game(Uuid::new_v4(), Side::Right, floor_payment())
                .unwrap();
            let token = f.game.trigger_reveal(Uuid::new_v4()).await.unwrap();

            let resolution = f
                .game
                .on_randomness_fulfilled(token, RandomValue::from(raw))
                .await
                .unwrap();
            assert_eq!(resolution.winning_side, expected);
            assert_eq!(f.game.last_side(), Some(expected));
        }
    }

    #[tokio::test]
    async fn test_payout_floors_and_remainder_carries_forward() {
        let mut f = fixture(std::time::Duration::ZERO);
        let winners: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();

        for w in &winners {
            f.game.enter_game(*w, Side::Left, floor_payment()).unwrap();
        }
        let pool = f.game.prize_pool();
        let expected_prize = pool.to_units() / 3;
        let expected_carry = pool.to_units() % 3;

        let token = f.game.trigger_reveal(Uuid::new_v4()).await.unwrap();
        let resolution = f
            .game
            .on_randomness_fulfilled(token, RandomValue::from(4u64))
            .await
            .unwrap();

        assert_eq!(resolution.prize_value, Amount::from_units(expected_prize));
        assert_eq!(resolution.winners, winners);
        assert_eq!(f.game.prize_pool(), Amount::from_units(expected_carry));
        for w in &winners {
            assert_eq!(f.treasury.balance(*w), Amount::from_units(expected_prize));
        }

        // Remainder is part of the next round's pool
        let next_payment = floor_payment();
        f.game
            .enter_game(Uuid::new_v4(), Side::Right, next_payment)
            .unwrap();
        let next_credit = next_payment.to_units() - next_payment.to_units() * 30 / 1000;
        assert_eq!(
            f.game.prize_pool(),
            Amount::from_units(expected_carry + next_credit)
        );
    }

    #[tokio::test]
    async fn test_resolution_resets_round() {
        let mut f = fixture(std::time::Duration::ZERO);
        f.game
            .enter_game(Uuid::new_v4(), Side::Left, floor_payment())
            .unwrap();
        f.game
            .enter_game(Uuid::new_v4(), Side::Right, floor_payment())
            .unwrap();
        let token = f.game.trigger_reveal(Uuid::new_v4()).await.unwrap();

        let before = Utc::now();
        f.game
            .on_randomness_fulfilled(token, RandomValue::from(7u64))
            .await
            .unwrap();

        assert_eq!(f.game.state(), RoundState::Open);
        assert_eq!(f.game.side_count(Side::Left), 0);
        assert_eq!(f.game.side_count(Side::Right), 0);
        assert!(f.game.pending_request().is_none());
        assert!(f.game.last_opened_at() >= before);
    }

    #[tokio::test]
    async fn test_losing_side_winners_empty_pool_carries() {
        let mut f = fixture(std::time::Duration::ZERO);
        let loser = Uuid::new_v4();
        f.game.enter_game(loser, Side::Right, floor_payment()).unwrap();
        let pool = f.game.prize_pool();

        let token = f.game.trigger_reveal(Uuid::new_v4()).await.unwrap();
        // Even value picks Left, which is empty
        let resolution = f
            .game
            .on_randomness_fulfilled(token, RandomValue::from(4u64))
            .await
            .unwrap();

        assert!(resolution.winners.is_empty());
        assert_eq!(resolution.prize_value, Amount::ZERO);
        assert_eq!(f.game.prize_pool(), pool);
        assert_eq!(f.treasury.balance(loser), Amount::ZERO);
        assert_eq!(f.game.state(), RoundState::Open);

        // The result snapshot is untouched by a winnerless round
        assert_eq!(f.game.last_side(), None);
        assert!(f.game.last_winners().is_empty());
        assert_eq!(f.game.last_prize_value(), Amount::ZERO);
    }

    #[tokio::test]
    async fn test_winnerless_round_keeps_previous_result() {
        let mut f = fixture(std::time::Duration::ZERO);

        // Round 1: a Right participant wins on an odd value
        let first_winner = Uuid::new_v4();
        f.game
            .enter_game(first_winner, Side::Right, floor_payment())
            .unwrap();
        let token = f.game.trigger_reveal(Uuid::new_v4()).await.unwrap();
        let first = f
            .game
            .on_randomness_fulfilled(token, RandomValue::from(7u64))
            .await
            .unwrap();
        assert_eq!(first.winners, vec![first_winner]);

        // Round 2: only Right is populated; an even value picks empty Left
        f.game
            .enter_game(Uuid::new_v4(), Side::Right, floor_payment())
            .unwrap();
        let token = f.game.trigger_reveal(Uuid::new_v4()).await.unwrap();
        f.game
            .on_randomness_fulfilled(token, RandomValue::from(4u64))
            .await
            .unwrap();

        assert_eq!(f.game.last_winners(), &[first_winner]);
        assert_eq!(f.game.last_side(), Some(Side::Right));
        assert_eq!(f.game.last_prize_value(), first.prize_value);
    }

    #[tokio::test]
    async fn test_transfer_failure_leaves_round_closed_and_intact() {
        let admin = Uuid::new_v4();
        let mut config = GameConfig::new(admin);
        config.round_interval = std::time::Duration::ZERO;

        let mut game = TrapdoorGame::new(
            config,
            Arc::new(FixedPriceOracle::new(USD_SCALE)),
            Arc::new(LocalRandomnessOracle::new([9u8; 32])),
            Arc::new(FailingTreasury),
        )
        .unwrap();

        let winner = Uuid::new_v4();
        game.enter_game(winner, Side::Left, floor_payment()).unwrap();
        let pool = game.prize_pool();
        let fees = game.fees();
        let token = game.trigger_reveal(Uuid::new_v4()).await.unwrap();

        let err = game
            .on_randomness_fulfilled(token, RandomValue::from(4u64))
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::TransferFailed(_)));

        // Nothing committed: round stays Closed and resolvable later
        assert_eq!(game.state(), RoundState::Closed);
        assert_eq!(game.side_count(Side::Left), 1);
        assert_eq!(game.prize_pool(), pool);
        assert_eq!(game.fees(), fees);
        assert_eq!(game.pending_request(), Some(token));
    }

    #[tokio::test]
    async fn test_fulfillment_without_request_rejected() {
        let mut f = fixture(std::time::Duration::ZERO);

        let err = f
            .game
            .on_randomness_fulfilled(RequestToken::new(), RandomValue::from(4u64))
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::NoPendingRequest));
    }

    #[tokio::test]
    async fn test_mismatched_token_still_processed() {
        let mut f = fixture(std::time::Duration::ZERO);
        f.game
            .enter_game(Uuid::new_v4(), Side::Left, floor_payment())
            .unwrap();
        f.game.trigger_reveal(Uuid::new_v4()).await.unwrap();

        let result = f
            .game
            .on_randomness_fulfilled(RequestToken::new(), RandomValue::from(4u64))
            .await;
        assert!(result.is_ok());
        assert_eq!(f.game.state(), RoundState::Open);
    }

    #[tokio::test]
    async fn test_withdraw_fees_drains_once() {
        let mut f = fixture(std::time::Duration::ZERO);
        f.game
            .enter_game(Uuid::new_v4(), Side::Left, floor_payment())
            .unwrap();
        let fees = f.game.fees();
        assert!(!fees.is_zero());

        let withdrawn = f.game.withdraw_fees(f.admin).await.unwrap();
        assert_eq!(withdrawn, fees);
        assert_eq!(f.game.fees(), Amount::ZERO);
        assert_eq!(f.treasury.balance(f.admin), fees);

        // Second immediate call transfers zero
        let again = f.game.withdraw_fees(f.admin).await.unwrap();
        assert_eq!(again, Amount::ZERO);
        assert_eq!(f.treasury.balance(f.admin), fees);
    }

    #[tokio::test]
    async fn test_withdraw_fees_rejects_non_admin() {
        let mut f = fixture(std::time::Duration::ZERO);
        f.game
            .enter_game(Uuid::new_v4(), Side::Left, floor_payment())
            .unwrap();

        let err = f.game.withdraw_fees(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, GameError::Unauthorized));
        assert!(!f.game.fees().is_zero());
    }

    #[tokio::test]
    async fn test_update_interval_is_admin_only() {
        let mut f = fixture(std::time::Duration::from_secs(600));
        f.game
            .enter_game(Uuid::new_v4(), Side::Left, floor_payment())
            .unwrap();

        assert!(matches!(
            f.game
                .update_interval(Uuid::new_v4(), std::time::Duration::ZERO)
                .unwrap_err(),
            GameError::Unauthorized
        ));

        f.game
            .update_interval(f.admin, std::time::Duration::ZERO)
            .unwrap();
        f.game.trigger_reveal(Uuid::new_v4()).await.unwrap();
    }

    #[tokio::test]
    async fn test_events_emitted_in_order() {
        let mut f = fixture(std::time::Duration::ZERO);
        let player = Uuid::new_v4();
        f.game.enter_game(player, Side::Left, floor_payment()).unwrap();
        let token = f.game.trigger_reveal(Uuid::new_v4()).await.unwrap();
        f.game
            .on_randomness_fulfilled(token, RandomValue::from(4u64))
            .await
            .unwrap();

        let events = f.game.take_events();
        assert_eq!(
            events,
            vec![
                GameEvent::ChoiceMade {
                    participant: player,
                    side: Side::Left,
                    payment: floor_payment(),
                },
                GameEvent::StateChanged {
                    state: RoundState::Closed
                },
                GameEvent::RandomnessRequested { token },
                GameEvent::TrapdoorOpened { side: Side::Left },
                GameEvent::WinnersChosen {
                    winners: vec![player]
                },
                GameEvent::StateChanged {
                    state: RoundState::Open
                },
            ]
        );
        assert!(f.game.events().is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_round_trips_through_restore() {
        let mut f = fixture(std::time::Duration::ZERO);
        f.game
            .enter_game(Uuid::new_v4(), Side::Left, floor_payment())
            .unwrap();
        let token = f.game.trigger_reveal(Uuid::new_v4()).await.unwrap();

        let snapshot = f.game.snapshot();
        let config = GameConfig::new(f.admin);
        let mut restored = TrapdoorGame::from_snapshot(
            snapshot,
            config,
            Arc::new(FixedPriceOracle::new(USD_SCALE)),
            Arc::new(LocalRandomnessOracle::new([9u8; 32])),
            f.treasury.clone(),
        )
        .unwrap();

        assert_eq!(restored.state(), RoundState::Closed);
        assert_eq!(restored.pending_request(), Some(token));
        restored
            .on_randomness_fulfilled(token, RandomValue::from(4u64))
            .await
            .unwrap();
        assert_eq!(restored.state(), RoundState::Open);
    }

    #[test]
    fn test_snapshot_preserves_subsecond_interval() {
        let f = fixture(std::time::Duration::from_millis(1500));

        let snapshot = f.game.snapshot();
        assert_eq!(snapshot.interval_ms, 1500);

        let restored = TrapdoorGame::from_snapshot(
            snapshot,
            GameConfig::new(f.admin),
            Arc::new(FixedPriceOracle::new(USD_SCALE)),
            Arc::new(LocalRandomnessOracle::new([9u8; 32])),
            f.treasury.clone(),
        )
        .unwrap();
        assert_eq!(restored.interval(), std::time::Duration::from_millis(1500));
    }

    #[test]
    fn test_entry_price_native_tracks_price() {
        let f = fixture(std::time::Duration::ZERO);
        assert_eq!(f.game.entry_price_native().unwrap(), Amount::from_coins(10));

        f.price_oracle.set_price(2 * USD_SCALE);
        assert_eq!(f.game.entry_price_native().unwrap(), Amount::from_coins(5));
    }
}
