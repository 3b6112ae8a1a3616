use anyhow::{anyhow, Context};
use comfy_table::{presets::UTF8_FULL, Table};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use trapdoor_core::{
    Amount, FixedPriceOracle, GameConfig, InMemoryTreasury, LocalRandomnessOracle, RandomValue,
    RoundRecord, RoundStore, Storage,
};
use trapdoor_game::{GameSnapshot, Side, TrapdoorGame};
use uuid::Uuid;

type Result<T> = anyhow::Result<T>;

/// Everything the host persists between invocations: deployment config,
/// the engine snapshot, the oracle seed and treasury balances.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct HostState {
    config: GameConfig,
    snapshot: GameSnapshot,
    oracle_seed: String, // hex, 32 bytes
    price_per_coin: u64,
    balances: HashMap<Uuid, u64>,
}

struct Host {
    game: TrapdoorGame,
    price_oracle: Arc<FixedPriceOracle>,
    randomness_oracle: Arc<LocalRandomnessOracle>,
    treasury: Arc<InMemoryTreasury>,
    config: GameConfig,
    oracle_seed: String,
}

fn state_path(data_dir: &Path) -> PathBuf {
    data_dir.join("trapdoor_state.json")
}

fn load_state(data_dir: &Path) -> Result<HostState> {
    let path = state_path(data_dir);
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("No game at {} (run `trapdoor init` first)", path.display()))?;
    Ok(serde_json::from_str(&content)?)
}

fn save_state(data_dir: &Path, state: &HostState) -> Result<()> {
    let content = serde_json::to_string_pretty(state)?;
    std::fs::write(state_path(data_dir), content)?;
    Ok(())
}

fn restore_host(state: &HostState) -> Result<Host> {
    let seed_bytes = hex::decode(&state.oracle_seed)?;
    let seed: [u8; 32] = seed_bytes
        .try_into()
        .map_err(|_| anyhow!("Oracle seed must be 32 bytes"))?;

    let price_oracle = Arc::new(FixedPriceOracle::new(state.price_per_coin));
    let randomness_oracle = Arc::new(LocalRandomnessOracle::new(seed));
    let treasury = Arc::new(InMemoryTreasury::with_balances(state.balances.clone()));

    let game = TrapdoorGame::from_snapshot(
        state.snapshot.clone(),
        state.config.clone(),
        price_oracle.clone(),
        randomness_oracle.clone(),
        treasury.clone(),
    )?;

    Ok(Host {
        game,
        price_oracle,
        randomness_oracle,
        treasury,
        config: state.config.clone(),
        oracle_seed: state.oracle_seed.clone(),
    })
}

fn persist_host(data_dir: &Path, host: &Host) -> Result<()> {
    let state = HostState {
        config: host.config.clone(),
        snapshot: host.game.snapshot(),
        oracle_seed: host.oracle_seed.clone(),
        price_per_coin: host.price_oracle.latest_price(),
        balances: host.treasury.balances(),
    };
    save_state(data_dir, &state)
}

async fn open_round_store(data_dir: &Path) -> Result<Storage> {
    Ok(Storage::new(&data_dir.join("trapdoor.db")).await?)
}

pub async fn init_game(data_dir: &Path, interval_secs: u64, price: u64) -> Result<()> {
    let path = state_path(data_dir);
    if path.exists() {
        return Err(anyhow!(
            "Game already exists at {} (remove it to start over)",
            path.display()
        ));
    }

    let admin = Uuid::new_v4();
    let mut config = GameConfig::new(admin);
    config.round_interval = std::time::Duration::from_secs(interval_secs);

    // 32-byte oracle seed from two v4 identifiers
    let mut seed = [0u8; 32];
    seed[..16].copy_from_slice(Uuid::new_v4().as_bytes());
    seed[16..].copy_from_slice(Uuid::new_v4().as_bytes());

    let price_oracle = Arc::new(FixedPriceOracle::new(price));
    let game = TrapdoorGame::new(
        config.clone(),
        price_oracle.clone(),
        Arc::new(LocalRandomnessOracle::new(seed)),
        Arc::new(InMemoryTreasury::new()),
    )?;

    let state = HostState {
        config: config.clone(),
        snapshot: game.snapshot(),
        oracle_seed: hex::encode(seed),
        price_per_coin: price,
        balances: HashMap::new(),
    };
    save_state(data_dir, &state)?;

    println!("Game created.");
    println!("Administrator: {}", admin);
    println!("Entry fee floor: {}", config.entry_fee_floor);
    println!("Round interval: {}s", interval_secs);
    println!(
        "Entry price at current oracle rate: {}",
        game.entry_price_native()?
    );

    Ok(())
}

pub async fn enter_game(
    data_dir: &Path,
    side: &str,
    amount: u64,
    participant: Option<&str>,
) -> Result<()> {
    let state = load_state(data_dir)?;
    let mut host = restore_host(&state)?;

    let side: Side = side.parse()?;
    let participant = match participant {
        Some(id) => Uuid::parse_str(id)?,
        None => Uuid::new_v4(),
    };
    let payment = Amount::from_units(amount);

    host.game.enter_game(participant, side, payment)?;
    log_events(&mut host.game);
    persist_host(data_dir, &host)?;

    println!("Entered {} with {}.", side, payment);
    println!("Participant ID: {}", participant);
    println!(
        "Side counts: left {} / right {}",
        host.game.side_count(Side::Left),
        host.game.side_count(Side::Right)
    );

    Ok(())
}

pub async fn trigger_reveal(data_dir: &Path) -> Result<()> {
    let state = load_state(data_dir)?;
    let mut host = restore_host(&state)?;

    let caller = Uuid::new_v4();
    let token = host.game.trigger_reveal(caller).await?;
    log_events(&mut host.game);
    persist_host(data_dir, &host)?;

    println!("Round closed. Randomness requested.");
    println!("Correlation token: {}", token);
    println!("Run `trapdoor fulfill` to deliver the random value.");

    Ok(())
}

pub async fn fulfill(data_dir: &Path, value_override: Option<u64>) -> Result<()> {
    let state = load_state(data_dir)?;
    let mut host = restore_host(&state)?;

    let token = host
        .game
        .pending_request()
        .ok_or_else(|| anyhow!("No randomness request outstanding"))?;

    let value = match value_override {
        Some(raw) => RandomValue::from(raw),
        None => host.randomness_oracle.value_for(&token),
    };

    let resolution = host.game.on_randomness_fulfilled(token, value).await?;
    log_events(&mut host.game);
    persist_host(data_dir, &host)?;

    let storage = open_round_store(data_dir).await?;
    let store = RoundStore::new(&storage);
    store
        .record_round(&RoundRecord {
            round_id: Uuid::new_v4().to_string(),
            resolved_at: resolution.resolved_at,
            winning_side: resolution.winning_side.to_string(),
            winner_count: resolution.winners.len() as u64,
            prize_value: resolution.prize_value,
            pool_carried: resolution.pool_carried,
            random_value: resolution.random_value.to_string(),
        })
        .await?;

    println!("------ ROUND RESOLVED ------");
    println!("Winning side: {}", resolution.winning_side);
    println!("Random value: {}", resolution.random_value);
    println!("Winners: {}", resolution.winners.len());
    println!("Prize per winner: {}", resolution.prize_value);
    println!("Pool carried forward: {}", resolution.pool_carried);

    if !resolution.winners.is_empty() {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Winner", "Prize"]);
        for winner in &resolution.winners {
            table.add_row(vec![
                winner.to_string(),
                resolution.prize_value.to_string(),
            ]);
        }
        println!("{}", table);
    }

    Ok(())
}

pub async fn show_status(data_dir: &Path) -> Result<()> {
    let state = load_state(data_dir)?;
    let host = restore_host(&state)?;
    let game = &host.game;

    println!("Game Status");
    println!("═══════════════════════════════════");
    println!("State: {:?}", game.state());
    println!("Prize pool: {}", game.prize_pool());
    println!("Fee balance: {}", game.fees());
    println!("Interval: {}s", game.interval().as_secs());
    println!(
        "Last opened: {}",
        game.last_opened_at().format("%Y-%m-%d %H:%M:%S UTC")
    );
    if let Some(token) = game.pending_request() {
        println!("Outstanding randomness request: {}", token);
    }
    println!(
        "Entry price at current oracle rate: {}",
        game.entry_price_native()?
    );

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Side", "Participants"]);
    table.add_row(vec![
        "left".to_string(),
        game.side_count(Side::Left).to_string(),
    ]);
    table.add_row(vec![
        "right".to_string(),
        game.side_count(Side::Right).to_string(),
    ]);
    println!("{}", table);

    if let Some(side) = game.last_side() {
        println!();
        println!("Last round: {} won, prize {}", side, game.last_prize_value());
        for winner in game.last_winners() {
            println!("  {}", winner);
        }
    }

    Ok(())
}

pub async fn show_history(data_dir: &Path, limit: usize) -> Result<()> {
    let storage = open_round_store(data_dir).await?;
    let store = RoundStore::new(&storage);
    let rounds = store.list_rounds(limit).await?;

    if rounds.is_empty() {
        println!("No resolved rounds.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        "Resolved",
        "Side",
        "Winners",
        "Prize",
        "Carried",
    ]);

    for round in &rounds {
        table.add_row(vec![
            round.resolved_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            round.winning_side.clone(),
            round.winner_count.to_string(),
            round.prize_value.to_string(),
            round.pool_carried.to_string(),
        ]);
    }

    println!("Resolved rounds:");
    println!("{}", table);

    Ok(())
}

pub async fn show_balances(data_dir: &Path) -> Result<()> {
    let state = load_state(data_dir)?;

    if state.balances.is_empty() {
        println!("No balances.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Identity", "Balance"]);
    for (id, units) in &state.balances {
        let label = if *id == state.config.admin {
            format!("{} (admin)", id)
        } else {
            id.to_string()
        };
        table.add_row(vec![label, Amount::from_units(*units).to_string()]);
    }
    println!("{}", table);

    Ok(())
}

pub async fn withdraw_fees(data_dir: &Path) -> Result<()> {
    let state = load_state(data_dir)?;
    let mut host = restore_host(&state)?;

    let fees = host.game.fees();
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(format!("Withdraw {} to the administrator?", fees))
        .default(false)
        .interact()?;
    if !confirmed {
        println!("Aborted.");
        return Ok(());
    }

    let admin = host.game.admin();
    let withdrawn = host.game.withdraw_fees(admin).await?;
    persist_host(data_dir, &host)?;

    let storage = open_round_store(data_dir).await?;
    RoundStore::new(&storage)
        .record_fee_withdrawal(withdrawn)
        .await?;

    println!("Withdrew {} to {}.", withdrawn, admin);
    Ok(())
}

pub async fn set_interval(data_dir: &Path, secs: u64) -> Result<()> {
    let state = load_state(data_dir)?;
    let mut host = restore_host(&state)?;

    let admin = host.game.admin();
    host.game
        .update_interval(admin, std::time::Duration::from_secs(secs))?;
    persist_host(data_dir, &host)?;

    println!("Round interval set to {}s.", secs);
    Ok(())
}

pub async fn set_price(data_dir: &Path, price: u64) -> Result<()> {
    let state = load_state(data_dir)?;
    let host = restore_host(&state)?;

    host.price_oracle.set_price(price);
    persist_host(data_dir, &host)?;

    println!("Oracle price set to {} (scaled) per coin.", price);
    println!(
        "Entry price at new rate: {}",
        host.game.entry_price_native()?
    );
    Ok(())
}

fn log_events(game: &mut TrapdoorGame) {
    for event in game.take_events() {
        tracing::debug!("Event: {:?}", event);
    }
}
