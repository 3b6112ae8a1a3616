use crate::error::Result;
use crate::storage::Storage;
use crate::types::Amount;
use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One resolved round as persisted in the history table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round_id: String,
    pub resolved_at: DateTime<Utc>,
    pub winning_side: String,
    pub winner_count: u64,
    pub prize_value: Amount,
    /// Pool remainder carried into the next round.
    pub pool_carried: Amount,
    pub random_value: String,
}

pub struct RoundStore<'a> {
    storage: &'a Storage,
}

impl<'a> RoundStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub async fn record_round(&self, record: &RoundRecord) -> Result<()> {
        let conn = self.storage.get_connection().await;

        conn.execute(
            "INSERT OR REPLACE INTO rounds
             (round_id, resolved_at, winning_side, winner_count, prize_value, pool_carried, random_value)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.round_id,
                record.resolved_at.timestamp(),
                record.winning_side,
                record.winner_count as i64,
                record.prize_value.to_units() as i64,
                record.pool_carried.to_units() as i64,
                record.random_value,
            ],
        )?;

        tracing::info!("Recorded resolved round: {}", record.round_id);
        Ok(())
    }

    pub async fn list_rounds(&self, limit: usize) -> Result<Vec<RoundRecord>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(
            "SELECT round_id, resolved_at, winning_side, winner_count, prize_value, pool_carried, random_value
             FROM rounds ORDER BY resolved_at DESC LIMIT ?1",
        )?;

        let round_iter = stmt.query_map(params![limit as i64], |row| {
            let resolved_timestamp: i64 = row.get(1)?;
            let winner_count: i64 = row.get(3)?;
            let prize_value: i64 = row.get(4)?;
            let pool_carried: i64 = row.get(5)?;

            Ok(RoundRecord {
                round_id: row.get(0)?,
                resolved_at: DateTime::from_timestamp(resolved_timestamp, 0)
                    .unwrap_or_else(Utc::now),
                winning_side: row.get(2)?,
                winner_count: winner_count as u64,
                prize_value: Amount::from_units(prize_value as u64),
                pool_carried: Amount::from_units(pool_carried as u64),
                random_value: row.get(6)?,
            })
        })?;

        let mut rounds = Vec::new();
        for round in round_iter {
            rounds.push(round?);
        }

        Ok(rounds)
    }

    pub async fn record_fee_withdrawal(&self, amount: Amount) -> Result<()> {
        let conn = self.storage.get_connection().await;

        conn.execute(
            "INSERT INTO fee_withdrawals (id, amount, withdrawn_at) VALUES (?1, ?2, ?3)",
            params![
                Uuid::new_v4().to_string(),
                amount.to_units() as i64,
                Utc::now().timestamp(),
            ],
        )?;

        Ok(())
    }

    pub async fn total_fees_withdrawn(&self) -> Result<Amount> {
        let conn = self.storage.get_connection().await;

        let total: i64 = conn.query_row(
            "SELECT COALESCE(SUM(amount), 0) FROM fee_withdrawals",
            [],
            |row| row.get(0),
        )?;

        Ok(Amount::from_units(total as u64))
    }
}
