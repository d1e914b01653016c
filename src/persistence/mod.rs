//! SQLite persistence for alert history.
//!
//! Every attempted alert is recorded together with whether delivery
//! succeeded. The latest funding time per symbol doubles as the alert
//! ledger, so deduplication survives restarts.

use crate::alerts::{AlertLedger, FundingAlert};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// One row of alert history.
#[derive(Debug, Clone)]
pub struct AlertRecord {
    pub sent_at: DateTime<Utc>,
    pub symbol: String,
    pub next_funding_time: i64,
    pub diff: Decimal,
    pub spread: Decimal,
    pub apr: Decimal,
    pub message: String,
    pub delivered: bool,
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn decimal_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    Decimal::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

/// SQLite-backed alert store.
pub struct AlertStore {
    conn: Connection,
}

impl AlertStore {
    /// Open (or create) the alert database.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", db_path.as_ref()))?;

        let store = Self { conn };
        store.init_schema()?;

        info!("Alert store initialized at {:?}", db_path.as_ref());
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS alerts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                sent_at TEXT NOT NULL,
                symbol TEXT NOT NULL,
                next_funding_time INTEGER NOT NULL,
                diff TEXT NOT NULL,
                spread TEXT NOT NULL,
                apr TEXT NOT NULL,
                message TEXT NOT NULL,
                delivered INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_alerts_symbol ON alerts(symbol);
            CREATE INDEX IF NOT EXISTS idx_alerts_sent_at ON alerts(sent_at);
            "#,
        )?;
        Ok(())
    }

    /// Record an attempted alert.
    pub fn record(&self, alert: &FundingAlert, delivered: bool) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO alerts (sent_at, symbol, next_funding_time, diff, spread, apr, message, delivered)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                Utc::now().to_rfc3339(),
                alert.symbol,
                alert.next_funding_time,
                alert.diff.to_string(),
                alert.spread.to_string(),
                alert.apr.to_string(),
                alert.message,
                delivered as i32,
            ],
        )?;
        debug!(symbol = %alert.symbol, delivered, "Alert recorded");
        Ok(())
    }

    /// Rebuild the ledger: latest alerted funding time per symbol.
    pub fn load_ledger(&self) -> Result<AlertLedger> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT symbol, MAX(next_funding_time)
            FROM alerts
            GROUP BY symbol
            "#,
        )?;

        let entries: HashMap<String, i64> = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<rusqlite::Result<_>>()?;

        debug!(symbols = entries.len(), "Alert ledger loaded");
        Ok(AlertLedger::from_map(entries))
    }

    /// Most recent alerts, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<AlertRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT sent_at, symbol, next_funding_time, diff, spread, apr, message, delivered
            FROM alerts
            ORDER BY id DESC
            LIMIT ?1
            "#,
        )?;

        let records = stmt
            .query_map([limit], |row| {
                Ok(AlertRecord {
                    sent_at: timestamp_column(row, 0)?,
                    symbol: row.get(1)?,
                    next_funding_time: row.get(2)?,
                    diff: decimal_column(row, 3)?,
                    spread: decimal_column(row, 4)?,
                    apr: decimal_column(row, 5)?,
                    message: row.get(6)?,
                    delivered: row.get::<_, i32>(7)? != 0,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(records)
    }

    /// Delete alerts older than the given time. Returns rows removed.
    pub fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let removed = self.conn.execute(
            "DELETE FROM alerts WHERE sent_at < ?1",
            [cutoff.to_rfc3339()],
        )?;
        if removed > 0 {
            warn!(removed, "Pruned old alert history");
        }
        Ok(removed)
    }

    /// Drop history older than `retention_days`; 0 keeps everything.
    pub fn apply_retention(&self, retention_days: u32) -> Result<usize> {
        if retention_days == 0 {
            return Ok(0);
        }
        self.prune_before(Utc::now() - chrono::Duration::days(i64::from(retention_days)))
    }
}
