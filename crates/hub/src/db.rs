use anyhow::{Context, Result};
use irrigation_core::registry::HISTORY_LEN;
use irrigation_core::{PlantId, PlantRecord};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use tracing::warn;

use crate::store::PlantStore;

const DND_KEY: &str = "dnd";

#[derive(Clone)]
pub struct Db {
    pool: Pool<Sqlite>,
}

/// `plants` row as stored.
type PlantRow = (i64, String, String, i64, i64, i64, String);

impl Db {
    /// db_url examples:
    /// - "sqlite:/home/pi/irrigation/irrigation.db"
    /// - "sqlite::memory:" (tests)
    pub async fn connect(db_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(db_url)
            .with_context(|| format!("invalid sqlite connection string: {db_url}"))?
            .journal_mode(SqliteJournalMode::Wal);

        // Each connection to an in-memory database opens a fresh database,
        // so the pool must hold exactly one and never recycle it.
        let pool_options = if db_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .with_context(|| format!("failed to connect to sqlite db: {db_url}"))?;

        Ok(Self { pool })
    }

    #[cfg(test)]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Runs SQLx migrations from ./migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("failed to run migrations")?;
        Ok(())
    }

    // ----------------------------
    // Plants
    // ----------------------------

    pub async fn load_plants(&self) -> Result<Vec<PlantRecord>> {
        let rows: Vec<PlantRow> = sqlx::query_as(
            r#"
            SELECT id, name, kind, threshold, duration_sec, zone_index, history
            FROM plants
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("load_plants failed")?;

        Ok(rows.into_iter().filter_map(record_from_row).collect())
    }

    /// Replace every plant row in one transaction.
    pub async fn save_plants(&self, records: &[PlantRecord]) -> Result<()> {
        let mut tx = self.pool.begin().await.context("save_plants: begin failed")?;

        sqlx::query("DELETE FROM plants")
            .execute(&mut *tx)
            .await
            .context("save_plants: delete failed")?;

        for r in records {
            let history = serde_json::to_string(&r.history).context("encode history")?;
            sqlx::query(
                r#"
                INSERT INTO plants (id, name, kind, threshold, duration_sec, zone_index, history)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(i64::from(r.id.0))
            .bind(r.name.as_str())
            .bind(r.kind.as_str())
            .bind(i64::from(r.threshold))
            .bind(i64::from(r.duration_sec))
            .bind(r.zone_index as i64)
            .bind(history)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("save_plants: insert plant {} failed", r.id))?;
        }

        tx.commit().await.context("save_plants: commit failed")?;
        Ok(())
    }

    // ----------------------------
    // Settings
    // ----------------------------

    pub async fn load_dnd(&self) -> Result<bool> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(DND_KEY)
            .fetch_optional(&self.pool)
            .await
            .context("load_dnd failed")?;
        Ok(matches!(value.as_deref(), Some("1") | Some("true")))
    }

    pub async fn save_dnd(&self, enabled: bool) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value=excluded.value
            "#,
        )
        .bind(DND_KEY)
        .bind(if enabled { "1" } else { "0" })
        .execute(&self.pool)
        .await
        .context("save_dnd failed")?;
        Ok(())
    }
}

/// Decode a row, clamping what can be clamped.  Rows whose id cannot be a
/// plant id are skipped.  A negative zone is passed through as out of range
/// so the registry reassigns it.
fn record_from_row(row: PlantRow) -> Option<PlantRecord> {
    let (id, name, kind, threshold, duration_sec, zone_index, history) = row;

    let Ok(id) = u32::try_from(id) else {
        warn!(id, name = %name, "stored plant has an invalid id, skipping");
        return None;
    };
    let history = serde_json::from_str::<[u8; HISTORY_LEN]>(&history).unwrap_or_else(|e| {
        warn!(id, error = %e, "stored history unreadable, resetting");
        [0; HISTORY_LEN]
    });

    Some(PlantRecord {
        id: PlantId(id),
        name,
        kind,
        threshold: threshold.clamp(0, 100) as u8,
        duration_sec: duration_sec.clamp(1, 60) as u8,
        zone_index: usize::try_from(zone_index).unwrap_or(usize::MAX),
        history,
    })
}

impl PlantStore for Db {
    async fn load(&self) -> Result<Vec<PlantRecord>> {
        self.load_plants().await
    }

    async fn save(&self, records: &[PlantRecord]) -> Result<()> {
        self.save_plants(records).await
    }

    async fn load_dnd(&self) -> Result<bool> {
        Db::load_dnd(self).await
    }

    async fn save_dnd(&self, enabled: bool) -> Result<()> {
        Db::save_dnd(self, enabled).await
    }
}

// ===========================================================================
// Tests
// ===========================================================================
