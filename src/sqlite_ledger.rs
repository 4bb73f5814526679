//! SQLite-backed [`Ledger`] implementation.
//!
//! Work item payloads are stored as JSON so that a resumed run sees exactly
//! what the previous stage produced.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use oai_harvest_core::ledger::Ledger;
use oai_harvest_core::models::{
    HarvestErrorRecord, HarvestRun, HarvestSource, Stage, WorkItem, WorkPayload,
};

/// SQLite implementation of the [`Ledger`] trait.
pub struct SqliteLedger {
    pool: SqlitePool,
}

impl SqliteLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn from_ts(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_default()
}

fn run_from_row(row: &SqliteRow) -> HarvestRun {
    HarvestRun {
        id: row.get("id"),
        source: HarvestSource {
            url: row.get("source_url"),
            query: row.get("query"),
        },
        created_at: from_ts(row.get("created_at")),
    }
}

fn item_from_row(row: &SqliteRow) -> Result<WorkItem> {
    let stage: String = row.get("stage");
    let payload_json: String = row.get("payload_json");
    Ok(WorkItem {
        id: row.get("id"),
        run_id: row.get("run_id"),
        stage: stage.parse()?,
        payload: serde_json::from_str(&payload_json)?,
    })
}

fn error_from_row(row: &SqliteRow) -> Result<HarvestErrorRecord> {
    let scope: String = row.get("scope");
    Ok(HarvestErrorRecord {
        run_id: row.get("run_id"),
        item_id: row.get("item_id"),
        scope: scope.parse()?,
        message: row.get("message"),
        created_at: from_ts(row.get("created_at")),
    })
}

#[async_trait]
impl Ledger for SqliteLedger {
    async fn create_run(&self, source: &HarvestSource) -> Result<HarvestRun> {
        let run = HarvestRun {
            id: Uuid::new_v4().to_string(),
            source: source.clone(),
            created_at: Utc::now(),
        };

        sqlx::query("INSERT INTO harvest_runs (id, source_url, query, created_at) VALUES (?, ?, ?, ?)")
            .bind(&run.id)
            .bind(&run.source.url)
            .bind(&run.source.query)
            .bind(run.created_at.timestamp())
            .execute(&self.pool)
            .await?;

        Ok(run)
    }

    async fn get_run(&self, id: &str) -> Result<Option<HarvestRun>> {
        let row = sqlx::query("SELECT id, source_url, query, created_at FROM harvest_runs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(run_from_row))
    }

    async fn list_runs(&self) -> Result<Vec<HarvestRun>> {
        let rows = sqlx::query(
            "SELECT id, source_url, query, created_at FROM harvest_runs ORDER BY created_at DESC, rowid DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(run_from_row).collect())
    }

    async fn insert_item(&self, run_id: &str, payload: WorkPayload) -> Result<WorkItem> {
        let item = WorkItem {
            id: Uuid::new_v4().to_string(),
            run_id: run_id.to_string(),
            stage: Stage::Gathered,
            payload,
        };
        let now = Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO work_items (id, run_id, stage, payload_json, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&item.id)
        .bind(&item.run_id)
        .bind(item.stage.as_str())
        .bind(serde_json::to_string(&item.payload)?)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(item)
    }

    async fn save_item(&self, item: &WorkItem) -> Result<()> {
        let result = sqlx::query(
            "UPDATE work_items SET stage = ?, payload_json = ?, updated_at = ? WHERE id = ?",
        )
        .bind(item.stage.as_str())
        .bind(serde_json::to_string(&item.payload)?)
        .bind(Utc::now().timestamp())
        .bind(&item.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            bail!("work item not found: {}", item.id);
        }
        Ok(())
    }

    async fn get_item(&self, id: &str) -> Result<Option<WorkItem>> {
        let row = sqlx::query("SELECT id, run_id, stage, payload_json FROM work_items WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(item_from_row).transpose()
    }

    async fn items_for_run(&self, run_id: &str) -> Result<Vec<WorkItem>> {
        let rows = sqlx::query(
            "SELECT id, run_id, stage, payload_json FROM work_items WHERE run_id = ? ORDER BY rowid",
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(item_from_row).collect()
    }

    async fn record_error(&self, error: &HarvestErrorRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO harvest_errors (run_id, item_id, scope, message, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&error.run_id)
        .bind(&error.item_id)
        .bind(error.scope.as_str())
        .bind(&error.message)
        .bind(error.created_at.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn errors_for_run(&self, run_id: &str) -> Result<Vec<HarvestErrorRecord>> {
        let rows = sqlx::query(
            "SELECT run_id, item_id, scope, message, created_at FROM harvest_errors WHERE run_id = ? ORDER BY id",
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(error_from_row).collect()
    }

    async fn errors_for_item(&self, item_id: &str) -> Result<Vec<HarvestErrorRecord>> {
        let rows = sqlx::query(
            "SELECT run_id, item_id, scope, message, created_at FROM harvest_errors WHERE item_id = ? ORDER BY id",
        )
        .bind(item_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(error_from_row).collect()
    }
}
