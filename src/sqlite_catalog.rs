//! SQLite-backed [`Catalog`] implementation.
//!
//! Each [`Catalog::apply`] call runs in one SQLite transaction. Entity
//! upserts are `INSERT ... ON CONFLICT` against the `UNIQUE(name)`
//! constraints, so two work items racing to create the same tag or
//! collection end up sharing one row.

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use oai_harvest_core::catalog::{
    apply_batch, ApplyReport, Catalog, CatalogTx, DatasetFields, DatasetView, ImportBatch,
    Resource,
};

/// SQLite implementation of the [`Catalog`] trait.
pub struct SqliteCatalog {
    pool: SqlitePool,
}

impl SqliteCatalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

struct SqliteTx {
    tx: Transaction<'static, Sqlite>,
}

impl SqliteTx {
    async fn id_by_name(&mut self, table: &'static str, name: &str) -> Result<String> {
        let sql = format!("SELECT id FROM {} WHERE name = ?", table);
        let id: String = sqlx::query_scalar(&sql)
            .bind(name)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(id)
    }
}

#[async_trait]
impl CatalogTx for SqliteTx {
    async fn upsert_dataset(&mut self, name: &str, fields: &DatasetFields) -> Result<String> {
        let now = chrono::Utc::now().timestamp();
        let extras_json = serde_json::to_string(&fields.extras)?;

        sqlx::query(
            r#"
            INSERT INTO datasets (id, name, title, author, author_email, notes, url,
                                  extras_json, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                title = excluded.title,
                author = excluded.author,
                author_email = excluded.author_email,
                notes = excluded.notes,
                url = excluded.url,
                extras_json = excluded.extras_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(name)
        .bind(&fields.title)
        .bind(&fields.author)
        .bind(&fields.author_email)
        .bind(&fields.notes)
        .bind(&fields.url)
        .bind(&extras_json)
        .bind(now)
        .bind(now)
        .execute(&mut *self.tx)
        .await?;

        self.id_by_name("datasets", name).await
    }

    async fn upsert_tag(&mut self, name: &str) -> Result<String> {
        sqlx::query("INSERT INTO tags (id, name) VALUES (?, ?) ON CONFLICT(name) DO NOTHING")
            .bind(Uuid::new_v4().to_string())
            .bind(name)
            .execute(&mut *self.tx)
            .await?;

        self.id_by_name("tags", name).await
    }

    async fn attach_tag(&mut self, dataset_id: &str, tag_id: &str) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO dataset_tags (dataset_id, tag_id) VALUES (?, ?)")
            .bind(dataset_id)
            .bind(tag_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn upsert_collection(&mut self, name: &str, description: &str) -> Result<String> {
        sqlx::query(
            "INSERT INTO collections (id, name, description) VALUES (?, ?, ?) ON CONFLICT(name) DO NOTHING",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(name)
        .bind(description)
        .execute(&mut *self.tx)
        .await?;

        self.id_by_name("collections", name).await
    }

    async fn add_member(&mut self, collection_id: &str, dataset_name: &str) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO collection_members (collection_id, dataset_name) VALUES (?, ?)",
        )
        .bind(collection_id)
        .bind(dataset_name)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn attach_resource(&mut self, dataset_id: &str, resource: &Resource) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO resources (id, dataset_id, url, name, description)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(dataset_id) DO UPDATE SET
                url = excluded.url,
                name = excluded.name,
                description = excluded.description
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(dataset_id)
        .bind(&resource.url)
        .bind(&resource.name)
        .bind(&resource.description)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn clear_resource(&mut self, dataset_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM resources WHERE dataset_id = ?")
            .bind(dataset_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Catalog for SqliteCatalog {
    async fn apply(&self, batch: &ImportBatch) -> Result<ApplyReport> {
        let mut tx = SqliteTx {
            tx: self.pool.begin().await?,
        };
        // Dropping `tx` on error rolls the batch back.
        let report = apply_batch(&mut tx, batch).await?;
        tx.tx.commit().await?;
        Ok(report)
    }

    async fn get_dataset(&self, name: &str) -> Result<Option<DatasetView>> {
        let row = sqlx::query(
            "SELECT id, name, title, author, author_email, notes, url, extras_json FROM datasets WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };
        let id: String = row.get("id");
        let extras_json: String = row.get("extras_json");
        let extras: BTreeMap<String, String> =
            serde_json::from_str(&extras_json).unwrap_or_default();

        let tags: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT t.name FROM tags t
            JOIN dataset_tags dt ON dt.tag_id = t.id
            WHERE dt.dataset_id = ?
            ORDER BY t.name
            "#,
        )
        .bind(&id)
        .fetch_all(&self.pool)
        .await?;

        let resources: Vec<Resource> =
            sqlx::query("SELECT url, name, description FROM resources WHERE dataset_id = ?")
                .bind(&id)
                .fetch_all(&self.pool)
                .await?
                .iter()
                .map(|r| Resource {
                    url: r.get("url"),
                    name: r.get("name"),
                    description: r.get("description"),
                })
                .collect();

        let collections: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT c.name FROM collections c
            JOIN collection_members cm ON cm.collection_id = c.id
            WHERE cm.dataset_name = ?
            ORDER BY c.name
            "#,
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(DatasetView {
            id,
            name: row.get("name"),
            fields: DatasetFields {
                title: row.get("title"),
                author: row.get("author"),
                author_email: row.get("author_email"),
                notes: row.get("notes"),
                url: row.get("url"),
                extras,
            },
            tags,
            resources,
            collections,
        }))
    }

    async fn collection_members(&self, name: &str) -> Result<Option<Vec<String>>> {
        let id: Option<String> = sqlx::query_scalar("SELECT id FROM collections WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        let id = match id {
            Some(id) => id,
            None => return Ok(None),
        };

        let members: Vec<String> = sqlx::query_scalar(
            "SELECT dataset_name FROM collection_members WHERE collection_id = ? ORDER BY dataset_name",
        )
        .bind(&id)
        .fetch_all(&self.pool)
        .await?;
        Ok(Some(members))
    }

    async fn collection_description(&self, name: &str) -> Result<Option<String>> {
        let description: Option<String> =
            sqlx::query_scalar("SELECT description FROM collections WHERE name = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(description)
    }

    async fn dataset_count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM datasets")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    async fn tag_names(&self) -> Result<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar("SELECT name FROM tags ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(names)
    }
}
