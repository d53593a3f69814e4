use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use mercat_core::collaborators::CollabError;
use mercat_core::repository::OrderRepository;

/// Postgres-backed order store.
///
/// The aggregate is persisted as one JSONB document per order, with the
/// version duplicated into its own column so the optimistic write can be
/// a single guarded UPDATE.
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn doc_id(order: &Value) -> Result<Uuid, CollabError> {
    let id = order["id"].as_str().ok_or("order document missing id")?;
    Ok(Uuid::parse_str(id)?)
}

fn doc_version(order: &Value) -> Result<i64, CollabError> {
    order["version"]
        .as_i64()
        .ok_or_else(|| "order document missing version".into())
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn insert(&self, order: &Value) -> Result<Uuid, CollabError> {
        let id = doc_id(order)?;
        let version = doc_version(order)?;

        sqlx::query("INSERT INTO orders (id, version, doc) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(version)
            .bind(order)
            .execute(&self.pool)
            .await?;

        Ok(id)
    }

    async fn load(&self, id: Uuid) -> Result<Option<Value>, CollabError> {
        let row = sqlx::query("SELECT doc FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(row.try_get::<Value, _>("doc")?)),
            None => Ok(None),
        }
    }

    async fn save(
        &self,
        id: Uuid,
        expected_version: u64,
        order: &Value,
    ) -> Result<bool, CollabError> {
        let new_version = doc_version(order)?;

        // The guarded UPDATE is the whole concurrency story: a stale
        // writer simply matches zero rows.
        let result = sqlx::query(
            "UPDATE orders SET version = $1, doc = $2, updated_at = NOW() \
             WHERE id = $3 AND version = $4",
        )
        .bind(new_version)
        .bind(order)
        .bind(id)
        .bind(expected_version as i64)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
