use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use mercat_core::collaborators::{CollabError, HistoryEntry, HistorySink};

/// Append-only audit log of order changes.
pub struct PgHistorySink {
    pool: PgPool,
}

impl PgHistorySink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HistorySink for PgHistorySink {
    async fn record(&self, entry: HistoryEntry) -> Result<(), CollabError> {
        sqlx::query(
            r#"
            INSERT INTO order_history (id, order_id, change_type, before_doc, after_doc, actor, note, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(entry.order_id)
        .bind(entry.change_type)
        .bind(entry.before)
        .bind(entry.after)
        .bind(entry.actor)
        .bind(entry.note)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
