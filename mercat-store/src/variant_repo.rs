use async_trait::async_trait;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use mercat_core::collaborators::{CollabError, VariantCatalog, VariantDetail};

/// Product variant lookup backed by the catalog table.
pub struct PgVariantCatalog {
    pool: PgPool,
}

impl PgVariantCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VariantCatalog for PgVariantCatalog {
    async fn variant(&self, id: Uuid) -> Result<Option<VariantDetail>, CollabError> {
        let row = sqlx::query(
            "SELECT id, sku, name, unit_price_net, tax_rate, currency FROM variants WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some(row) => Some(VariantDetail {
                id: row.try_get("id")?,
                sku: row.try_get("sku")?,
                name: row.try_get("name")?,
                unit_price_net: row.try_get("unit_price_net")?,
                tax_rate: row.try_get("tax_rate")?,
                currency: row.try_get("currency")?,
            }),
            None => None,
        })
    }
}
