use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::collaborators::CollabError;

/// Repository over order aggregate documents.
///
/// Orders are stored and exchanged as JSON documents; the engine owns the
/// typed model and (de)serializes at this seam. `save` enforces optimistic
/// concurrency: it only writes when the stored document still carries
/// `expected_version`, and reports whether it did.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn insert(&self, order: &Value) -> Result<Uuid, CollabError>;

    async fn load(&self, id: Uuid) -> Result<Option<Value>, CollabError>;

    /// Atomically replace the stored document if its version still matches.
    /// Returns false on a version conflict; the caller decides how to
    /// surface that.
    async fn save(
        &self,
        id: Uuid,
        expected_version: u64,
        order: &Value,
    ) -> Result<bool, CollabError>;
}

/// In-memory repository used by engine tests and local development.
#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<Uuid, Value>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn doc_id(order: &Value) -> Result<Uuid, CollabError> {
    let id = order["id"].as_str().ok_or("order document missing id")?;
    Ok(Uuid::parse_str(id)?)
}

fn doc_version(order: &Value) -> u64 {
    order["version"].as_u64().unwrap_or(0)
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn insert(&self, order: &Value) -> Result<Uuid, CollabError> {
        let id = doc_id(order)?;
        self.orders.write().await.insert(id, order.clone());
        Ok(id)
    }

    async fn load(&self, id: Uuid) -> Result<Option<Value>, CollabError> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn save(
        &self,
        id: Uuid,
        expected_version: u64,
        order: &Value,
    ) -> Result<bool, CollabError> {
        let mut orders = self.orders.write().await;
        match orders.get(&id) {
            Some(stored) if doc_version(stored) == expected_version => {
                orders.insert(id, order.clone());
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(format!("order {} not found", id).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_save_rejects_version_conflict() {
        let repo = InMemoryOrderRepository::new();
        let id = Uuid::new_v4();
        let v1 = json!({"id": id.to_string(), "version": 1});
        repo.insert(&v1).await.unwrap();

        let v2 = json!({"id": id.to_string(), "version": 2});
        assert!(repo.save(id, 1, &v2).await.unwrap());

        // A writer still holding version 1 must be turned away.
        let stale = json!({"id": id.to_string(), "version": 2});
        assert!(!repo.save(id, 1, &stale).await.unwrap());
    }
}
