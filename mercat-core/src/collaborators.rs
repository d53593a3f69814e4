use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

pub type CollabError = Box<dyn std::error::Error + Send + Sync>;

/// Read-only product variant lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantDetail {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    /// Unit price, net, in minor currency units.
    pub unit_price_net: i64,
    /// Tax rate percentage applicable to this variant.
    pub tax_rate: f64,
    pub currency: String,
}

#[async_trait]
pub trait VariantCatalog: Send + Sync {
    async fn variant(&self, id: Uuid) -> Result<Option<VariantDetail>, CollabError>;
}

/// Promotion evaluation over an order document. Invoked unless the
/// modification froze promotions.
#[async_trait]
pub trait PromotionEngine: Send + Sync {
    /// Total promotion discount (net, minor units) for the given order.
    async fn discount_for(&self, order: &Value) -> Result<i64, CollabError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingQuote {
    pub method: String,
    pub net: i64,
    pub tax_rate: f64,
}

/// Shipping cost calculation, invoked when a dry-run asks for
/// recalculated shipping.
#[async_trait]
pub trait ShippingCalculator: Send + Sync {
    async fn quote(&self, order: &Value) -> Result<ShippingQuote, CollabError>;
}

/// One audit row per order change: line mutations, state transitions,
/// committed modifications and notes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub order_id: Uuid,
    pub change_type: String,
    pub before: Option<Value>,
    pub after: Option<Value>,
    pub actor: String,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(order_id: Uuid, change_type: impl Into<String>, actor: impl Into<String>) -> Self {
        Self {
            order_id,
            change_type: change_type.into(),
            before: None,
            after: None,
            actor: actor.into(),
            note: None,
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait HistorySink: Send + Sync {
    async fn record(&self, entry: HistoryEntry) -> Result<(), CollabError>;
}

// ============================================================================
// Mock implementations (used by engine tests and local development)
// ============================================================================

pub struct InMemoryVariantCatalog {
    variants: HashMap<Uuid, VariantDetail>,
}

impl InMemoryVariantCatalog {
    pub fn new(variants: Vec<VariantDetail>) -> Self {
        Self {
            variants: variants.into_iter().map(|v| (v.id, v)).collect(),
        }
    }
}

#[async_trait]
impl VariantCatalog for InMemoryVariantCatalog {
    async fn variant(&self, id: Uuid) -> Result<Option<VariantDetail>, CollabError> {
        Ok(self.variants.get(&id).cloned())
    }
}

/// Promotion engine that never grants a discount.
pub struct NoopPromotionEngine;

#[async_trait]
impl PromotionEngine for NoopPromotionEngine {
    async fn discount_for(&self, _order: &Value) -> Result<i64, CollabError> {
        Ok(0)
    }
}

/// Flat-rate shipping regardless of order contents.
pub struct FlatRateShipping {
    pub method: String,
    pub net: i64,
    pub tax_rate: f64,
}

#[async_trait]
impl ShippingCalculator for FlatRateShipping {
    async fn quote(&self, _order: &Value) -> Result<ShippingQuote, CollabError> {
        Ok(ShippingQuote {
            method: self.method.clone(),
            net: self.net,
            tax_rate: self.tax_rate,
        })
    }
}

/// History sink that keeps entries in memory for inspection in tests.
#[derive(Default)]
pub struct RecordingHistorySink {
    entries: std::sync::Mutex<Vec<HistoryEntry>>,
}

impl RecordingHistorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries.lock().expect("history sink poisoned").clone()
    }
}

#[async_trait]
impl HistorySink for RecordingHistorySink {
    async fn record(&self, entry: HistoryEntry) -> Result<(), CollabError> {
        self.entries.lock().expect("history sink poisoned").push(entry);
        Ok(())
    }
}
