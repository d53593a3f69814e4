use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use mercat_core::collaborators::{HistoryEntry, HistorySink, VariantCatalog};
use mercat_core::repository::OrderRepository;

use crate::fulfillment::{self, FulfillmentError};
use crate::interceptor::{AddLineInput, AdjustLineInput, InterceptorChain, InterceptorVetoError};
use crate::models::{Fulfillment, FulfillmentLine, FulfillmentState, Order, OrderLine, OrderState};
use crate::modify::{ModificationEngine, ModificationPreview, ModifyOrderError, ModifyOrderInput};
use crate::state::{self, OrderStateTransitionError};

#[derive(Debug, thiserror::Error)]
pub enum OrderServiceError {
    #[error("Order not found: {0}")]
    NotFound(Uuid),

    #[error("Order line not found: {0}")]
    LineNotFound(Uuid),

    #[error("Unknown product variant: {0}")]
    VariantNotFound(Uuid),

    #[error("Quantity must be a positive integer")]
    InvalidQuantity,

    #[error("Lines cannot be edited while the order is in state {0:?}")]
    LinesNotEditable(OrderState),

    #[error(transparent)]
    Veto(#[from] InterceptorVetoError),

    #[error(transparent)]
    Transition(#[from] OrderStateTransitionError),

    #[error(transparent)]
    Fulfillment(#[from] FulfillmentError),

    #[error(transparent)]
    Modify(#[from] ModifyOrderError),

    #[error("Storage failure: {0}")]
    Storage(String),
}

/// Result of a `modify_order` call: a non-persisting preview or the
/// committed order.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifyOrderOutcome {
    DryRun(ModificationPreview),
    Committed(Order),
}

/// Entry point for all order mutations.
///
/// Each order is the unit of mutual exclusion: every mutating operation
/// takes that order's lock, so commits never interleave with other
/// commits or fulfillment transitions on the same order. Dry-runs take
/// no lock and never write. Operations on different orders proceed in
/// parallel.
pub struct OrderService {
    repo: Arc<dyn OrderRepository>,
    variants: Arc<dyn VariantCatalog>,
    interceptors: InterceptorChain,
    engine: ModificationEngine,
    history: Arc<dyn HistorySink>,
    locks: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl OrderService {
    pub fn new(
        repo: Arc<dyn OrderRepository>,
        variants: Arc<dyn VariantCatalog>,
        interceptors: InterceptorChain,
        engine: ModificationEngine,
        history: Arc<dyn HistorySink>,
    ) -> Self {
        Self {
            repo,
            variants,
            interceptors,
            engine,
            history,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Create a draft order in AddingItems.
    pub async fn create_order(
        &self,
        currency: &str,
        customer_id: Option<String>,
    ) -> Result<Order, OrderServiceError> {
        let mut order = Order::new(currency);
        order.customer_id = customer_id;
        self.repo
            .insert(&to_doc(&order)?)
            .await
            .map_err(|e| OrderServiceError::Storage(e.to_string()))?;
        self.record(HistoryEntry::new(order.id, "ORDER_CREATED", "ADMIN"))
            .await;
        Ok(order)
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<Order, OrderServiceError> {
        self.load(order_id).await
    }

    /// Add a variant to the order, merging into an existing line when the
    /// variant and custom fields match.
    pub async fn add_item_to_order(
        &self,
        order_id: Uuid,
        input: AddLineInput,
    ) -> Result<Order, OrderServiceError> {
        if input.quantity == 0 {
            return Err(OrderServiceError::InvalidQuantity);
        }
        let lock = self.lock_for(order_id);
        let _guard = lock.lock().await;

        let mut order = self.load(order_id).await?;
        if !state::lines_editable(order.state) {
            return Err(OrderServiceError::LinesNotEditable(order.state));
        }
        self.interceptors.check_add_line(&order, &input)?;

        let version = order.version;
        if let Some(existing) = order.line_for_variant(input.variant_id, &input.custom_fields) {
            let line_id = existing.id;
            let line = order.line_mut(line_id).expect("line id just resolved");
            line.quantity += input.quantity;
        } else {
            let variant = self
                .variants
                .variant(input.variant_id)
                .await
                .map_err(|e| OrderServiceError::Storage(e.to_string()))?
                .ok_or(OrderServiceError::VariantNotFound(input.variant_id))?;
            order.lines.push(OrderLine::new(
                variant.id,
                variant.sku,
                variant.name,
                input.quantity,
                variant.unit_price_net,
                variant.tax_rate,
                input.custom_fields.clone(),
            ));
        }
        order.touch();
        self.save(&order, version).await?;

        let mut entry = HistoryEntry::new(order_id, "LINE_ADDED", "ADMIN");
        entry.after = Some(json!({
            "variant_id": input.variant_id,
            "quantity": input.quantity,
        }));
        self.record(entry).await;
        Ok(order)
    }

    /// Change an existing line's quantity (and custom fields). Quantity
    /// zero removes the line, subject to the remove hooks.
    pub async fn adjust_order_line(
        &self,
        order_id: Uuid,
        input: AdjustLineInput,
    ) -> Result<Order, OrderServiceError> {
        let lock = self.lock_for(order_id);
        let _guard = lock.lock().await;

        let mut order = self.load(order_id).await?;
        if !state::lines_editable(order.state) {
            return Err(OrderServiceError::LinesNotEditable(order.state));
        }
        let line = order
            .line(input.line_id)
            .ok_or(OrderServiceError::LineNotFound(input.line_id))?
            .clone();

        let version = order.version;
        if input.quantity == 0 {
            self.interceptors.check_remove_line(&order, &line)?;
            order.lines.retain(|l| l.id != input.line_id);
        } else {
            self.interceptors.check_adjust_line(&order, &line, &input)?;
            let line = order.line_mut(input.line_id).expect("line checked above");
            line.quantity = input.quantity;
            if let Some(fields) = &input.custom_fields {
                line.custom_fields = fields.clone();
            }
        }
        order.touch();
        self.save(&order, version).await?;

        let mut entry = HistoryEntry::new(order_id, "LINE_ADJUSTED", "ADMIN");
        entry.before = Some(json!({"quantity": line.quantity}));
        entry.after = Some(json!({"quantity": input.quantity}));
        self.record(entry).await;
        Ok(order)
    }

    /// Remove a line entirely, subject to the remove hooks.
    pub async fn remove_order_line(
        &self,
        order_id: Uuid,
        line_id: Uuid,
    ) -> Result<Order, OrderServiceError> {
        let lock = self.lock_for(order_id);
        let _guard = lock.lock().await;

        let mut order = self.load(order_id).await?;
        if !state::lines_editable(order.state) {
            return Err(OrderServiceError::LinesNotEditable(order.state));
        }
        let line = order
            .line(line_id)
            .ok_or(OrderServiceError::LineNotFound(line_id))?
            .clone();
        self.interceptors.check_remove_line(&order, &line)?;

        let version = order.version;
        order.lines.retain(|l| l.id != line_id);
        order.touch();
        self.save(&order, version).await?;

        let mut entry = HistoryEntry::new(order_id, "LINE_REMOVED", "ADMIN");
        entry.before = Some(json!({"line_id": line_id, "quantity": line.quantity}));
        self.record(entry).await;
        Ok(order)
    }

    /// Transition the order itself.
    pub async fn transition_order(
        &self,
        order_id: Uuid,
        target: OrderState,
    ) -> Result<Order, OrderServiceError> {
        let lock = self.lock_for(order_id);
        let _guard = lock.lock().await;

        let mut order = self.load(order_id).await?;
        let from = order.state;
        let version = order.version;
        state::transition(&mut order, target)?;
        order.touch();
        self.save(&order, version).await?;

        let mut entry = HistoryEntry::new(order_id, "STATE_TRANSITION", "ADMIN");
        entry.before = Some(json!({"state": from}));
        entry.after = Some(json!({"state": target}));
        self.record(entry).await;
        Ok(order)
    }

    /// Create a fulfillment covering some or all lines.
    pub async fn create_fulfillment(
        &self,
        order_id: Uuid,
        method: String,
        lines: Vec<FulfillmentLine>,
    ) -> Result<Fulfillment, OrderServiceError> {
        let lock = self.lock_for(order_id);
        let _guard = lock.lock().await;

        let mut order = self.load(order_id).await?;
        let version = order.version;
        let created = fulfillment::create(&mut order, method, lines)?;
        order.touch();
        self.save(&order, version).await?;

        let mut entry = HistoryEntry::new(order_id, "FULFILLMENT_CREATED", "ADMIN");
        entry.after = Some(json!({"fulfillment_id": created.id, "method": created.method}));
        self.record(entry).await;
        Ok(created)
    }

    /// Transition a fulfillment; the owning order's state follows the
    /// aggregate fulfillment picture. Illegal transitions come back as
    /// typed values for per-row display.
    pub async fn transition_fulfillment(
        &self,
        order_id: Uuid,
        fulfillment_id: Uuid,
        target: FulfillmentState,
    ) -> Result<Fulfillment, OrderServiceError> {
        let lock = self.lock_for(order_id);
        let _guard = lock.lock().await;

        let mut order = self.load(order_id).await?;
        let version = order.version;
        let updated = fulfillment::transition(&mut order, fulfillment_id, target)?;
        order.touch();
        self.save(&order, version).await?;

        let mut entry = HistoryEntry::new(order_id, "FULFILLMENT_TRANSITION", "ADMIN");
        entry.after = Some(json!({"fulfillment_id": fulfillment_id, "state": target}));
        self.record(entry).await;
        Ok(updated)
    }

    /// Run the modification protocol: a lock-free, side-effect-free
    /// dry-run, or a serialized commit that persists atomically.
    pub async fn modify_order(
        &self,
        order_id: Uuid,
        input: ModifyOrderInput,
        dry_run: bool,
    ) -> Result<ModifyOrderOutcome, OrderServiceError> {
        if dry_run {
            let order = self.load(order_id).await?;
            let preview = self.engine.dry_run(&order, &input).await?;
            return Ok(ModifyOrderOutcome::DryRun(preview));
        }

        let lock = self.lock_for(order_id);
        let _guard = lock.lock().await;

        let order = self.load(order_id).await?;
        let version = order.version;
        let (committed, record) = self.engine.commit(&order, &input).await?;
        self.save(&committed, version).await?;

        let mut entry = HistoryEntry::new(order_id, "ORDER_MODIFIED", "ADMIN");
        entry.after = Some(json!({
            "modification_id": record.id,
            "price_delta": record.price_delta,
        }));
        self.record(entry).await;

        let mut note_entry = HistoryEntry::new(order_id, "NOTE", "ADMIN");
        note_entry.note = Some(record.note.clone());
        self.record(note_entry).await;

        Ok(ModifyOrderOutcome::Committed(committed))
    }

    fn lock_for(&self, order_id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().expect("order lock table poisoned");
        locks
            .entry(order_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    async fn load(&self, order_id: Uuid) -> Result<Order, OrderServiceError> {
        let doc = self
            .repo
            .load(order_id)
            .await
            .map_err(|e| OrderServiceError::Storage(e.to_string()))?
            .ok_or(OrderServiceError::NotFound(order_id))?;
        serde_json::from_value(doc).map_err(|e| OrderServiceError::Storage(e.to_string()))
    }

    async fn save(&self, order: &Order, expected_version: u64) -> Result<(), OrderServiceError> {
        let saved = self
            .repo
            .save(order.id, expected_version, &to_doc(order)?)
            .await
            .map_err(|e| OrderServiceError::Storage(e.to_string()))?;
        if !saved {
            // The per-order lock makes this unreachable for in-process
            // writers; an external writer snuck in, so fail loudly
            // rather than overwrite.
            return Err(OrderServiceError::Storage(format!(
                "version conflict persisting order {}",
                order.id
            )));
        }
        Ok(())
    }

    async fn record(&self, entry: HistoryEntry) {
        if let Err(e) = self.history.record(entry).await {
            tracing::warn!("failed to record order history: {}", e);
        }
    }
}

fn to_doc(order: &Order) -> Result<serde_json::Value, OrderServiceError> {
    serde_json::to_value(order).map_err(|e| OrderServiceError::Storage(e.to_string()))
}
