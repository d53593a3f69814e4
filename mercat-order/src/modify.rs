use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use mercat_core::collaborators::{PromotionEngine, ShippingCalculator, VariantCatalog};
use mercat_core::payment::RefundRequest;

use crate::diff::{self, ChangeSet};
use crate::ledger::OrderTotals;
use crate::models::{
    DryRunOptions, ModificationRecord, Order, OrderLine, OrderState, PriceOverride, ShippingLine,
};
use crate::refund::{self, RefundError};
use crate::state::{self, OrderStateTransitionError};

/// A line added during a modification session. Unlike a plain add, it may
/// carry a price override in the same request, since the new line has no
/// id to address through [`LineOverride`] yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddLine {
    pub variant_id: Uuid,
    pub quantity: u32,
    #[serde(default)]
    pub custom_fields: Value,
    pub price: Option<PriceOverride>,
}

/// Administrator-entered change to one existing line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineOverride {
    pub line_id: Uuid,
    /// New quantity; 0 removes the line.
    pub quantity: Option<u32>,
    pub price: Option<PriceOverride>,
    pub custom_fields: Option<Value>,
}

/// A batched "modify order" request, shared by dry-run and commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModifyOrderInput {
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub options: DryRunOptions,
    #[serde(default)]
    pub overrides: Vec<LineOverride>,
    #[serde(default)]
    pub add_lines: Vec<AddLine>,
    pub refund: Option<RefundRequest>,
    /// Version stamp returned by the dry-run this commit is based on.
    pub expected_version: Option<u64>,
}

/// Result of a dry-run: the reviewable change-set, the would-be totals,
/// and the version stamp a later commit must present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModificationPreview {
    pub change_set: ChangeSet,
    pub new_totals: OrderTotals,
    pub order_version: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ModifyOrderError {
    #[error("A note explaining the modification is required")]
    NoteRequired,

    #[error("Commit requires the version stamp from a prior dry-run")]
    MissingDryRunVersion,

    #[error("The order changed since the dry-run was taken (expected version {expected}, found {actual}); re-run the preview")]
    StaleModification { expected: u64, actual: u64 },

    #[error("Order line not found: {0}")]
    LineNotFound(Uuid),

    #[error("Unknown product variant: {0}")]
    VariantNotFound(Uuid),

    #[error("Payment not found: {0}")]
    PaymentNotFound(Uuid),

    #[error("The modification would not change the order")]
    NoChanges,

    #[error(transparent)]
    Transition(#[from] OrderStateTransitionError),

    #[error(transparent)]
    Refund(#[from] RefundError),

    #[error("Collaborator failure: {0}")]
    Collaborator(String),
}

/// Orchestrates the two-phase dry-run / commit protocol for post-payment
/// order modifications.
///
/// Both phases work on a working copy of the committed order; the engine
/// takes a snapshot in and returns a new snapshot out, so no shared
/// mutable order is held across calls.
pub struct ModificationEngine {
    variants: Arc<dyn VariantCatalog>,
    promotions: Arc<dyn PromotionEngine>,
    shipping: Arc<dyn ShippingCalculator>,
}

impl ModificationEngine {
    pub fn new(
        variants: Arc<dyn VariantCatalog>,
        promotions: Arc<dyn PromotionEngine>,
        shipping: Arc<dyn ShippingCalculator>,
    ) -> Self {
        Self {
            variants,
            promotions,
            shipping,
        }
    }

    /// Preview a modification without persisting anything.
    ///
    /// The note is optional at this phase. The input order is untouched;
    /// the preview carries its version stamp for the later commit.
    pub async fn dry_run(
        &self,
        order: &Order,
        input: &ModifyOrderInput,
    ) -> Result<ModificationPreview, ModifyOrderError> {
        let working = self.build_working_copy(order, input).await?;
        let change_set = diff::diff(order, &working);
        Ok(ModificationPreview {
            new_totals: working.totals(),
            order_version: order.version,
            change_set,
        })
    }

    /// Validate and apply a modification, producing the new order
    /// snapshot and its permanent record.
    ///
    /// The order passes through Modifying for the duration of the commit
    /// and exits back to its prior state; on any error the caller's
    /// snapshot is untouched, which is the rollback.
    pub async fn commit(
        &self,
        order: &Order,
        input: &ModifyOrderInput,
    ) -> Result<(Order, ModificationRecord), ModifyOrderError> {
        if input.note.trim().is_empty() {
            return Err(ModifyOrderError::NoteRequired);
        }
        let expected = input
            .expected_version
            .ok_or(ModifyOrderError::MissingDryRunVersion)?;
        if expected != order.version {
            return Err(ModifyOrderError::StaleModification {
                expected,
                actual: order.version,
            });
        }

        let prior_state = order.state;
        let mut working = self.build_working_copy(order, input).await?;
        state::transition(&mut working, OrderState::Modifying)?;

        let change_set = diff::diff(order, &working);
        let price_delta = change_set.price_delta();

        let mut refund_recorded = false;
        if let Some(request) = &input.refund {
            let payment = working
                .payment(request.payment_id)
                .ok_or(ModifyOrderError::PaymentNotFound(request.payment_id))?;
            if let Some(assessment) =
                refund::for_delta(price_delta, &working.currency, payment, request.amount)?
            {
                let payment = working
                    .payment_mut(request.payment_id)
                    .expect("payment id checked above");
                refund::record(payment, &assessment, request.reason.clone());
                refund_recorded = true;
            }
        }

        if change_set.is_empty() && !refund_recorded {
            return Err(ModifyOrderError::NoChanges);
        }

        let record = ModificationRecord {
            id: Uuid::new_v4(),
            note: input.note.trim().to_string(),
            options: input.options,
            refund: input.refund.clone(),
            change_set,
            price_delta,
            created_at: chrono::Utc::now(),
        };
        working.modifications.push(record.clone());

        state::transition(&mut working, prior_state)?;
        working.touch();

        tracing::info!(
            order_id = %order.id,
            price_delta,
            changes = record.change_set.changes.len(),
            "order modification committed"
        );
        Ok((working, record))
    }

    /// Clone the order and apply added lines, per-line overrides, and the
    /// optional shipping/promotion recalculations.
    async fn build_working_copy(
        &self,
        order: &Order,
        input: &ModifyOrderInput,
    ) -> Result<Order, ModifyOrderError> {
        let mut working = order.clone();

        for add in &input.add_lines {
            let variant = self
                .variants
                .variant(add.variant_id)
                .await
                .map_err(|e| ModifyOrderError::Collaborator(e.to_string()))?
                .ok_or(ModifyOrderError::VariantNotFound(add.variant_id))?;
            let mut line = OrderLine::new(
                variant.id,
                variant.sku,
                variant.name,
                add.quantity,
                variant.unit_price_net,
                variant.tax_rate,
                add.custom_fields.clone(),
            );
            line.price_override = add.price.clone();
            working.lines.push(line);
        }

        for o in &input.overrides {
            {
                let line = working
                    .line_mut(o.line_id)
                    .ok_or(ModifyOrderError::LineNotFound(o.line_id))?;
                if let Some(price) = &o.price {
                    line.price_override = Some(price.clone());
                }
                if let Some(fields) = &o.custom_fields {
                    line.custom_fields = fields.clone();
                }
                if let Some(quantity) = o.quantity {
                    if quantity > 0 {
                        line.quantity = quantity;
                    }
                }
            }
            // Quantity zero removes the line rather than keeping an
            // empty entry.
            if o.quantity == Some(0) {
                working.lines.retain(|l| l.id != o.line_id);
            }
        }

        if input.options.recalculate_shipping {
            let doc = order_doc(&working)?;
            let quote = self
                .shipping
                .quote(&doc)
                .await
                .map_err(|e| ModifyOrderError::Collaborator(e.to_string()))?;
            working.shipping = Some(ShippingLine {
                method: quote.method,
                net: quote.net,
                tax_rate: quote.tax_rate,
            });
        }

        if !input.options.freeze_promotions {
            let doc = order_doc(&working)?;
            working.discount_net = self
                .promotions
                .discount_for(&doc)
                .await
                .map_err(|e| ModifyOrderError::Collaborator(e.to_string()))?;
        }

        Ok(working)
    }
}

fn order_doc(order: &Order) -> Result<Value, ModifyOrderError> {
    serde_json::to_value(order).map_err(|e| ModifyOrderError::Collaborator(e.to_string()))
}
