use chrono::{DateTime, Utc};
use mercat_core::payment::{Payment, RefundRequest};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::diff::ChangeSet;

/// Order status in the lifecycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderState {
    AddingItems,
    ArrangingPayment,
    PaymentAuthorized,
    PaymentSettled,
    PartiallyShipped,
    Shipped,
    PartiallyDelivered,
    Delivered,
    Cancelled,
    Modifying,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FulfillmentState {
    Created,
    Shipped,
    Delivered,
    Cancelled,
}

/// Basis of an administrator-entered line price override.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceBasis {
    /// The override value is tax-exclusive.
    Net,
    /// The override value is tax-inclusive.
    Gross,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceOverride {
    pub value: i64,
    pub basis: PriceBasis,
}

/// One product-variant/quantity/price entry within an order.
///
/// Quantity is always positive while the line exists: driving it to zero
/// removes the line rather than retaining it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: Uuid,
    pub variant_id: Uuid,
    pub sku: String,
    pub name: String,
    pub quantity: u32,
    /// Unit price, net, in minor currency units.
    pub unit_price_net: i64,
    /// Tax rate percentage applicable to this line.
    pub tax_rate: f64,
    pub price_override: Option<PriceOverride>,
    #[serde(default)]
    pub custom_fields: Value,
    pub created_at: DateTime<Utc>,
}

impl OrderLine {
    pub fn new(
        variant_id: Uuid,
        sku: impl Into<String>,
        name: impl Into<String>,
        quantity: u32,
        unit_price_net: i64,
        tax_rate: f64,
        custom_fields: Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            variant_id,
            sku: sku.into(),
            name: name.into(),
            quantity,
            unit_price_net,
            tax_rate,
            price_override: None,
            custom_fields,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FulfillmentLine {
    pub line_id: Uuid,
    pub quantity: u32,
}

/// A shipment/delivery unit covering some or all order lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fulfillment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub method: String,
    pub lines: Vec<FulfillmentLine>,
    pub state: FulfillmentState,
    pub tracking_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Fulfillment {
    pub fn new(order_id: Uuid, method: impl Into<String>, lines: Vec<FulfillmentLine>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            order_id,
            method: method.into(),
            lines,
            state: FulfillmentState::Created,
            tracking_code: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Shipping charged on the order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShippingLine {
    pub method: String,
    pub net: i64,
    pub tax_rate: f64,
}

/// Options controlling a modification dry-run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DryRunOptions {
    #[serde(default)]
    pub recalculate_shipping: bool,
    #[serde(default)]
    pub freeze_promotions: bool,
}

/// Permanent record of a committed modification. Created transiently
/// during dry-run and appended to the order only on commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModificationRecord {
    pub id: Uuid,
    pub note: String,
    pub options: DryRunOptions,
    pub refund: Option<RefundRequest>,
    pub change_set: ChangeSet,
    /// New grand total minus old grand total, gross, minor units.
    pub price_delta: i64,
    pub created_at: DateTime<Utc>,
}

/// The single source of truth for a customer's purchase.
///
/// Owns its lines and fulfillments; payments are captured against it but
/// managed by the gateway. Totals are never stored: they are recomputed
/// from the lines on demand so no mutation can leave them stale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub customer_id: Option<String>,
    pub state: OrderState,
    pub currency: String,
    pub lines: Vec<OrderLine>,
    pub shipping: Option<ShippingLine>,
    /// Promotion discount applied to the order, net, minor units.
    pub discount_net: i64,
    pub payments: Vec<Payment>,
    pub fulfillments: Vec<Fulfillment>,
    pub modifications: Vec<ModificationRecord>,
    /// Bumped on every persisted mutation; backs the stale-commit check.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(currency: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            customer_id: None,
            state: OrderState::AddingItems,
            currency: currency.into(),
            lines: Vec::new(),
            shipping: None,
            discount_net: 0,
            payments: Vec::new(),
            fulfillments: Vec::new(),
            modifications: Vec::new(),
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn line(&self, line_id: Uuid) -> Option<&OrderLine> {
        self.lines.iter().find(|l| l.id == line_id)
    }

    pub fn line_mut(&mut self, line_id: Uuid) -> Option<&mut OrderLine> {
        self.lines.iter_mut().find(|l| l.id == line_id)
    }

    /// The existing line for a variant with identical custom fields, if
    /// any. Re-adding such a variant adjusts this line instead of
    /// creating a duplicate.
    pub fn line_for_variant(&self, variant_id: Uuid, custom_fields: &Value) -> Option<&OrderLine> {
        self.lines
            .iter()
            .find(|l| l.variant_id == variant_id && &l.custom_fields == custom_fields)
    }

    pub fn payment(&self, payment_id: Uuid) -> Option<&Payment> {
        self.payments.iter().find(|p| p.id == payment_id)
    }

    pub fn payment_mut(&mut self, payment_id: Uuid) -> Option<&mut Payment> {
        self.payments.iter_mut().find(|p| p.id == payment_id)
    }

    pub fn fulfillment(&self, fulfillment_id: Uuid) -> Option<&Fulfillment> {
        self.fulfillments.iter().find(|f| f.id == fulfillment_id)
    }

    pub fn fulfillment_mut(&mut self, fulfillment_id: Uuid) -> Option<&mut Fulfillment> {
        self.fulfillments.iter_mut().find(|f| f.id == fulfillment_id)
    }

    /// Quantity of a line already covered by non-cancelled fulfillments.
    pub fn fulfilled_quantity(&self, line_id: Uuid) -> u32 {
        self.fulfillments
            .iter()
            .filter(|f| f.state != FulfillmentState::Cancelled)
            .flat_map(|f| f.lines.iter())
            .filter(|fl| fl.line_id == line_id)
            .map(|fl| fl.quantity)
            .sum()
    }

    pub fn touch(&mut self) {
        self.version += 1;
        self.updated_at = Utc::now();
    }
}
