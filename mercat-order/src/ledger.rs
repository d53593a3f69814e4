use mercat_core::money::{gross_from_net, net_from_gross, Money};
use serde::{Deserialize, Serialize};

use crate::models::{Order, OrderLine, PriceBasis};

impl OrderLine {
    /// Unit price actually charged, net: the base price unless an
    /// override is present. Gross-basis overrides are converted down
    /// with this line's tax rate.
    pub fn effective_unit_net(&self) -> i64 {
        match &self.price_override {
            Some(o) => match o.basis {
                PriceBasis::Net => o.value,
                PriceBasis::Gross => net_from_gross(o.value, self.tax_rate),
            },
            None => self.unit_price_net,
        }
    }

    /// Unit price actually charged, gross. A gross-basis override is
    /// taken verbatim so the administrator-entered figure is what the
    /// customer sees.
    pub fn effective_unit_gross(&self) -> i64 {
        match &self.price_override {
            Some(o) if o.basis == PriceBasis::Gross => o.value,
            _ => gross_from_net(self.effective_unit_net(), self.tax_rate),
        }
    }

    pub fn total_net(&self) -> i64 {
        self.effective_unit_net() * self.quantity as i64
    }

    pub fn total_gross(&self) -> i64 {
        self.effective_unit_gross() * self.quantity as i64
    }

    pub fn tax_amount(&self) -> i64 {
        self.total_gross() - self.total_net()
    }
}

/// Order totals, recomputed from the lines on every call. Nothing here is
/// cached: the grand total always equals line totals + shipping - discount.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderTotals {
    pub currency: String,
    pub sub_total_net: i64,
    pub sub_total_gross: i64,
    pub shipping_net: i64,
    pub shipping_gross: i64,
    pub discount_net: i64,
    pub tax_total: i64,
    pub grand_total_net: i64,
    pub grand_total_gross: i64,
}

impl OrderTotals {
    pub fn grand_total(&self) -> Money {
        Money::new(self.grand_total_gross, self.currency.clone())
    }
}

impl Order {
    pub fn totals(&self) -> OrderTotals {
        let sub_total_net: i64 = self.lines.iter().map(|l| l.total_net()).sum();
        let sub_total_gross: i64 = self.lines.iter().map(|l| l.total_gross()).sum();

        let (shipping_net, shipping_gross) = match &self.shipping {
            Some(s) => (s.net, gross_from_net(s.net, s.tax_rate)),
            None => (0, 0),
        };

        let grand_total_net = sub_total_net + shipping_net - self.discount_net;
        let tax_total = (sub_total_gross - sub_total_net) + (shipping_gross - shipping_net);

        OrderTotals {
            currency: self.currency.clone(),
            sub_total_net,
            sub_total_gross,
            shipping_net,
            shipping_gross,
            discount_net: self.discount_net,
            tax_total,
            grand_total_net,
            grand_total_gross: grand_total_net + tax_total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PriceOverride, ShippingLine};
    use serde_json::json;
    use uuid::Uuid;

    fn line(quantity: u32, unit_net: i64, tax_rate: f64) -> OrderLine {
        OrderLine::new(
            Uuid::new_v4(),
            "SKU",
            "Widget",
            quantity,
            unit_net,
            tax_rate,
            json!({}),
        )
    }

    #[test]
    fn test_totals_recomputed_from_lines() {
        let mut order = Order::new("EUR");
        order.lines.push(line(2, 1000, 20.0));
        order.lines.push(line(1, 500, 10.0));

        let totals = order.totals();
        assert_eq!(totals.sub_total_net, 2500);
        assert_eq!(totals.sub_total_gross, 2400 + 550);
        assert_eq!(totals.grand_total_gross, 2950);

        // Mutate a quantity; totals must follow immediately.
        order.lines[0].quantity = 3;
        assert_eq!(order.totals().sub_total_net, 3500);
    }

    #[test]
    fn test_net_override_changes_effective_price() {
        let mut l = line(2, 1000, 20.0);
        l.price_override = Some(PriceOverride {
            value: 800,
            basis: PriceBasis::Net,
        });
        assert_eq!(l.effective_unit_net(), 800);
        assert_eq!(l.effective_unit_gross(), 960);
        assert_eq!(l.total_gross(), 1920);
    }

    #[test]
    fn test_gross_override_taken_verbatim() {
        let mut l = line(1, 1000, 19.0);
        l.price_override = Some(PriceOverride {
            value: 999,
            basis: PriceBasis::Gross,
        });
        assert_eq!(l.effective_unit_gross(), 999);
        // Derived net stays within one minor unit of the round trip.
        let back = gross_from_net(l.effective_unit_net(), 19.0);
        assert!((back - 999).abs() <= 1);
    }

    #[test]
    fn test_shipping_and_discount_in_grand_total() {
        let mut order = Order::new("EUR");
        order.lines.push(line(1, 1000, 20.0));
        order.shipping = Some(ShippingLine {
            method: "standard".to_string(),
            net: 500,
            tax_rate: 20.0,
        });
        order.discount_net = 100;

        let totals = order.totals();
        assert_eq!(totals.grand_total_net, 1000 + 500 - 100);
        assert_eq!(totals.tax_total, 200 + 100);
        assert_eq!(totals.grand_total_gross, 1400 + 300);
    }
}
