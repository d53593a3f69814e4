use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::models::{Order, OrderLine};

/// One field-level difference on an existing line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldChange {
    pub path: String,
    pub before: Value,
    pub after: Value,
}

/// What the review UI needs to render a line: identity plus the effective
/// (override-resolved) prices.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineSnapshot {
    pub line_id: Uuid,
    pub variant_id: Uuid,
    pub sku: String,
    pub quantity: u32,
    pub unit_price: i64,
    pub unit_price_with_tax: i64,
    pub custom_fields: Value,
}

impl LineSnapshot {
    fn of(line: &OrderLine) -> Self {
        Self {
            line_id: line.id,
            variant_id: line.variant_id,
            sku: line.sku.clone(),
            quantity: line.quantity,
            unit_price: line.effective_unit_net(),
            unit_price_with_tax: line.effective_unit_gross(),
            custom_fields: line.custom_fields.clone(),
        }
    }
}

/// A single entry in a change-set.
///
/// A line present only in the working copy is New (even if it was also
/// price-overridden in the same session: the snapshot already carries the
/// overridden price, so it is never duplicated as both new and changed).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LineChange {
    NewLine { line: LineSnapshot },
    RemovedLine { line: LineSnapshot },
    FieldChanges {
        line_id: Uuid,
        changes: Vec<FieldChange>,
    },
}

/// Structured difference between two order snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangeSet {
    pub changes: Vec<LineChange>,
    pub currency: String,
    /// Grand totals, gross, minor units.
    pub old_grand_total: i64,
    pub new_grand_total: i64,
}

impl ChangeSet {
    /// New total minus old total; negative means the customer is owed.
    pub fn price_delta(&self) -> i64 {
        self.new_grand_total - self.old_grand_total
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && self.price_delta() == 0
    }
}

fn field_changes(original: &OrderLine, working: &OrderLine) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    let mut push = |path: &str, before: Value, after: Value| {
        if before != after {
            changes.push(FieldChange {
                path: path.to_string(),
                before,
                after,
            });
        }
    };

    push(
        "quantity",
        json!(original.quantity),
        json!(working.quantity),
    );
    push(
        "unit_price",
        json!(original.effective_unit_net()),
        json!(working.effective_unit_net()),
    );
    push(
        "unit_price_with_tax",
        json!(original.effective_unit_gross()),
        json!(working.effective_unit_gross()),
    );
    push(
        "custom_fields",
        original.custom_fields.clone(),
        working.custom_fields.clone(),
    );
    changes
}

/// Compute the change-set between an original order snapshot and a
/// working copy.
///
/// Lines are matched by stable line id. The output is a pure function of
/// the two snapshots: original-sequence lines first (removed or changed),
/// then working-copy-only lines as new, in working-copy order.
pub fn diff(original: &Order, working: &Order) -> ChangeSet {
    let mut changes = Vec::new();

    for line in &original.lines {
        match working.line(line.id) {
            None => changes.push(LineChange::RemovedLine {
                line: LineSnapshot::of(line),
            }),
            Some(updated) => {
                let fields = field_changes(line, updated);
                if !fields.is_empty() {
                    changes.push(LineChange::FieldChanges {
                        line_id: line.id,
                        changes: fields,
                    });
                }
            }
        }
    }

    for line in &working.lines {
        if original.line(line.id).is_none() {
            changes.push(LineChange::NewLine {
                line: LineSnapshot::of(line),
            });
        }
    }

    ChangeSet {
        changes,
        currency: original.currency.clone(),
        old_grand_total: original.totals().grand_total_gross,
        new_grand_total: working.totals().grand_total_gross,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PriceBasis, PriceOverride};

    fn order_with_lines(lines: Vec<OrderLine>) -> Order {
        let mut order = Order::new("EUR");
        order.lines = lines;
        order
    }

    fn line(unit_net: i64, quantity: u32) -> OrderLine {
        OrderLine::new(
            Uuid::new_v4(),
            "SKU",
            "Widget",
            quantity,
            unit_net,
            20.0,
            json!({}),
        )
    }

    #[test]
    fn test_new_removed_and_changed_lines() {
        let kept = line(1000, 1);
        let removed = line(500, 2);
        let original = order_with_lines(vec![kept.clone(), removed.clone()]);

        let mut working = original.clone();
        working.lines.retain(|l| l.id != removed.id);
        working.line_mut(kept.id).unwrap().quantity = 3;
        let added = line(700, 1);
        working.lines.push(added.clone());

        let set = diff(&original, &working);
        assert_eq!(set.changes.len(), 3);
        assert!(matches!(
            &set.changes[0],
            LineChange::FieldChanges { line_id, .. } if *line_id == kept.id
        ));
        assert!(matches!(
            &set.changes[1],
            LineChange::RemovedLine { line } if line.line_id == removed.id
        ));
        assert!(matches!(
            &set.changes[2],
            LineChange::NewLine { line } if line.line_id == added.id
        ));
    }

    #[test]
    fn test_price_and_quantity_changes_reported_independently() {
        let l = line(1000, 2);
        let original = order_with_lines(vec![l.clone()]);
        let mut working = original.clone();
        {
            let wl = working.line_mut(l.id).unwrap();
            wl.quantity = 5;
            wl.price_override = Some(PriceOverride {
                value: 800,
                basis: PriceBasis::Net,
            });
        }

        let set = diff(&original, &working);
        match &set.changes[0] {
            LineChange::FieldChanges { changes, .. } => {
                let paths: Vec<&str> = changes.iter().map(|c| c.path.as_str()).collect();
                assert_eq!(
                    paths,
                    vec!["quantity", "unit_price", "unit_price_with_tax"]
                );
            }
            other => panic!("expected field changes, got {:?}", other),
        }
    }

    #[test]
    fn test_new_line_with_override_reported_once_as_new() {
        let original = order_with_lines(vec![]);
        let mut working = original.clone();
        let mut added = line(1000, 1);
        added.price_override = Some(PriceOverride {
            value: 900,
            basis: PriceBasis::Net,
        });
        working.lines.push(added.clone());

        let set = diff(&original, &working);
        assert_eq!(set.changes.len(), 1);
        match &set.changes[0] {
            LineChange::NewLine { line } => {
                assert_eq!(line.line_id, added.id);
                // The snapshot carries the overridden price.
                assert_eq!(line.unit_price, 900);
            }
            other => panic!("expected new line, got {:?}", other),
        }
    }

    #[test]
    fn test_deterministic_for_fixed_snapshots() {
        let a = line(1000, 1);
        let b = line(500, 2);
        let original = order_with_lines(vec![a.clone(), b.clone()]);
        let mut working = original.clone();
        working.line_mut(a.id).unwrap().quantity = 4;
        working.lines.push(line(300, 1));

        let first = diff(&original, &working);
        let second = diff(&original, &working);
        assert_eq!(first, second);
    }

    #[test]
    fn test_identical_snapshots_produce_empty_set() {
        let original = order_with_lines(vec![line(1000, 1)]);
        let set = diff(&original, &original.clone());
        assert!(set.is_empty());
    }
}
