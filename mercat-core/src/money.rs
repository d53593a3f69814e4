use serde::{Deserialize, Serialize};

/// Gross (tax-inclusive) amount for a net amount in minor units.
///
/// `tax_rate` is a percentage, e.g. `20.0` for 20% VAT. Rounds to the
/// nearest minor unit, half away from zero.
pub fn gross_from_net(net_minor: i64, tax_rate: f64) -> i64 {
    (net_minor as f64 * (100.0 + tax_rate) / 100.0).round() as i64
}

/// Net (tax-exclusive) amount for a gross amount in minor units.
///
/// Inverse of [`gross_from_net`]; round-tripping net -> gross -> net
/// reproduces the original to within one minor unit for any rate in
/// [0, 100].
pub fn net_from_gross(gross_minor: i64, tax_rate: f64) -> i64 {
    (gross_minor as f64 * 100.0 / (100.0 + tax_rate)).round() as i64
}

/// A fixed-point monetary amount in minor currency units.
///
/// There is no implicit tax rate anywhere: converting between net and
/// gross always takes the rate explicitly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Money {
    pub amount: i64,
    pub currency: String,
}

impl Money {
    pub fn new(amount: i64, currency: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into(),
        }
    }

    pub fn zero(currency: impl Into<String>) -> Self {
        Self::new(0, currency)
    }

    /// Add another amount of the same currency.
    pub fn checked_add(&self, other: &Money) -> Result<Money, MoneyError> {
        self.require_same_currency(other)?;
        Ok(Money::new(self.amount + other.amount, self.currency.clone()))
    }

    /// Subtract another amount of the same currency.
    pub fn checked_sub(&self, other: &Money) -> Result<Money, MoneyError> {
        self.require_same_currency(other)?;
        Ok(Money::new(self.amount - other.amount, self.currency.clone()))
    }

    /// This amount with tax applied at the given rate.
    pub fn with_tax(&self, tax_rate: f64) -> Money {
        Money::new(gross_from_net(self.amount, tax_rate), self.currency.clone())
    }

    /// This amount with tax at the given rate backed out.
    pub fn without_tax(&self, tax_rate: f64) -> Money {
        Money::new(net_from_gross(self.amount, tax_rate), self.currency.clone())
    }

    fn require_same_currency(&self, other: &Money) -> Result<(), MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch {
                left: self.currency.clone(),
                right: other.currency.clone(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MoneyError {
    #[error("Currency mismatch: {left} vs {right}")]
    CurrencyMismatch { left: String, right: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gross_from_net() {
        assert_eq!(gross_from_net(1000, 20.0), 1200);
        assert_eq!(gross_from_net(1000, 0.0), 1000);
        assert_eq!(gross_from_net(999, 8.25), 1081);
    }

    #[test]
    fn test_net_from_gross() {
        assert_eq!(net_from_gross(1200, 20.0), 1000);
        assert_eq!(net_from_gross(1000, 0.0), 1000);
    }

    #[test]
    fn test_round_trip_within_one_minor_unit() {
        // grossFromNet(netFromGross(grossFromNet(P, R))) == grossFromNet(P, R) +/- 1
        let rates = [
            0.0, 0.5, 1.0, 5.0, 7.7, 8.25, 10.0, 19.0, 20.0, 21.0, 25.0, 33.3, 50.0, 77.7, 99.9,
            100.0,
        ];
        let prices = [0i64, 1, 3, 99, 100, 999, 1234, 9999, 123_456, 1_000_000];
        for &rate in &rates {
            for &price in &prices {
                let gross = gross_from_net(price, rate);
                let net_again = net_from_gross(gross, rate);
                let gross_again = gross_from_net(net_again, rate);
                assert!(
                    (gross_again - gross).abs() <= 1,
                    "round trip off by more than 1 minor unit: price={} rate={} gross={} gross_again={}",
                    price,
                    rate,
                    gross,
                    gross_again
                );
            }
        }
    }

    #[test]
    fn test_currency_mismatch() {
        let eur = Money::new(100, "EUR");
        let usd = Money::new(100, "USD");
        assert!(eur.checked_add(&usd).is_err());
        assert_eq!(
            eur.checked_add(&Money::new(50, "EUR")).unwrap().amount,
            150
        );
    }

    #[test]
    fn test_with_tax() {
        let net = Money::new(1000, "EUR");
        let gross = net.with_tax(20.0);
        assert_eq!(gross.amount, 1200);
        assert_eq!(gross.without_tax(20.0).amount, 1000);
    }
}
