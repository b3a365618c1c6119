//! Amounts in the processor's minor currency unit.
//!
//! Stripe expresses every amount as an integer in the smallest currency unit
//! (cents for USD). Zero-decimal currencies such as JPY are charged in whole
//! units, so formatting has to know which currencies those are.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Currencies Stripe treats as zero-decimal.
const ZERO_DECIMAL_CURRENCIES: &[&str] = &[
    "bif", "clp", "djf", "gnf", "jpy", "kmf", "krw", "mga", "pyg", "rwf", "ugx", "vnd", "vuv",
    "xaf", "xof", "xpf",
];

/// Default charge currency.
pub const DEFAULT_CURRENCY: &str = "usd";

/// An amount together with its ISO currency code (lowercase, as Stripe sends it).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// Amount in the minor unit of `currency`.
    pub amount: i64,
    /// Lowercase ISO 4217 currency code.
    pub currency: String,
}

impl Money {
    /// Create an amount, normalizing the currency code to lowercase.
    #[must_use]
    pub fn new(amount: i64, currency: impl AsRef<str>) -> Self {
        Self {
            amount,
            currency: currency.as_ref().to_ascii_lowercase(),
        }
    }

    /// Whether the currency has no minor unit.
    #[must_use]
    pub fn is_zero_decimal(&self) -> bool {
        ZERO_DECIMAL_CURRENCIES.contains(&self.currency.as_str())
    }

    /// Currency symbol used when rendering notices.
    #[must_use]
    pub fn symbol(&self) -> &str {
        match self.currency.as_str() {
            "usd" | "cad" | "aud" | "nzd" | "mxn" | "sgd" | "hkd" => "$",
            "eur" => "€",
            "gbp" => "£",
            "jpy" => "¥",
            "inr" => "₹",
            "krw" => "₩",
            _ => "",
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.amount < 0 { "-" } else { "" };
        let abs = self.amount.unsigned_abs();
        let symbol = self.symbol();

        let number = if self.is_zero_decimal() {
            abs.to_string()
        } else {
            format!("{}.{:02}", abs / 100, abs % 100)
        };

        if symbol.is_empty() {
            write!(f, "{sign}{number} {}", self.currency.to_ascii_uppercase())
        } else {
            write!(f, "{sign}{symbol}{number}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_two_decimal_currency() {
        assert_eq!(Money::new(1234, "usd").to_string(), "$12.34");
        assert_eq!(Money::new(5, "USD").to_string(), "$0.05");
        assert_eq!(Money::new(100_000, "eur").to_string(), "€1000.00");
    }

    #[test]
    fn formats_zero_decimal_currency() {
        let yen = Money::new(500, "JPY");
        assert!(yen.is_zero_decimal());
        assert_eq!(yen.to_string(), "¥500");
    }

    #[test]
    fn formats_unknown_currency_with_code() {
        assert_eq!(Money::new(990, "chf").to_string(), "9.90 CHF");
    }

    #[test]
    fn formats_negative_amount() {
        assert_eq!(Money::new(-250, "gbp").to_string(), "-£2.50");
    }
}
