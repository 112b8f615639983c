//! Engine configuration.
//!
//! Values come from environment variables; anything missing or malformed
//! falls back to a default with a warning.

use core::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Prefixes used when formatting issued document numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberPrefixes {
    pub quotation: String,
    pub order: String,
    pub delivery_note: String,
    pub invoice: String,
}

impl Default for NumberPrefixes {
    fn default() -> Self {
        Self {
            quotation: "QT".to_string(),
            order: "SO".to_string(),
            delivery_note: "DN".to_string(),
            invoice: "INV".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Tax rate (percent) seeded into new documents.
    pub default_tax_rate: Decimal,
    /// Whether new documents charge tax.
    pub tax_enabled: bool,
    /// Days between invoice issue and due date.
    pub payment_terms_days: u32,
    pub prefixes: NumberPrefixes,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_tax_rate: dec!(19),
            tax_enabled: true,
            payment_terms_days: 14,
            prefixes: NumberPrefixes::default(),
        }
    }
}

impl EngineSettings {
    /// Load settings from `ORDERFLOW_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let default_tax_rate = parse_or(
            &lookup,
            "ORDERFLOW_DEFAULT_TAX_RATE",
            defaults.default_tax_rate,
        );
        let default_tax_rate = if default_tax_rate < Decimal::ZERO {
            tracing::warn!(%default_tax_rate, "negative default tax rate; using default");
            defaults.default_tax_rate
        } else {
            default_tax_rate
        };

        Self {
            default_tax_rate,
            tax_enabled: parse_or(&lookup, "ORDERFLOW_TAX_ENABLED", defaults.tax_enabled),
            payment_terms_days: parse_or(
                &lookup,
                "ORDERFLOW_PAYMENT_TERMS_DAYS",
                defaults.payment_terms_days,
            ),
            prefixes: NumberPrefixes {
                quotation: text_or(&lookup, "ORDERFLOW_QUOTATION_PREFIX", defaults.prefixes.quotation),
                order: text_or(&lookup, "ORDERFLOW_ORDER_PREFIX", defaults.prefixes.order),
                delivery_note: text_or(
                    &lookup,
                    "ORDERFLOW_DELIVERY_NOTE_PREFIX",
                    defaults.prefixes.delivery_note,
                ),
                invoice: text_or(&lookup, "ORDERFLOW_INVOICE_PREFIX", defaults.prefixes.invoice),
            },
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + core::fmt::Display,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, %default, "invalid setting; using default");
            default
        }),
    }
}

fn text_or(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: String) -> String {
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw.trim().to_string(),
        Some(_) => {
            tracing::warn!(key, %default, "empty setting; using default");
            default
        }
        None => default,
    }
}
