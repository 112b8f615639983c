use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use orderflow_core::DomainError;

/// Product type, the tag part of a [`ProductRef`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProductKind {
    TradingGoods,
    Equipment,
    Service,
}

impl ProductKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductKind::TradingGoods => "trading-goods",
            ProductKind::Equipment => "equipment",
            ProductKind::Service => "service",
        }
    }
}

impl FromStr for ProductKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trading-goods" => Ok(ProductKind::TradingGoods),
            "equipment" => Ok(ProductKind::Equipment),
            "service" => Ok(ProductKind::Service),
            other => Err(DomainError::invalid_id(format!("unknown product kind '{other}'"))),
        }
    }
}

/// Type-tagged product reference, e.g. `trading-goods:123`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProductRef {
    kind: ProductKind,
    key: String,
}

impl ProductRef {
    pub fn new(kind: ProductKind, key: impl Into<String>) -> Result<Self, DomainError> {
        let key = key.into();
        if key.is_empty() || key.contains(':') {
            return Err(DomainError::invalid_id(format!(
                "product key '{key}' must be non-empty and contain no ':'"
            )));
        }
        Ok(Self { kind, key })
    }

    pub fn kind(&self) -> ProductKind {
        self.kind
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl core::fmt::Display for ProductRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.key)
    }
}

impl FromStr for ProductRef {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, key) = s
            .split_once(':')
            .ok_or_else(|| DomainError::invalid_id(format!("product reference '{s}' has no kind tag")))?;
        ProductRef::new(kind.parse()?, key)
    }
}

impl TryFrom<String> for ProductRef {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ProductRef> for String {
    fn from(value: ProductRef) -> Self {
        value.to_string()
    }
}

/// Product data as the catalog stores it, one shape per product type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ProductRecord {
    TradingGoods {
        description: String,
        list_price: Decimal,
        purchase_price: Decimal,
    },
    Equipment {
        description: String,
        manufacturer_list_price: Decimal,
        /// Overrides the manufacturer list price when present.
        current_list_price: Option<Decimal>,
        dealer_price: Decimal,
    },
    Service {
        description: String,
        hourly_rate: Decimal,
        cost_rate: Decimal,
    },
}

impl ProductRecord {
    pub fn kind(&self) -> ProductKind {
        match self {
            ProductRecord::TradingGoods { .. } => ProductKind::TradingGoods,
            ProductRecord::Equipment { .. } => ProductKind::Equipment,
            ProductRecord::Service { .. } => ProductKind::Service,
        }
    }

    /// Collapse type-specific pricing into the uniform entry.
    pub fn normalize(&self) -> CatalogEntry {
        match self {
            ProductRecord::TradingGoods {
                description,
                list_price,
                purchase_price,
            } => CatalogEntry {
                unit_price: *list_price,
                purchase_price: *purchase_price,
                description: description.clone(),
            },
            ProductRecord::Equipment {
                description,
                manufacturer_list_price,
                current_list_price,
                dealer_price,
            } => CatalogEntry {
                unit_price: current_list_price.unwrap_or(*manufacturer_list_price),
                purchase_price: *dealer_price,
                description: description.clone(),
            },
            ProductRecord::Service {
                description,
                hourly_rate,
                cost_rate,
            } => CatalogEntry {
                unit_price: *hourly_rate,
                purchase_price: *cost_rate,
                description: description.clone(),
            },
        }
    }
}

/// Normalized product data used to seed a new line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub unit_price: Decimal,
    pub purchase_price: Decimal,
    pub description: String,
}
