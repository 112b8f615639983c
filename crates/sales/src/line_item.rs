//! Line items: standalone articles, group headers and group members.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use orderflow_catalog::{CatalogEntry, ProductRef};
use orderflow_core::{DomainError, DomainResult, GroupId, LineItemId};

use crate::pricing::{LinePricing, price_line};

/// Delivered/invoiced bookkeeping for one article (order context only).
///
/// Invariant: `quantity_delivered <= quantity_ordered` and
/// `quantity_invoiced <= quantity_ordered`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fulfillment {
    pub quantity_ordered: Decimal,
    pub quantity_delivered: Decimal,
    pub quantity_invoiced: Decimal,
    pub delivery_note_sequence: Option<u32>,
    pub invoice_sequence: Option<u32>,
}

/// A sellable article: the commercial terms of a standalone item or group member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub description: String,
    pub product: Option<ProductRef>,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub discount_percent: Decimal,
    pub tax_rate: Decimal,
    /// Unit purchase cost. Only used for margins, never shown to the customer.
    pub purchase_price: Decimal,
    pub serial_number: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub fulfillment: Fulfillment,
}

impl Article {
    pub fn new(
        description: impl Into<String>,
        quantity: Decimal,
        unit_price: Decimal,
        tax_rate: Decimal,
    ) -> Self {
        Self {
            description: description.into(),
            product: None,
            quantity,
            unit_price,
            discount_percent: Decimal::ZERO,
            tax_rate,
            purchase_price: Decimal::ZERO,
            serial_number: None,
            notes: None,
            fulfillment: Fulfillment::default(),
        }
    }

    /// Seed an article from a catalog lookup.
    pub fn from_catalog(
        product: ProductRef,
        entry: CatalogEntry,
        quantity: Decimal,
        tax_rate: Decimal,
    ) -> Self {
        let mut article = Self::new(entry.description, quantity, entry.unit_price, tax_rate);
        article.product = Some(product);
        article.purchase_price = entry.purchase_price;
        article
    }

    pub fn with_discount(mut self, discount_percent: Decimal) -> Self {
        self.discount_percent = discount_percent;
        self
    }

    pub fn with_purchase_price(mut self, purchase_price: Decimal) -> Self {
        self.purchase_price = purchase_price;
        self
    }

    pub fn pricing(&self) -> LinePricing {
        price_line(
            self.quantity,
            self.unit_price,
            self.discount_percent,
            self.tax_rate,
            self.purchase_price,
        )
    }

    /// `quantity × unit_price × (1 − discount/100)`, unrounded.
    pub fn list_value(&self) -> Decimal {
        self.quantity * self.unit_price * (Decimal::ONE - self.discount_percent / Decimal::ONE_HUNDRED)
    }

    /// `quantity × purchase_price`, unrounded.
    pub fn purchase_cost(&self) -> Decimal {
        self.quantity * self.purchase_price
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.quantity < Decimal::ZERO {
            return Err(DomainError::validation("quantity must not be negative"));
        }
        if self.unit_price < Decimal::ZERO {
            return Err(DomainError::validation("unit price must not be negative"));
        }
        if self.purchase_price < Decimal::ZERO {
            return Err(DomainError::validation("purchase price must not be negative"));
        }
        if self.discount_percent < Decimal::ZERO || self.discount_percent > Decimal::ONE_HUNDRED {
            return Err(DomainError::validation("discount must be between 0 and 100 percent"));
        }
        if self.tax_rate < Decimal::ZERO {
            return Err(DomainError::validation("tax rate must not be negative"));
        }
        Ok(())
    }
}

/// Umbrella position for a group of articles sold under one price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupHeader {
    pub group_id: GroupId,
    pub title: String,
    pub tax_rate: Decimal,
    pub uses_system_price: bool,
    /// Manually entered sale price; `None` means the members' list price sum.
    pub sale_price: Option<Decimal>,
    /// Derived: Σ member list values.
    #[serde(default)]
    pub list_price_sum: Decimal,
    /// Derived: Σ member purchase costs.
    #[serde(default)]
    pub purchase_cost_sum: Decimal,
    /// Derived: share of the document's system price.
    #[serde(default)]
    pub allocated_price: Option<Decimal>,
    pub notes: Option<String>,
}

impl GroupHeader {
    pub fn new(group_id: GroupId, title: impl Into<String>, tax_rate: Decimal) -> Self {
        Self {
            group_id,
            title: title.into(),
            tax_rate,
            uses_system_price: false,
            sale_price: None,
            list_price_sum: Decimal::ZERO,
            purchase_cost_sum: Decimal::ZERO,
            allocated_price: None,
            notes: None,
        }
    }

    /// The price the group is sold at.
    ///
    /// While `uses_system_price` is set and an allocation exists, the manual
    /// sale price is ignored.
    pub fn effective_sale_price(&self) -> Decimal {
        match (self.uses_system_price, self.allocated_price) {
            (true, Some(allocated)) => allocated,
            _ => self.sale_price.unwrap_or(self.list_price_sum),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LineKind {
    Standalone {
        article: Article,
        uses_system_price: bool,
        #[serde(default)]
        allocated_price: Option<Decimal>,
    },
    GroupHeader(GroupHeader),
    GroupMember {
        group_id: GroupId,
        article: Article,
    },
}

/// One row of a quotation or order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: LineItemId,
    /// Top-level ordinal; members share their header's.
    #[serde(default)]
    pub position: u32,
    /// `"N"` for top-level items, `"N.NN"` for group members.
    #[serde(default)]
    pub display_position: String,
    pub kind: LineKind,
}

impl LineItem {
    pub fn new(id: LineItemId, kind: LineKind) -> Self {
        Self {
            id,
            position: 0,
            display_position: String::new(),
            kind,
        }
    }

    pub fn standalone(id: LineItemId, article: Article) -> Self {
        Self::new(
            id,
            LineKind::Standalone {
                article,
                uses_system_price: false,
                allocated_price: None,
            },
        )
    }

    pub fn group_header(id: LineItemId, header: GroupHeader) -> Self {
        Self::new(id, LineKind::GroupHeader(header))
    }

    pub fn group_member(id: LineItemId, group_id: GroupId, article: Article) -> Self {
        Self::new(id, LineKind::GroupMember { group_id, article })
    }

    pub fn is_group_header(&self) -> bool {
        matches!(self.kind, LineKind::GroupHeader(_))
    }

    /// Headers and standalone items; members are not top-level.
    pub fn is_top_level(&self) -> bool {
        !matches!(self.kind, LineKind::GroupMember { .. })
    }

    /// Group this item belongs to, for headers and members alike.
    pub fn group_id(&self) -> Option<GroupId> {
        match &self.kind {
            LineKind::Standalone { .. } => None,
            LineKind::GroupHeader(header) => Some(header.group_id),
            LineKind::GroupMember { group_id, .. } => Some(*group_id),
        }
    }

    /// Group id, only when this item is a member.
    pub fn member_of(&self) -> Option<GroupId> {
        match &self.kind {
            LineKind::GroupMember { group_id, .. } => Some(*group_id),
            _ => None,
        }
    }

    pub fn header(&self) -> Option<&GroupHeader> {
        match &self.kind {
            LineKind::GroupHeader(header) => Some(header),
            _ => None,
        }
    }

    pub fn header_mut(&mut self) -> Option<&mut GroupHeader> {
        match &mut self.kind {
            LineKind::GroupHeader(header) => Some(header),
            _ => None,
        }
    }

    pub fn article(&self) -> Option<&Article> {
        match &self.kind {
            LineKind::Standalone { article, .. } | LineKind::GroupMember { article, .. } => {
                Some(article)
            }
            LineKind::GroupHeader(_) => None,
        }
    }

    pub fn article_mut(&mut self) -> Option<&mut Article> {
        match &mut self.kind {
            LineKind::Standalone { article, .. } | LineKind::GroupMember { article, .. } => {
                Some(article)
            }
            LineKind::GroupHeader(_) => None,
        }
    }

    pub fn uses_system_price(&self) -> bool {
        match &self.kind {
            LineKind::Standalone {
                uses_system_price, ..
            } => *uses_system_price,
            LineKind::GroupHeader(header) => header.uses_system_price,
            LineKind::GroupMember { .. } => false,
        }
    }

    pub fn fulfillment(&self) -> Option<&Fulfillment> {
        self.article().map(|a| &a.fulfillment)
    }
}

/// Input for adding a line; derived fields are filled in by the recompute passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NewLine {
    Standalone {
        article: Article,
        #[serde(default)]
        uses_system_price: bool,
    },
    GroupHeader {
        group_id: GroupId,
        title: String,
        tax_rate: Decimal,
        #[serde(default)]
        uses_system_price: bool,
    },
    GroupMember {
        group_id: GroupId,
        article: Article,
    },
}

impl NewLine {
    pub fn into_line_item(self, id: LineItemId) -> LineItem {
        match self {
            NewLine::Standalone {
                article,
                uses_system_price,
            } => LineItem::new(
                id,
                LineKind::Standalone {
                    article,
                    uses_system_price,
                    allocated_price: None,
                },
            ),
            NewLine::GroupHeader {
                group_id,
                title,
                tax_rate,
                uses_system_price,
            } => {
                let mut header = GroupHeader::new(group_id, title, tax_rate);
                header.uses_system_price = uses_system_price;
                LineItem::group_header(id, header)
            }
            NewLine::GroupMember { group_id, article } => {
                LineItem::group_member(id, group_id, article)
            }
        }
    }
}

/// Partial update of an article. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticlePatch {
    pub description: Option<String>,
    pub quantity: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    pub discount_percent: Option<Decimal>,
    pub tax_rate: Option<Decimal>,
    pub purchase_price: Option<Decimal>,
}

impl ArticlePatch {
    /// True when the patch touches price-relevant terms.
    pub fn is_commercial(&self) -> bool {
        self.quantity.is_some()
            || self.unit_price.is_some()
            || self.discount_percent.is_some()
            || self.tax_rate.is_some()
            || self.purchase_price.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.description.is_none() && !self.is_commercial()
    }

    pub fn apply_to(&self, article: &mut Article) {
        if let Some(description) = &self.description {
            article.description = description.clone();
        }
        if let Some(quantity) = self.quantity {
            article.quantity = quantity;
        }
        if let Some(unit_price) = self.unit_price {
            article.unit_price = unit_price;
        }
        if let Some(discount_percent) = self.discount_percent {
            article.discount_percent = discount_percent;
        }
        if let Some(tax_rate) = self.tax_rate {
            article.tax_rate = tax_rate;
        }
        if let Some(purchase_price) = self.purchase_price {
            article.purchase_price = purchase_price;
        }
    }
}
