use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use orderflow_core::{
    Aggregate, AggregateRoot, CustomerId, DocumentId, DomainError, DomainEvent, DomainResult,
    EngineSettings, GroupId, LineItemId,
};

use crate::fulfillment::{self, FulfillmentKind};
use crate::lifecycle::{DocumentKind, DocumentStatus, OrderStatus, QuotationStatus, check_transition};
use orderflow_catalog::{Catalog, ProductRef};

use crate::line_item::{Article, ArticlePatch, Fulfillment, LineItem, LineKind, NewLine};
use crate::numbering::{Direction, move_item};
use crate::pricing::LinePricing;
use crate::recalc::recompute;
use crate::totals::{DocumentTotals, effective_pricing, fulfillable_values, summarize};

/// Aggregate root: a quotation or a customer order.
///
/// Treated as an immutable value: every edit goes through
/// [`Aggregate::execute`] and yields a new document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    id: DocumentId,
    status: DocumentStatus,
    number: Option<String>,
    customer: Option<CustomerId>,
    tax_rate: Decimal,
    tax_enabled: bool,
    system_price: Option<Decimal>,
    delivery_cost: Decimal,
    items: Vec<LineItem>,
    source_quotation: Option<DocumentId>,
    #[serde(default)]
    version: u64,
}

impl Document {
    pub fn new_quotation(id: DocumentId, settings: &EngineSettings) -> Self {
        Self::blank(id, DocumentStatus::Quotation(QuotationStatus::Draft), settings)
    }

    pub fn new_order(id: DocumentId, settings: &EngineSettings) -> Self {
        Self::blank(id, DocumentStatus::Order(OrderStatus::Created), settings)
    }

    fn blank(id: DocumentId, status: DocumentStatus, settings: &EngineSettings) -> Self {
        Self {
            id,
            status,
            number: None,
            customer: None,
            tax_rate: settings.default_tax_rate,
            tax_enabled: settings.tax_enabled,
            system_price: None,
            delivery_cost: Decimal::ZERO,
            items: Vec::new(),
            source_quotation: None,
            version: 0,
        }
    }

    pub fn kind(&self) -> DocumentKind {
        self.status.kind()
    }

    pub fn status(&self) -> DocumentStatus {
        self.status
    }

    /// Issued quotation/order number, once sent or confirmed.
    pub fn number(&self) -> Option<&str> {
        self.number.as_deref()
    }

    pub fn customer(&self) -> Option<CustomerId> {
        self.customer
    }

    pub fn tax_rate(&self) -> Decimal {
        self.tax_rate
    }

    pub fn tax_enabled(&self) -> bool {
        self.tax_enabled
    }

    pub fn system_price(&self) -> Option<Decimal> {
        self.system_price
    }

    pub fn delivery_cost(&self) -> Decimal {
        self.delivery_cost
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn source_quotation(&self) -> Option<DocumentId> {
        self.source_quotation
    }

    pub fn item(&self, id: LineItemId) -> Option<&LineItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn totals(&self) -> DocumentTotals {
        summarize(&self.items, self.tax_rate, self.tax_enabled, self.delivery_cost)
    }

    pub fn item_pricing(&self, id: LineItemId) -> Option<LinePricing> {
        self.item(id).map(effective_pricing)
    }

    pub fn open_items(&self, kind: FulfillmentKind) -> Vec<LineItemId> {
        fulfillment::open_items(&self.items, kind)
    }

    pub fn is_fully_fulfilled(&self, kind: FulfillmentKind) -> bool {
        fulfillment::all_fulfilled(&self.items, kind)
    }

    /// Net value of each deliverable/invoiceable item.
    pub fn fulfillable_values(&self) -> HashMap<LineItemId, Decimal> {
        fulfillable_values(&self.items)
    }

    /// True when no item has been invoiced yet.
    pub fn has_no_invoices(&self) -> bool {
        self.items
            .iter()
            .filter_map(LineItem::fulfillment)
            .all(|f| f.invoice_sequence.is_none())
    }

    /// Check that the given items can be delivered (or invoiced) right now.
    ///
    /// Covers the lifecycle gate and the open check; nothing is changed.
    /// Persistence uses this before drawing a delivery note or invoice number.
    pub fn check_fulfillment(
        &self,
        kind: FulfillmentKind,
        item_ids: &[LineItemId],
    ) -> DomainResult<OrderStatus> {
        let status = self.order_status_for(kind)?;
        fulfillment::ensure_open(&self.items, item_ids, kind)?;
        Ok(status)
    }

    /// Check that this copy carries the delivery and invoice state of `stored`.
    ///
    /// Only delivery notes and invoices write that state, so a save that
    /// would change it comes from a stale copy. `None` means nothing is
    /// stored yet, and then no item may be delivered or invoiced.
    pub fn ensure_fulfillment_matches(&self, stored: Option<&Document>) -> DomainResult<()> {
        let unfulfilled = Fulfillment::default();
        for item in &self.items {
            let Some(mine) = item.fulfillment() else {
                continue;
            };
            let theirs = stored
                .and_then(|doc| doc.item(item.id))
                .and_then(LineItem::fulfillment)
                .unwrap_or(&unfulfilled);
            if !mine.same_progress(theirs) {
                return Err(DomainError::conflict(format!(
                    "delivery or invoice state of position {} changed since it was loaded",
                    item.display_position
                )));
            }
        }

        let dropped = stored.into_iter().flat_map(|doc| doc.items.iter()).find(|item| {
            self.item(item.id).is_none()
                && item.fulfillment().is_some_and(|f| !f.same_progress(&unfulfilled))
        });
        if let Some(item) = dropped {
            return Err(DomainError::conflict(format!(
                "position {} was delivered or invoiced and cannot be dropped",
                item.display_position
            )));
        }
        Ok(())
    }

    /// Stamp the version assigned by persistence.
    pub fn at_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Seed an article from the catalog at this document's tax rate.
    ///
    /// An unknown product is [`DomainError::NotFound`].
    pub fn article_from_catalog(
        &self,
        catalog: &impl Catalog,
        product: &ProductRef,
        quantity: Decimal,
    ) -> DomainResult<Article> {
        let entry = catalog
            .lookup(product)
            .ok_or_else(|| DomainError::not_found(format!("product {product}")))?;
        Ok(Article::from_catalog(product.clone(), entry, quantity, self.tax_rate))
    }

    /// Re-run the derived-field passes, e.g. after deserializing.
    pub fn recalculated(mut self) -> Self {
        recompute(&mut self.items, self.system_price);
        self
    }

    /// Turn a sent or active quotation into a new customer order.
    ///
    /// Returns the quotation (now `ordered`) and the order (in `created`).
    /// Items get fresh ids and empty fulfillment state.
    pub fn derive_order(&self, order_id: DocumentId) -> DomainResult<(Document, Document)> {
        let Some(status) = self.status.quotation() else {
            return Err(DomainError::precondition("only quotations can be turned into orders"));
        };
        if !status.allows_ordering() {
            return Err(DomainError::precondition(format!(
                "a quotation in status {status:?} cannot be ordered"
            )));
        }

        let mut quotation = self.clone();
        quotation.apply(&DocumentEvent::StatusChanged {
            from: self.status,
            to: DocumentStatus::Quotation(QuotationStatus::Ordered),
            number: None,
        });

        let items = self
            .items
            .iter()
            .cloned()
            .map(|mut item| {
                item.id = LineItemId::new();
                if let Some(article) = item.article_mut() {
                    article.fulfillment = Fulfillment::default();
                    article.serial_number = None;
                }
                item
            })
            .collect();

        let order = Document {
            id: order_id,
            status: DocumentStatus::Order(OrderStatus::Created),
            number: None,
            customer: self.customer,
            tax_rate: self.tax_rate,
            tax_enabled: self.tax_enabled,
            system_price: self.system_price,
            delivery_cost: self.delivery_cost,
            items,
            source_quotation: Some(self.id),
            version: 0,
        }
        .recalculated();

        tracing::info!(quotation_id = %self.id, order_id = %order_id, "order derived from quotation");
        Ok((quotation, order))
    }
}

impl AggregateRoot for Document {
    type Id = DocumentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Edits accepted by a [`Document`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum DocumentCommand {
    SetCustomer {
        customer: Option<CustomerId>,
    },
    SetTaxRate {
        tax_rate: Decimal,
    },
    SetTaxEnabled {
        enabled: bool,
    },
    SetSystemPrice {
        system_price: Option<Decimal>,
    },
    SetDeliveryCost {
        delivery_cost: Decimal,
    },
    AddItem {
        item_id: LineItemId,
        line: NewLine,
    },
    UpdateArticle {
        item_id: LineItemId,
        patch: ArticlePatch,
    },
    SetGroupTitle {
        item_id: LineItemId,
        title: String,
    },
    SetGroupSalePrice {
        item_id: LineItemId,
        sale_price: Option<Decimal>,
    },
    SetUsesSystemPrice {
        item_id: LineItemId,
        enabled: bool,
    },
    SetSerialNumber {
        item_id: LineItemId,
        serial_number: Option<String>,
    },
    SetNotes {
        item_id: LineItemId,
        notes: Option<String>,
    },
    RemoveItem {
        item_id: LineItemId,
    },
    MoveUp {
        item_id: LineItemId,
    },
    MoveDown {
        item_id: LineItemId,
    },
    SendQuotation {
        number: String,
    },
    ConfirmOrder {
        number: String,
    },
    Transition {
        to: DocumentStatus,
    },
    Cancel {
        reason: Option<String>,
    },
    RecordDelivery {
        sequence: u32,
        item_ids: Vec<LineItemId>,
        #[serde(default)]
        serial_numbers: BTreeMap<LineItemId, String>,
    },
    RecordInvoice {
        sequence: u32,
        item_ids: Vec<LineItemId>,
    },
    /// Reopen the items of a voided invoice for billing.
    ReleaseInvoice {
        sequence: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DocumentEvent {
    CustomerChanged {
        customer: Option<CustomerId>,
    },
    TaxRateChanged {
        tax_rate: Decimal,
    },
    TaxEnabledChanged {
        enabled: bool,
    },
    SystemPriceChanged {
        system_price: Option<Decimal>,
    },
    DeliveryCostChanged {
        delivery_cost: Decimal,
    },
    ItemAdded {
        index: usize,
        item: LineItem,
    },
    ArticleUpdated {
        item_id: LineItemId,
        patch: ArticlePatch,
    },
    GroupTitleChanged {
        item_id: LineItemId,
        title: String,
    },
    GroupSalePriceChanged {
        item_id: LineItemId,
        sale_price: Option<Decimal>,
    },
    UsesSystemPriceChanged {
        item_id: LineItemId,
        enabled: bool,
    },
    SerialNumberChanged {
        item_id: LineItemId,
        serial_number: Option<String>,
    },
    NotesChanged {
        item_id: LineItemId,
        notes: Option<String>,
    },
    ItemsRemoved {
        item_ids: Vec<LineItemId>,
    },
    ItemsReordered {
        order: Vec<LineItemId>,
    },
    StatusChanged {
        from: DocumentStatus,
        to: DocumentStatus,
        number: Option<String>,
    },
    OrderCancelled {
        from: DocumentStatus,
        reason: Option<String>,
    },
    ItemsDelivered {
        sequence: u32,
        item_ids: Vec<LineItemId>,
        serial_numbers: BTreeMap<LineItemId, String>,
    },
    ItemsInvoiced {
        sequence: u32,
        item_ids: Vec<LineItemId>,
    },
    InvoiceReleased {
        sequence: u32,
        item_ids: Vec<LineItemId>,
    },
}

impl DomainEvent for DocumentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DocumentEvent::CustomerChanged { .. } => "sales.document.customer_changed",
            DocumentEvent::TaxRateChanged { .. } => "sales.document.tax_rate_changed",
            DocumentEvent::TaxEnabledChanged { .. } => "sales.document.tax_enabled_changed",
            DocumentEvent::SystemPriceChanged { .. } => "sales.document.system_price_changed",
            DocumentEvent::DeliveryCostChanged { .. } => "sales.document.delivery_cost_changed",
            DocumentEvent::ItemAdded { .. } => "sales.document.item_added",
            DocumentEvent::ArticleUpdated { .. } => "sales.document.article_updated",
            DocumentEvent::GroupTitleChanged { .. } => "sales.document.group_title_changed",
            DocumentEvent::GroupSalePriceChanged { .. } => "sales.document.group_sale_price_changed",
            DocumentEvent::UsesSystemPriceChanged { .. } => "sales.document.uses_system_price_changed",
            DocumentEvent::SerialNumberChanged { .. } => "sales.document.serial_number_changed",
            DocumentEvent::NotesChanged { .. } => "sales.document.notes_changed",
            DocumentEvent::ItemsRemoved { .. } => "sales.document.items_removed",
            DocumentEvent::ItemsReordered { .. } => "sales.document.items_reordered",
            DocumentEvent::StatusChanged { .. } => "sales.document.status_changed",
            DocumentEvent::OrderCancelled { .. } => "sales.document.order_cancelled",
            DocumentEvent::ItemsDelivered { .. } => "sales.document.items_delivered",
            DocumentEvent::ItemsInvoiced { .. } => "sales.document.items_invoiced",
            DocumentEvent::InvoiceReleased { .. } => "sales.document.invoice_released",
        }
    }
}

impl Aggregate for Document {
    type Command = DocumentCommand;
    type Event = DocumentEvent;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            DocumentEvent::CustomerChanged { customer } => self.customer = *customer,
            DocumentEvent::TaxRateChanged { tax_rate } => self.tax_rate = *tax_rate,
            DocumentEvent::TaxEnabledChanged { enabled } => self.tax_enabled = *enabled,
            DocumentEvent::SystemPriceChanged { system_price } => self.system_price = *system_price,
            DocumentEvent::DeliveryCostChanged { delivery_cost } => {
                self.delivery_cost = *delivery_cost
            }
            DocumentEvent::ItemAdded { index, item } => {
                let index = (*index).min(self.items.len());
                self.items.insert(index, item.clone());
            }
            DocumentEvent::ArticleUpdated { item_id, patch } => {
                if let Some(article) = self.item_mut(*item_id).and_then(LineItem::article_mut) {
                    patch.apply_to(article);
                }
            }
            DocumentEvent::GroupTitleChanged { item_id, title } => {
                if let Some(header) = self.item_mut(*item_id).and_then(LineItem::header_mut) {
                    header.title = title.clone();
                }
            }
            DocumentEvent::GroupSalePriceChanged {
                item_id,
                sale_price,
            } => {
                if let Some(header) = self.item_mut(*item_id).and_then(LineItem::header_mut) {
                    header.sale_price = *sale_price;
                }
            }
            DocumentEvent::UsesSystemPriceChanged { item_id, enabled } => {
                if let Some(item) = self.item_mut(*item_id) {
                    match &mut item.kind {
                        LineKind::Standalone {
                            uses_system_price, ..
                        } => *uses_system_price = *enabled,
                        LineKind::GroupHeader(header) => header.uses_system_price = *enabled,
                        LineKind::GroupMember { .. } => {}
                    }
                }
            }
            DocumentEvent::SerialNumberChanged {
                item_id,
                serial_number,
            } => {
                if let Some(article) = self.item_mut(*item_id).and_then(LineItem::article_mut) {
                    article.serial_number = serial_number.clone();
                }
            }
            DocumentEvent::NotesChanged { item_id, notes } => {
                if let Some(item) = self.item_mut(*item_id) {
                    match &mut item.kind {
                        LineKind::Standalone { article, .. }
                        | LineKind::GroupMember { article, .. } => article.notes = notes.clone(),
                        LineKind::GroupHeader(header) => header.notes = notes.clone(),
                    }
                }
            }
            DocumentEvent::ItemsRemoved { item_ids } => {
                self.items.retain(|item| !item_ids.contains(&item.id));
            }
            DocumentEvent::ItemsReordered { order } => {
                let mut rest = std::mem::take(&mut self.items);
                let mut reordered = Vec::with_capacity(rest.len());
                for id in order {
                    if let Some(index) = rest.iter().position(|item| item.id == *id) {
                        reordered.push(rest.remove(index));
                    }
                }
                // Items missing from the event keep their relative order at the end.
                reordered.extend(rest);
                self.items = reordered;
            }
            DocumentEvent::StatusChanged { from, to, number } => {
                self.status = *to;
                if let Some(number) = number {
                    self.number = Some(number.clone());
                }
                if *to == DocumentStatus::Order(OrderStatus::Confirmed) {
                    for article in self.items.iter_mut().filter_map(LineItem::article_mut) {
                        article.fulfillment.quantity_ordered = article.quantity;
                    }
                }
                tracing::info!(document_id = %self.id, %from, %to, "document status changed");
            }
            DocumentEvent::OrderCancelled { from, reason } => {
                self.status = DocumentStatus::Order(OrderStatus::Cancelled);
                tracing::info!(document_id = %self.id, %from, ?reason, "order cancelled");
            }
            DocumentEvent::ItemsDelivered {
                sequence,
                item_ids,
                serial_numbers,
            } => fulfillment::mark(
                &mut self.items,
                item_ids,
                FulfillmentKind::Delivery,
                *sequence,
                serial_numbers,
            ),
            DocumentEvent::ItemsInvoiced { sequence, item_ids } => fulfillment::mark(
                &mut self.items,
                item_ids,
                FulfillmentKind::Invoice,
                *sequence,
                &BTreeMap::new(),
            ),
            DocumentEvent::InvoiceReleased { sequence, item_ids } => {
                fulfillment::release(&mut self.items, item_ids, FulfillmentKind::Invoice);
                tracing::info!(document_id = %self.id, sequence, "invoice released");
            }
        }

        recompute(&mut self.items, self.system_price);
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> DomainResult<Vec<Self::Event>> {
        match command {
            DocumentCommand::SetCustomer { customer } => {
                self.ensure_commercial_editable()?;
                if self.customer == *customer {
                    return Ok(vec![]);
                }
                Ok(vec![DocumentEvent::CustomerChanged {
                    customer: *customer,
                }])
            }
            DocumentCommand::SetTaxRate { tax_rate } => {
                self.ensure_commercial_editable()?;
                ensure_non_negative(*tax_rate, "tax rate")?;
                Ok(vec![DocumentEvent::TaxRateChanged {
                    tax_rate: *tax_rate,
                }])
            }
            DocumentCommand::SetTaxEnabled { enabled } => {
                self.ensure_commercial_editable()?;
                Ok(vec![DocumentEvent::TaxEnabledChanged { enabled: *enabled }])
            }
            DocumentCommand::SetSystemPrice { system_price } => {
                self.ensure_commercial_editable()?;
                if let Some(price) = system_price {
                    ensure_non_negative(*price, "system price")?;
                }
                Ok(vec![DocumentEvent::SystemPriceChanged {
                    system_price: *system_price,
                }])
            }
            DocumentCommand::SetDeliveryCost { delivery_cost } => {
                self.ensure_commercial_editable()?;
                ensure_non_negative(*delivery_cost, "delivery cost")?;
                Ok(vec![DocumentEvent::DeliveryCostChanged {
                    delivery_cost: *delivery_cost,
                }])
            }
            DocumentCommand::AddItem { item_id, line } => self.handle_add_item(*item_id, line),
            DocumentCommand::UpdateArticle { item_id, patch } => {
                self.handle_update_article(*item_id, patch)
            }
            DocumentCommand::SetGroupTitle { item_id, title } => {
                self.ensure_not_closed()?;
                self.find_header(*item_id)?;
                Ok(vec![DocumentEvent::GroupTitleChanged {
                    item_id: *item_id,
                    title: title.clone(),
                }])
            }
            DocumentCommand::SetGroupSalePrice {
                item_id,
                sale_price,
            } => {
                self.ensure_commercial_editable()?;
                self.find_header(*item_id)?;
                if let Some(price) = sale_price {
                    ensure_non_negative(*price, "sale price")?;
                }
                Ok(vec![DocumentEvent::GroupSalePriceChanged {
                    item_id: *item_id,
                    sale_price: *sale_price,
                }])
            }
            DocumentCommand::SetUsesSystemPrice { item_id, enabled } => {
                self.ensure_commercial_editable()?;
                let item = self.find(*item_id)?;
                if !item.is_top_level() {
                    return Err(DomainError::validation(
                        "group members take part in the system price through their group",
                    ));
                }
                if item.uses_system_price() == *enabled {
                    return Ok(vec![]);
                }
                Ok(vec![DocumentEvent::UsesSystemPriceChanged {
                    item_id: *item_id,
                    enabled: *enabled,
                }])
            }
            DocumentCommand::SetSerialNumber {
                item_id,
                serial_number,
            } => {
                self.ensure_not_closed()?;
                if self.find(*item_id)?.article().is_none() {
                    return Err(DomainError::validation("group headers carry no serial number"));
                }
                Ok(vec![DocumentEvent::SerialNumberChanged {
                    item_id: *item_id,
                    serial_number: serial_number.clone(),
                }])
            }
            DocumentCommand::SetNotes { item_id, notes } => {
                self.ensure_not_closed()?;
                self.find(*item_id)?;
                Ok(vec![DocumentEvent::NotesChanged {
                    item_id: *item_id,
                    notes: notes.clone(),
                }])
            }
            DocumentCommand::RemoveItem { item_id } => {
                self.ensure_commercial_editable()?;
                let item = self.find(*item_id)?;
                let item_ids = match item.header() {
                    Some(header) => self
                        .items
                        .iter()
                        .filter(|other| other.group_id() == Some(header.group_id))
                        .map(|other| other.id)
                        .collect(),
                    None => vec![*item_id],
                };
                Ok(vec![DocumentEvent::ItemsRemoved { item_ids }])
            }
            DocumentCommand::MoveUp { item_id } => self.handle_move(*item_id, Direction::Up),
            DocumentCommand::MoveDown { item_id } => self.handle_move(*item_id, Direction::Down),
            DocumentCommand::SendQuotation { number } => {
                if self.kind() != DocumentKind::Quotation {
                    return Err(DomainError::precondition("only quotations can be sent"));
                }
                self.handle_issue(number, DocumentStatus::Quotation(QuotationStatus::Sent))
            }
            DocumentCommand::ConfirmOrder { number } => {
                if self.kind() != DocumentKind::CustomerOrder {
                    return Err(DomainError::precondition("only customer orders can be confirmed"));
                }
                self.handle_issue(number, DocumentStatus::Order(OrderStatus::Confirmed))
            }
            DocumentCommand::Transition { to } => self.handle_transition(*to),
            DocumentCommand::Cancel { reason } => {
                let to = DocumentStatus::Order(OrderStatus::Cancelled);
                check_transition(self.status, to)?;
                Ok(vec![DocumentEvent::OrderCancelled {
                    from: self.status,
                    reason: reason.clone(),
                }])
            }
            DocumentCommand::RecordDelivery {
                sequence,
                item_ids,
                serial_numbers,
            } => self.handle_record_delivery(*sequence, item_ids, serial_numbers),
            DocumentCommand::RecordInvoice { sequence, item_ids } => {
                self.handle_record_invoice(*sequence, item_ids)
            }
            DocumentCommand::ReleaseInvoice { sequence } => self.handle_release_invoice(*sequence),
        }
    }
}

impl Document {
    fn item_mut(&mut self, id: LineItemId) -> Option<&mut LineItem> {
        self.items.iter_mut().find(|item| item.id == id)
    }

    fn find(&self, id: LineItemId) -> DomainResult<&LineItem> {
        self.item(id)
            .ok_or_else(|| DomainError::not_found(format!("line item {id}")))
    }

    fn find_header(&self, id: LineItemId) -> DomainResult<&LineItem> {
        let item = self.find(id)?;
        if !item.is_group_header() {
            return Err(DomainError::validation(format!(
                "position {} is not a group header",
                item.display_position
            )));
        }
        Ok(item)
    }

    fn ensure_commercial_editable(&self) -> DomainResult<()> {
        if self.status.is_editable() {
            Ok(())
        } else {
            Err(DomainError::precondition(format!(
                "commercial terms are frozen ({})",
                self.status
            )))
        }
    }

    fn ensure_not_closed(&self) -> DomainResult<()> {
        if self.status.is_closed() {
            Err(DomainError::precondition(format!(
                "document is closed ({})",
                self.status
            )))
        } else {
            Ok(())
        }
    }

    fn has_header(&self, group_id: GroupId) -> bool {
        self.items
            .iter()
            .any(|item| item.header().is_some_and(|h| h.group_id == group_id))
    }

    fn handle_add_item(&self, item_id: LineItemId, line: &NewLine) -> DomainResult<Vec<DocumentEvent>> {
        let appending_to_order = match self.status {
            _ if self.status.is_editable() => false,
            DocumentStatus::Order(status) if status.allows_append() => true,
            _ => {
                return Err(DomainError::precondition(format!(
                    "items can no longer be added ({})",
                    self.status
                )));
            }
        };

        if self.item(item_id).is_some() {
            return Err(DomainError::validation(format!("line item {item_id} already exists")));
        }

        let index = match line {
            NewLine::Standalone { article, .. } => {
                article.validate()?;
                self.items.len()
            }
            NewLine::GroupHeader {
                group_id, tax_rate, ..
            } => {
                ensure_non_negative(*tax_rate, "tax rate")?;
                if self.items.iter().any(|item| item.group_id() == Some(*group_id)) {
                    return Err(DomainError::validation(format!("group {group_id} already exists")));
                }
                self.items.len()
            }
            NewLine::GroupMember { group_id, article } => {
                article.validate()?;
                if !self.has_header(*group_id) {
                    return Err(DomainError::validation(format!("unknown group {group_id}")));
                }
                // After the last item of the group, keeping the block contiguous.
                self.items
                    .iter()
                    .rposition(|item| item.group_id() == Some(*group_id))
                    .map_or(self.items.len(), |last| last + 1)
            }
        };

        let mut item = line.clone().into_line_item(item_id);
        if appending_to_order && item.uses_system_price() {
            return Err(DomainError::precondition(
                "the system price is frozen; appended items cannot take part in it",
            ));
        }
        // Fulfillment state is written only by delivery notes and invoices.
        if let Some(article) = item.article_mut() {
            article.fulfillment = Fulfillment {
                quantity_ordered: if appending_to_order {
                    article.quantity
                } else {
                    Decimal::ZERO
                },
                ..Fulfillment::default()
            };
        }

        Ok(vec![DocumentEvent::ItemAdded { index, item }])
    }

    fn handle_update_article(
        &self,
        item_id: LineItemId,
        patch: &ArticlePatch,
    ) -> DomainResult<Vec<DocumentEvent>> {
        if patch.is_commercial() {
            self.ensure_commercial_editable()?;
        } else {
            self.ensure_not_closed()?;
        }

        let item = self.find(item_id)?;
        let Some(article) = item.article() else {
            return Err(DomainError::validation(format!(
                "group header {} has no article terms",
                item.display_position
            )));
        };
        if patch.is_empty() {
            return Ok(vec![]);
        }

        let mut updated = article.clone();
        patch.apply_to(&mut updated);
        updated.validate()?;

        Ok(vec![DocumentEvent::ArticleUpdated {
            item_id,
            patch: patch.clone(),
        }])
    }

    fn handle_move(&self, item_id: LineItemId, direction: Direction) -> DomainResult<Vec<DocumentEvent>> {
        self.ensure_commercial_editable()?;
        self.find(item_id)?;

        let mut items = self.items.clone();
        if !move_item(&mut items, item_id, direction) {
            return Ok(vec![]);
        }
        Ok(vec![DocumentEvent::ItemsReordered {
            order: items.iter().map(|item| item.id).collect(),
        }])
    }

    fn ensure_ready_to_issue(&self) -> DomainResult<()> {
        if self.customer.is_none() {
            return Err(DomainError::precondition("no customer"));
        }
        if self.items.is_empty() {
            return Err(DomainError::precondition("no items"));
        }
        Ok(())
    }

    fn handle_issue(&self, number: &str, to: DocumentStatus) -> DomainResult<Vec<DocumentEvent>> {
        check_transition(self.status, to)?;
        self.ensure_ready_to_issue()?;
        if number.trim().is_empty() {
            return Err(DomainError::validation("issued number must not be empty"));
        }
        Ok(vec![DocumentEvent::StatusChanged {
            from: self.status,
            to,
            number: Some(number.trim().to_string()),
        }])
    }

    fn handle_transition(&self, to: DocumentStatus) -> DomainResult<Vec<DocumentEvent>> {
        check_transition(self.status, to)?;
        match to {
            DocumentStatus::Order(OrderStatus::Confirmed) => {
                return Err(DomainError::precondition(
                    "confirming an order requires an order number",
                ));
            }
            DocumentStatus::Quotation(QuotationStatus::Sent) => {
                return Err(DomainError::precondition(
                    "sending a quotation requires a quotation number",
                ));
            }
            DocumentStatus::Quotation(QuotationStatus::Ordered) => {
                return Err(DomainError::precondition(
                    "a quotation is ordered by deriving an order from it",
                ));
            }
            DocumentStatus::Order(OrderStatus::Delivered)
                if !self.is_fully_fulfilled(FulfillmentKind::Delivery) =>
            {
                return Err(DomainError::precondition("not all items have been delivered"));
            }
            DocumentStatus::Order(OrderStatus::Invoiced)
                if !self.is_fully_fulfilled(FulfillmentKind::Invoice) =>
            {
                return Err(DomainError::precondition("not all items have been invoiced"));
            }
            DocumentStatus::Order(OrderStatus::Cancelled) => {
                return Ok(vec![DocumentEvent::OrderCancelled {
                    from: self.status,
                    reason: None,
                }]);
            }
            _ => {}
        }
        Ok(vec![DocumentEvent::StatusChanged {
            from: self.status,
            to,
            number: None,
        }])
    }

    fn order_status_for(&self, kind: FulfillmentKind) -> DomainResult<OrderStatus> {
        let Some(status) = self.status.order() else {
            return Err(DomainError::precondition(
                "quotations cannot be delivered or invoiced",
            ));
        };
        let allowed = match kind {
            FulfillmentKind::Delivery => status.allows_delivery(),
            FulfillmentKind::Invoice => status.allows_invoicing(),
        };
        if !allowed {
            let what = match kind {
                FulfillmentKind::Delivery => "delivery notes",
                FulfillmentKind::Invoice => "invoices",
            };
            return Err(DomainError::precondition(format!(
                "{what} cannot be created for an order in status {status:?}"
            )));
        }
        Ok(status)
    }

    fn handle_record_delivery(
        &self,
        sequence: u32,
        item_ids: &[LineItemId],
        serial_numbers: &BTreeMap<LineItemId, String>,
    ) -> DomainResult<Vec<DocumentEvent>> {
        let status = self.check_fulfillment(FulfillmentKind::Delivery, item_ids)?;
        if let Some(stray) = serial_numbers.keys().find(|id| !item_ids.contains(id)) {
            return Err(DomainError::validation(format!(
                "serial number given for item {stray} which is not being delivered"
            )));
        }

        let mut events = vec![DocumentEvent::ItemsDelivered {
            sequence,
            item_ids: item_ids.to_vec(),
            serial_numbers: serial_numbers.clone(),
        }];
        if fulfillment::all_fulfilled_with(&self.items, FulfillmentKind::Delivery, item_ids) {
            let delivered = DocumentStatus::Order(OrderStatus::Delivered);
            events.push(DocumentEvent::StatusChanged {
                from: DocumentStatus::Order(status),
                to: delivered,
                number: None,
            });
            if self.is_fully_fulfilled(FulfillmentKind::Invoice) {
                events.push(DocumentEvent::StatusChanged {
                    from: delivered,
                    to: DocumentStatus::Order(OrderStatus::Invoiced),
                    number: None,
                });
            }
        }
        Ok(events)
    }

    fn handle_record_invoice(
        &self,
        sequence: u32,
        item_ids: &[LineItemId],
    ) -> DomainResult<Vec<DocumentEvent>> {
        let status = self.check_fulfillment(FulfillmentKind::Invoice, item_ids)?;

        let mut events = vec![DocumentEvent::ItemsInvoiced {
            sequence,
            item_ids: item_ids.to_vec(),
        }];
        if status == OrderStatus::Delivered
            && fulfillment::all_fulfilled_with(&self.items, FulfillmentKind::Invoice, item_ids)
        {
            events.push(DocumentEvent::StatusChanged {
                from: DocumentStatus::Order(status),
                to: DocumentStatus::Order(OrderStatus::Invoiced),
                number: None,
            });
        }
        Ok(events)
    }

    fn handle_release_invoice(&self, sequence: u32) -> DomainResult<Vec<DocumentEvent>> {
        let Some(status) = self.status.order() else {
            return Err(DomainError::precondition("quotations carry no invoices"));
        };
        if !status.allows_invoice_release() {
            return Err(DomainError::precondition(format!(
                "invoices of an order in status {status:?} cannot be released"
            )));
        }
        let item_ids = fulfillment::items_with_sequence(&self.items, FulfillmentKind::Invoice, sequence);
        if item_ids.is_empty() {
            return Err(DomainError::not_found(format!("no items carry invoice #{sequence}")));
        }

        let mut events = vec![DocumentEvent::InvoiceReleased { sequence, item_ids }];
        if status == OrderStatus::Invoiced {
            events.push(DocumentEvent::StatusChanged {
                from: DocumentStatus::Order(status),
                to: DocumentStatus::Order(OrderStatus::Delivered),
                number: None,
            });
        }
        Ok(events)
    }
}

fn ensure_non_negative(value: Decimal, what: &str) -> DomainResult<()> {
    if value < Decimal::ZERO {
        return Err(DomainError::validation(format!("{what} must not be negative")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use orderflow_catalog::{InMemoryCatalog, ProductRecord};
    use rust_decimal_macros::dec;

    fn settings() -> EngineSettings {
        EngineSettings::default()
    }

    fn run(doc: &Document, command: DocumentCommand) -> Document {
        doc.execute(&command).unwrap()
    }

    fn add_article(doc: &Document, article: Article) -> (Document, LineItemId) {
        let item_id = LineItemId::new();
        let doc = run(
            doc,
            DocumentCommand::AddItem {
                item_id,
                line: NewLine::Standalone {
                    article,
                    uses_system_price: false,
                },
            },
        );
        (doc, item_id)
    }

    fn article(quantity: Decimal, unit_price: Decimal) -> Article {
        Article::new("article", quantity, unit_price, dec!(19))
    }

    /// Order with a customer and two items, still `created`.
    fn draft_order() -> (Document, LineItemId, LineItemId) {
        let doc = Document::new_order(DocumentId::new(), &settings());
        let doc = run(
            &doc,
            DocumentCommand::SetCustomer {
                customer: Some(CustomerId::new()),
            },
        );
        let (doc, a) = add_article(&doc, article(dec!(2), dec!(100)));
        let (doc, b) = add_article(&doc, article(dec!(1), dec!(50)));
        (doc, a, b)
    }

    fn confirmed_order() -> (Document, LineItemId, LineItemId) {
        let (doc, a, b) = draft_order();
        let doc = run(
            &doc,
            DocumentCommand::ConfirmOrder {
                number: "SO-2026-0001".into(),
            },
        );
        (doc, a, b)
    }

    fn deliver(ids: Vec<LineItemId>, sequence: u32) -> DocumentCommand {
        DocumentCommand::RecordDelivery {
            sequence,
            item_ids: ids,
            serial_numbers: BTreeMap::new(),
        }
    }

    #[test]
    fn new_documents_take_settings_defaults() {
        let doc = Document::new_quotation(DocumentId::new(), &settings());
        assert_eq!(doc.status(), DocumentStatus::Quotation(QuotationStatus::Draft));
        assert_eq!(doc.tax_rate(), dec!(19));
        assert!(doc.tax_enabled());
        assert_eq!(doc.version(), 0);
        assert_eq!(doc.totals().gross_total, Decimal::ZERO);
    }

    #[test]
    fn execute_leaves_the_original_untouched() {
        let (doc, _, _) = draft_order();
        let before = doc.clone();
        let (next, _) = add_article(&doc, article(dec!(1), dec!(10)));
        assert_eq!(doc, before);
        assert_eq!(next.items().len(), 3);
        assert_eq!(next.version(), doc.version() + 1);
    }

    #[test]
    fn items_are_numbered_and_totals_follow_edits() {
        let (doc, a, b) = draft_order();
        assert_eq!(doc.item(a).unwrap().display_position, "1");
        assert_eq!(doc.item(b).unwrap().display_position, "2");
        assert_eq!(doc.totals().net_total, dec!(250));

        let doc = run(
            &doc,
            DocumentCommand::UpdateArticle {
                item_id: a,
                patch: ArticlePatch {
                    discount_percent: Some(dec!(10)),
                    ..ArticlePatch::default()
                },
            },
        );
        assert_eq!(doc.item_pricing(a).unwrap().subtotal, dec!(180));
        assert_eq!(doc.totals().net_total, dec!(230));
        assert_eq!(doc.totals().tax, dec!(43.70));
    }

    #[test]
    fn group_members_are_kept_together_and_numbered_under_header() {
        let doc = Document::new_quotation(DocumentId::new(), &settings());
        let (doc, _) = add_article(&doc, article(dec!(1), dec!(10)));
        let group_id = GroupId::new();
        let header_id = LineItemId::new();
        let doc = run(
            &doc,
            DocumentCommand::AddItem {
                item_id: header_id,
                line: NewLine::GroupHeader {
                    group_id,
                    title: "Workstation".into(),
                    tax_rate: dec!(19),
                    uses_system_price: false,
                },
            },
        );
        let (doc, trailing) = add_article(&doc, article(dec!(1), dec!(5)));
        let member_id = LineItemId::new();
        let doc = run(
            &doc,
            DocumentCommand::AddItem {
                item_id: member_id,
                line: NewLine::GroupMember {
                    group_id,
                    article: article(dec!(1), dec!(300)),
                },
            },
        );

        let order: Vec<LineItemId> = doc.items().iter().map(|item| item.id).collect();
        assert_eq!(order[1], header_id);
        assert_eq!(order[2], member_id);
        assert_eq!(order[3], trailing);
        assert_eq!(doc.item(member_id).unwrap().display_position, "2.01");
        assert_eq!(doc.item(trailing).unwrap().display_position, "3");
        assert_eq!(doc.totals().net_total, dec!(315));

        let doc = run(&doc, DocumentCommand::RemoveItem { item_id: header_id });
        assert_eq!(doc.items().len(), 2);
        assert!(doc.item(member_id).is_none());
    }

    #[test]
    fn member_of_unknown_group_is_rejected() {
        let doc = Document::new_quotation(DocumentId::new(), &settings());
        let err = doc
            .execute(&DocumentCommand::AddItem {
                item_id: LineItemId::new(),
                line: NewLine::GroupMember {
                    group_id: GroupId::new(),
                    article: article(dec!(1), dec!(1)),
                },
            })
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn moving_first_item_up_changes_nothing() {
        let (doc, a, b) = draft_order();
        let same = run(&doc, DocumentCommand::MoveUp { item_id: a });
        assert_eq!(same, doc);

        let moved = run(&doc, DocumentCommand::MoveDown { item_id: a });
        assert_eq!(moved.items()[0].id, b);
        assert_eq!(moved.item(a).unwrap().display_position, "2");
    }

    #[test]
    fn system_price_is_allocated_across_flagged_items() {
        let doc = Document::new_quotation(DocumentId::new(), &settings());
        let item_id = LineItemId::new();
        let doc = run(
            &doc,
            DocumentCommand::AddItem {
                item_id,
                line: NewLine::Standalone {
                    article: article(dec!(2), dec!(10)).with_purchase_price(dec!(40)),
                    uses_system_price: true,
                },
            },
        );
        let doc = run(
            &doc,
            DocumentCommand::SetSystemPrice {
                system_price: Some(dec!(500)),
            },
        );
        assert_eq!(doc.totals().net_total, dec!(500));
        assert_eq!(doc.item(item_id).unwrap().article().unwrap().unit_price, dec!(250));

        let err = doc
            .execute(&DocumentCommand::SetSystemPrice {
                system_price: Some(dec!(-1)),
            })
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn confirming_requires_customer_and_items() {
        let doc = Document::new_order(DocumentId::new(), &settings());
        let confirm = DocumentCommand::ConfirmOrder {
            number: "SO-1".into(),
        };
        assert!(matches!(doc.execute(&confirm), Err(DomainError::Precondition(_))));

        let doc = run(
            &doc,
            DocumentCommand::SetCustomer {
                customer: Some(CustomerId::new()),
            },
        );
        assert!(matches!(doc.execute(&confirm), Err(DomainError::Precondition(_))));
    }

    #[test]
    fn confirmation_freezes_commercial_terms_and_sets_ordered_quantities() {
        let (doc, a, _) = confirmed_order();
        assert_eq!(doc.number(), Some("SO-2026-0001"));
        assert_eq!(
            doc.item(a).unwrap().fulfillment().unwrap().quantity_ordered,
            dec!(2)
        );

        let err = doc
            .execute(&DocumentCommand::UpdateArticle {
                item_id: a,
                patch: ArticlePatch {
                    unit_price: Some(dec!(1)),
                    ..ArticlePatch::default()
                },
            })
            .unwrap_err();
        assert!(matches!(err, DomainError::Precondition(_)));
        assert!(doc.execute(&DocumentCommand::RemoveItem { item_id: a }).is_err());

        // Non-commercial fields stay editable.
        let doc = run(
            &doc,
            DocumentCommand::SetNotes {
                item_id: a,
                notes: Some("deliver to gate 3".into()),
            },
        );
        assert_eq!(
            doc.item(a).unwrap().article().unwrap().notes.as_deref(),
            Some("deliver to gate 3")
        );
    }

    #[test]
    fn items_appended_after_confirmation_are_ordered() {
        let (doc, _, _) = confirmed_order();
        let (doc, added) = add_article(&doc, article(dec!(3), dec!(7)));
        let fulfillment = doc.item(added).unwrap().fulfillment().unwrap();
        assert_eq!(fulfillment.quantity_ordered, dec!(3));
        assert!(fulfillment.is_open(FulfillmentKind::Delivery));
    }

    #[test]
    fn added_items_start_unfulfilled() {
        let (doc, _, _) = draft_order();
        let mut preset = article(dec!(1), dec!(10));
        preset.fulfillment = Fulfillment {
            quantity_ordered: dec!(1),
            quantity_delivered: dec!(500),
            quantity_invoiced: dec!(1),
            delivery_note_sequence: Some(99),
            invoice_sequence: Some(7),
        };
        let (doc, added) = add_article(&doc, preset.clone());
        assert_eq!(doc.item(added).unwrap().fulfillment(), Some(&Fulfillment::default()));

        let doc = run(
            &doc,
            DocumentCommand::ConfirmOrder {
                number: "SO-1".into(),
            },
        );
        let fulfillment = doc.item(added).unwrap().fulfillment().unwrap();
        assert_eq!(fulfillment.quantity_ordered, dec!(1));
        assert_eq!(fulfillment.quantity_delivered, Decimal::ZERO);
        assert!(fulfillment.is_open(FulfillmentKind::Delivery));

        // Appending to a confirmed order resets the state just the same.
        let (doc, appended) = add_article(&doc, preset);
        let fulfillment = doc.item(appended).unwrap().fulfillment().unwrap();
        assert_eq!(fulfillment.quantity_ordered, dec!(1));
        assert!(fulfillment.is_open(FulfillmentKind::Invoice));
        assert!(fulfillment.is_open(FulfillmentKind::Delivery));
    }

    #[test]
    fn releasing_an_invoice_reopens_items_and_steps_back_to_delivered() {
        let (doc, a, b) = confirmed_order();
        let doc = run(&doc, deliver(vec![a, b], 1));
        let doc = run(
            &doc,
            DocumentCommand::RecordInvoice {
                sequence: 3,
                item_ids: vec![a, b],
            },
        );
        assert_eq!(doc.status(), DocumentStatus::Order(OrderStatus::Invoiced));

        let doc = run(&doc, DocumentCommand::ReleaseInvoice { sequence: 3 });
        assert_eq!(doc.status(), DocumentStatus::Order(OrderStatus::Delivered));
        assert_eq!(doc.open_items(FulfillmentKind::Invoice), vec![a, b]);
        assert!(doc.has_no_invoices());

        assert!(matches!(
            doc.execute(&DocumentCommand::ReleaseInvoice { sequence: 3 }),
            Err(DomainError::NotFound(_))
        ));
        let doc = run(
            &doc,
            DocumentCommand::RecordInvoice {
                sequence: 4,
                item_ids: vec![a, b],
            },
        );
        assert_eq!(doc.status(), DocumentStatus::Order(OrderStatus::Invoiced));
    }

    #[test]
    fn created_orders_cannot_be_delivered_or_invoiced() {
        let (doc, a, _) = draft_order();
        assert!(matches!(
            doc.execute(&deliver(vec![a], 1)),
            Err(DomainError::Precondition(_))
        ));
        assert!(matches!(
            doc.execute(&DocumentCommand::RecordInvoice {
                sequence: 1,
                item_ids: vec![a],
            }),
            Err(DomainError::Precondition(_))
        ));
    }

    #[test]
    fn second_delivery_of_same_item_conflicts() {
        let (doc, a, _) = confirmed_order();
        let doc = run(&doc, deliver(vec![a], 1));
        let err = doc.execute(&deliver(vec![a], 2)).unwrap_err();
        assert!(matches!(err, DomainError::FulfillmentConflict(_)));
        assert!(err.requires_refresh());
        assert_eq!(
            doc.item(a).unwrap().fulfillment().unwrap().delivery_note_sequence,
            Some(1)
        );
    }

    #[test]
    fn full_delivery_then_full_invoice_advances_status() {
        let (doc, a, b) = confirmed_order();
        let doc = run(&doc, deliver(vec![a], 1));
        assert_eq!(doc.status(), DocumentStatus::Order(OrderStatus::Confirmed));

        let doc = run(&doc, deliver(vec![b], 2));
        assert_eq!(doc.status(), DocumentStatus::Order(OrderStatus::Delivered));

        let doc = run(
            &doc,
            DocumentCommand::RecordInvoice {
                sequence: 1,
                item_ids: vec![a, b],
            },
        );
        assert_eq!(doc.status(), DocumentStatus::Order(OrderStatus::Invoiced));
        assert!(doc.open_items(FulfillmentKind::Invoice).is_empty());
    }

    #[test]
    fn invoicing_before_delivery_completes_on_last_delivery() {
        let (doc, a, b) = confirmed_order();
        let doc = run(
            &doc,
            DocumentCommand::RecordInvoice {
                sequence: 1,
                item_ids: vec![a, b],
            },
        );
        assert_eq!(doc.status(), DocumentStatus::Order(OrderStatus::Confirmed));
        let doc = run(&doc, deliver(vec![a, b], 1));
        assert_eq!(doc.status(), DocumentStatus::Order(OrderStatus::Invoiced));
    }

    #[test]
    fn delivery_records_serial_numbers() {
        let (doc, a, b) = confirmed_order();
        let doc = run(
            &doc,
            DocumentCommand::RecordDelivery {
                sequence: 1,
                item_ids: vec![a],
                serial_numbers: BTreeMap::from([(a, "SN-42".to_string())]),
            },
        );
        assert_eq!(
            doc.item(a).unwrap().article().unwrap().serial_number.as_deref(),
            Some("SN-42")
        );

        let err = doc
            .execute(&DocumentCommand::RecordDelivery {
                sequence: 2,
                item_ids: vec![b],
                serial_numbers: BTreeMap::from([(a, "SN-43".to_string())]),
            })
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn explicit_transitions_follow_the_graph() {
        let (doc, _, _) = confirmed_order();
        let doc = run(
            &doc,
            DocumentCommand::Transition {
                to: DocumentStatus::Order(OrderStatus::InProduction),
            },
        );
        let err = doc
            .execute(&DocumentCommand::Transition {
                to: DocumentStatus::Order(OrderStatus::Delivered),
            })
            .unwrap_err();
        assert!(matches!(err, DomainError::Precondition(_)));

        let err = doc
            .execute(&DocumentCommand::Transition {
                to: DocumentStatus::Order(OrderStatus::Paid),
            })
            .unwrap_err();
        assert!(matches!(err, DomainError::Precondition(_)));

        let cancelled = run(&doc, DocumentCommand::Cancel { reason: None });
        assert_eq!(cancelled.status(), DocumentStatus::Order(OrderStatus::Cancelled));
        assert!(cancelled.execute(&DocumentCommand::Cancel { reason: None }).is_err());
    }

    #[test]
    fn derive_order_copies_items_and_closes_quotation() {
        let doc = Document::new_quotation(DocumentId::new(), &settings());
        let doc = run(
            &doc,
            DocumentCommand::SetCustomer {
                customer: Some(CustomerId::new()),
            },
        );
        let (doc, original) = add_article(&doc, article(dec!(4), dec!(25)));

        assert!(doc.derive_order(DocumentId::new()).is_err());

        let doc = run(
            &doc,
            DocumentCommand::SendQuotation {
                number: "QT-2026-0007".into(),
            },
        );
        let order_id = DocumentId::new();
        let (quotation, order) = doc.derive_order(order_id).unwrap();

        assert_eq!(quotation.status(), DocumentStatus::Quotation(QuotationStatus::Ordered));
        assert!(quotation.derive_order(DocumentId::new()).is_err());
        assert_eq!(order.id(), &order_id);
        assert_eq!(order.status(), DocumentStatus::Order(OrderStatus::Created));
        assert_eq!(order.source_quotation(), Some(*doc.id()));
        assert_eq!(order.customer(), doc.customer());
        assert_eq!(order.items().len(), 1);
        assert_ne!(order.items()[0].id, original);
        assert_eq!(order.totals(), doc.totals());
    }

    #[test]
    fn catalog_products_seed_articles() {
        let mut catalog = InMemoryCatalog::new();
        let product: ProductRef = "service:install".parse().unwrap();
        catalog.insert(
            product.clone(),
            ProductRecord::Service {
                description: "On-site installation".into(),
                hourly_rate: dec!(95),
                cost_rate: dec!(55),
            },
        );

        let doc = Document::new_quotation(DocumentId::new(), &settings());
        let article = doc.article_from_catalog(&catalog, &product, dec!(3)).unwrap();
        assert_eq!(article.unit_price, dec!(95));
        assert_eq!(article.purchase_price, dec!(55));
        assert_eq!(article.tax_rate, dec!(19));
        assert_eq!(article.product.as_ref(), Some(&product));

        let missing: ProductRef = "service:cleaning".parse().unwrap();
        assert!(matches!(
            doc.article_from_catalog(&catalog, &missing, dec!(1)),
            Err(DomainError::NotFound(_))
        ));
    }

    #[test]
    fn stale_copies_do_not_match_recorded_deliveries() {
        let (stale, a, _) = confirmed_order();
        let stored = run(&stale, deliver(vec![a], 1));

        assert!(stored.ensure_fulfillment_matches(Some(&stored)).is_ok());
        let err = stale.ensure_fulfillment_matches(Some(&stored)).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert!(err.requires_refresh());

        // A brand-new document may not arrive already delivered.
        assert!(matches!(
            stored.ensure_fulfillment_matches(None),
            Err(DomainError::Conflict(_))
        ));
        assert!(stale.ensure_fulfillment_matches(None).is_ok());

        // Confirmation only seeds ordered quantities, which is not progress.
        let (draft, _, _) = draft_order();
        let confirmed = run(
            &draft,
            DocumentCommand::ConfirmOrder {
                number: "SO-2".into(),
            },
        );
        assert!(confirmed.ensure_fulfillment_matches(Some(&draft)).is_ok());
    }

    #[test]
    fn json_round_trip_preserves_document() {
        let (doc, _, _) = confirmed_order();
        let json = serde_json::to_string(&doc).unwrap();
        let back: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(back.recalculated(), doc);
    }
}
