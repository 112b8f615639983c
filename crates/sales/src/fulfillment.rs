//! Delivered/invoiced state of line items.
//!
//! A line item is delivered (or invoiced) as a whole, at most once, and the
//! sequence number of the delivery note (or invoice) that did it is recorded
//! on the item. Group headers never take part.

use std::collections::{BTreeMap, HashSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use orderflow_core::{DomainError, DomainResult, LineItemId};

use crate::line_item::{Fulfillment, LineItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentKind {
    Delivery,
    Invoice,
}

impl FulfillmentKind {
    fn noun(&self) -> &'static str {
        match self {
            FulfillmentKind::Delivery => "delivered",
            FulfillmentKind::Invoice => "invoiced",
        }
    }
}

impl Fulfillment {
    pub fn sequence(&self, kind: FulfillmentKind) -> Option<u32> {
        match kind {
            FulfillmentKind::Delivery => self.delivery_note_sequence,
            FulfillmentKind::Invoice => self.invoice_sequence,
        }
    }

    pub fn is_open(&self, kind: FulfillmentKind) -> bool {
        self.sequence(kind).is_none()
    }

    /// Same delivery and invoice progress. `quantity_ordered` is not compared.
    pub fn same_progress(&self, other: &Fulfillment) -> bool {
        self.delivery_note_sequence == other.delivery_note_sequence
            && self.invoice_sequence == other.invoice_sequence
            && self.quantity_delivered == other.quantity_delivered
            && self.quantity_invoiced == other.quantity_invoiced
    }
}

/// Eligible for a new delivery note / invoice.
pub fn is_open(item: &LineItem, kind: FulfillmentKind) -> bool {
    item.fulfillment().is_some_and(|f| f.is_open(kind))
}

pub fn open_items(items: &[LineItem], kind: FulfillmentKind) -> Vec<LineItemId> {
    items
        .iter()
        .filter(|item| is_open(item, kind))
        .map(|item| item.id)
        .collect()
}

/// True when the document has fulfillable items and none is still open.
pub fn all_fulfilled(items: &[LineItem], kind: FulfillmentKind) -> bool {
    let mut fulfillable = items.iter().filter(|item| item.fulfillment().is_some()).peekable();
    fulfillable.peek().is_some() && fulfillable.all(|item| !is_open(item, kind))
}

/// As [`all_fulfilled`], pretending `pending` were already fulfilled.
pub fn all_fulfilled_with(items: &[LineItem], kind: FulfillmentKind, pending: &[LineItemId]) -> bool {
    let mut fulfillable = items.iter().filter(|item| item.fulfillment().is_some()).peekable();
    fulfillable.peek().is_some()
        && fulfillable.all(|item| !is_open(item, kind) || pending.contains(&item.id))
}

/// Check that every id names a distinct, open, fulfillable item.
///
/// Nothing is changed; callers mark items only after this succeeds for the
/// whole set.
pub fn ensure_open(items: &[LineItem], ids: &[LineItemId], kind: FulfillmentKind) -> DomainResult<()> {
    if ids.is_empty() {
        return Err(DomainError::validation("no items selected"));
    }

    let mut seen = HashSet::with_capacity(ids.len());
    for id in ids {
        if !seen.insert(*id) {
            return Err(DomainError::validation(format!("item {id} selected twice")));
        }
        let item = items
            .iter()
            .find(|item| item.id == *id)
            .ok_or_else(|| DomainError::not_found(format!("line item {id}")))?;
        let fulfillment = item.fulfillment().ok_or_else(|| {
            DomainError::validation(format!(
                "group header {} cannot be {}",
                item.display_position,
                kind.noun()
            ))
        })?;
        if let Some(sequence) = fulfillment.sequence(kind) {
            return Err(DomainError::fulfillment_conflict(format!(
                "position {} was already {} (#{sequence})",
                item.display_position,
                kind.noun()
            )));
        }
    }
    Ok(())
}

/// Record a fulfillment on the given items. Call [`ensure_open`] first.
///
/// Delivery copies any serial number given for an item onto it.
pub fn mark(
    items: &mut [LineItem],
    ids: &[LineItemId],
    kind: FulfillmentKind,
    sequence: u32,
    serial_numbers: &BTreeMap<LineItemId, String>,
) {
    for item in items.iter_mut().filter(|item| ids.contains(&item.id)) {
        let id = item.id;
        let Some(article) = item.article_mut() else {
            continue;
        };
        let fulfillment = &mut article.fulfillment;
        match kind {
            FulfillmentKind::Delivery => {
                fulfillment.delivery_note_sequence = Some(sequence);
                fulfillment.quantity_delivered = fulfillment.quantity_ordered;
                if let Some(serial) = serial_numbers.get(&id) {
                    article.serial_number = Some(serial.clone());
                }
            }
            FulfillmentKind::Invoice => {
                fulfillment.invoice_sequence = Some(sequence);
                fulfillment.quantity_invoiced = fulfillment.quantity_ordered;
            }
        }
    }
}

/// Items whose delivery (or invoice) carries the given sequence number.
pub fn items_with_sequence(items: &[LineItem], kind: FulfillmentKind, sequence: u32) -> Vec<LineItemId> {
    items
        .iter()
        .filter(|item| item.fulfillment().and_then(|f| f.sequence(kind)) == Some(sequence))
        .map(|item| item.id)
        .collect()
}

/// Undo [`mark`] on the given items, e.g. when their invoice is voided.
pub fn release(items: &mut [LineItem], ids: &[LineItemId], kind: FulfillmentKind) {
    for article in items
        .iter_mut()
        .filter(|item| ids.contains(&item.id))
        .filter_map(LineItem::article_mut)
    {
        let fulfillment = &mut article.fulfillment;
        match kind {
            FulfillmentKind::Delivery => {
                fulfillment.delivery_note_sequence = None;
                fulfillment.quantity_delivered = Decimal::ZERO;
            }
            FulfillmentKind::Invoice => {
                fulfillment.invoice_sequence = None;
                fulfillment.quantity_invoiced = Decimal::ZERO;
            }
        }
    }
}
