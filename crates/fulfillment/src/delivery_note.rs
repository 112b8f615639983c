use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use orderflow_core::{Aggregate, AggregateRoot, DeliveryNoteId, DocumentId, DomainResult, LineItemId};
use orderflow_sales::{Document, DocumentCommand, FulfillmentKind};

use crate::store::IssuedNumber;

/// What the caller selects for a new delivery note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryRequest {
    pub item_ids: Vec<LineItemId>,
    /// Serial numbers entered while packing, copied onto the items.
    #[serde(default)]
    pub serial_numbers: BTreeMap<LineItemId, String>,
    pub issued_on: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryLine {
    pub item_id: LineItemId,
    pub position: String,
    pub description: String,
    pub quantity: Decimal,
    pub serial_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryNote {
    pub id: DeliveryNoteId,
    pub document_id: DocumentId,
    pub sequence: u32,
    pub number: String,
    pub issued_on: NaiveDate,
    pub lines: Vec<DeliveryLine>,
}

/// Deliver the selected items of an order.
///
/// Returns the updated order and the new delivery note. Fails without
/// changing anything when the order is not deliverable or any selected item
/// is unknown, a group header, or already delivered.
pub fn create_delivery_note(
    document: &Document,
    id: DeliveryNoteId,
    number: IssuedNumber,
    request: &DeliveryRequest,
) -> DomainResult<(Document, DeliveryNote)> {
    let updated = document.execute(&DocumentCommand::RecordDelivery {
        sequence: number.sequence,
        item_ids: request.item_ids.clone(),
        serial_numbers: request.serial_numbers.clone(),
    })?;

    let lines = request
        .item_ids
        .iter()
        .filter_map(|item_id| updated.item(*item_id))
        .filter_map(|item| {
            item.article().map(|article| DeliveryLine {
                item_id: item.id,
                position: item.display_position.clone(),
                description: article.description.clone(),
                quantity: article.fulfillment.quantity_delivered,
                serial_number: article.serial_number.clone(),
            })
        })
        .collect();

    let note = DeliveryNote {
        id,
        document_id: *document.id(),
        sequence: number.sequence,
        number: number.number,
        issued_on: request.issued_on,
        lines,
    };

    tracing::info!(
        document_id = %note.document_id,
        delivery_note = %note.number,
        items = note.lines.len(),
        fully_delivered = updated.is_fully_fulfilled(FulfillmentKind::Delivery),
        "delivery note created"
    );
    Ok((updated, note))
}
