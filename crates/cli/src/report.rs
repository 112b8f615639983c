//! Printable summary of a document.

use rust_decimal::Decimal;
use serde::Serialize;

use orderflow_core::{AggregateRoot, DocumentId, round_money};
use orderflow_sales::{Document, DocumentStatus, DocumentTotals, FulfillmentKind, LineItem, LineKind};

#[derive(Debug, Serialize)]
pub struct LineReport {
    pub position: String,
    pub description: String,
    pub quantity: Option<Decimal>,
    pub subtotal: Decimal,
    pub margin: Decimal,
    pub margin_percent: Decimal,
    /// Members are shown but count only through their group header.
    pub counted: bool,
    pub delivered: Option<u32>,
    pub invoiced: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct DocumentReport {
    pub document_id: DocumentId,
    pub number: Option<String>,
    pub status: DocumentStatus,
    pub lines: Vec<LineReport>,
    pub totals: DocumentTotals,
    pub open_deliveries: usize,
    pub open_invoices: usize,
}

impl DocumentReport {
    pub fn new(document: &Document) -> Self {
        let lines = document
            .items()
            .iter()
            .filter_map(|item| {
                document
                    .item_pricing(item.id)
                    .map(|pricing| line_report(item, pricing))
            })
            .collect();

        Self {
            document_id: *document.id(),
            number: document.number().map(str::to_string),
            status: document.status(),
            lines,
            totals: document.totals(),
            open_deliveries: document.open_items(FulfillmentKind::Delivery).len(),
            open_invoices: document.open_items(FulfillmentKind::Invoice).len(),
        }
    }
}

fn line_report(item: &LineItem, pricing: orderflow_sales::LinePricing) -> LineReport {
    let description = match &item.kind {
        LineKind::GroupHeader(header) => header.title.clone(),
        LineKind::Standalone { article, .. } | LineKind::GroupMember { article, .. } => {
            article.description.clone()
        }
    };
    let fulfillment = item.fulfillment();
    LineReport {
        position: item.display_position.clone(),
        description,
        quantity: item.article().map(|article| article.quantity),
        subtotal: round_money(pricing.subtotal),
        margin: round_money(pricing.margin),
        margin_percent: pricing.margin_percent,
        counted: item.is_top_level(),
        delivered: fulfillment.and_then(|f| f.delivery_note_sequence),
        invoiced: fulfillment.and_then(|f| f.invoice_sequence),
    }
}
