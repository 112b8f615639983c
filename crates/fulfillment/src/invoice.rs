use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use orderflow_core::{
    Aggregate, AggregateRoot, DocumentId, DomainError, DomainEvent, DomainResult, InvoiceId,
    LineItemId, percent_of, round_money,
};
use orderflow_sales::{Document, DocumentCommand, FulfillmentKind};

use crate::store::IssuedNumber;

/// What the caller selects for a new invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRequest {
    pub item_ids: Vec<LineItemId>,
    pub issued_on: NaiveDate,
}

/// Invoice status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Open,
    Paid,
    Void,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub item_id: LineItemId,
    pub position: String,
    pub description: String,
    pub quantity: Decimal,
    /// Net amount charged for the whole line.
    pub net_amount: Decimal,
}

/// Aggregate root: Invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    id: InvoiceId,
    document_id: DocumentId,
    sequence: u32,
    number: String,
    issued_on: NaiveDate,
    due_on: NaiveDate,
    lines: Vec<InvoiceLine>,
    delivery_cost: Decimal,
    net_total: Decimal,
    tax: Decimal,
    gross_total: Decimal,
    total_paid: Decimal,
    status: InvoiceStatus,
    version: u64,
}

impl Invoice {
    pub fn document_id(&self) -> DocumentId {
        self.document_id
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn issued_on(&self) -> NaiveDate {
        self.issued_on
    }

    pub fn due_on(&self) -> NaiveDate {
        self.due_on
    }

    pub fn lines(&self) -> &[InvoiceLine] {
        &self.lines
    }

    /// Delivery cost charged on this invoice (only the first of an order).
    pub fn delivery_cost(&self) -> Decimal {
        self.delivery_cost
    }

    /// Net amount including delivery cost.
    pub fn net_total(&self) -> Decimal {
        self.net_total
    }

    pub fn tax(&self) -> Decimal {
        self.tax
    }

    pub fn gross_total(&self) -> Decimal {
        self.gross_total
    }

    pub fn total_paid(&self) -> Decimal {
        self.total_paid
    }

    pub fn outstanding_amount(&self) -> Decimal {
        (self.gross_total - self.total_paid).max(Decimal::ZERO)
    }

    pub fn status(&self) -> InvoiceStatus {
        self.status
    }

    /// Cannot pay a void or fully paid invoice.
    pub fn can_accept_payment(&self) -> bool {
        self.status == InvoiceStatus::Open && self.outstanding_amount() > Decimal::ZERO
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status == InvoiceStatus::Open && today > self.due_on
    }
}

impl AggregateRoot for Invoice {
    type Id = InvoiceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum InvoiceCommand {
    RegisterPayment { amount: Decimal, paid_on: NaiveDate },
    Void { reason: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum InvoiceEvent {
    PaymentRegistered {
        amount: Decimal,
        paid_on: NaiveDate,
        new_total_paid: Decimal,
    },
    InvoiceVoided {
        reason: Option<String>,
    },
}

impl DomainEvent for InvoiceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InvoiceEvent::PaymentRegistered { .. } => "fulfillment.invoice.payment_registered",
            InvoiceEvent::InvoiceVoided { .. } => "fulfillment.invoice.voided",
        }
    }
}

impl Aggregate for Invoice {
    type Command = InvoiceCommand;
    type Event = InvoiceEvent;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InvoiceEvent::PaymentRegistered { new_total_paid, .. } => {
                self.total_paid = *new_total_paid;
                if self.total_paid >= self.gross_total {
                    self.status = InvoiceStatus::Paid;
                }
            }
            InvoiceEvent::InvoiceVoided { .. } => {
                self.status = InvoiceStatus::Void;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> DomainResult<Vec<Self::Event>> {
        match command {
            InvoiceCommand::RegisterPayment { amount, paid_on } => {
                self.handle_register_payment(*amount, *paid_on)
            }
            InvoiceCommand::Void { reason } => self.handle_void(reason),
        }
    }
}

impl Invoice {
    fn handle_register_payment(
        &self,
        amount: Decimal,
        paid_on: NaiveDate,
    ) -> DomainResult<Vec<InvoiceEvent>> {
        if !self.can_accept_payment() {
            return Err(DomainError::precondition(format!(
                "invoice {} is {:?} and accepts no payments",
                self.number, self.status
            )));
        }
        if amount <= Decimal::ZERO {
            return Err(DomainError::validation("payment amount must be positive"));
        }

        let new_total_paid = self.total_paid + amount;
        if new_total_paid > self.gross_total {
            return Err(DomainError::invariant("cannot overpay invoice"));
        }

        Ok(vec![InvoiceEvent::PaymentRegistered {
            amount,
            paid_on,
            new_total_paid,
        }])
    }

    fn handle_void(&self, reason: &Option<String>) -> DomainResult<Vec<InvoiceEvent>> {
        match self.status {
            InvoiceStatus::Void => Err(DomainError::conflict("invoice is already void")),
            InvoiceStatus::Paid => Err(DomainError::precondition("a paid invoice cannot be voided")),
            InvoiceStatus::Open if self.total_paid > Decimal::ZERO => Err(
                DomainError::precondition("an invoice with payments cannot be voided"),
            ),
            InvoiceStatus::Open => Ok(vec![InvoiceEvent::InvoiceVoided {
                reason: reason.clone(),
            }]),
        }
    }
}

/// Invoice the selected items of an order.
///
/// Each line is charged the item's net value as it counts towards the order:
/// standalone items their effective subtotal, group members their share of
/// the group price. The first invoice of an order also carries the delivery
/// cost. Fails without changing anything when the order cannot be invoiced
/// or any selected item is unknown, a group header, or already invoiced.
pub fn create_invoice(
    document: &Document,
    id: InvoiceId,
    number: IssuedNumber,
    request: &InvoiceRequest,
    payment_terms_days: u32,
) -> DomainResult<(Document, Invoice)> {
    let due_on = request
        .issued_on
        .checked_add_days(Days::new(u64::from(payment_terms_days)))
        .ok_or_else(|| DomainError::validation("due date out of range"))?;
    let first_invoice = document.has_no_invoices();
    let values = document.fulfillable_values();

    let updated = document.execute(&DocumentCommand::RecordInvoice {
        sequence: number.sequence,
        item_ids: request.item_ids.clone(),
    })?;

    let lines: Vec<InvoiceLine> = request
        .item_ids
        .iter()
        .filter_map(|item_id| updated.item(*item_id))
        .filter_map(|item| {
            item.article().map(|article| InvoiceLine {
                item_id: item.id,
                position: item.display_position.clone(),
                description: article.description.clone(),
                quantity: article.fulfillment.quantity_invoiced,
                net_amount: values.get(&item.id).copied().unwrap_or_default(),
            })
        })
        .collect();

    let delivery_cost = if first_invoice {
        document.delivery_cost()
    } else {
        Decimal::ZERO
    };
    let net_total = round_money(lines.iter().map(|line| line.net_amount).sum::<Decimal>() + delivery_cost);
    let tax = if document.tax_enabled() {
        round_money(percent_of(net_total, document.tax_rate()))
    } else {
        Decimal::ZERO
    };

    let invoice = Invoice {
        id,
        document_id: *document.id(),
        sequence: number.sequence,
        number: number.number,
        issued_on: request.issued_on,
        due_on,
        lines,
        delivery_cost,
        net_total,
        tax,
        gross_total: net_total + tax,
        total_paid: Decimal::ZERO,
        status: InvoiceStatus::Open,
        version: 0,
    };

    tracing::info!(
        document_id = %invoice.document_id,
        invoice = %invoice.number,
        gross_total = %invoice.gross_total,
        fully_invoiced = updated.is_fully_fulfilled(FulfillmentKind::Invoice),
        "invoice created"
    );
    Ok((updated, invoice))
}

/// Void an unpaid invoice and reopen its items on the order.
///
/// The document must be the order the invoice was created from.
pub fn void_invoice(
    document: &Document,
    invoice: &Invoice,
    reason: Option<String>,
) -> DomainResult<(Document, Invoice)> {
    if *document.id() != invoice.document_id {
        return Err(DomainError::validation(format!(
            "invoice {} does not belong to document {}",
            invoice.number,
            document.id()
        )));
    }
    let voided = invoice.execute(&InvoiceCommand::Void { reason })?;
    let updated = document.execute(&DocumentCommand::ReleaseInvoice {
        sequence: invoice.sequence,
    })?;

    tracing::info!(
        document_id = %invoice.document_id,
        invoice = %invoice.number,
        "invoice voided"
    );
    Ok((updated, voided))
}
