//! Status lifecycles of quotations and customer orders.
//!
//! ```text
//! order:      created → confirmed → in_production → delivered → invoiced → paid → completed
//!                            └──────────────────────────┘
//!             (any non-terminal state) → cancelled
//!
//! quotation:  draft → sent → active ⇄ expired
//!                       └──────┴──→ ordered
//! ```

use serde::{Deserialize, Serialize};

use orderflow_core::{DomainError, DomainResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Created,
    Confirmed,
    InProduction,
    Delivered,
    Invoiced,
    Paid,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, next) {
            (from, Cancelled) => !from.is_terminal(),
            (Created, Confirmed)
            | (Confirmed, InProduction)
            | (Confirmed, Delivered)
            | (InProduction, Delivered)
            | (Delivered, Invoiced)
            | (Invoiced, Paid)
            | (Paid, Completed) => true,
            _ => false,
        }
    }

    /// Delivery notes can be created.
    pub fn allows_delivery(&self) -> bool {
        matches!(self, OrderStatus::Confirmed | OrderStatus::InProduction)
    }

    /// Invoices can be created.
    pub fn allows_invoicing(&self) -> bool {
        matches!(
            self,
            OrderStatus::Confirmed | OrderStatus::InProduction | OrderStatus::Delivered
        )
    }

    /// Invoices may still be voided and their items billed again.
    pub fn allows_invoice_release(&self) -> bool {
        !matches!(
            self,
            OrderStatus::Created | OrderStatus::Paid | OrderStatus::Completed
        )
    }

    /// Items may still be appended after confirmation.
    pub fn allows_append(&self) -> bool {
        matches!(
            self,
            OrderStatus::Created | OrderStatus::Confirmed | OrderStatus::InProduction
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotationStatus {
    Draft,
    Sent,
    Active,
    Expired,
    Ordered,
}

impl QuotationStatus {
    pub fn can_transition_to(&self, next: QuotationStatus) -> bool {
        use QuotationStatus::*;
        matches!(
            (self, next),
            (Draft, Sent)
                | (Sent, Active)
                | (Sent, Expired)
                | (Sent, Ordered)
                | (Active, Expired)
                | (Active, Ordered)
                | (Expired, Active)
        )
    }

    /// An order can be derived from the quotation.
    pub fn allows_ordering(&self) -> bool {
        matches!(self, QuotationStatus::Sent | QuotationStatus::Active)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Quotation,
    CustomerOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "status", rename_all = "snake_case")]
pub enum DocumentStatus {
    Quotation(QuotationStatus),
    Order(OrderStatus),
}

impl DocumentStatus {
    pub fn kind(&self) -> DocumentKind {
        match self {
            DocumentStatus::Quotation(_) => DocumentKind::Quotation,
            DocumentStatus::Order(_) => DocumentKind::CustomerOrder,
        }
    }

    /// Commercial terms (prices, quantities, discounts) can still change.
    pub fn is_editable(&self) -> bool {
        matches!(
            self,
            DocumentStatus::Quotation(QuotationStatus::Draft)
                | DocumentStatus::Order(OrderStatus::Created)
        )
    }

    /// No edits at all, not even notes or serial numbers.
    pub fn is_closed(&self) -> bool {
        match self {
            DocumentStatus::Quotation(status) => *status == QuotationStatus::Ordered,
            DocumentStatus::Order(status) => status.is_terminal(),
        }
    }

    pub fn order(&self) -> Option<OrderStatus> {
        match self {
            DocumentStatus::Order(status) => Some(*status),
            DocumentStatus::Quotation(_) => None,
        }
    }

    pub fn quotation(&self) -> Option<QuotationStatus> {
        match self {
            DocumentStatus::Quotation(status) => Some(*status),
            DocumentStatus::Order(_) => None,
        }
    }
}

impl core::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DocumentStatus::Quotation(status) => write!(f, "quotation {status:?}"),
            DocumentStatus::Order(status) => write!(f, "order {status:?}"),
        }
    }
}

/// Check that `from → to` is an edge of the lifecycle graph.
pub fn check_transition(from: DocumentStatus, to: DocumentStatus) -> DomainResult<()> {
    let allowed = match (from, to) {
        (DocumentStatus::Order(from), DocumentStatus::Order(to)) => from.can_transition_to(to),
        (DocumentStatus::Quotation(from), DocumentStatus::Quotation(to)) => {
            from.can_transition_to(to)
        }
        _ => {
            return Err(DomainError::validation(format!(
                "{to} is not a status of a {:?}",
                from.kind()
            )));
        }
    };
    if allowed {
        Ok(())
    } else {
        Err(DomainError::precondition(format!(
            "cannot move from {from} to {to}"
        )))
    }
}
