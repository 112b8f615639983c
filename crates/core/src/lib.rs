//! `orderflow-core`: shared building blocks for the sales document engine.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod aggregate;
pub mod config;
pub mod error;
pub mod id;
pub mod money;

pub use aggregate::{Aggregate, AggregateRoot, DomainEvent, ExpectedVersion};
pub use config::{EngineSettings, NumberPrefixes};
pub use error::{DomainError, DomainResult};
pub use id::{CustomerId, DeliveryNoteId, DocumentId, GroupId, InvoiceId, LineItemId};
pub use money::{percent_of, ratio_percent, round_money};
