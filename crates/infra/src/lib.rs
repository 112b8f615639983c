//! Infrastructure layer: in-memory implementations of the persistence and
//! number-sequence collaborators.

pub mod document_store;
pub mod number_sequence;

mod integration_tests;

pub use document_store::InMemoryDocumentStore;
pub use number_sequence::InMemoryNumberSequence;
