use std::collections::HashMap;

use crate::product::{CatalogEntry, ProductRecord, ProductRef};

/// Catalog lookup collaborator.
///
/// Reads are idempotent. An unknown product yields `None`, never an error.
pub trait Catalog {
    fn lookup(&self, product: &ProductRef) -> Option<CatalogEntry>;
}

/// Catalog backed by a map. Intended for tests/dev.
#[derive(Debug, Default, Clone)]
pub struct InMemoryCatalog {
    records: HashMap<ProductRef, ProductRecord>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record. Returns the previous one, if any.
    pub fn insert(&mut self, product: ProductRef, record: ProductRecord) -> Option<ProductRecord> {
        if product.kind() != record.kind() {
            tracing::warn!(
                %product,
                record_kind = record.kind().as_str(),
                "product reference kind differs from record kind"
            );
        }
        self.records.insert(product, record)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Catalog for InMemoryCatalog {
    fn lookup(&self, product: &ProductRef) -> Option<CatalogEntry> {
        self.records.get(product).map(ProductRecord::normalize)
    }
}
