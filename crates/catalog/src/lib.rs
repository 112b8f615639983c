//! Product catalog boundary.
//!
//! Product records differ per product type; this crate normalizes them into
//! the uniform `{unit_price, purchase_price, description}` shape the sales
//! engine works with.

pub mod catalog;
pub mod product;

pub use catalog::{Catalog, InMemoryCatalog};
pub use product::{CatalogEntry, ProductKind, ProductRecord, ProductRef};
