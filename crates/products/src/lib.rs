//! Catalog domain module: departments and products.
//!
//! Pure records and validation (no IO, no HTTP, no storage). Stock levels live in
//! `rocktools-inventory`.

pub mod department;
pub mod product;

pub use department::{Department, DepartmentId};
pub use product::{Product, ProductDetails, ProductId};
