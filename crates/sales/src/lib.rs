//! Sales domain module: the transaction ledger, payments and the shopping cart.
//!
//! Pure domain logic (no IO, no HTTP, no storage). The store commits what these
//! types produce inside one unit of work.

pub mod cart;
pub mod payment;
pub mod transaction;

pub use cart::{Cart, CartId, CartItem};
pub use payment::{Payment, PaymentId, PaymentType};
pub use transaction::{Transaction, TransactionId, TransactionItem, TransactionType};
