//! Parties domain module: clients, employees and their addresses.
//!
//! Pure domain logic (no IO, no HTTP, no storage).

pub mod address;
pub mod person;

pub use address::{Address, AddressDetails, AddressId, AddressOwner};
pub use person::{Client, ClientId, Employee, EmployeeId, PersonName};
