//! Infrastructure layer: persistence, payment gateway, configuration and the
//! storefront services built on them.

pub mod checkout;
pub mod config;
pub mod identity;
pub mod payment;
pub mod store;
pub mod storefront;

pub use checkout::{CheckoutError, CheckoutOutcome, CheckoutService};
pub use config::{AppConfig, ConfigError};
pub use identity::{IdentityError, IdentityService, IssuedToken, Profile, Registration};
pub use payment::{
    CheckoutLine, CheckoutSession, InMemoryPaymentGateway, PaymentError, PaymentGateway, StripeCheckoutGateway,
};
pub use store::{
    DynRetailStore, InMemoryRetailStore, LedgerCommit, PostgresRetailStore, RetailStore, StockedProduct,
    StoreError, StoreResult,
};
pub use storefront::{CartView, DepartmentPage, StorefrontService};
