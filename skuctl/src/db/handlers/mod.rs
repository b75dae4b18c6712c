//! Repository implementations for database access.
//!
//! Each repository borrows a caller-owned SQLx connection or transaction
//! for the duration of a call scope. Composing several repository calls
//! inside one transaction is the orchestrator's job; nothing here begins or
//! commits transactions.
//!
//! # Available Repositories
//!
//! - [`Orders`]: Order rows and status/metadata/expiry mutations
//! - [`OrderItems`]: Order item reads and bulk insertion
//! - [`Issuers`]: Credential issuer lookup and creation
//! - [`OrderPayHistory`]: Append-only payment history
//! - [`Tlv2`]: Time-limited v2 credential submissions and dedup checks

pub mod credentials;
pub mod issuers;
pub mod order_items;
pub mod orders;
pub mod pay_history;

pub use credentials::Tlv2;
pub use issuers::Issuers;
pub use order_items::OrderItems;
pub use orders::Orders;
pub use pay_history::OrderPayHistory;
