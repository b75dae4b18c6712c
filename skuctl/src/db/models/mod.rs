//! Database record structures matching table schemas.

pub mod credentials;
pub mod issuers;
pub mod orders;

pub use credentials::{CredBatchCreateDBRequest, CredSubmissionReport};
pub use issuers::{Issuer, IssuerCreateDBRequest};
pub use orders::{Order, OrderCreateDBRequest, OrderItem, OrderItemCreateDBRequest, OrderStatus};
