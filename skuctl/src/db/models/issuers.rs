//! Database models for credential issuers.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::types::IssuerId;

/// Database model for a credential issuer.
///
/// One issuer exists per (merchant_id, public_key) pair. It is created on
/// first encounter and looked up afterwards; the signing key itself lives
/// with the external credential signer.
#[derive(Debug, Clone, FromRow)]
pub struct Issuer {
    pub id: IssuerId,
    pub created_at: DateTime<Utc>,
    pub merchant_id: String,
    pub public_key: String,
}

/// Request to create a new issuer.
#[derive(Debug, Clone)]
pub struct IssuerCreateDBRequest {
    pub merchant_id: String,
    pub public_key: String,
}
