//! Database models for time-limited v2 credential submissions.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::types::{IssuerId, OrderId, OrderItemId, RequestId};

/// Request to persist one signed batch of time-limited v2 credentials.
#[derive(Debug, Clone)]
pub struct CredBatchCreateDBRequest {
    pub order_id: OrderId,
    pub item_id: OrderItemId,
    pub issuer_id: IssuerId,
    pub request_id: RequestId,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub blinded_creds: Vec<String>,
    pub signed_creds: Vec<String>,
    pub batch_proof: String,
    pub public_key: String,
}

/// Outcome of the anti-double-issuance check for one submission.
///
/// `submitted` and `req_id_mismatch` are not mutually exclusive in theory;
/// callers must reject on mismatch before honoring `submitted`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow)]
pub struct CredSubmissionReport {
    /// A stored batch already has this exact first blinded credential.
    pub submitted: bool,
    /// The request id is already bound to a batch with a different first
    /// blinded credential: the client reused a request id across batches.
    pub req_id_mismatch: bool,
}
