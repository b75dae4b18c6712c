//! Database models for orders and order items.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::postgres::types::PgInterval;

use crate::types::{OrderId, OrderItemId};

/// Order lifecycle status, stored as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Created, awaiting first payment
    Pending,
    /// Paid up for the current period
    Paid,
    /// Subscription ended
    Canceled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Canceled => "canceled",
        }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "canceled" => Ok(Self::Canceled),
            _ => Err(format!("Unknown order status: {}", s)),
        }
    }
}

/// Database model for an order.
#[derive(Debug, Clone, FromRow)]
pub struct Order {
    pub id: OrderId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub merchant_id: String,
    pub status: String,
    pub currency: String,
    pub total_price: Decimal,
    pub location: Option<String>,
    pub allowed_payment_methods: Vec<String>,
    pub metadata: Option<serde_json::Value>,
    pub valid_for: Option<PgInterval>,
    pub last_paid_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub trial_days: Option<i64>,
}

impl Order {
    /// Get the parsed lifecycle status.
    pub fn order_status(&self) -> OrderStatus {
        self.status.parse().unwrap_or(OrderStatus::Pending)
    }
}

/// Request to create a new order.
#[derive(Debug, Clone)]
pub struct OrderCreateDBRequest {
    pub merchant_id: String,
    pub status: OrderStatus,
    pub currency: String,
    pub location: Option<String>,
    pub total_price: Decimal,
    pub allowed_payment_methods: Vec<String>,
    pub valid_for: Option<PgInterval>,
}

/// Database model for an order item.
///
/// Immutable once created except via full re-insert.
#[derive(Debug, Clone, FromRow)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sku: String,
    pub currency: String,
    pub quantity: i32,
    pub price: Decimal,
    /// quantity × price, computed by the database at read time.
    pub subtotal: Decimal,
    pub location: Option<String>,
    pub description: Option<String>,
    pub credential_type: String,
    pub metadata: Option<serde_json::Value>,
    /// ISO 8601 period one issuance of this item is valid for.
    pub valid_for_iso: Option<String>,
    pub issuance_interval: Option<String>,
}

/// Request to insert an order item.
#[derive(Debug, Clone)]
pub struct OrderItemCreateDBRequest {
    pub order_id: OrderId,
    pub sku: String,
    pub currency: String,
    pub quantity: i32,
    pub price: Decimal,
    pub location: Option<String>,
    pub description: Option<String>,
    pub credential_type: String,
    pub metadata: Option<serde_json::Value>,
    pub valid_for: Option<PgInterval>,
    pub valid_for_iso: Option<String>,
    pub issuance_interval: Option<String>,
}
