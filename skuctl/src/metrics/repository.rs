//! Call-level metrics for repositories.
//!
//! [`Instrumented<R>`] decorates a repository with wall-clock duration and
//! outcome tracking per method, leaving inputs, outputs, and error values
//! untouched. The histogram vec is registered on a caller-supplied
//! registry; duplicate registration is the registry's concern, not this
//! module's.

use std::time::Instant;

use chrono::{DateTime, Utc};
use prometheus::{HistogramOpts, HistogramVec, Registry};

use crate::db::errors::Result;
use crate::db::handlers::{Issuers, OrderItems, OrderPayHistory, Orders, Tlv2};
use crate::db::models::credentials::{CredBatchCreateDBRequest, CredSubmissionReport};
use crate::db::models::issuers::{Issuer, IssuerCreateDBRequest};
use crate::db::models::orders::{Order, OrderCreateDBRequest, OrderItem, OrderItemCreateDBRequest, OrderStatus};
use crate::types::{OrderId, OrderItemId, RequestId};

/// Per-call repository metrics.
#[derive(Clone)]
pub struct RepositoryMetrics {
    calls: HistogramVec,
}

impl RepositoryMetrics {
    /// Register the call-duration histogram on `registry`.
    pub fn new(registry: &Registry) -> std::result::Result<Self, prometheus::Error> {
        let calls = HistogramVec::new(
            HistogramOpts::new(
                "repository_call_duration_seconds",
                "Duration of repository calls by method and outcome",
            ),
            &["repository", "method", "outcome"],
        )?;

        registry.register(Box::new(calls.clone()))?;

        Ok(Self { calls })
    }

    fn observe(&self, repository: &str, method: &str, ok: bool, started: Instant) {
        let outcome = if ok { "ok" } else { "error" };

        self.calls
            .with_label_values(&[repository, method, outcome])
            .observe(started.elapsed().as_secs_f64());
    }
}

/// A repository decorated with per-method call metrics.
///
/// Delegates every method to the wrapped repository, recording duration and
/// `ok`/`error` outcome under the instance name given at construction.
pub struct Instrumented<R> {
    inner: R,
    name: &'static str,
    metrics: RepositoryMetrics,
}

impl<R> Instrumented<R> {
    pub fn new(inner: R, name: &'static str, metrics: RepositoryMetrics) -> Self {
        Self { inner, name, metrics }
    }
}

/// Generates a delegating method that times the inner call and records its
/// outcome without touching arguments, results, or errors.
macro_rules! delegate {
    ($method:ident ( $($arg:ident : $ty:ty),* ) -> $ret:ty) => {
        pub async fn $method(&mut self, $($arg: $ty),*) -> $ret {
            let started = Instant::now();
            let result = self.inner.$method($($arg),*).await;
            self.metrics.observe(self.name, stringify!($method), result.is_ok(), started);
            result
        }
    };
}

impl<'c> Instrumented<Orders<'c>> {
    delegate!(create(request: &OrderCreateDBRequest) -> Result<Order>);
    delegate!(get(id: OrderId) -> Result<Order>);
    delegate!(get_by_external_id(ext_id: &str) -> Result<Order>);
    delegate!(get_metadata(id: OrderId) -> Result<serde_json::Value>);
    delegate!(set_trial_days(id: OrderId, ndays: i64) -> Result<Order>);
    delegate!(set_status(id: OrderId, status: OrderStatus) -> Result<()>);
    delegate!(set_last_paid_at(id: OrderId, when: DateTime<Utc>) -> Result<()>);
    delegate!(set_expires_at(id: OrderId, when: DateTime<Utc>) -> Result<()>);
    delegate!(update_metadata(id: OrderId, data: &serde_json::Value) -> Result<()>);
    delegate!(append_metadata(id: OrderId, key: &str, val: &str) -> Result<()>);
    delegate!(append_metadata_int(id: OrderId, key: &str, val: i32) -> Result<()>);
    delegate!(get_expires_at_after_iso_period(id: OrderId) -> Result<DateTime<Utc>>);
}

impl<'c> Instrumented<OrderItems<'c>> {
    delegate!(get(id: OrderItemId) -> Result<OrderItem>);
    delegate!(find_by_order_id(order_id: OrderId) -> Result<Vec<OrderItem>>);
    delegate!(insert_many(items: Vec<OrderItemCreateDBRequest>) -> Result<Vec<OrderItem>>);
}

impl<'c> Instrumented<Issuers<'c>> {
    delegate!(create(request: &IssuerCreateDBRequest) -> Result<Issuer>);
    delegate!(get_by_merchant_id(merchant_id: &str) -> Result<Issuer>);
    delegate!(get_by_public_key(public_key: &str) -> Result<Issuer>);
}

impl<'c> Instrumented<OrderPayHistory<'c>> {
    delegate!(insert(id: OrderId, when: DateTime<Utc>) -> Result<()>);
}

impl<'c> Instrumented<Tlv2<'c>> {
    delegate!(get_cred_submission_report(req_id: RequestId, creds: &[String]) -> Result<CredSubmissionReport>);
    delegate!(uniq_batches(order_id: OrderId, item_id: OrderItemId, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<i64>);
    delegate!(delete_legacy(order_id: OrderId) -> Result<()>);
    delegate!(insert_batch(request: &CredBatchCreateDBRequest) -> Result<()>);
}
