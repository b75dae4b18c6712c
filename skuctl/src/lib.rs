//! # skuctl: subscription billing webhook core
//!
//! `skuctl` is the billing core behind a store selling anonymous,
//! time-limited access credentials against orders. It ingests payment
//! provider webhooks (the Radom crypto-checkout provider and Play Store
//! billing), authenticates them, classifies them into a small canonical set
//! of subscription lifecycle effects, and provides the transactional
//! repository layer that keeps credential issuance idempotent.
//!
//! ## Overview
//!
//! Payment providers deliver webhooks at-least-once and out of order. The
//! hard problem this crate solves is not HTTP plumbing — it is guaranteeing
//! that credential issuance and order state transitions happen exactly once
//! per billing event despite duplicate deliveries and concurrent requests.
//! The HTTP surface, checkout-session creation, and the blind-signature
//! cryptography live in the embedding service; this crate owns everything
//! between raw webhook bytes and the database.
//!
//! ### Request Flow
//!
//! Inbound webhook bytes are decoded by a provider-specific notification
//! codec ([`payment_providers::radom`], [`payment_providers::playstore`]).
//! If the delivery authenticates (shared-secret constant-time compare for
//! Radom, Google identity-token validation for Play Store), a pure
//! classifier derives one [`Effect`] — `new`, `renew`, `cancel`,
//! `payment_failure`, or `skip` — and the orchestrating service applies the
//! effect through the repositories in [`db::handlers`], composing several
//! repository calls into one database transaction.
//!
//! ### Idempotent Issuance
//!
//! Credential batches are deduplicated on their first blinded credential:
//! [`db::handlers::Tlv2::get_cred_submission_report`] reports whether a
//! batch was already submitted and whether its request id was reused for a
//! different batch (a client-side bug, rejected rather than signed twice).
//! A unique index on `(item_id, request_id, first blinded credential)`
//! backs the check at the storage layer.
//!
//! ## Core Components
//!
//! The **provider layer** ([`payment_providers`]) pairs a notification
//! codec, an effect classifier, and a webhook authenticator per provider.
//!
//! The **database layer** ([`db`]) uses the repository pattern. Each
//! repository borrows a caller-owned connection or transaction, so an
//! orchestrator can compose order updates, pay-history appends, and
//! credential inserts atomically.
//!
//! The **metrics layer** ([`metrics`]) decorates any repository with
//! per-method duration/outcome histograms on an injected Prometheus
//! registry, without changing the wrapped contract.

pub mod config;
pub mod db;
pub mod metrics;
pub mod payment_providers;
pub mod types;

pub use config::{PlayStoreConfig, RadomConfig};
pub use payment_providers::Effect;
