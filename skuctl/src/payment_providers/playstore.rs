//! Play Store billing webhooks.
//!
//! Play Store pushes real-time developer notifications through a Pub/Sub
//! envelope: outer JSON, base64 payload, inner JSON. Exactly one of four
//! nested notification kinds is populated per delivery. Deliveries are
//! authenticated with a Google-signed identity token validated against the
//! configured issuer and service account.
//!
//! https://developer.android.com/google/play/billing/rtdn-reference

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;

use crate::config::PlayStoreConfig;
use crate::payment_providers::Effect;

/// Notifications issued before 2024-06-01 UTC are suppressed: past events
/// must not replay effects onto orders migrated after that date.
const EVENT_TIME_CUTOFF_MILLIS: i64 = 1_717_200_000_000;

// Subscription notification type codes.
const NTF_TYPE_SUB_RECOVERED: i32 = 1;
const NTF_TYPE_SUB_RENEWED: i32 = 2;
const NTF_TYPE_SUB_CANCELED: i32 = 3;
const NTF_TYPE_SUB_RESTARTED: i32 = 7;
const NTF_TYPE_SUB_REVOKED: i32 = 12;
const NTF_TYPE_SUB_EXPIRED: i32 = 13;

/// Product type on voided purchases marking a subscription, as opposed to
/// a one-time product.
const PRODUCT_TYPE_SUBSCRIPTION: i32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum PlayStoreError {
    #[error("playstore: failed to unmarshal message: {0}")]
    MalformedMessage(#[source] serde_json::Error),

    #[error("playstore: failed to decode message data: {0}")]
    MalformedData(#[source] base64::DecodeError),

    #[error("playstore: failed to unmarshal notification: {0}")]
    MalformedNotification(#[source] serde_json::Error),

    #[error("playstore: disabled")]
    Disabled,

    #[error("playstore: authorization header is empty")]
    AuthHeaderEmpty,

    #[error("playstore: authorization header invalid format")]
    AuthHeaderFormat,

    #[error("playstore: invalid authentication token: {0}")]
    TokenValidation(anyhow::Error),

    #[error("playstore: invalid issuer")]
    InvalidIssuer,

    #[error("playstore: invalid email")]
    InvalidEmail,

    #[error("playstore: email not verified")]
    EmailNotVerified,
}

/// Pub/Sub push envelope wrapping a developer notification.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PushMessage {
    /// Subscription path; may become useful for distinguishing channels.
    #[allow(dead_code)]
    subscription: String,
    message: PushMessageData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PushMessageData {
    data: String,
    #[allow(dead_code)]
    message_id: String,
}

/// A real-time developer notification from Play Store.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeveloperNotification {
    pub package_name: String,

    /// Epoch milliseconds as sent by the provider, kept as a numeric
    /// string; consumers choose the precision they need.
    #[serde(deserialize_with = "de_event_time")]
    pub event_time_millis: String,

    pub subscription_notification: Option<SubscriptionNotification>,
    pub voided_purchase_notification: Option<VoidedPurchaseNotification>,

    // Only the presence of these matters. The content is ignored.
    pub one_time_product_notification: Option<OneTimeProductNotification>,
    pub test_notification: Option<TestNotification>,
}

/// Accepts the timestamp as either a JSON string or number; anything else
/// reads as empty, which [`DeveloperNotification::is_before_cutoff`] treats
/// as untrusted.
fn de_event_time<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        _ => Ok(String::new()),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SubscriptionNotification {
    pub version: String,
    pub notification_type: i32,
    pub purchase_token: String,
    pub subscription_id: String,
}

impl SubscriptionNotification {
    pub fn should_renew(&self) -> bool {
        matches!(
            self.notification_type,
            NTF_TYPE_SUB_RECOVERED | NTF_TYPE_SUB_RENEWED | NTF_TYPE_SUB_RESTARTED
        )
    }

    pub fn should_cancel(&self) -> bool {
        matches!(
            self.notification_type,
            NTF_TYPE_SUB_CANCELED | NTF_TYPE_SUB_REVOKED | NTF_TYPE_SUB_EXPIRED
        )
    }

    pub fn should_process(&self) -> bool {
        self.should_renew() || self.should_cancel()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VoidedPurchaseNotification {
    pub purchase_token: String,
    pub order_id: String,
    pub product_type: i32,
    pub refund_type: i32,
}

impl VoidedPurchaseNotification {
    /// Voided one-time products are not subscription lifecycle events.
    pub fn should_process(&self) -> bool {
        self.product_type == PRODUCT_TYPE_SUBSCRIPTION
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct OneTimeProductNotification {}

#[derive(Debug, Default, Deserialize)]
pub struct TestNotification {}

impl DeveloperNotification {
    /// Decode a Pub/Sub push delivery: outer envelope, then the base64
    /// payload, then the inner notification. Each stage fails with its own
    /// error so a bad delivery can be traced to the stage that rejected it.
    pub fn parse(raw: &[u8]) -> Result<Self, PlayStoreError> {
        let wrap: PushMessage = serde_json::from_slice(raw).map_err(PlayStoreError::MalformedMessage)?;

        let data = base64::engine::general_purpose::STANDARD
            .decode(wrap.message.data)
            .map_err(PlayStoreError::MalformedData)?;

        serde_json::from_slice(&data).map_err(PlayStoreError::MalformedNotification)
    }

    pub fn should_process(&self) -> bool {
        if let Some(sub) = &self.subscription_notification {
            return sub.should_process();
        }
        if let Some(voided) = &self.voided_purchase_notification {
            return voided.should_process();
        }

        // One-time-product, test, and empty notifications never process.
        false
    }

    pub fn effect(&self) -> Effect {
        if let Some(sub) = &self.subscription_notification {
            if sub.should_renew() {
                return Effect::Renew;
            }
            if sub.should_cancel() {
                return Effect::Cancel;
            }

            // Unknown or future type codes must never map to an assumed effect.
            return Effect::Skip;
        }

        if let Some(voided) = &self.voided_purchase_notification {
            if voided.should_process() {
                return Effect::Cancel;
            }
        }

        Effect::Skip
    }

    /// Whether the event predates the trust cutoff.
    ///
    /// An unreadable timestamp counts as before the cutoff: suppress what
    /// cannot be trusted rather than acting on it.
    pub fn is_before_cutoff(&self) -> bool {
        match self.event_time_millis.parse::<i64>() {
            Ok(ms) => ms < EVENT_TIME_CUTOFF_MILLIS,
            Err(_) => true,
        }
    }

    /// The purchase token identifying the purchase with the vendor, for
    /// notification kinds that carry one.
    pub fn purchase_token(&self) -> Option<&str> {
        if let Some(sub) = &self.subscription_notification {
            return Some(&sub.purchase_token);
        }
        if let Some(voided) = &self.voided_purchase_notification {
            return Some(&voided.purchase_token);
        }

        None
    }
}

/// Verified identity-token payload returned by a [`TokenValidator`].
#[derive(Debug, Clone, Default)]
pub struct IdTokenPayload {
    pub issuer: String,
    pub claims: serde_json::Map<String, serde_json::Value>,
}

/// Verifies Google-signed identity tokens.
///
/// The production implementation lives with the embedding service and talks
/// to Google's certs endpoint; tests inject doubles.
#[async_trait]
pub trait TokenValidator: Send + Sync {
    async fn validate(&self, token: &str, audience: &str) -> anyhow::Result<IdTokenPayload>;
}

/// Authenticates Play Store push deliveries via the identity token on the
/// Authorization header.
pub struct NotificationAuthenticator<V> {
    cfg: PlayStoreConfig,
    validator: V,
}

impl<V: TokenValidator> NotificationAuthenticator<V> {
    pub fn new(cfg: PlayStoreConfig, validator: V) -> Self {
        Self { cfg, validator }
    }

    /// Validate the Authorization header of a push delivery.
    ///
    /// Checks run in a fixed order and the first failure wins: disabled,
    /// empty header, header format, token verification, issuer, email,
    /// email verification.
    pub async fn authenticate(&self, header: &str) -> Result<(), PlayStoreError> {
        if self.cfg.disabled {
            return Err(PlayStoreError::Disabled);
        }

        if header.is_empty() {
            return Err(PlayStoreError::AuthHeaderEmpty);
        }

        let parts: Vec<&str> = header.split(' ').collect();
        if parts.len() != 2 {
            return Err(PlayStoreError::AuthHeaderFormat);
        }

        let payload = self
            .validator
            .validate(parts[1], &self.cfg.audience)
            .await
            .map_err(PlayStoreError::TokenValidation)?;

        if payload.issuer.is_empty() || payload.issuer != self.cfg.issuer {
            return Err(PlayStoreError::InvalidIssuer);
        }

        if payload.claims.get("email").and_then(|v| v.as_str()) != Some(self.cfg.service_account.as_str()) {
            return Err(PlayStoreError::InvalidEmail);
        }

        if payload.claims.get("email_verified").and_then(|v| v.as_bool()) != Some(true) {
            return Err(PlayStoreError::EmailNotVerified);
        }

        Ok(())
    }
}
