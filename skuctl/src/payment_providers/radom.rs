//! Radom crypto-checkout webhooks.
//!
//! Radom delivers one JSON notification per subscription lifecycle event.
//! The `eventData` object carries at most one populated variant; which one
//! it is determines the [`Effect`]. Deliveries are authenticated with a
//! shared verification token compared in constant time.

use serde::Deserialize;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::config::RadomConfig;
use crate::payment_providers::Effect;

/// Checkout-session metadata key carrying the order id.
const METADATA_KEY_ORDER_ID: &str = "brave_order_id";

#[derive(Debug, thiserror::Error)]
pub enum RadomError {
    #[error("radom: failed to parse notification: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("radom: unsupported event")]
    UnsupportedEvent,

    #[error("radom: no checkout session data")]
    NoCheckoutSessionData,

    #[error("radom: order id not found")]
    OrderIdNotFound,

    #[error("radom: invalid order id: {0}")]
    InvalidOrderId(#[from] uuid::Error),

    #[error("radom: no payment data")]
    NoPaymentData,

    #[error("radom: disabled")]
    Disabled,

    #[error("radom: verification key is empty")]
    VerificationKeyEmpty,

    #[error("radom: verification key is invalid")]
    VerificationKeyInvalid,
}

/// A parsed Radom webhook notification.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Notification {
    pub event_type: String,
    event_data: Option<EventData>,
    radom_data: Option<CheckoutData>,
}

/// Wire shape of `eventData`.
///
/// The provider populates at most one field; [`Notification::event`] is the
/// resolved view.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct EventData {
    new_subscription: Option<NewSubscription>,
    subscription_payment: Option<SubscriptionPayment>,
    subscription_cancelled: Option<SubscriptionCancelled>,
    subscription_expired: Option<SubscriptionExpired>,
    subscription_payment_attempt_failure: Option<SubscriptionPaymentAttemptFailure>,
    subscription_payment_overdue: Option<SubscriptionPaymentOverdue>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSubscription {
    pub subscription_id: Uuid,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SubscriptionPayment {
    radom_data: Option<CheckoutData>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionCancelled {
    pub subscription_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionExpired {
    pub subscription_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionPaymentAttemptFailure {
    pub subscription_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionPaymentOverdue {
    pub subscription_id: Uuid,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct CheckoutData {
    checkout_session: Option<CheckoutSession>,
    subscription: Option<SubscriptionData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CheckoutSession {
    pub checkout_session_id: String,
    pub metadata: Vec<Metadata>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionData {
    pub subscription_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Metadata {
    pub key: String,
    pub value: String,
}

/// The populated event payload of a notification.
///
/// The wire format could in principle carry more than one populated field;
/// resolution order is fixed so classification stays deterministic: new,
/// payment, cancelled, expired, payment attempt failure, payment overdue.
#[derive(Debug, Clone, Copy)]
pub enum Event<'a> {
    New(&'a NewSubscription),
    Payment(&'a SubscriptionPayment),
    Cancelled(&'a SubscriptionCancelled),
    Expired(&'a SubscriptionExpired),
    PaymentAttemptFailure(&'a SubscriptionPaymentAttemptFailure),
    PaymentOverdue(&'a SubscriptionPaymentOverdue),
}

impl Notification {
    pub fn parse(raw: &[u8]) -> Result<Self, RadomError> {
        Ok(serde_json::from_slice(raw)?)
    }

    /// The populated payload variant, if any.
    pub fn event(&self) -> Option<Event<'_>> {
        let data = self.event_data.as_ref()?;

        if let Some(v) = &data.new_subscription {
            return Some(Event::New(v));
        }
        if let Some(v) = &data.subscription_payment {
            return Some(Event::Payment(v));
        }
        if let Some(v) = &data.subscription_cancelled {
            return Some(Event::Cancelled(v));
        }
        if let Some(v) = &data.subscription_expired {
            return Some(Event::Expired(v));
        }
        if let Some(v) = &data.subscription_payment_attempt_failure {
            return Some(Event::PaymentAttemptFailure(v));
        }
        if let Some(v) = &data.subscription_payment_overdue {
            return Some(Event::PaymentOverdue(v));
        }

        None
    }

    /// The order id a new subscription was purchased for, read from the
    /// checkout-session metadata. Only new-subscription notifications carry
    /// it; there is no fallback.
    pub fn order_id(&self) -> Result<Uuid, RadomError> {
        if !matches!(self.event(), Some(Event::New(_))) {
            return Err(RadomError::UnsupportedEvent);
        }

        let session = self
            .radom_data
            .as_ref()
            .and_then(|d| d.checkout_session.as_ref())
            .ok_or(RadomError::NoCheckoutSessionData)?;

        let entry = session
            .metadata
            .iter()
            .find(|m| m.key == METADATA_KEY_ORDER_ID)
            .ok_or(RadomError::OrderIdNotFound)?;

        Ok(Uuid::parse_str(&entry.value)?)
    }

    /// The subscription id, from whichever variant is populated.
    pub fn sub_id(&self) -> Result<Uuid, RadomError> {
        match self.event() {
            None => Err(RadomError::UnsupportedEvent),
            Some(Event::New(v)) => Ok(v.subscription_id),
            Some(Event::Payment(v)) => v
                .radom_data
                .as_ref()
                .and_then(|d| d.subscription.as_ref())
                .map(|s| s.subscription_id)
                .ok_or(RadomError::NoPaymentData),
            Some(Event::Cancelled(v)) => Ok(v.subscription_id),
            Some(Event::Expired(v)) => Ok(v.subscription_id),
            Some(Event::PaymentAttemptFailure(v)) => Ok(v.subscription_id),
            Some(Event::PaymentOverdue(v)) => Ok(v.subscription_id),
        }
    }

    pub fn is_new_sub(&self) -> bool {
        matches!(self.event(), Some(Event::New(_)))
    }

    pub fn should_renew(&self) -> bool {
        matches!(self.event(), Some(Event::Payment(_)))
    }

    pub fn should_cancel(&self) -> bool {
        matches!(self.event(), Some(Event::Cancelled(_) | Event::Expired(_)))
    }

    pub fn should_record_pay_failure(&self) -> bool {
        matches!(
            self.event(),
            Some(Event::PaymentAttemptFailure(_) | Event::PaymentOverdue(_))
        )
    }

    pub fn should_process(&self) -> bool {
        self.is_new_sub() || self.should_renew() || self.should_cancel() || self.should_record_pay_failure()
    }

    pub fn effect(&self) -> Effect {
        match self.event() {
            Some(Event::New(_)) => Effect::New,
            Some(Event::Payment(_)) => Effect::Renew,
            Some(Event::Cancelled(_) | Event::Expired(_)) => Effect::Cancel,
            Some(Event::PaymentAttemptFailure(_) | Event::PaymentOverdue(_)) => Effect::PaymentFailure,
            None => Effect::Skip,
        }
    }

    /// Raw provider event-type tag, for logging.
    pub fn ntf_type(&self) -> &str {
        &self.event_type
    }
}

/// Authenticates Radom webhook deliveries against the shared verification
/// token.
pub struct MessageAuthenticator {
    cfg: RadomConfig,
}

impl MessageAuthenticator {
    pub fn new(cfg: RadomConfig) -> Self {
        Self { cfg }
    }

    /// Check the verification token supplied with a webhook delivery.
    ///
    /// The comparison is constant-time so response timing does not leak the
    /// secret byte by byte.
    pub fn authenticate(&self, token: &str) -> Result<(), RadomError> {
        if !self.cfg.enabled {
            return Err(RadomError::Disabled);
        }

        if token.is_empty() {
            return Err(RadomError::VerificationKeyEmpty);
        }

        if !bool::from(self.cfg.token.as_bytes().ct_eq(token.as_bytes())) {
            return Err(RadomError::VerificationKeyInvalid);
        }

        Ok(())
    }
}
