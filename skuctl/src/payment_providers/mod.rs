//! Payment provider webhook surfaces.
//!
//! Each provider module pairs a notification codec (raw webhook bytes to a
//! typed notification), a pure effect classifier, and a webhook
//! authenticator. Providers differ in notification shape and failure
//! semantics; the orchestrating service only ever acts on an [`Effect`].
//! Adding a provider means adding a module here.

pub mod playstore;
pub mod radom;

/// Canonical subscription lifecycle effect derived from a provider
/// notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// A subscription was purchased; the order moves to paid.
    New,
    /// A recurring payment landed; the order's paid window extends.
    Renew,
    /// The subscription ended (cancelled, revoked, or expired).
    Cancel,
    /// A payment attempt failed; recorded, no state transition.
    PaymentFailure,
    /// Not actionable: unknown event types, test notifications, empty payloads.
    Skip,
}

impl Effect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Renew => "renew",
            Self::Cancel => "cancel",
            Self::PaymentFailure => "payment_failure",
            Self::Skip => "skip",
        }
    }
}

impl std::fmt::Display for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
