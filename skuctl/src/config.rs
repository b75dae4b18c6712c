//! Provider configuration.
//!
//! Configuration is built once at startup by the embedding application and
//! passed into each component's constructor. Components never read ambient
//! state, so every input is visible in the constructor signature.

use serde::Deserialize;

/// Settings for the Radom crypto-checkout webhook surface.
#[derive(Debug, Clone, Deserialize)]
pub struct RadomConfig {
    /// Whether Radom webhook processing is enabled.
    ///
    /// Disabled means "do not trust": authentication fails rather than
    /// letting deliveries through unchecked.
    pub enabled: bool,

    /// Shared secret expected on each webhook delivery.
    pub token: String,
}

/// Settings for Play Store real-time developer notifications.
#[derive(Debug, Clone, Deserialize)]
pub struct PlayStoreConfig {
    /// Whether Play Store webhook processing is disabled.
    pub disabled: bool,

    /// Expected audience of the push identity token.
    pub audience: String,

    /// Expected issuer of the push identity token.
    pub issuer: String,

    /// Service account email the token's `email` claim must carry.
    pub service_account: String,
}
