//! Service configuration.

use access_principal::Did;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

const DEFAULT_CONFIRMATION_TTL: u64 = 15 * 60;
const DEFAULT_SESSION_TTL: u64 = 5 * 60;
const DEFAULT_PIN_LENGTH: usize = 6;

/// Configuration of an [`AccessService`](crate::AccessService).
///
/// Every field but `did` and `public_url` has a default, so a minimal
/// configuration document only names the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// The service's `did:web` identity.
    pub did: Did,

    /// Base URL that confirmation links point at.
    pub public_url: Url,

    /// Lifetime of confirmation artifacts and authorization requests.
    #[serde(default = "default_confirmation_ttl")]
    pub confirmation_ttl_secs: u64,

    /// Lifetime of session bindings awaiting a poll.
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,

    /// Number of digits in generated pins.
    #[serde(default = "default_pin_length")]
    pub pin_length: usize,

    /// Storage providers spaces can be provisioned with.
    #[serde(default)]
    pub providers: Vec<Did>,
}

fn default_confirmation_ttl() -> u64 {
    DEFAULT_CONFIRMATION_TTL
}

fn default_session_ttl() -> u64 {
    DEFAULT_SESSION_TTL
}

fn default_pin_length() -> usize {
    DEFAULT_PIN_LENGTH
}

/// Error type for [`ServiceConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The service must be identified by a `did:web`.
    #[error("service did must use the web method, got {0}")]
    NotWeb(Did),

    /// Pins are between 1 and 9 digits.
    #[error("pin length must be between 1 and 9, got {0}")]
    PinLength(usize),

    /// A lifetime is zero.
    #[error("{0} must be greater than zero")]
    ZeroTtl(&'static str),

    /// Confirmation links need an absolute http(s) URL.
    #[error("public url must be http or https, got {0}")]
    PublicUrl(Url),
}

impl ServiceConfig {
    /// A configuration with default lifetimes and no providers.
    pub fn new(did: Did, public_url: Url) -> Self {
        Self {
            did,
            public_url,
            confirmation_ttl_secs: DEFAULT_CONFIRMATION_TTL,
            session_ttl_secs: DEFAULT_SESSION_TTL,
            pin_length: DEFAULT_PIN_LENGTH,
            providers: Vec::new(),
        }
    }

    /// Offer `provider` to spaces.
    #[must_use]
    pub fn with_provider(mut self, provider: Did) -> Self {
        self.providers.push(provider);
        self
    }

    /// Check the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.did.method() != "web" {
            return Err(ConfigError::NotWeb(self.did.clone()));
        }
        if !matches!(self.public_url.scheme(), "http" | "https") {
            return Err(ConfigError::PublicUrl(self.public_url.clone()));
        }
        if !(1..=9).contains(&self.pin_length) {
            return Err(ConfigError::PinLength(self.pin_length));
        }
        if self.confirmation_ttl_secs == 0 {
            return Err(ConfigError::ZeroTtl("confirmation_ttl_secs"));
        }
        if self.session_ttl_secs == 0 {
            return Err(ConfigError::ZeroTtl("session_ttl_secs"));
        }
        Ok(())
    }

    /// Whether spaces can be provisioned with `provider`.
    pub fn offers(&self, provider: &Did) -> bool {
        self.providers.contains(provider)
    }
}
