//! Outgoing email.
//!
//! The service never talks to a mail server. It hands messages to an
//! [`Email`] implementation, and treats a failure to send as a failure of
//! the request that triggered it.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use url::Url;

use crate::pin::Pin;

/// A confirmation link for an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationEmail {
    /// Mailbox of the account.
    pub to: String,
    /// Link that confirms the authorization.
    pub url: Url,
}

impl ValidationEmail {
    /// The confirmation artifact carried by the link.
    pub fn artifact(&self) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(name, _)| name == "ucan")
            .map(|(_, value)| value.into_owned())
    }
}

/// A pin for an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinEmail {
    /// Mailbox of the account.
    pub to: String,
    /// Pin to enter on the agent.
    pub pin: Pin,
}

/// Email could not be sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct EmailError(pub String);

/// Email collaborator.
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait Email: Send + Sync {
    /// Send a confirmation link.
    async fn send_validation(&self, email: ValidationEmail) -> Result<(), EmailError>;

    /// Send a pin.
    async fn send_pin(&self, email: PinEmail) -> Result<(), EmailError>;
}

/// Keeps sent messages in memory.
#[derive(Debug, Default)]
pub struct Outbox {
    validations: Mutex<Vec<ValidationEmail>>,
    pins: Mutex<Vec<PinEmail>>,
    offline: AtomicBool,
}

impl Outbox {
    /// An empty outbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every send fail while `offline` is set.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Confirmation links sent so far.
    pub fn validations(&self) -> Vec<ValidationEmail> {
        self.validations.lock().clone()
    }

    /// Pins sent so far.
    pub fn pins(&self) -> Vec<PinEmail> {
        self.pins.lock().clone()
    }

    fn check(&self, to: &str) -> Result<(), EmailError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(EmailError(format!("mail to {to} could not be delivered")))
        } else {
            Ok(())
        }
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl Email for Outbox {
    async fn send_validation(&self, email: ValidationEmail) -> Result<(), EmailError> {
        self.check(&email.to)?;
        self.validations.lock().push(email);
        Ok(())
    }

    async fn send_pin(&self, email: PinEmail) -> Result<(), EmailError> {
        self.check(&email.to)?;
        self.pins.lock().push(email);
        Ok(())
    }
}
