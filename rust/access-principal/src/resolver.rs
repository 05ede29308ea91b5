//! DID-to-verifier resolution.

use std::collections::HashMap;

use crate::{
    did::Did,
    ed25519::{Ed25519DidFromStrError, Ed25519Signature, Ed25519Verifier},
};

/// What a DID resolves to.
///
/// `Absentee` carries no verification capability: any delegation issued by
/// it has to be vouched for by an attestation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verifier {
    /// A principal with an ed25519 verifying key.
    Key(Ed25519Verifier),

    /// A principal without a discoverable key (`did:mailto`).
    Absentee(Did),
}

impl Verifier {
    /// Verify `signature` over `payload` with a key principal.
    ///
    /// # Errors
    ///
    /// Fails if the signature is missing or invalid, and always fails for
    /// absentee principals.
    pub fn verify(
        &self,
        payload: &[u8],
        signature: Option<&Ed25519Signature>,
    ) -> Result<(), signature::Error> {
        match (self, signature) {
            (Verifier::Key(key), Some(signature)) => key.verify(payload, signature),
            _ => Err(signature::Error::new()),
        }
    }
}

/// Resolves a DID to a [`Verifier`].
pub trait Resolver {
    /// Resolve `did`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] when the DID is not understood.
    fn resolve(&self, did: &Did) -> Result<Verifier, ResolveError>;
}

impl<R: Resolver + ?Sized> Resolver for &R {
    fn resolve(&self, did: &Did) -> Result<Verifier, ResolveError> {
        (**self).resolve(did)
    }
}

impl<R: Resolver + ?Sized> Resolver for std::sync::Arc<R> {
    fn resolve(&self, did: &Did) -> Result<Verifier, ResolveError> {
        (**self).resolve(did)
    }
}

/// Error type for DID resolution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// The DID could not be parsed as an ed25519 `did:key`.
    #[error("invalid ed25519 did:key {did}: {source}")]
    InvalidKey {
        /// The DID that failed to parse.
        did: Did,
        /// Underlying parse error.
        source: Ed25519DidFromStrError,
    },

    /// No key is known for the DID.
    #[error("unable to resolve {0}")]
    Unresolvable(Did),
}

/// Resolves `did:key` from the key bytes, `did:mailto` to an absentee and
/// `did:web` from a table of known keys.
#[derive(Debug, Clone, Default)]
pub struct KeyResolver {
    web: HashMap<Did, Ed25519Verifier>,
}

impl KeyResolver {
    /// A resolver that knows no `did:web` keys.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the key behind a `did:web`.
    #[must_use]
    pub fn with_web_key(mut self, did: Did, key: Ed25519Verifier) -> Self {
        self.web.insert(did, key);
        self
    }
}

impl Resolver for KeyResolver {
    fn resolve(&self, did: &Did) -> Result<Verifier, ResolveError> {
        match did.method() {
            "key" => Ed25519Verifier::try_from(did)
                .map(Verifier::Key)
                .map_err(|source| ResolveError::InvalidKey {
                    did: did.clone(),
                    source,
                }),
            "mailto" => Ok(Verifier::Absentee(did.clone())),
            _ => self
                .web
                .get(did)
                .copied()
                .map(Verifier::Key)
                .ok_or_else(|| ResolveError::Unresolvable(did.clone())),
        }
    }
}
