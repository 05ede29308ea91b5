//! Ed25519 signer implementation.

use super::{Ed25519Signature, error::Ed25519KeyError, verifier::Ed25519Verifier};
use crate::{
    did::Did,
    principal::{Authority, Principal},
};

/// An `Ed25519` signer.
///
/// Identified by its `did:key` unless re-labelled with [`with_did`], which
/// lets a service sign as its `did:web` while resolvers map that DID back
/// to the key.
///
/// [`with_did`]: Ed25519Signer::with_did
#[derive(Clone)]
pub struct Ed25519Signer {
    did: Did,
    verifier: Ed25519Verifier,
    signer: ed25519_dalek::SigningKey,
}

impl From<ed25519_dalek::SigningKey> for Ed25519Signer {
    fn from(signer: ed25519_dalek::SigningKey) -> Self {
        let verifier = Ed25519Verifier::from(&signer);
        Self {
            did: verifier.did(),
            verifier,
            signer,
        }
    }
}

impl Ed25519Signer {
    /// Generate a new Ed25519 keypair with random bytes from `getrandom`.
    ///
    /// # Errors
    ///
    /// Returns an error if the RNG fails.
    pub fn generate() -> Result<Self, Ed25519KeyError> {
        let mut seed = [0u8; 32];
        getrandom::getrandom(&mut seed).map_err(Ed25519KeyError::Rng)?;
        Ok(Self::from_seed(&seed))
    }

    /// Deterministically derive a keypair from a 32 byte seed.
    #[must_use]
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        ed25519_dalek::SigningKey::from_bytes(seed).into()
    }

    /// Import a keypair from raw seed bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the seed is not 32 bytes long.
    pub fn import(seed: &[u8]) -> Result<Self, Ed25519KeyError> {
        let seed: [u8; 32] = seed
            .try_into()
            .map_err(|_| Ed25519KeyError::InvalidSeedLength(seed.len()))?;
        Ok(Self::from_seed(&seed))
    }

    /// Export the raw seed bytes.
    #[must_use]
    pub fn export(&self) -> [u8; 32] {
        self.signer.to_bytes()
    }

    /// Re-label this signer with a different DID (e.g. `did:web`).
    #[must_use]
    pub fn with_did(mut self, did: Did) -> Self {
        self.did = did;
        self
    }

    /// The `did:key` verifier for this signer's key, regardless of the DID
    /// it signs as.
    #[must_use]
    pub const fn verifier(&self) -> &Ed25519Verifier {
        &self.verifier
    }

    /// Sign `msg` with the underlying key.
    ///
    /// # Errors
    ///
    /// Returns `signature::Error` if signing fails.
    pub fn sign_bytes(&self, msg: &[u8]) -> Result<Ed25519Signature, signature::Error> {
        use signature::Signer;
        let sig = self.signer.try_sign(msg)?;
        Ok(Ed25519Signature::from(sig))
    }
}

impl std::fmt::Debug for Ed25519Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ed25519Signer")
            .field("did", &self.did)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Display for Ed25519Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.did)
    }
}

impl Principal for Ed25519Signer {
    fn did(&self) -> Did {
        self.did.clone()
    }
}

impl Authority for Ed25519Signer {
    fn sign(&self, payload: &[u8]) -> Result<Option<Ed25519Signature>, signature::Error> {
        self.sign_bytes(payload).map(Some)
    }
}
