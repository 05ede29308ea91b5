//! Ed25519 `did:key` principal and verifier.

use super::{ED25519_PUB, Ed25519Signature, error::Ed25519DidFromStrError};
use crate::{did::Did, principal::Principal};
use base58::{FromBase58, ToBase58};
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;

/// An `Ed25519` `did:key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ed25519Verifier(pub ed25519_dalek::VerifyingKey);

impl Ed25519Verifier {
    /// Get the raw public key bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// Verify `signature` over `msg`.
    ///
    /// # Errors
    ///
    /// Returns `signature::Error` if verification fails.
    pub fn verify(&self, msg: &[u8], signature: &Ed25519Signature) -> Result<(), signature::Error> {
        use signature::Verifier;
        let dalek_sig = ed25519_dalek::Signature::from(*signature);
        self.0.verify(msg, &dalek_sig)
    }
}

impl From<ed25519_dalek::VerifyingKey> for Ed25519Verifier {
    fn from(key: ed25519_dalek::VerifyingKey) -> Self {
        Ed25519Verifier(key)
    }
}

impl From<&ed25519_dalek::SigningKey> for Ed25519Verifier {
    fn from(key: &ed25519_dalek::SigningKey) -> Self {
        Ed25519Verifier(key.verifying_key())
    }
}

impl std::fmt::Display for Ed25519Verifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut raw_bytes = Vec::with_capacity(34);
        raw_bytes.extend_from_slice(&ED25519_PUB);
        raw_bytes.extend_from_slice(&self.0.to_bytes());
        let b58 = ToBase58::to_base58(raw_bytes.as_slice());
        write!(f, "did:key:z{b58}")
    }
}

impl FromStr for Ed25519Verifier {
    type Err = Ed25519DidFromStrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        let [did_tag, key_tag, encoded] = parts.as_slice() else {
            return Err(Ed25519DidFromStrError::InvalidDidHeader);
        };
        if *did_tag != "did" || *key_tag != "key" {
            return Err(Ed25519DidFromStrError::InvalidDidHeader);
        }
        let b58 = encoded
            .strip_prefix('z')
            .ok_or(Ed25519DidFromStrError::MissingBase58Prefix)?;
        let key_bytes = b58
            .from_base58()
            .map_err(|_| Ed25519DidFromStrError::InvalidBase58)?;
        let raw_arr = <[u8; 34]>::try_from(key_bytes.as_slice())
            .map_err(|_| Ed25519DidFromStrError::InvalidKey)?;
        if raw_arr[..2] != ED25519_PUB {
            return Err(Ed25519DidFromStrError::InvalidKey);
        }
        let key_arr: [u8; 32] = raw_arr[2..]
            .try_into()
            .map_err(|_| Ed25519DidFromStrError::InvalidKey)?;
        let key = ed25519_dalek::VerifyingKey::from_bytes(&key_arr)
            .map_err(|_| Ed25519DidFromStrError::InvalidKey)?;
        Ok(Ed25519Verifier(key))
    }
}

impl TryFrom<&Did> for Ed25519Verifier {
    type Error = Ed25519DidFromStrError;

    fn try_from(did: &Did) -> Result<Self, Self::Error> {
        did.as_str().parse()
    }
}

impl Principal for Ed25519Verifier {
    fn did(&self) -> Did {
        Did::new_unchecked(self.to_string())
    }
}

impl Serialize for Ed25519Verifier {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Ed25519Verifier {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
