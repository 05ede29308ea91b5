//! Ed25519 key types, `did:key` verifier and signer.

mod error;
mod signer;
mod verifier;

pub use error::{Ed25519DidFromStrError, Ed25519KeyError};
pub use signer::Ed25519Signer;
pub use verifier::Ed25519Verifier;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Multicodec header for ed25519 public keys.
pub(crate) const ED25519_PUB: [u8; 2] = [0xed, 0x01];

/// Raw ed25519 signature bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ed25519Signature([u8; 64]);

impl Ed25519Signature {
    /// Signature bytes.
    #[must_use]
    pub const fn to_bytes(&self) -> [u8; 64] {
        self.0
    }
}

impl std::fmt::Debug for Ed25519Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ed25519Signature(")?;
        for byte in &self.0[..4] {
            write!(f, "{byte:02x}")?;
        }
        write!(f, "..)")
    }
}

impl From<ed25519_dalek::Signature> for Ed25519Signature {
    fn from(signature: ed25519_dalek::Signature) -> Self {
        Self(signature.to_bytes())
    }
}

impl From<Ed25519Signature> for ed25519_dalek::Signature {
    fn from(signature: Ed25519Signature) -> Self {
        ed25519_dalek::Signature::from_bytes(&signature.0)
    }
}

impl TryFrom<&[u8]> for Ed25519Signature {
    type Error = Ed25519KeyError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; 64] = bytes
            .try_into()
            .map_err(|_| Ed25519KeyError::InvalidSignatureLength(bytes.len()))?;
        Ok(Self(bytes))
    }
}

impl Serialize for Ed25519Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serde_bytes::Bytes::new(&self.0).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Ed25519Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes = serde_bytes::ByteBuf::deserialize(deserializer)?;
        Self::try_from(bytes.as_slice()).map_err(serde::de::Error::custom)
    }
}
