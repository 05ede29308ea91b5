//! Error types for Ed25519 key operations.

use thiserror::Error;

/// Errors from importing or generating key material.
#[derive(Debug, Clone, Error)]
pub enum Ed25519KeyError {
    /// The seed bytes have the wrong length (expected 32).
    #[error("expected 32 seed bytes, got {0}")]
    InvalidSeedLength(usize),

    /// The signature bytes have the wrong length (expected 64).
    #[error("expected 64 signature bytes, got {0}")]
    InvalidSignatureLength(usize),

    /// Random number generation failed.
    #[error("RNG error: {0}")]
    Rng(getrandom::Error),
}

/// Errors that can occur when parsing an ed25519 `did:key` from a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum Ed25519DidFromStrError {
    /// The DID header is invalid.
    #[error("invalid did header")]
    InvalidDidHeader,

    /// The base58 prefix 'z' is missing.
    #[error("missing base58 prefix 'z'")]
    MissingBase58Prefix,

    /// The base58 encoding is invalid.
    #[error("invalid base58 encoding")]
    InvalidBase58,

    /// The key bytes are invalid.
    #[error("invalid key bytes")]
    InvalidKey,
}
