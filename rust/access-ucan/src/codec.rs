//! Encoding errors and the multibase text form of archives.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use thiserror::Error;

/// Multibase prefix for base64url without padding.
pub const BASE64URL_PREFIX: char = 'u';

/// Error type for encoding and decoding blocks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// DAG-CBOR encoding failed.
    #[error("failed to encode DAG-CBOR: {0}")]
    Encode(String),

    /// DAG-CBOR decoding failed.
    #[error("failed to decode DAG-CBOR: {0}")]
    Decode(String),

    /// The digest could not be wrapped in a multihash.
    #[error("invalid multihash: {0}")]
    Multihash(String),

    /// Text is not multibase base64url.
    #[error("expected multibase base64url (prefix 'u'): {0}")]
    Multibase(String),

    /// The signature bytes are malformed.
    #[error("invalid signature: {0}")]
    Signature(String),
}

pub(crate) fn encode<T: serde::Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError> {
    serde_ipld_dagcbor::to_vec(value).map_err(|e| CodecError::Encode(e.to_string()))
}

pub(crate) fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    serde_ipld_dagcbor::from_slice(bytes).map_err(|e| CodecError::Decode(e.to_string()))
}

/// Multibase base64url text of `bytes`.
#[must_use]
pub fn to_multibase(bytes: &[u8]) -> String {
    let mut text = String::with_capacity(bytes.len() * 4 / 3 + 2);
    text.push(BASE64URL_PREFIX);
    URL_SAFE_NO_PAD.encode_string(bytes, &mut text);
    text
}

/// Bytes of a multibase base64url string.
///
/// # Errors
///
/// Returns [`CodecError::Multibase`] for other bases or invalid text.
pub fn from_multibase(text: &str) -> Result<Vec<u8>, CodecError> {
    let encoded = text
        .strip_prefix(BASE64URL_PREFIX)
        .ok_or_else(|| CodecError::Multibase("missing prefix".into()))?;
    URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|e| CodecError::Multibase(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multibase_roundtrip() {
        let bytes = vec![0u8, 1, 2, 250, 251, 252, 253, 254, 255];
        let text = to_multibase(&bytes);
        assert!(text.starts_with('u'));
        assert!(!text.contains('='));
        assert!(!text.contains('+') && !text.contains('/'));
        assert_eq!(from_multibase(&text).unwrap(), bytes);
    }

    #[test]
    fn other_bases_are_rejected() {
        assert!(matches!(
            from_multibase("zabc"),
            Err(CodecError::Multibase(_))
        ));
        assert!(matches!(
            from_multibase("u!!"),
            Err(CodecError::Multibase(_))
        ));
    }
}
