//! DID (Decentralized Identifier) types.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// A [Decentralized Identifier][spec] string.
///
/// Wraps a raw DID string like `did:key:z6Mk...`, `did:web:example.com` or
/// `did:mailto:example.com:alice`. Use [`method()`][Did::method] to inspect
/// the DID method at runtime.
///
/// [spec]: https://www.w3.org/TR/did-core/
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Did(String);

impl Did {
    /// Wrap a string already known to be a well-formed DID.
    pub(crate) fn new_unchecked(did: String) -> Self {
        Did(did)
    }

    /// Get the raw DID string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the DID method name (e.g. `"key"` for `did:key:...`,
    /// `"mailto"` for `did:mailto:...`).
    #[must_use]
    pub fn method(&self) -> &str {
        self.0["did:".len()..].split(':').next().unwrap_or_default()
    }

    /// Method specific identifier, everything after `did:<method>:`.
    #[must_use]
    pub fn identifier(&self) -> &str {
        let method = self.method();
        &self.0["did:".len() + method.len() + 1..]
    }

    /// Returns `true` for `did:mailto` identifiers, which never carry a
    /// signing key.
    #[must_use]
    pub fn is_mailto(&self) -> bool {
        self.method() == "mailto"
    }

    /// Builds a `did:mailto` from an email address.
    ///
    /// `alice@example.com` becomes `did:mailto:example.com:alice`.
    ///
    /// # Errors
    ///
    /// Fails if the address has no `@` or an empty local part or domain.
    pub fn mailto(email: &str) -> Result<Self, DidParseError> {
        let (local, domain) = email
            .rsplit_once('@')
            .ok_or_else(|| DidParseError(format!("expected an email address, got: {email}")))?;
        if local.is_empty() || domain.is_empty() {
            return Err(DidParseError(format!(
                "expected an email address, got: {email}"
            )));
        }
        format!("did:mailto:{domain}:{local}").parse()
    }

    /// Email address of a `did:mailto`, `None` for every other method.
    #[must_use]
    pub fn email(&self) -> Option<String> {
        if !self.is_mailto() {
            return None;
        }
        let (domain, local) = self.identifier().split_once(':')?;
        Some(format!("{local}@{domain}"))
    }
}

impl AsRef<str> for Did {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&Did> for Did {
    fn from(did: &Did) -> Self {
        did.clone()
    }
}

impl fmt::Debug for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Error when parsing a DID string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid DID: {0}")]
pub struct DidParseError(pub String);

impl FromStr for Did {
    type Err = DidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some(rest) = s.strip_prefix("did:") else {
            return Err(DidParseError(format!("expected did: prefix, got: {s}")));
        };
        // Must have at least did:method:identifier
        match rest.split_once(':') {
            Some((method, id)) if !method.is_empty() && !id.is_empty() => Ok(Did(s.to_string())),
            _ => Err(DidParseError(format!(
                "expected did:method:identifier, got: {s}"
            ))),
        }
    }
}

impl TryFrom<String> for Did {
    type Error = DidParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl Serialize for Did {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Did {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Creates a [`Did`] from a string literal, validated at compile time.
///
/// The `"did:"` prefix is added automatically, pass `"method:identifier"`.
///
/// ```
/// use access_principal::did;
///
/// let w = did!("web:access.example.com");
/// assert_eq!(w.method(), "web");
///
/// let m = did!("mailto:example.com:alice");
/// assert_eq!(m.email().as_deref(), Some("alice@example.com"));
/// ```
///
/// Invalid literals fail at compile time:
/// ```compile_fail
/// use access_principal::did;
/// let _bad = did!("nocolon");
/// ```
#[macro_export]
macro_rules! did {
    ($s:literal) => {{
        const _: () = assert!(
            $crate::did::is_literal_did($s),
            "expected \"method:identifier\""
        );
        $crate::did::Did::from_literal(concat!("did:", $s))
    }};
}

/// Whether `body` (a DID without its `did:` prefix) has a non-empty method
/// and identifier.
#[doc(hidden)]
pub const fn is_literal_did(body: &str) -> bool {
    let bytes = body.as_bytes();
    let mut colon = 0;
    while colon < bytes.len() && bytes[colon] != b':' {
        colon += 1;
    }
    colon > 0 && colon + 1 < bytes.len()
}

impl Did {
    /// Used by [`did!`] after the literal was checked at compile time.
    #[doc(hidden)]
    pub fn from_literal(did: &'static str) -> Self {
        Did(did.to_string())
    }
}
