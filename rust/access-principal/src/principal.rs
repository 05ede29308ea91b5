//! Principal and authority traits.

use crate::{did::Did, ed25519::Ed25519Signature};

/// An entity identified by a [DID].
///
/// Implemented by anything that has a DID: key types, signers, absentee
/// accounts. Does not imply any cryptographic capability.
///
/// [DID]: https://www.w3.org/TR/did-core/
pub trait Principal {
    /// Returns this entity's DID.
    fn did(&self) -> Did;
}

impl Principal for Did {
    fn did(&self) -> Did {
        self.clone()
    }
}

impl<P: Principal + ?Sized> Principal for &P {
    fn did(&self) -> Did {
        (**self).did()
    }
}

/// A principal that can issue delegations.
///
/// Key-holding principals return a signature over the payload. Absentee
/// principals return `None`: their delegations are only trusted when a
/// service attests to them.
pub trait Authority: Principal {
    /// Sign `payload`, or `None` for principals without a key.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying key fails to sign.
    fn sign(&self, payload: &[u8]) -> Result<Option<Ed25519Signature>, signature::Error>;
}

impl<A: Authority + ?Sized> Authority for &A {
    fn sign(&self, payload: &[u8]) -> Result<Option<Ed25519Signature>, signature::Error> {
        (**self).sign(payload)
    }
}

/// A principal with no discoverable signing key, typically a `did:mailto`
/// account.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Absentee(Did);

impl Absentee {
    /// Wrap a DID as an absentee issuer.
    #[must_use]
    pub const fn new(did: Did) -> Self {
        Self(did)
    }
}

impl From<Did> for Absentee {
    fn from(did: Did) -> Self {
        Self(did)
    }
}

impl Principal for Absentee {
    fn did(&self) -> Did {
        self.0.clone()
    }
}

impl Authority for Absentee {
    fn sign(&self, _payload: &[u8]) -> Result<Option<Ed25519Signature>, signature::Error> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::did;

    #[test]
    fn absentee_never_signs() {
        let account = Absentee::new(did!("mailto:example.com:alice"));
        assert_eq!(account.sign(b"payload").unwrap(), None);
        assert_eq!(account.did(), did!("mailto:example.com:alice"));
    }
}
