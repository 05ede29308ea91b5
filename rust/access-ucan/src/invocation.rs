//! Invocations: delegations carrying exactly one capability, to be
//! performed now.

use std::ops::Deref;

use access_capability::Capability;
use thiserror::Error;

use crate::{codec::CodecError, delegation::Delegation};

/// Error type for treating a delegation as an invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvocationError {
    /// The delegation does not carry exactly one capability.
    #[error("invocation must carry exactly one capability, found {0}")]
    CapabilityCount(usize),

    /// The invocation could not be decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// A [`Delegation`] with a single capability.
///
/// Invocations compare by CID, like delegations.
#[derive(Debug, Clone)]
pub struct Invocation {
    delegation: Delegation,
    capability: Capability,
}

impl Invocation {
    /// The invoked capability.
    #[must_use]
    pub const fn capability(&self) -> &Capability {
        &self.capability
    }

    /// The underlying delegation.
    #[must_use]
    pub const fn delegation(&self) -> &Delegation {
        &self.delegation
    }

    /// Unwrap the underlying delegation.
    #[must_use]
    pub fn into_delegation(self) -> Delegation {
        self.delegation
    }

    /// Decode an archived invocation.
    ///
    /// # Errors
    ///
    /// Fails if the archive is invalid or does not hold exactly one
    /// capability.
    pub fn extract(bytes: &[u8]) -> Result<Self, InvocationError> {
        Self::try_from(Delegation::extract(bytes)?)
    }

    /// Parse the text form of an archived invocation.
    ///
    /// # Errors
    ///
    /// Fails if the text is invalid or does not hold exactly one capability.
    pub fn parse(text: &str) -> Result<Self, InvocationError> {
        Self::try_from(Delegation::parse(text)?)
    }
}

impl TryFrom<Delegation> for Invocation {
    type Error = InvocationError;

    fn try_from(delegation: Delegation) -> Result<Self, Self::Error> {
        let capability = match delegation.capabilities() {
            [capability] => capability.clone(),
            other => return Err(InvocationError::CapabilityCount(other.len())),
        };
        Ok(Self {
            delegation,
            capability,
        })
    }
}

impl Deref for Invocation {
    type Target = Delegation;

    fn deref(&self) -> &Self::Target {
        &self.delegation
    }
}

impl From<Invocation> for Delegation {
    fn from(invocation: Invocation) -> Self {
        invocation.delegation
    }
}

impl PartialEq for Invocation {
    fn eq(&self, other: &Self) -> bool {
        self.delegation == other.delegation
    }
}

impl Eq for Invocation {}

#[cfg(test)]
mod tests {
    use super::*;
    use access_principal::{Ed25519Signer, Principal};
    use testresult::TestResult;

    #[test]
    fn exactly_one_capability() -> TestResult {
        let signer = Ed25519Signer::from_seed(&[1; 32]);
        let with = signer.did().to_string();
        let two = Delegation::builder()
            .audience(signer.did())
            .capability(Capability::new("space/info", &with))
            .capability(Capability::new("store/list", &with))
            .sign(&signer)?;
        assert_eq!(
            Invocation::try_from(two),
            Err(InvocationError::CapabilityCount(2))
        );

        let one = Delegation::builder()
            .audience(signer.did())
            .capability(Capability::new("space/info", &with))
            .sign(&signer)?;
        let invocation = Invocation::try_from(one.clone())?;
        assert_eq!(invocation.capability().can, "space/info");
        assert_eq!(invocation.cid(), one.cid());

        let decoded = Invocation::parse(&invocation.format()?)?;
        assert_eq!(decoded, invocation);
        Ok(())
    }

    #[test]
    fn invocations_with_float_caveats_compare_by_cid() -> TestResult {
        let signer = Ed25519Signer::from_seed(&[1; 32]);
        let with = signer.did().to_string();
        let invoke = |ratio: f64| {
            Delegation::builder()
                .audience(signer.did())
                .capability(Capability::new("space/info", &with).with_nb("ratio", ratio))
                .sign(&signer)
        };
        let half = Invocation::try_from(invoke(0.5)?)?;
        assert_eq!(half, Invocation::try_from(invoke(0.5)?)?);
        assert_ne!(half, Invocation::try_from(invoke(0.25)?)?);
        Ok(())
    }
}
