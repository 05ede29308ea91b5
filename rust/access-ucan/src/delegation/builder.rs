//! Builder for [`Delegation`]s.

use std::collections::BTreeMap;

use access_capability::Capability;
use access_principal::{Authority, Did};
use ipld_core::{cid::Cid, ipld::Ipld};
use thiserror::Error;

use super::{Delegation, DelegationPayload};
use crate::{
    codec::CodecError,
    time::{Expiration, Timestamp},
};

/// Error type for building a delegation.
#[derive(Debug, Error)]
pub enum BuildError {
    /// No audience was set.
    #[error("delegation has no audience")]
    MissingAudience,

    /// The payload could not be encoded.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The issuer failed to sign.
    #[error("signing failed: {0}")]
    Signing(#[from] signature::Error),

    /// The result is not a valid invocation.
    #[error(transparent)]
    Invocation(#[from] crate::invocation::InvocationError),
}

/// Builder for [`Delegation`]s.
///
/// Expiration defaults to [`Expiration::Never`].
#[derive(Debug, Clone, Default)]
pub struct DelegationBuilder {
    audience: Option<Did>,
    capabilities: Vec<Capability>,
    expiration: Option<Expiration>,
    not_before: Option<Timestamp>,
    proofs: Vec<Cid>,
    attached: BTreeMap<Cid, Delegation>,
    facts: Vec<BTreeMap<String, Ipld>>,
    nonce: Option<String>,
}

impl DelegationBuilder {
    /// A blank builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the audience.
    #[must_use]
    pub fn audience(mut self, audience: impl Into<Did>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Add a capability.
    #[must_use]
    pub fn capability(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    /// Add capabilities.
    #[must_use]
    pub fn capabilities(mut self, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        self.capabilities.extend(capabilities);
        self
    }

    /// Set the expiration.
    #[must_use]
    pub const fn expiration(mut self, expiration: Expiration) -> Self {
        self.expiration = Some(expiration);
        self
    }

    /// Set the time before which the delegation is not valid.
    #[must_use]
    pub const fn not_before(mut self, not_before: Timestamp) -> Self {
        self.not_before = Some(not_before);
        self
    }

    /// Reference and attach a proof.
    #[must_use]
    pub fn proof(mut self, proof: Delegation) -> Self {
        let cid = proof.cid();
        if !self.proofs.contains(&cid) {
            self.proofs.push(cid);
        }
        self.attached.insert(cid, proof);
        self
    }

    /// Reference and attach proofs.
    #[must_use]
    pub fn proofs(self, proofs: impl IntoIterator<Item = Delegation>) -> Self {
        proofs.into_iter().fold(self, Self::proof)
    }

    /// Reference a proof by CID without attaching it.
    #[must_use]
    pub fn proof_link(mut self, cid: Cid) -> Self {
        if !self.proofs.contains(&cid) {
            self.proofs.push(cid);
        }
        self
    }

    /// Add a fact.
    #[must_use]
    pub fn fact(mut self, fact: BTreeMap<String, Ipld>) -> Self {
        self.facts.push(fact);
        self
    }

    /// Set the nonce.
    #[must_use]
    pub fn nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// Sign the delegation as `issuer`.
    ///
    /// Absentee issuers produce an unsigned delegation.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError`] if the audience is missing, the payload cannot
    /// be encoded or signing fails.
    pub fn sign<A: Authority + ?Sized>(self, issuer: &A) -> Result<Delegation, BuildError> {
        let payload = DelegationPayload {
            issuer: issuer.did(),
            audience: self.audience.ok_or(BuildError::MissingAudience)?,
            capabilities: self.capabilities,
            expiration: self.expiration.unwrap_or(Expiration::Never),
            not_before: self.not_before,
            proofs: self.proofs,
            facts: self.facts,
            nonce: self.nonce,
        };
        let signature = issuer.sign(&payload.signing_bytes()?)?;
        Ok(Delegation::seal(signature, payload, self.attached)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use access_principal::{Ed25519Signer, Principal};
    use testresult::TestResult;

    #[test]
    fn audience_is_required() {
        let signer = Ed25519Signer::from_seed(&[1; 32]);
        let result = Delegation::builder()
            .capability(Capability::new("*", signer.did().as_str()))
            .sign(&signer);
        assert!(matches!(result, Err(BuildError::MissingAudience)));
    }

    #[test]
    fn explicit_nonce_is_deterministic() -> TestResult {
        let signer = Ed25519Signer::from_seed(&[1; 32]);
        let build = || {
            Delegation::builder()
                .audience(signer.did())
                .capability(Capability::new("*", signer.did().as_str()))
                .nonce("fixed")
                .sign(&signer)
        };
        assert_eq!(build()?.cid(), build()?.cid());
        Ok(())
    }

    #[test]
    fn proofs_are_deduplicated() -> TestResult {
        let signer = Ed25519Signer::from_seed(&[1; 32]);
        let proof = Delegation::builder()
            .audience(signer.did())
            .capability(Capability::new("*", signer.did().as_str()))
            .sign(&signer)?;
        let delegation = Delegation::builder()
            .audience(signer.did())
            .proof(proof.clone())
            .proof_link(proof.cid())
            .proofs([proof.clone()])
            .sign(&signer)?;
        assert_eq!(delegation.proofs(), &[proof.cid()]);
        Ok(())
    }
}
