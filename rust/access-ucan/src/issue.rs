//! Helpers for issuing delegations, invocations and attestations.

use access_capability::Capability;
use access_principal::{Authority, Did};
use ipld_core::{cid::Cid, ipld::Ipld};

use crate::{
    delegation::{BuildError, Delegation},
    invocation::Invocation,
    time::{Expiration, Timestamp},
};

/// Ability of attestations.
pub const ATTEST: &str = "ucan/attest";

/// Delegate `capabilities` from `issuer` to `audience`, attaching `proofs`.
///
/// # Errors
///
/// Returns [`BuildError`] if encoding or signing fails.
pub fn delegate<A: Authority + ?Sized>(
    issuer: &A,
    audience: &Did,
    capabilities: impl IntoIterator<Item = Capability>,
    expiration: Expiration,
    not_before: Option<Timestamp>,
    proofs: impl IntoIterator<Item = Delegation>,
) -> Result<Delegation, BuildError> {
    let mut builder = Delegation::builder()
        .audience(audience)
        .capabilities(capabilities)
        .expiration(expiration)
        .proofs(proofs);
    if let Some(not_before) = not_before {
        builder = builder.not_before(not_before);
    }
    builder.sign(issuer)
}

/// Invoke `capability` on `audience` as `issuer`.
///
/// # Errors
///
/// Returns [`BuildError`] if encoding or signing fails.
pub fn invoke<A: Authority + ?Sized>(
    issuer: &A,
    audience: &Did,
    capability: Capability,
    expiration: Expiration,
    proofs: impl IntoIterator<Item = Delegation>,
) -> Result<Invocation, BuildError> {
    let delegation = Delegation::builder()
        .audience(audience)
        .capability(capability)
        .expiration(expiration)
        .proofs(proofs)
        .sign(issuer)?;
    Ok(Invocation::try_from(delegation)?)
}

/// Vouch, as `service`, for the delegation with CID `proof`.
///
/// # Errors
///
/// Returns [`BuildError`] if encoding or signing fails.
pub fn attest<A: Authority + ?Sized>(
    service: &A,
    audience: &Did,
    proof: Cid,
) -> Result<Delegation, BuildError> {
    Delegation::builder()
        .audience(audience)
        .capability(Capability::new(ATTEST, service.did().as_str()).with_nb("proof", proof))
        .expiration(Expiration::Never)
        .sign(service)
}

/// If `delegation` is an attestation, the CID it vouches for.
#[must_use]
pub fn attested(delegation: &Delegation) -> Option<Cid> {
    match delegation.capabilities() {
        [capability] if capability.can == ATTEST => match capability.caveat("proof") {
            Some(Ipld::Link(cid)) => Some(*cid),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use access_principal::{Absentee, Ed25519Signer, Principal, did};
    use pretty_assertions::assert_eq;
    use testresult::TestResult;

    #[test]
    fn attestation_links_the_proof() -> TestResult {
        let service = Ed25519Signer::from_seed(&[9; 32]).with_did(did!("web:access.example.com"));
        let agent = Ed25519Signer::from_seed(&[2; 32]);
        let account = Absentee::new(did!("mailto:example.com:alice"));
        let grant = delegate(
            &account,
            &agent.did(),
            [Capability::new("*", "ucan:*")],
            Expiration::Never,
            None,
            [],
        )?;
        let attestation = attest(&service, &agent.did(), grant.cid())?;
        assert_eq!(attestation.issuer(), &did!("web:access.example.com"));
        assert_eq!(attestation.capabilities()[0].with, "did:web:access.example.com");
        assert_eq!(attestation.expiration(), Expiration::Never);
        assert_eq!(attested(&attestation), Some(grant.cid()));
        assert_eq!(attested(&grant), None);
        Ok(())
    }

    #[test]
    fn invoke_builds_single_capability() -> TestResult {
        let agent = Ed25519Signer::from_seed(&[2; 32]);
        let invocation = invoke(
            &agent,
            &did!("web:access.example.com"),
            Capability::new("access/claim", agent.did().as_str()),
            Expiration::At(100),
            [],
        )?;
        assert_eq!(invocation.capability().can, "access/claim");
        assert_eq!(invocation.audience(), &did!("web:access.example.com"));
        Ok(())
    }
}
