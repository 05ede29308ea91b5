//! Proof chain validation.
//!
//! [`Validator::authorize`] walks from an invoked capability back to the
//! resource owner. At each step it looks for a proof addressed to the
//! current holder that is within its time window, not revoked, correctly
//! signed (or attested, for absentee issuers) and grants a capability the
//! claim derives from. The proof's issuer becomes the next holder, and the
//! walk ends once the holder is the resource itself.

use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

use access_capability::{Capability, DeriveError, Malformed, Registry, can_derive, upstream};
use access_principal::{Did, ResolveError, Resolver, Verifier};
use ipld_core::cid::Cid;
use thiserror::Error;
use tracing::debug;

use crate::{
    delegation::Delegation,
    invocation::Invocation,
    issue::attested,
    revocation::Revocations,
    time::{Expiration, Timestamp},
};

/// Chains longer than this are rejected.
const MAX_DEPTH: usize = 32;

/// Why a single proof could not be used.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProofFailure {
    /// The proof is referenced but not available.
    #[error("proof {0} is not available")]
    Unknown(Cid),

    /// The proof is addressed to someone else.
    #[error("proof {cid} is issued to {actual}, expected {expected}")]
    AudienceMismatch {
        /// The proof.
        cid: Cid,
        /// The current holder.
        expected: Did,
        /// The proof's audience.
        actual: Did,
    },

    /// The proof has expired.
    #[error("proof {cid} expired at {expiration}")]
    Expired {
        /// The proof.
        cid: Cid,
        /// Its expiration.
        expiration: Timestamp,
    },

    /// The proof is not valid yet.
    #[error("proof {cid} is not valid before {not_before}")]
    NotYetValid {
        /// The proof.
        cid: Cid,
        /// Its start of validity.
        not_before: Timestamp,
    },

    /// An issuer upstream of the proof revoked it.
    #[error("proof {cid} has been revoked by {revoker}")]
    Revoked {
        /// The proof.
        cid: Cid,
        /// Who revoked it.
        revoker: Did,
    },

    /// The signature does not match the issuer.
    #[error("proof {cid} does not have a valid signature from {issuer}")]
    InvalidSignature {
        /// The proof.
        cid: Cid,
        /// Its issuer.
        issuer: Did,
    },

    /// The issuer cannot be resolved to a verifier.
    #[error("proof {cid} issuer {issuer} cannot be resolved: {source}")]
    Unresolvable {
        /// The proof.
        cid: Cid,
        /// Its issuer.
        issuer: Did,
        /// Resolution error.
        source: ResolveError,
    },

    /// An absentee issuer without a valid attestation from the authority.
    #[error("proof {cid} from {issuer} has no valid attestation from {authority}")]
    Unattested {
        /// The proof.
        cid: Cid,
        /// Its absentee issuer.
        issuer: Did,
        /// The trusted authority.
        authority: Did,
    },

    /// None of the proof's capabilities grant the claim.
    #[error("proof {cid} does not grant the claim: {}", join(.reasons))]
    Escalation {
        /// The proof.
        cid: Cid,
        /// One failure per capability of the proof.
        reasons: Vec<DeriveError>,
    },

    /// The proof is valid, but its issuer could not prove its own authority.
    #[error("proof {cid} is not authorized: {cause}")]
    Upstream {
        /// The proof.
        cid: Cid,
        /// Why its issuer is not authorized.
        cause: Box<InvalidClaim>,
    },

    /// The proof already appears further down the chain.
    #[error("proof {0} is part of a cycle or exceeds the maximum depth")]
    Cycle(Cid),
}

fn join(reasons: &[DeriveError]) -> String {
    let reasons: Vec<String> = reasons.iter().map(ToString::to_string).collect();
    reasons.join("; ")
}

impl ProofFailure {
    /// The failures at the end of `Upstream` chains.
    fn leaves<'a>(&'a self, leaves: &mut Vec<&'a ProofFailure>) {
        match self {
            ProofFailure::Upstream { cause, .. } => leaves.extend(cause.leaves()),
            other => leaves.push(other),
        }
    }
}

/// Error type for [`Validator::authorize`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidClaim {
    /// The invoked capability does not fit its ability's schema.
    #[error(transparent)]
    Malformed(#[from] Malformed),

    /// Wildcard abilities can only be delegated.
    #[error("{0} can only be delegated, not invoked")]
    WildcardInvocation(String),

    /// The invocation is addressed to a different service.
    #[error("invocation is addressed to {actual}, expected {expected}")]
    WrongAudience {
        /// The validating authority.
        expected: Did,
        /// The invocation's audience.
        actual: Did,
    },

    /// The invocation envelope itself is invalid.
    #[error("invalid invocation: {0}")]
    Invocation(ProofFailure),

    /// No proof establishes the claim.
    #[error("{capability} is not authorized for {holder}{}", describe(.failures))]
    Unauthorized {
        /// The capability being proven at the failing step.
        capability: Capability,
        /// Who had to prove it.
        holder: Did,
        /// One failure per candidate proof.
        failures: Vec<ProofFailure>,
    },
}

fn describe(failures: &[ProofFailure]) -> String {
    if failures.is_empty() {
        ": no proofs".into()
    } else {
        let failures: Vec<String> = failures.iter().map(ToString::to_string).collect();
        format!(": {}", failures.join("; "))
    }
}

impl InvalidClaim {
    /// Every underlying proof failure, following upstream causes.
    #[must_use]
    pub fn leaves(&self) -> Vec<&ProofFailure> {
        let mut leaves = Vec::new();
        match self {
            InvalidClaim::Invocation(failure) => failure.leaves(&mut leaves),
            InvalidClaim::Unauthorized { failures, .. } => {
                for failure in failures {
                    failure.leaves(&mut leaves);
                }
            }
            InvalidClaim::Malformed(_)
            | InvalidClaim::WildcardInvocation(_)
            | InvalidClaim::WrongAudience { .. } => {}
        }
        leaves
    }
}

/// A successfully validated invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Authorization {
    /// The invocation.
    pub invocation: Cid,
    /// The invoked capability.
    pub capability: Capability,
    /// Who invoked it.
    pub issuer: Did,
    /// Proofs from the invoker up to the resource owner.
    pub chain: Vec<Cid>,
}

/// Everything available to prove a claim.
struct Bundle<'a> {
    delegations: HashMap<Cid, &'a Delegation>,
    now: Timestamp,
}

impl<'a> Bundle<'a> {
    fn new(invocation: &'a Invocation, proofs: &'a [Delegation], now: Timestamp) -> Self {
        let mut delegations = HashMap::new();
        let roots = std::iter::once(invocation.delegation()).chain(proofs);
        for root in roots {
            for delegation in root.iter_all() {
                delegations.insert(delegation.cid(), delegation);
            }
        }
        Self { delegations, now }
    }

    fn get(&self, cid: &Cid) -> Option<&'a Delegation> {
        self.delegations.get(cid).copied()
    }

    fn attestations_for(&self, cid: Cid) -> impl Iterator<Item = &'a Delegation> + '_ {
        self.delegations
            .values()
            .copied()
            .filter(move |delegation| attested(delegation) == Some(cid))
    }
}

/// Validates invocations against their proof chains.
///
/// `authority` is the DID of the service whose attestations vouch for
/// absentee issuers.
pub struct Validator<R> {
    authority: Did,
    registry: Registry,
    resolver: R,
    revocations: Arc<dyn Revocations>,
}

impl<R: Resolver> Validator<R> {
    /// A validator using the standard ability registry.
    pub fn new(authority: Did, resolver: R, revocations: Arc<dyn Revocations>) -> Self {
        Self {
            authority,
            registry: Registry::standard(),
            resolver,
            revocations,
        }
    }

    /// Replace the ability registry.
    #[must_use]
    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    /// The trusted authority.
    #[must_use]
    pub const fn authority(&self) -> &Did {
        &self.authority
    }

    /// The ability registry.
    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The principal resolver.
    #[must_use]
    pub const fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Validate `invocation` at time `now`.
    ///
    /// Proofs are looked up among the invocation's attached proofs and
    /// `proofs`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidClaim`] describing the first failing step.
    pub fn authorize(
        &self,
        invocation: &Invocation,
        proofs: &[Delegation],
        now: Timestamp,
    ) -> Result<Authorization, InvalidClaim> {
        let capability = invocation.capability();
        let descriptor = self
            .registry
            .get(&capability.can)
            .ok_or_else(|| Malformed::UnknownAbility(capability.can.clone()))?;
        descriptor.validate(capability)?;
        if descriptor.is_wildcard() {
            return Err(InvalidClaim::WildcardInvocation(capability.can.clone()));
        }
        if invocation.audience() != &self.authority {
            return Err(InvalidClaim::WrongAudience {
                expected: self.authority.clone(),
                actual: invocation.audience().clone(),
            });
        }

        let bundle = Bundle::new(invocation, proofs, now);
        self.check(&bundle, invocation.delegation())
            .map_err(InvalidClaim::Invocation)?;

        let mut path = vec![invocation.cid()];
        let chain = self.prove(&bundle, capability, invocation.delegation(), &mut path)?;
        debug!(
            invocation = %invocation.cid(),
            can = %capability.can,
            with = %capability.with,
            depth = chain.len(),
            "invocation authorized"
        );
        Ok(Authorization {
            invocation: invocation.cid(),
            capability: capability.clone(),
            issuer: invocation.issuer().clone(),
            chain,
        })
    }

    /// Prove that the issuer of `node` holds `claim`, returning the proofs
    /// used from `node` up to the resource owner.
    fn prove(
        &self,
        bundle: &Bundle<'_>,
        claim: &Capability,
        node: &Delegation,
        path: &mut Vec<Cid>,
    ) -> Result<Vec<Cid>, InvalidClaim> {
        let holder = node.issuer();
        if holder.as_str() == claim.with {
            return Ok(Vec::new());
        }
        let mut failures = Vec::new();
        for cid in node.proofs() {
            if bundle.get(cid).is_some_and(|proof| attested(proof).is_some()) {
                continue;
            }
            match self.try_proof(bundle, claim, holder, cid, path) {
                Ok(chain) => return Ok(chain),
                Err(failure) => {
                    debug!(proof = %cid, %failure, "proof rejected");
                    failures.push(failure);
                }
            }
        }
        Err(InvalidClaim::Unauthorized {
            capability: claim.clone(),
            holder: holder.clone(),
            failures,
        })
    }

    fn try_proof(
        &self,
        bundle: &Bundle<'_>,
        claim: &Capability,
        holder: &Did,
        cid: &Cid,
        path: &mut Vec<Cid>,
    ) -> Result<Vec<Cid>, ProofFailure> {
        let proof = bundle.get(cid).ok_or(ProofFailure::Unknown(*cid))?;
        if path.contains(cid) || path.len() > MAX_DEPTH {
            return Err(ProofFailure::Cycle(*cid));
        }
        if proof.audience() != holder {
            return Err(ProofFailure::AudienceMismatch {
                cid: *cid,
                expected: holder.clone(),
                actual: proof.audience().clone(),
            });
        }
        self.check(bundle, proof)?;

        let mut reasons = Vec::new();
        let mut upstream_failure = None;
        for capability in proof.capabilities() {
            if let Err(reason) = can_derive(&self.registry, claim, capability) {
                reasons.push(reason);
                continue;
            }
            let parent = upstream(claim, capability);
            match self.through(bundle, &parent, proof, cid, path) {
                Ok(chain) => return Ok(chain),
                Err(failure) => {
                    debug!(proof = %cid, parent = %parent, %failure, "parent not proven");
                    upstream_failure.get_or_insert(failure);
                }
            }
        }
        Err(upstream_failure.unwrap_or(ProofFailure::Escalation { cid: *cid, reasons }))
    }

    /// Prove `parent` upstream of `proof` and check that no issuer along the
    /// resulting chain revoked `proof`.
    fn through(
        &self,
        bundle: &Bundle<'_>,
        parent: &Capability,
        proof: &Delegation,
        cid: &Cid,
        path: &mut Vec<Cid>,
    ) -> Result<Vec<Cid>, ProofFailure> {
        path.push(*cid);
        let upstream = self.prove(bundle, parent, proof, path);
        path.pop();
        let upstream = upstream.map_err(|cause| ProofFailure::Upstream {
            cid: *cid,
            cause: Box::new(cause),
        })?;

        let revokers = self.revocations.revokers(cid);
        if !revokers.is_empty() {
            let issuers: BTreeSet<&Did> = std::iter::once(proof.issuer())
                .chain(
                    upstream
                        .iter()
                        .filter_map(|cid| bundle.get(cid))
                        .map(Delegation::issuer),
                )
                .collect();
            if let Some(revoker) = revokers.iter().find(|revoker| issuers.contains(revoker)) {
                return Err(ProofFailure::Revoked {
                    cid: *cid,
                    revoker: revoker.clone(),
                });
            }
        }

        let mut chain = Vec::with_capacity(upstream.len() + 1);
        chain.push(*cid);
        chain.extend(upstream);
        Ok(chain)
    }

    /// Time window, self-revocation and signature (or attestation).
    fn check(&self, bundle: &Bundle<'_>, delegation: &Delegation) -> Result<(), ProofFailure> {
        let cid = delegation.cid();
        self.check_time(bundle, delegation)?;
        if self.revocations.revokers(&cid).contains(delegation.issuer()) {
            return Err(ProofFailure::Revoked {
                cid,
                revoker: delegation.issuer().clone(),
            });
        }
        match self.resolve(delegation)? {
            key @ Verifier::Key(_) => self.check_signature(delegation, &key),
            Verifier::Absentee(issuer) => self.check_attestation(bundle, delegation, issuer),
        }
    }

    fn check_time(&self, bundle: &Bundle<'_>, delegation: &Delegation) -> Result<(), ProofFailure> {
        let cid = delegation.cid();
        if let Expiration::At(expiration) = delegation.expiration() {
            if bundle.now > expiration {
                return Err(ProofFailure::Expired { cid, expiration });
            }
        }
        if let Some(not_before) = delegation.not_before() {
            if bundle.now < not_before {
                return Err(ProofFailure::NotYetValid { cid, not_before });
            }
        }
        Ok(())
    }

    fn resolve(&self, delegation: &Delegation) -> Result<Verifier, ProofFailure> {
        self.resolver
            .resolve(delegation.issuer())
            .map_err(|source| ProofFailure::Unresolvable {
                cid: delegation.cid(),
                issuer: delegation.issuer().clone(),
                source,
            })
    }

    fn check_signature(
        &self,
        delegation: &Delegation,
        verifier: &Verifier,
    ) -> Result<(), ProofFailure> {
        delegation
            .verify_signature(verifier)
            .map_err(|_| ProofFailure::InvalidSignature {
                cid: delegation.cid(),
                issuer: delegation.issuer().clone(),
            })
    }

    /// An absentee delegation needs a valid, signed `ucan/attest` from the
    /// authority naming its CID.
    fn check_attestation(
        &self,
        bundle: &Bundle<'_>,
        delegation: &Delegation,
        issuer: Did,
    ) -> Result<(), ProofFailure> {
        let mut last = None;
        for attestation in bundle.attestations_for(delegation.cid()) {
            let from_authority = attestation.issuer() == &self.authority
                && attestation
                    .capabilities()
                    .iter()
                    .all(|capability| capability.with == self.authority.as_str());
            if !from_authority {
                continue;
            }
            let verdict = self.check_time(bundle, attestation).and_then(|()| {
                if self.revocations.is_revoked(&attestation.cid()) {
                    return Err(ProofFailure::Revoked {
                        cid: attestation.cid(),
                        revoker: self.authority.clone(),
                    });
                }
                match self.resolve(attestation)? {
                    key @ Verifier::Key(_) => self.check_signature(attestation, &key),
                    Verifier::Absentee(_) => Err(ProofFailure::InvalidSignature {
                        cid: attestation.cid(),
                        issuer: attestation.issuer().clone(),
                    }),
                }
            });
            match verdict {
                Ok(()) => return Ok(()),
                Err(failure) => last = Some(failure),
            }
        }
        Err(last.unwrap_or_else(|| ProofFailure::Unattested {
            cid: delegation.cid(),
            issuer,
            authority: self.authority.clone(),
        }))
    }
}
