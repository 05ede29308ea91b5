//! Tests for proof chain validation: expiry, audiences, escalation,
//! signatures, absentee attestation and revocation.

use std::sync::Arc;

use access_capability::Capability;
use access_principal::{Absentee, Did, Ed25519Signer, KeyResolver, Principal, did};
use access_ucan::{
    Delegation, Expiration, InvalidClaim, Invocation, MemoryRevocations, ProofFailure, Revocation,
    Revocations, Validator, attest, invoke,
};
use ipld_core::ipld::Ipld;
use proptest::prelude::*;
use testresult::TestResult;

const NOW: u64 = 1_700_000_000;

fn signer(seed: u8) -> Ed25519Signer {
    Ed25519Signer::from_seed(&[seed; 32])
}

fn service() -> Ed25519Signer {
    signer(200).with_did(did!("web:access.example.com"))
}

fn validator(revocations: Arc<MemoryRevocations>) -> Validator<KeyResolver> {
    let service = service();
    let resolver = KeyResolver::new().with_web_key(service.did(), *service.verifier());
    Validator::new(service.did(), resolver, revocations)
}

fn store_add(space: &Did, size: i64) -> Capability {
    Capability::new("store/add", space.as_str())
        .with_nb("link", Ipld::Link(access_ucan::cid::to_dagcbor_cid(&"shard").unwrap()))
        .with_nb("size", size)
}

fn grant(
    issuer: &Ed25519Signer,
    audience: &Did,
    capability: Capability,
    proofs: Vec<Delegation>,
) -> Result<Delegation, access_ucan::BuildError> {
    Delegation::builder()
        .audience(audience)
        .capability(capability)
        .expiration(Expiration::At(NOW + 3600))
        .proofs(proofs)
        .sign(issuer)
}

fn leaves(error: &InvalidClaim) -> Vec<ProofFailure> {
    error.leaves().into_iter().cloned().collect()
}

#[test]
fn chain_check_self_issued() -> TestResult {
    let space = signer(1);
    let invocation = invoke(
        &space,
        &service().did(),
        Capability::new("space/info", space.did().as_str()),
        Expiration::At(NOW + 60),
        [],
    )?;
    let authorization = validator(Arc::default()).authorize(&invocation, &[], NOW)?;
    assert_eq!(authorization.issuer, space.did());
    assert!(authorization.chain.is_empty());
    Ok(())
}

#[test]
fn chain_check_single_delegation() -> TestResult {
    let space = signer(1);
    let agent = signer(2);
    let proof = grant(&space, &agent.did(), Capability::new("*", space.did().as_str()), vec![])?;
    let invocation = invoke(
        &agent,
        &service().did(),
        store_add(&space.did(), 1024),
        Expiration::At(NOW + 60),
        [proof.clone()],
    )?;
    let authorization = validator(Arc::default()).authorize(&invocation, &[], NOW)?;
    assert_eq!(authorization.chain, vec![proof.cid()]);
    assert_eq!(authorization.capability.can, "store/add");
    Ok(())
}

#[test]
fn chain_check_unknown_proof() -> TestResult {
    let space = signer(1);
    let agent = signer(2);
    let proof = grant(&space, &agent.did(), Capability::new("*", space.did().as_str()), vec![])?;
    let invocation: Invocation = Delegation::builder()
        .audience(service().did())
        .capability(Capability::new("space/info", space.did().as_str()))
        .proof_link(proof.cid())
        .sign(&agent)?
        .try_into()?;

    let validator = validator(Arc::default());
    let error = validator.authorize(&invocation, &[], NOW).unwrap_err();
    assert_eq!(leaves(&error), vec![ProofFailure::Unknown(proof.cid())]);

    assert!(validator.authorize(&invocation, &[proof], NOW).is_ok());
    Ok(())
}

#[test]
fn chain_check_expired_and_early_proofs() -> TestResult {
    let space = signer(1);
    let agent = signer(2);
    let expired = Delegation::builder()
        .audience(agent.did())
        .capability(Capability::new("*", space.did().as_str()))
        .expiration(Expiration::At(NOW - 1))
        .sign(&space)?;
    let early = Delegation::builder()
        .audience(agent.did())
        .capability(Capability::new("*", space.did().as_str()))
        .not_before(NOW + 1)
        .sign(&space)?;
    let validator = validator(Arc::default());

    for (proof, expected) in [
        (
            expired.clone(),
            ProofFailure::Expired {
                cid: expired.cid(),
                expiration: NOW - 1,
            },
        ),
        (
            early.clone(),
            ProofFailure::NotYetValid {
                cid: early.cid(),
                not_before: NOW + 1,
            },
        ),
    ] {
        let invocation = invoke(
            &agent,
            &service().did(),
            Capability::new("space/info", space.did().as_str()),
            Expiration::At(NOW + 60),
            [proof],
        )?;
        let error = validator.authorize(&invocation, &[], NOW).unwrap_err();
        assert_eq!(leaves(&error), vec![expected]);
    }
    Ok(())
}

#[test]
fn chain_check_expired_invocation() -> TestResult {
    let space = signer(1);
    let invocation = invoke(
        &space,
        &service().did(),
        Capability::new("space/info", space.did().as_str()),
        Expiration::At(NOW - 10),
        [],
    )?;
    let error = validator(Arc::default())
        .authorize(&invocation, &[], NOW)
        .unwrap_err();
    assert!(matches!(
        error,
        InvalidClaim::Invocation(ProofFailure::Expired { .. })
    ));
    Ok(())
}

#[test]
fn chain_check_audience_mismatch() -> TestResult {
    let space = signer(1);
    let agent = signer(2);
    let other = signer(3);
    let proof = grant(&space, &other.did(), Capability::new("*", space.did().as_str()), vec![])?;
    let invocation = invoke(
        &agent,
        &service().did(),
        Capability::new("space/info", space.did().as_str()),
        Expiration::At(NOW + 60),
        [proof.clone()],
    )?;
    let error = validator(Arc::default())
        .authorize(&invocation, &[], NOW)
        .unwrap_err();
    assert_eq!(
        leaves(&error),
        vec![ProofFailure::AudienceMismatch {
            cid: proof.cid(),
            expected: agent.did(),
            actual: other.did(),
        }]
    );
    Ok(())
}

#[test]
fn chain_check_escalation_names_field() -> TestResult {
    let space = signer(1);
    let agent = signer(2);
    let proof = grant(&space, &agent.did(), store_add(&space.did(), 10), vec![])?;
    let invocation = invoke(
        &agent,
        &service().did(),
        store_add(&space.did(), 20),
        Expiration::At(NOW + 60),
        [proof],
    )?;
    let error = validator(Arc::default())
        .authorize(&invocation, &[], NOW)
        .unwrap_err();
    let found = leaves(&error);
    let [ProofFailure::Escalation { reasons, .. }] = found.as_slice() else {
        panic!("expected an escalation, got {error}");
    };
    assert_eq!(reasons[0].to_string(), "20 violates imposed size constraint 10");
    Ok(())
}

#[test]
fn chain_check_tries_every_capability_of_a_proof() -> TestResult {
    let space = signer(1);
    let bob = signer(2);
    let carol = signer(3);
    let to_bob = grant(&space, &bob.did(), Capability::new("store/*", space.did().as_str()), vec![])?;
    let to_carol = Delegation::builder()
        .audience(carol.did())
        .capability(Capability::new("*", space.did().as_str()))
        .capability(Capability::new("store/*", space.did().as_str()))
        .expiration(Expiration::At(NOW + 3600))
        .proof(to_bob.clone())
        .sign(&bob)?;
    let validator = validator(Arc::default());

    let add = invoke(
        &carol,
        &service().did(),
        store_add(&space.did(), 64),
        Expiration::At(NOW + 60),
        [to_carol.clone()],
    )?;
    let authorization = validator.authorize(&add, &[], NOW)?;
    assert_eq!(authorization.chain, vec![to_carol.cid(), to_bob.cid()]);

    // Only the `*` capability covers space/info, and bob cannot back it.
    let info = invoke(
        &carol,
        &service().did(),
        Capability::new("space/info", space.did().as_str()),
        Expiration::At(NOW + 60),
        [to_carol],
    )?;
    let error = validator.authorize(&info, &[], NOW).unwrap_err();
    let found = leaves(&error);
    let [ProofFailure::Escalation { cid, .. }] = found.as_slice() else {
        panic!("expected an escalation, got {error}");
    };
    assert_eq!(*cid, to_bob.cid());
    Ok(())
}

#[test]
fn chain_check_any_resource_grant_needs_only_the_claim_upstream() -> TestResult {
    let space = signer(1);
    let agent = signer(2);
    let account = Absentee::new(did!("mailto:example.com:alice"));
    let to_account = grant(
        &space,
        &account.did(),
        Capability::new("store/*", space.did().as_str()),
        vec![],
    )?;
    let to_agent = Delegation::builder()
        .audience(agent.did())
        .capability(Capability::new("*", "ucan:*"))
        .proof(to_account.clone())
        .sign(&account)?;
    let attestation = attest(&service(), &agent.did(), to_agent.cid())?;
    let validator = validator(Arc::default());

    let add = invoke(
        &agent,
        &service().did(),
        store_add(&space.did(), 5),
        Expiration::At(NOW + 60),
        [to_agent.clone(), attestation.clone()],
    )?;
    let authorization = validator.authorize(&add, &[], NOW)?;
    assert_eq!(authorization.chain, vec![to_agent.cid(), to_account.cid()]);

    let info = invoke(
        &agent,
        &service().did(),
        Capability::new("space/info", space.did().as_str()),
        Expiration::At(NOW + 60),
        [to_agent, attestation],
    )?;
    let error = validator.authorize(&info, &[], NOW).unwrap_err();
    let found = leaves(&error);
    let [ProofFailure::Escalation { cid, .. }] = found.as_slice() else {
        panic!("expected an escalation, got {error}");
    };
    assert_eq!(*cid, to_account.cid());
    Ok(())
}

#[test]
fn chain_check_forged_signature() -> TestResult {
    let space = signer(1);
    let agent = signer(2);
    let forger = signer(9).with_did(space.did());
    let proof = grant(&forger, &agent.did(), Capability::new("*", space.did().as_str()), vec![])?;
    let invocation = invoke(
        &agent,
        &service().did(),
        Capability::new("space/info", space.did().as_str()),
        Expiration::At(NOW + 60),
        [proof.clone()],
    )?;
    let error = validator(Arc::default())
        .authorize(&invocation, &[], NOW)
        .unwrap_err();
    assert_eq!(
        leaves(&error),
        vec![ProofFailure::InvalidSignature {
            cid: proof.cid(),
            issuer: space.did(),
        }]
    );
    Ok(())
}

#[test]
fn chain_check_absentee_requires_attestation() -> TestResult {
    let space = signer(1);
    let agent = signer(2);
    let account = Absentee::new(did!("mailto:example.com:alice"));
    let to_account = grant(&space, &account.did(), Capability::new("*", space.did().as_str()), vec![])?;
    let to_agent = Delegation::builder()
        .audience(agent.did())
        .capability(Capability::new("*", "ucan:*"))
        .proof(to_account.clone())
        .sign(&account)?;
    let attestation = attest(&service(), &agent.did(), to_agent.cid())?;
    let validator = validator(Arc::default());

    let unattested = invoke(
        &agent,
        &service().did(),
        store_add(&space.did(), 5),
        Expiration::At(NOW + 60),
        [to_agent.clone()],
    )?;
    let error = validator.authorize(&unattested, &[], NOW).unwrap_err();
    assert_eq!(
        leaves(&error),
        vec![ProofFailure::Unattested {
            cid: to_agent.cid(),
            issuer: account.did(),
            authority: service().did(),
        }]
    );

    let attested = invoke(
        &agent,
        &service().did(),
        store_add(&space.did(), 5),
        Expiration::At(NOW + 60),
        [to_agent.clone(), attestation.clone()],
    )?;
    let authorization = validator.authorize(&attested, &[], NOW)?;
    assert_eq!(authorization.chain, vec![to_agent.cid(), to_account.cid()]);

    // An attestation from anyone else does not count.
    let impostor = attest(&signer(7), &agent.did(), to_agent.cid())?;
    let error = validator
        .authorize(&unattested, &[impostor], NOW)
        .unwrap_err();
    assert!(matches!(
        leaves(&error).as_slice(),
        [ProofFailure::Unattested { .. }]
    ));
    Ok(())
}

#[test]
fn chain_check_revocation_is_scoped_to_upstream_issuers() -> TestResult {
    let space = signer(1);
    let agent = signer(2);
    let stranger = signer(3);
    let proof = grant(&space, &agent.did(), Capability::new("*", space.did().as_str()), vec![])?;
    let invocation = invoke(
        &agent,
        &service().did(),
        Capability::new("space/info", space.did().as_str()),
        Expiration::At(NOW + 60),
        [proof.clone()],
    )?;
    let revocations = Arc::new(MemoryRevocations::new());
    let validator = validator(revocations.clone());

    revocations.record(Revocation {
        ucan: proof.cid(),
        revoker: stranger.did(),
        proof: vec![],
    });
    assert!(validator.authorize(&invocation, &[], NOW).is_ok());

    revocations.record(Revocation {
        ucan: proof.cid(),
        revoker: space.did(),
        proof: vec![],
    });
    let error = validator.authorize(&invocation, &[], NOW).unwrap_err();
    assert_eq!(
        leaves(&error),
        vec![ProofFailure::Revoked {
            cid: proof.cid(),
            revoker: space.did(),
        }]
    );
    Ok(())
}

#[test]
fn chain_check_rejects_wildcard_and_malformed_invocations() -> TestResult {
    let space = signer(1);
    let validator = validator(Arc::default());

    let wildcard = invoke(
        &space,
        &service().did(),
        Capability::new("store/*", space.did().as_str()),
        Expiration::At(NOW + 60),
        [],
    )?;
    assert_eq!(
        validator.authorize(&wildcard, &[], NOW),
        Err(InvalidClaim::WildcardInvocation("store/*".into()))
    );

    let malformed = invoke(
        &space,
        &service().did(),
        Capability::new("store/add", space.did().as_str()).with_nb("size", 1),
        Expiration::At(NOW + 60),
        [],
    )?;
    assert!(matches!(
        validator.authorize(&malformed, &[], NOW),
        Err(InvalidClaim::Malformed(_))
    ));
    Ok(())
}

#[test]
fn chain_check_wrong_audience() -> TestResult {
    let space = signer(1);
    let invocation = invoke(
        &space,
        &did!("web:elsewhere.example.com"),
        Capability::new("space/info", space.did().as_str()),
        Expiration::At(NOW + 60),
        [],
    )?;
    assert!(matches!(
        validator(Arc::default()).authorize(&invocation, &[], NOW),
        Err(InvalidClaim::WrongAudience { .. })
    ));
    Ok(())
}

/// A chain `space -> a1 -> ... -> an` with proofs referenced but not
/// attached, and an invocation by `an`.
fn linked_chain(length: usize) -> (Invocation, Vec<Delegation>) {
    let signers: Vec<Ed25519Signer> = (0..=length)
        .map(|i| signer(u8::try_from(i + 10).unwrap()))
        .collect();
    let space = signers[0].did();
    let mut proofs: Vec<Delegation> = Vec::new();
    for pair in signers.windows(2) {
        let mut builder = Delegation::builder()
            .audience(pair[1].did())
            .capability(Capability::new("*", space.as_str()))
            .expiration(Expiration::At(NOW + 3600));
        if let Some(previous) = proofs.last() {
            builder = builder.proof_link(previous.cid());
        }
        proofs.push(builder.sign(&pair[0]).unwrap());
    }
    let invocation = Delegation::builder()
        .audience(service().did())
        .capability(Capability::new("space/info", space.as_str()))
        .expiration(Expiration::At(NOW + 60))
        .proof_link(proofs.last().unwrap().cid())
        .sign(signers.last().unwrap())
        .unwrap()
        .try_into()
        .unwrap();
    (invocation, proofs)
}

proptest! {
    #[test]
    fn removing_any_link_breaks_the_chain(length in 1usize..6, seed in any::<prop::sample::Index>()) {
        let (invocation, proofs) = linked_chain(length);
        let validator = validator(Arc::default());
        prop_assert!(validator.authorize(&invocation, &proofs, NOW).is_ok());

        let removed = seed.index(proofs.len());
        let mut broken = proofs.clone();
        broken.remove(removed);
        prop_assert!(validator.authorize(&invocation, &broken, NOW).is_err());
    }

    #[test]
    fn revoking_any_link_breaks_the_chain(length in 1usize..6, seed in any::<prop::sample::Index>()) {
        let (invocation, proofs) = linked_chain(length);
        let revocations = Arc::new(MemoryRevocations::new());
        let validator = validator(revocations.clone());
        prop_assert!(validator.authorize(&invocation, &proofs, NOW).is_ok());

        let revoked = &proofs[seed.index(proofs.len())];
        revocations.record(Revocation {
            ucan: revoked.cid(),
            revoker: revoked.issuer().clone(),
            proof: vec![],
        });
        prop_assert!(revocations.is_revoked(&revoked.cid()));
        prop_assert!(validator.authorize(&invocation, &proofs, NOW).is_err());
    }
}
