//! Delegations: content-addressed grants of capabilities from an issuer to
//! an audience.

pub mod builder;

use std::{collections::BTreeMap, fmt};

use access_capability::Capability;
use access_principal::{Did, Ed25519Signature, Verifier};
use ipld_core::{cid::Cid, ipld::Ipld};
use serde::{Deserialize, Serialize};

use crate::{
    cid::block_cid,
    codec::{self, CodecError},
    time::{Expiration, Timestamp},
};

pub use builder::{BuildError, DelegationBuilder};

/// Signed (or absentee) grant of capabilities.
///
/// The block is the DAG-CBOR tuple `[signature, payload]`, with an empty
/// byte string standing in for the signature of absentee issuers. The CID
/// is computed over that block. Proofs referenced by CID may be attached to
/// the delegation; attached proofs travel with it but are not part of its
/// CID.
#[derive(Clone)]
pub struct Delegation {
    cid: Cid,
    block: Vec<u8>,
    signature: Option<Ed25519Signature>,
    payload: DelegationPayload,
    attached: BTreeMap<Cid, Delegation>,
}

/// The signed content of a [`Delegation`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelegationPayload {
    #[serde(rename = "iss")]
    pub(crate) issuer: Did,

    #[serde(rename = "aud")]
    pub(crate) audience: Did,

    #[serde(rename = "att")]
    pub(crate) capabilities: Vec<Capability>,

    #[serde(rename = "exp")]
    pub(crate) expiration: Expiration,

    #[serde(rename = "nbf", default, skip_serializing_if = "Option::is_none")]
    pub(crate) not_before: Option<Timestamp>,

    #[serde(rename = "prf", default)]
    pub(crate) proofs: Vec<Cid>,

    #[serde(rename = "fct", default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) facts: Vec<BTreeMap<String, Ipld>>,

    #[serde(rename = "nnc", default, skip_serializing_if = "Option::is_none")]
    pub(crate) nonce: Option<String>,
}

impl DelegationPayload {
    /// Bytes covered by the issuer's signature.
    pub(crate) fn signing_bytes(&self) -> Result<Vec<u8>, CodecError> {
        codec::encode(self)
    }
}

impl Delegation {
    /// Creates a blank [`DelegationBuilder`].
    #[must_use]
    pub fn builder() -> DelegationBuilder {
        DelegationBuilder::new()
    }

    pub(crate) fn seal(
        signature: Option<Ed25519Signature>,
        payload: DelegationPayload,
        attached: BTreeMap<Cid, Delegation>,
    ) -> Result<Self, CodecError> {
        let signature_bytes = signature.map(|s| s.to_bytes().to_vec()).unwrap_or_default();
        let block = codec::encode(&(serde_bytes::Bytes::new(&signature_bytes), &payload))?;
        Ok(Self {
            cid: block_cid(&block)?,
            block,
            signature,
            payload,
            attached,
        })
    }

    /// Decode a single block. Proofs are left unattached.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if the bytes are not a delegation.
    pub fn from_block(block: &[u8]) -> Result<Self, CodecError> {
        let (signature, payload): (serde_bytes::ByteBuf, DelegationPayload) =
            codec::decode(block)?;
        let signature = if signature.is_empty() {
            None
        } else {
            Some(
                Ed25519Signature::try_from(signature.as_slice())
                    .map_err(|e| CodecError::Signature(e.to_string()))?,
            )
        };
        Ok(Self {
            cid: block_cid(block)?,
            block: block.to_vec(),
            signature,
            payload,
            attached: BTreeMap::new(),
        })
    }

    /// Getter for the `issuer` field.
    #[must_use]
    pub const fn issuer(&self) -> &Did {
        &self.payload.issuer
    }

    /// Getter for the `audience` field.
    #[must_use]
    pub const fn audience(&self) -> &Did {
        &self.payload.audience
    }

    /// Getter for the `capabilities` field.
    #[must_use]
    pub fn capabilities(&self) -> &[Capability] {
        &self.payload.capabilities
    }

    /// Getter for the `expiration` field.
    #[must_use]
    pub const fn expiration(&self) -> Expiration {
        self.payload.expiration
    }

    /// Getter for the `not_before` field.
    #[must_use]
    pub const fn not_before(&self) -> Option<Timestamp> {
        self.payload.not_before
    }

    /// CIDs of the proofs this delegation relies on.
    #[must_use]
    pub fn proofs(&self) -> &[Cid] {
        &self.payload.proofs
    }

    /// Getter for the `facts` field.
    #[must_use]
    pub fn facts(&self) -> &[BTreeMap<String, Ipld>] {
        &self.payload.facts
    }

    /// Getter for the `nonce` field.
    #[must_use]
    pub fn nonce(&self) -> Option<&str> {
        self.payload.nonce.as_deref()
    }

    /// The signature, `None` for absentee issuers.
    #[must_use]
    pub const fn signature(&self) -> Option<&Ed25519Signature> {
        self.signature.as_ref()
    }

    /// Getter for the payload.
    #[must_use]
    pub const fn payload(&self) -> &DelegationPayload {
        &self.payload
    }

    /// The content identifier.
    #[must_use]
    pub const fn cid(&self) -> Cid {
        self.cid
    }

    /// The encoded block the CID is computed over.
    #[must_use]
    pub fn block(&self) -> &[u8] {
        &self.block
    }

    /// Proofs carried with this delegation.
    pub fn attached(&self) -> impl Iterator<Item = &Delegation> {
        self.attached.values()
    }

    /// An attached proof by CID.
    #[must_use]
    pub fn attached_proof(&self, cid: &Cid) -> Option<&Delegation> {
        self.attached.get(cid)
    }

    /// Attach proofs this delegation references.
    ///
    /// Delegations not listed in `prf` are ignored, so the CID is
    /// unaffected.
    #[must_use]
    pub fn with_attached(mut self, proofs: impl IntoIterator<Item = Delegation>) -> Self {
        for proof in proofs {
            if self.payload.proofs.contains(&proof.cid) {
                self.attached.insert(proof.cid, proof);
            }
        }
        self
    }

    /// This delegation followed by every transitively attached proof.
    #[must_use]
    pub fn iter_all(&self) -> Vec<&Delegation> {
        let mut all = vec![self];
        let mut index = 0;
        while index < all.len() {
            let current = all[index];
            for proof in current.attached.values() {
                if !all.iter().any(|seen| seen.cid == proof.cid) {
                    all.push(proof);
                }
            }
            index += 1;
        }
        all
    }

    /// Returns `true` once `now` is past the expiration.
    #[must_use]
    pub const fn is_expired(&self, now: Timestamp) -> bool {
        self.payload.expiration.is_expired(now)
    }

    /// Returns `true` while `now` is before `not_before`.
    #[must_use]
    pub const fn is_too_early(&self, now: Timestamp) -> bool {
        match self.payload.not_before {
            Some(nbf) => now < nbf,
            None => false,
        }
    }

    /// Verify the signature with the issuer's verifier.
    ///
    /// # Errors
    ///
    /// Fails if the signature is missing or does not match the payload, and
    /// always for absentee verifiers.
    pub fn verify_signature(&self, verifier: &Verifier) -> Result<(), signature::Error> {
        let payload = self
            .payload
            .signing_bytes()
            .map_err(|_| signature::Error::new())?;
        verifier.verify(&payload, self.signature.as_ref())
    }
}

impl PartialEq for Delegation {
    fn eq(&self, other: &Self) -> bool {
        self.cid == other.cid
    }
}

impl Eq for Delegation {}

impl fmt::Debug for Delegation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delegation")
            .field("cid", &self.cid.to_string())
            .field("iss", &self.payload.issuer)
            .field("aud", &self.payload.audience)
            .field("att", &self.payload.capabilities)
            .field("exp", &self.payload.expiration)
            .field("prf", &self.payload.proofs.len())
            .finish_non_exhaustive()
    }
}
