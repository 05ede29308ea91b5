//! Self-describing encoding of a delegation with its attached proofs.
//!
//! An archive is the DAG-CBOR map `{ root, blocks }`: the root CID, the root
//! block, then every transitively attached proof block in CID order. The
//! text form is multibase base64url.

use std::collections::BTreeMap;

use ipld_core::cid::Cid;
use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;

use crate::{
    cid::block_cid,
    codec::{self, CodecError, from_multibase, to_multibase},
    delegation::Delegation,
};

#[derive(Serialize, Deserialize)]
struct Archive {
    root: Cid,
    blocks: Vec<ByteBuf>,
}

impl Delegation {
    /// Encode this delegation and its attached proofs.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if encoding fails.
    pub fn archive(&self) -> Result<Vec<u8>, CodecError> {
        let proofs: BTreeMap<Cid, &[u8]> = self
            .iter_all()
            .into_iter()
            .skip(1)
            .filter(|proof| proof.cid() != self.cid())
            .map(|proof| (proof.cid(), proof.block()))
            .collect();
        let mut blocks = Vec::with_capacity(proofs.len() + 1);
        blocks.push(ByteBuf::from(self.block()));
        blocks.extend(proofs.into_values().map(ByteBuf::from));
        codec::encode(&Archive {
            root: self.cid(),
            blocks,
        })
    }

    /// Decode an archive produced by [`Delegation::archive`].
    ///
    /// Proofs whose blocks are present are re-attached.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if the bytes are not an archive or the root
    /// block is missing.
    pub fn extract(bytes: &[u8]) -> Result<Self, CodecError> {
        let archive: Archive = codec::decode(bytes)?;
        let mut blocks = BTreeMap::new();
        for block in &archive.blocks {
            blocks.insert(block_cid(block)?, block.as_slice());
        }
        assemble(&archive.root, &blocks, 0)
    }

    /// Archive as multibase base64url text, e.g. for a URL parameter.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if encoding fails.
    pub fn format(&self) -> Result<String, CodecError> {
        Ok(to_multibase(&self.archive()?))
    }

    /// Parse text produced by [`Delegation::format`].
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] for invalid text or archives.
    pub fn parse(text: &str) -> Result<Self, CodecError> {
        Self::extract(&from_multibase(text)?)
    }
}

/// Proof graphs deeper than this are rejected.
const MAX_DEPTH: usize = 64;

fn assemble(cid: &Cid, blocks: &BTreeMap<Cid, &[u8]>, depth: usize) -> Result<Delegation, CodecError> {
    let block = blocks
        .get(cid)
        .ok_or_else(|| CodecError::Decode(format!("missing block {cid}")))?;
    if depth > MAX_DEPTH {
        return Err(CodecError::Decode(format!("proofs nested too deep at {cid}")));
    }
    let delegation = Delegation::from_block(block)?;
    let mut attached = Vec::new();
    for proof in delegation.proofs() {
        if blocks.contains_key(proof) {
            attached.push(assemble(proof, blocks, depth + 1)?);
        }
    }
    Ok(delegation.with_attached(attached))
}

#[cfg(test)]
mod tests {
    use super::*;
    use access_capability::Capability;
    use access_principal::{Absentee, Ed25519Signer, Principal, did};
    use pretty_assertions::assert_eq;
    use testresult::TestResult;

    fn signer(seed: u8) -> Ed25519Signer {
        Ed25519Signer::from_seed(&[seed; 32])
    }

    fn chain() -> Result<Delegation, crate::delegation::BuildError> {
        let space = signer(1);
        let account = Absentee::new(did!("mailto:example.com:alice"));
        let agent = signer(2);
        let root = Delegation::builder()
            .audience(account.did())
            .capability(Capability::new("*", space.did().as_str()))
            .sign(&space)?;
        let middle = Delegation::builder()
            .audience(agent.did())
            .capability(Capability::new("*", "ucan:*"))
            .proof(root)
            .sign(&account)?;
        Delegation::builder()
            .audience(signer(3).did())
            .capability(Capability::new("store/*", space.did().as_str()))
            .proof(middle)
            .sign(&agent)
    }

    #[test]
    fn archive_roundtrip_is_byte_identical() -> TestResult {
        let delegation = chain()?;
        let bytes = delegation.archive()?;
        let decoded = Delegation::extract(&bytes)?;
        assert_eq!(decoded.cid(), delegation.cid());
        assert_eq!(decoded.iter_all().len(), 3);
        assert_eq!(decoded.archive()?, bytes);
        Ok(())
    }

    #[test]
    fn text_form_roundtrip_is_identical() -> TestResult {
        let delegation = chain()?;
        let text = delegation.format()?;
        assert!(text.starts_with('u'));
        let decoded = Delegation::parse(&text)?;
        assert_eq!(decoded.format()?, text);
        Ok(())
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(Delegation::parse("uAAAA").is_err());
        assert!(Delegation::parse("not multibase").is_err());
        assert!(Delegation::extract(&[0xa0]).is_err());
    }
}
