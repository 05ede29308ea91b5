//! Content identifiers for DAG-CBOR blocks.

use ipld_core::cid::{Cid, multihash::Multihash};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::codec::CodecError;

/// Multicodec code for DAG-CBOR.
pub const DAG_CBOR: u64 = 0x71;

/// Multihash code for sha2-256.
pub const SHA2_256: u64 = 0x12;

/// CIDv1 of an already encoded DAG-CBOR block.
///
/// # Errors
///
/// Fails only if the digest cannot be wrapped in a multihash.
pub fn block_cid(bytes: &[u8]) -> Result<Cid, CodecError> {
    let digest = Sha256::digest(bytes);
    let hash = Multihash::<64>::wrap(SHA2_256, &digest)
        .map_err(|e| CodecError::Multihash(e.to_string()))?;
    Ok(Cid::new_v1(DAG_CBOR, hash))
}

/// Encode `value` as DAG-CBOR and compute its CID.
///
/// # Errors
///
/// Returns [`CodecError`] if encoding fails.
pub fn to_dagcbor_cid<T: Serialize + ?Sized>(value: &T) -> Result<Cid, CodecError> {
    let bytes = serde_ipld_dagcbor::to_vec(value).map_err(|e| CodecError::Encode(e.to_string()))?;
    block_cid(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn cids_are_stable_under_key_order() {
        let mut a = BTreeMap::new();
        a.insert("b", 2);
        a.insert("a", 1);
        let mut b = BTreeMap::new();
        b.insert("a", 1);
        b.insert("b", 2);
        assert_eq!(to_dagcbor_cid(&a).unwrap(), to_dagcbor_cid(&b).unwrap());
    }

    #[test]
    fn cids_use_dag_cbor_and_sha256() {
        let cid = to_dagcbor_cid(&"hello").unwrap();
        assert_eq!(cid.version(), ipld_core::cid::Version::V1);
        assert_eq!(cid.codec(), DAG_CBOR);
        assert_eq!(cid.hash().code(), SHA2_256);
        assert!(cid.to_string().starts_with("bafy"));
    }
}
