//! Delegations, invocations and attestations of the access protocol, and
//! the validator that checks an invocation against its proof chain.
//!
//! Delegations are content addressed: the CID is computed over the DAG-CBOR
//! encoding of `[signature, payload]`. Archives carry a delegation together
//! with the proofs it relies on, and have a multibase text form suitable for
//! URLs.

pub mod archive;
pub mod cid;
pub mod codec;
pub mod delegation;
pub mod invocation;
pub mod issue;
pub mod revocation;
pub mod time;
pub mod validator;

pub use codec::CodecError;
pub use delegation::{BuildError, Delegation, DelegationBuilder, DelegationPayload};
pub use invocation::{Invocation, InvocationError};
pub use issue::{ATTEST, attest, attested, delegate, invoke};
pub use revocation::{MemoryRevocations, REVOKE, Revocation, Revocations};
pub use time::{Expiration, Timestamp};
pub use validator::{Authorization, InvalidClaim, ProofFailure, Validator};

pub use ipld_core::{cid::Cid, ipld::Ipld};
