//! Principals of the access protocol.
//!
//! Principals are identified by [`Did`]s of three kinds:
//!
//! - `did:key`: agents holding an ed25519 key ([`Ed25519Signer`] /
//!   [`Ed25519Verifier`]),
//! - `did:mailto`: accounts, which hold no key and are modelled as
//!   [`Absentee`] principals,
//! - `did:web`: services, which sign with a key registered in a
//!   [`KeyResolver`].
//!
//! The [`Resolver`] trait turns a DID into a [`Verifier`], forcing callers to
//! handle the absentee case explicitly.

pub mod did;
pub mod ed25519;
pub mod principal;
pub mod resolver;

pub use did::{Did, DidParseError};
pub use ed25519::{
    Ed25519DidFromStrError, Ed25519KeyError, Ed25519Signature, Ed25519Signer, Ed25519Verifier,
};
pub use principal::{Absentee, Authority, Principal};
pub use resolver::{KeyResolver, ResolveError, Resolver, Verifier};
