//! Revocation bookkeeping.

use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

use access_principal::Did;
use ipld_core::cid::Cid;
use parking_lot::RwLock;

/// Ability of revocation invocations.
pub const REVOKE: &str = "ucan/revoke";

/// A principal voids a delegation for every chain that passes through it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revocation {
    /// The revoked delegation.
    pub ucan: Cid,
    /// The principal issuing the revocation.
    pub revoker: Did,
    /// Proofs showing the revoker is upstream of the revoked delegation.
    pub proof: Vec<Cid>,
}

/// Revocation lookup consulted at every step of chain validation.
pub trait Revocations: Send + Sync {
    /// Principals that revoked `ucan`.
    fn revokers(&self, ucan: &Cid) -> BTreeSet<Did>;

    /// Returns `true` if anyone revoked `ucan`.
    fn is_revoked(&self, ucan: &Cid) -> bool {
        !self.revokers(ucan).is_empty()
    }

    /// Record a revocation.
    fn record(&self, revocation: Revocation);
}

impl<R: Revocations + ?Sized> Revocations for Arc<R> {
    fn revokers(&self, ucan: &Cid) -> BTreeSet<Did> {
        (**self).revokers(ucan)
    }

    fn record(&self, revocation: Revocation) {
        (**self).record(revocation);
    }
}

impl<R: Revocations + ?Sized> Revocations for &R {
    fn revokers(&self, ucan: &Cid) -> BTreeSet<Did> {
        (**self).revokers(ucan)
    }

    fn record(&self, revocation: Revocation) {
        (**self).record(revocation);
    }
}

/// In-memory [`Revocations`].
#[derive(Debug, Default)]
pub struct MemoryRevocations {
    revoked: RwLock<HashMap<Cid, BTreeSet<Did>>>,
}

impl MemoryRevocations {
    /// An empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of revoked delegations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.revoked.read().len()
    }

    /// Returns `true` if nothing has been revoked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.revoked.read().is_empty()
    }
}

impl Revocations for MemoryRevocations {
    fn revokers(&self, ucan: &Cid) -> BTreeSet<Did> {
        self.revoked.read().get(ucan).cloned().unwrap_or_default()
    }

    fn record(&self, revocation: Revocation) {
        self.revoked
            .write()
            .entry(revocation.ucan)
            .or_default()
            .insert(revocation.revoker);
    }
}
