//! Delegation stores.

use std::{collections::BTreeMap, sync::Mutex};

use access_principal::Did;
use access_ucan::{Cid, Delegation};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use thiserror::Error;

/// Error for when an in-memory store's [`Mutex`] is poisoned.
#[derive(Debug, Clone, Copy, Error)]
#[error("store poisoned")]
pub struct StorePoisoned;

/// Error type for the service's stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Mutex was poisoned
    #[error(transparent)]
    Poisoned(#[from] StorePoisoned),

    /// The backing store failed
    #[error("store backend failed: {0}")]
    Backend(String),
}

/// Delegations matching a [`DelegationStore::find`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// Audience of the delegations.
    pub audience: Did,
}

impl Query {
    /// Delegations addressed to `audience`.
    pub fn audience(audience: impl Into<Did>) -> Self {
        Self {
            audience: audience.into(),
        }
    }
}

/// Delegation store.
///
/// Stores must read their own writes for a given audience. Inserting a
/// delegation that is already stored is a no-op.
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait DelegationStore: Send + Sync {
    /// Store `delegations` together with their attached proofs.
    async fn put_many(&self, delegations: Vec<Delegation>) -> Result<(), StoreError>;

    /// Stream the delegations matching `query`.
    fn find(&self, query: Query) -> BoxStream<'_, Result<Delegation, StoreError>>;

    /// Number of stored delegations.
    async fn count(&self) -> Result<u64, StoreError>;
}

/// In-memory [`DelegationStore`] keyed by CID.
#[derive(Debug, Default)]
pub struct MemoryDelegationStore {
    delegations: Mutex<BTreeMap<Cid, Delegation>>,
}

impl MemoryDelegationStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl DelegationStore for MemoryDelegationStore {
    async fn put_many(&self, delegations: Vec<Delegation>) -> Result<(), StoreError> {
        let mut locked = self.delegations.lock().map_err(|_| StorePoisoned)?;
        for delegation in delegations {
            locked.entry(delegation.cid()).or_insert(delegation);
        }
        Ok(())
    }

    fn find(&self, query: Query) -> BoxStream<'_, Result<Delegation, StoreError>> {
        let matching = match self.delegations.lock() {
            Ok(locked) => locked
                .values()
                .filter(|delegation| delegation.audience() == &query.audience)
                .cloned()
                .map(Ok)
                .collect::<Vec<_>>(),
            Err(_) => vec![Err(StorePoisoned.into())],
        };
        stream::iter(matching).boxed()
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let locked = self.delegations.lock().map_err(|_| StorePoisoned)?;
        Ok(locked.len() as u64)
    }
}
