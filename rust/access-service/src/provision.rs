//! Storage provisioning of spaces.

use access_principal::Did;
use access_ucan::Cid;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::store::StoreError;

/// A space provisioned with a storage provider by an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provision {
    /// The space.
    pub space: Did,
    /// The storage provider.
    pub provider: Did,
    /// The account paying for it.
    pub account: Did,
    /// The `provider/add` invocation.
    pub cause: Cid,
}

/// Which providers back which spaces.
///
/// Adding a provider is not transactional: two accounts provisioning the
/// same space at once may both succeed.
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait Provisions: Send + Sync {
    /// Provisions of `space`.
    async fn providers(&self, space: &Did) -> Result<Vec<Provision>, StoreError>;

    /// Record `provision`. Recording the same space and provider again
    /// replaces the earlier record.
    async fn add_provider(&self, provision: Provision) -> Result<(), StoreError>;
}

/// In-memory [`Provisions`].
#[derive(Debug, Default)]
pub struct MemoryProvisions {
    spaces: DashMap<Did, Vec<Provision>>,
}

impl MemoryProvisions {
    /// No provisioned spaces.
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl Provisions for MemoryProvisions {
    async fn providers(&self, space: &Did) -> Result<Vec<Provision>, StoreError> {
        Ok(self
            .spaces
            .get(space)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    async fn add_provider(&self, provision: Provision) -> Result<(), StoreError> {
        let mut provisions = self.spaces.entry(provision.space.clone()).or_default();
        provisions.retain(|existing| existing.provider != provision.provider);
        provisions.push(provision);
        Ok(())
    }
}
