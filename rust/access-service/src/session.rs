//! Session bindings: delegations waiting for an agent to collect them.

use access_principal::Did;
use access_ucan::{Cid, Delegation, Timestamp};
use async_trait::async_trait;
use dashmap::DashMap;

use crate::store::StoreError;

/// Delegations minted by a confirmation, held for the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// The authorization request that was confirmed.
    pub request: Cid,
    /// The account-to-agent delegation and its attestation.
    pub delegations: Vec<Delegation>,
    /// When the binding lapses.
    pub expires_at: Timestamp,
}

/// Short-lived store of [`Session`]s keyed by agent.
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait SessionStore: Send + Sync {
    /// Bind `session` to `agent`, replacing any earlier binding.
    async fn put(&self, agent: Did, session: Session) -> Result<(), StoreError>;

    /// Remove and return the binding of `agent` for `request`, unless it
    /// lapsed before `now`.
    async fn take(
        &self,
        agent: &Did,
        request: &Cid,
        now: Timestamp,
    ) -> Result<Option<Session>, StoreError>;

    /// Drop bindings that lapsed before `now`, returning how many.
    async fn purge(&self, now: Timestamp) -> Result<usize, StoreError>;
}

/// In-memory [`SessionStore`].
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: DashMap<Did, Session>,
}

impl MemorySessionStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bindings, lapsed or not.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no bindings are held.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl SessionStore for MemorySessionStore {
    async fn put(&self, agent: Did, session: Session) -> Result<(), StoreError> {
        self.sessions.insert(agent, session);
        Ok(())
    }

    async fn take(
        &self,
        agent: &Did,
        request: &Cid,
        now: Timestamp,
    ) -> Result<Option<Session>, StoreError> {
        let taken = self
            .sessions
            .remove_if(agent, |_, session| &session.request == request);
        Ok(taken
            .map(|(_, session)| session)
            .filter(|session| now <= session.expires_at))
    }

    async fn purge(&self, now: Timestamp) -> Result<usize, StoreError> {
        let mut purged = 0;
        self.sessions.retain(|_, session| {
            let keep = now <= session.expires_at;
            purged += usize::from(!keep);
            keep
        });
        Ok(purged)
    }
}
