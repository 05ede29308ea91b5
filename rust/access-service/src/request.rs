//! Authorization requests and their lifecycle.
//!
//! ```text
//! Requested ──▶ ConfirmationSent ──▶ Confirmed ──▶ Claimed
//!     │                │
//!     └────────────────┴──▶ Expired | Rejected
//! ```

use std::fmt;

use access_capability::Capability;
use access_principal::Did;
use access_ucan::{Cid, Timestamp};
use async_trait::async_trait;
use dashmap::DashMap;
use ipld_core::ipld::Ipld;
use serde::{Deserialize, Serialize};

use crate::store::StoreError;

/// State of an [`AuthorizationRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    /// Received, confirmation not yet delivered.
    Requested,
    /// The account has been sent a confirmation link or pin.
    ConfirmationSent,
    /// The account approved, delegations are waiting for the agent.
    Confirmed,
    /// The agent collected its delegations.
    Claimed,
    /// Not confirmed in time.
    Expired,
    /// The confirmation could not be delivered.
    Rejected,
}

impl RequestState {
    /// Whether a request can move from `self` to `next`.
    pub fn can_transition(self, next: RequestState) -> bool {
        use RequestState::*;
        matches!(
            (self, next),
            (Requested, ConfirmationSent)
                | (ConfirmationSent, Confirmed)
                | (Confirmed, Claimed)
                | (Requested | ConfirmationSent, Expired | Rejected)
        )
    }

    /// No transitions leave this state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RequestState::Claimed | RequestState::Expired | RequestState::Rejected
        )
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestState::Requested => "requested",
            RequestState::ConfirmationSent => "confirmation sent",
            RequestState::Confirmed => "confirmed",
            RequestState::Claimed => "claimed",
            RequestState::Expired => "expired",
            RequestState::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// An ability an agent asks an account for.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CapabilityRequest {
    /// The ability.
    pub can: String,
}

impl CapabilityRequest {
    /// Request `can`.
    pub fn new(can: impl Into<String>) -> Self {
        Self { can: can.into() }
    }

    /// The granted capability on `with`.
    pub fn on(&self, with: impl Into<String>) -> Capability {
        Capability::new(self.can.clone(), with)
    }

    /// Encode a list of requests as the `att` caveat.
    pub fn to_att(requests: &[CapabilityRequest]) -> Ipld {
        Ipld::List(
            requests
                .iter()
                .map(|request| {
                    Ipld::Map([("can".to_string(), Ipld::String(request.can.clone()))].into())
                })
                .collect(),
        )
    }

    /// Encode a list of requests as the `access` caveat.
    pub fn to_access(requests: &[CapabilityRequest]) -> Ipld {
        Ipld::Map(
            requests
                .iter()
                .map(|request| (request.can.clone(), Ipld::Map(Default::default())))
                .collect(),
        )
    }
}

/// An agent's request to act on behalf of an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    /// CID of the `access/authorize` invocation.
    pub id: Cid,
    /// The agent asking.
    pub agent: Did,
    /// The account asked.
    pub account: Did,
    /// What the agent asks for.
    pub requested: Vec<CapabilityRequest>,
    /// When the request was received.
    pub created_at: Timestamp,
    /// When it lapses unless confirmed.
    pub expires_at: Timestamp,
    /// Where it is in its lifecycle.
    pub state: RequestState,
}

impl AuthorizationRequest {
    /// Whether the request lapsed without being confirmed.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.state == RequestState::Expired
            || (!self.state.is_terminal()
                && self.state != RequestState::Confirmed
                && now > self.expires_at)
    }

    /// Move to `next` if the lifecycle allows it.
    ///
    /// Returns `false`, leaving the request unchanged, otherwise.
    pub fn transition(&mut self, next: RequestState) -> bool {
        if self.state.can_transition(next) {
            self.state = next;
            true
        } else {
            false
        }
    }
}

/// Short-lived store of [`AuthorizationRequest`]s.
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait RequestStore: Send + Sync {
    /// Insert or replace a request.
    async fn put(&self, request: AuthorizationRequest) -> Result<(), StoreError>;

    /// Look up a request.
    async fn get(&self, id: &Cid) -> Result<Option<AuthorizationRequest>, StoreError>;

    /// Drop requests that lapsed before `before`, returning how many.
    async fn purge(&self, before: Timestamp) -> Result<usize, StoreError>;
}

/// In-memory [`RequestStore`].
#[derive(Debug, Default)]
pub struct MemoryRequestStore {
    requests: DashMap<Cid, AuthorizationRequest>,
}

impl MemoryRequestStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of requests held.
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Whether no requests are held.
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl RequestStore for MemoryRequestStore {
    async fn put(&self, request: AuthorizationRequest) -> Result<(), StoreError> {
        self.requests.insert(request.id, request);
        Ok(())
    }

    async fn get(&self, id: &Cid) -> Result<Option<AuthorizationRequest>, StoreError> {
        Ok(self.requests.get(id).map(|entry| entry.value().clone()))
    }

    async fn purge(&self, before: Timestamp) -> Result<usize, StoreError> {
        let mut purged = 0;
        self.requests.retain(|_, request| {
            let keep = request.expires_at >= before;
            purged += usize::from(!keep);
            keep
        });
        Ok(purged)
    }
}
