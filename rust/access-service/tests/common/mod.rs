#![allow(dead_code)]

use std::sync::Arc;

use access_capability::Capability;
use access_principal::{Did, Ed25519Signer, Principal, did};
use access_service::{
    AccessService, CapabilityRequest, Confirmation, ManualClock, MemoryDelegationStore,
    MemoryProvisions, MemoryRequestStore, MemorySessionStore, Outbox, ServiceConfig,
};
use access_ucan::{BuildError, Delegation, Expiration, Invocation, invoke};
use testresult::TestResult;
use url::Url;

pub const NOW: u64 = 1_700_000_000;

/// Deterministic signer from a seed byte.
pub fn signer(seed: u8) -> Ed25519Signer {
    Ed25519Signer::from_seed(&[seed; 32])
}

pub fn alice() -> Did {
    did!("mailto:example.com:alice")
}

pub fn bob() -> Did {
    did!("mailto:example.com:bob")
}

pub fn storage() -> Did {
    did!("web:storage.example.com")
}

/// A service with in-memory stores the test can inspect.
pub struct Fixture {
    pub service: AccessService,
    pub outbox: Arc<Outbox>,
    pub clock: Arc<ManualClock>,
    pub delegations: Arc<MemoryDelegationStore>,
    pub sessions: Arc<MemorySessionStore>,
    pub requests: Arc<MemoryRequestStore>,
    pub provisions: Arc<MemoryProvisions>,
}

impl Fixture {
    pub fn new() -> Self {
        let outbox = Arc::new(Outbox::new());
        let clock = Arc::new(ManualClock::new(NOW));
        let delegations = Arc::new(MemoryDelegationStore::new());
        let sessions = Arc::new(MemorySessionStore::new());
        let requests = Arc::new(MemoryRequestStore::new());
        let provisions = Arc::new(MemoryProvisions::new());
        let config = ServiceConfig::new(
            did!("web:access.example.com"),
            Url::parse("https://access.example.com").unwrap(),
        )
        .with_provider(storage());
        let service = AccessService::new(config, signer(200), outbox.clone())
            .unwrap()
            .with_clock(clock.clone())
            .with_delegations(delegations.clone())
            .with_sessions(sessions.clone())
            .with_requests(requests.clone())
            .with_provisions(provisions.clone());
        Self {
            service,
            outbox,
            clock,
            delegations,
            sessions,
            requests,
            provisions,
        }
    }

    /// `access/authorize` from `agent` for `account`.
    pub fn request(
        &self,
        agent: &Ed25519Signer,
        account: &Did,
        abilities: &[&str],
    ) -> Result<Invocation, BuildError> {
        let requested: Vec<CapabilityRequest> =
            abilities.iter().copied().map(CapabilityRequest::new).collect();
        invoke(
            agent,
            self.service.did(),
            Capability::new("access/authorize", agent.did().as_str())
                .with_nb("iss", account.as_str())
                .with_nb("att", CapabilityRequest::to_att(&requested)),
            Expiration::At(NOW + 60),
            [],
        )
    }

    /// Invoke `capability` on this service as `issuer`.
    pub fn invocation(
        &self,
        issuer: &Ed25519Signer,
        capability: Capability,
        proofs: impl IntoIterator<Item = Delegation>,
    ) -> Result<Invocation, BuildError> {
        invoke(
            issuer,
            self.service.did(),
            capability,
            Expiration::At(NOW + 60),
            proofs,
        )
    }

    /// Run the email handshake for `agent` and `account` to completion.
    pub async fn authorize(
        &self,
        agent: &Ed25519Signer,
        account: &Did,
        abilities: &[&str],
    ) -> TestResult<Confirmation> {
        self.service
            .authorize(&self.request(agent, account, abilities)?)
            .await?;
        let artifact = self
            .outbox
            .validations()
            .last()
            .and_then(|email| email.artifact())
            .ok_or("no confirmation link was sent")?;
        Ok(self.service.confirm(&artifact).await?)
    }
}
