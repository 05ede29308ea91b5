//! The access service.
//!
//! [`AccessService`] validates invocations against their proof chains and
//! then performs them: the authorization handshake (see
//! [`handshake`](crate::handshake)), depositing delegations, revocation and
//! provisioning spaces with storage providers.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use access_capability::{Capability, abilities};
use access_principal::{Did, Ed25519Signer, Ed25519Verifier, KeyResolver};
use access_ucan::{
    Authorization, Cid, Delegation, Invocation, MemoryRevocations, REVOKE, Revocation,
    Revocations, Validator,
};
use ipld_core::serde::from_ipld;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, info, instrument};

use crate::{
    clock::{Clock, SystemClock},
    config::{ConfigError, ServiceConfig},
    email::Email,
    error::{AccessError, ServiceError},
    handshake::Confirmation,
    provision::{MemoryProvisions, Provision, Provisions},
    request::{AuthorizationRequest, MemoryRequestStore, RequestStore},
    session::{MemorySessionStore, SessionStore},
    store::{DelegationStore, MemoryDelegationStore},
};

pub(crate) const AUTHORIZE: &str = abilities::ACCESS_AUTHORIZE.can;
pub(crate) const CONFIRM: &str = abilities::ACCESS_CONFIRM.can;
pub(crate) const CLAIM: &str = abilities::ACCESS_CLAIM.can;
const DELEGATE: &str = abilities::ACCESS_DELEGATE.can;
const SPACE_INFO: &str = abilities::SPACE_INFO.can;
const PROVIDER_ADD: &str = abilities::PROVIDER_ADD.can;

/// What a space is provisioned with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceInfo {
    /// The space.
    pub did: Did,
    /// Its storage providers.
    pub providers: Vec<Did>,
}

/// Successful result of [`AccessService::invoke`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A confirmation was sent to the account.
    Requested(AuthorizationRequest),
    /// An account confirmed with a pin-derived signer.
    Confirmed(Confirmation),
    /// Delegations addressed to the resource, as archives.
    Claimed(BTreeMap<Cid, Vec<u8>>),
    /// Delegations stored on behalf of a space.
    Delegated(Vec<Cid>),
    /// A delegation was revoked.
    Revoked(Revocation),
    /// A space was provisioned.
    Provisioned(Provision),
    /// Space description.
    Space(SpaceInfo),
}

/// Capability-based access service.
///
/// Stores default to in-memory implementations and can be replaced with
/// the `with_*` methods.
pub struct AccessService {
    pub(crate) config: ServiceConfig,
    pub(crate) signer: Ed25519Signer,
    pub(crate) validator: Validator<KeyResolver>,
    pub(crate) revocations: Arc<dyn Revocations>,
    pub(crate) delegations: Arc<dyn DelegationStore>,
    pub(crate) sessions: Arc<dyn SessionStore>,
    pub(crate) requests: Arc<dyn RequestStore>,
    pub(crate) provisions: Arc<dyn Provisions>,
    pub(crate) email: Arc<dyn Email>,
    pub(crate) clock: Arc<dyn Clock>,
}

fn validator(
    did: &Did,
    key: Ed25519Verifier,
    revocations: Arc<dyn Revocations>,
) -> Validator<KeyResolver> {
    let resolver = KeyResolver::new().with_web_key(did.clone(), key);
    Validator::new(did.clone(), resolver, revocations)
}

impl AccessService {
    /// A service signing as `config.did` with `signer`'s key.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `config` is invalid.
    pub fn new(
        config: ServiceConfig,
        signer: Ed25519Signer,
        email: Arc<dyn Email>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let signer = signer.with_did(config.did.clone());
        let revocations: Arc<dyn Revocations> = Arc::new(MemoryRevocations::new());
        Ok(Self {
            validator: validator(&config.did, *signer.verifier(), revocations.clone()),
            config,
            signer,
            revocations,
            delegations: Arc::new(MemoryDelegationStore::new()),
            sessions: Arc::new(MemorySessionStore::new()),
            requests: Arc::new(MemoryRequestStore::new()),
            provisions: Arc::new(MemoryProvisions::new()),
            email,
            clock: Arc::new(SystemClock),
        })
    }

    /// Use `delegations` to store delegations.
    #[must_use]
    pub fn with_delegations(mut self, delegations: Arc<dyn DelegationStore>) -> Self {
        self.delegations = delegations;
        self
    }

    /// Use `sessions` for session bindings.
    #[must_use]
    pub fn with_sessions(mut self, sessions: Arc<dyn SessionStore>) -> Self {
        self.sessions = sessions;
        self
    }

    /// Use `requests` for authorization requests.
    #[must_use]
    pub fn with_requests(mut self, requests: Arc<dyn RequestStore>) -> Self {
        self.requests = requests;
        self
    }

    /// Use `provisions` to track providers of spaces.
    #[must_use]
    pub fn with_provisions(mut self, provisions: Arc<dyn Provisions>) -> Self {
        self.provisions = provisions;
        self
    }

    /// Record and consult revocations in `revocations`.
    #[must_use]
    pub fn with_revocations(mut self, revocations: Arc<dyn Revocations>) -> Self {
        self.validator = validator(&self.config.did, *self.signer.verifier(), revocations.clone());
        self.revocations = revocations;
        self
    }

    /// Read the time from `clock`.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The service's DID.
    pub fn did(&self) -> &Did {
        &self.config.did
    }

    /// The service's configuration.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// The service's verifying key.
    pub fn verifier(&self) -> &Ed25519Verifier {
        self.signer.verifier()
    }

    /// The validator used for every invocation.
    pub fn validator(&self) -> &Validator<KeyResolver> {
        &self.validator
    }

    /// Validate `invocation` against its attached proofs.
    pub(crate) fn validate(&self, invocation: &Invocation) -> Result<Authorization, AccessError> {
        Ok(self
            .validator
            .authorize(invocation, &[], self.clock.now())?)
    }

    /// Perform `invocation`, reporting failures in their structured form.
    ///
    /// `access/authorize` on a `did:mailto` is a pin confirmation; on a
    /// `did:key` it starts the email handshake.
    ///
    /// # Errors
    ///
    /// Returns a [`ServiceError`] if the invocation is invalid or fails.
    #[instrument(skip_all, fields(invocation = %invocation.cid(), can = %invocation.capability().can))]
    pub async fn invoke(&self, invocation: &Invocation) -> Result<Outcome, ServiceError> {
        let capability = invocation.capability();
        let outcome = match capability.can.as_str() {
            AUTHORIZE if capability.with.starts_with("did:mailto:") => self
                .confirm_pin(invocation)
                .await
                .map(Outcome::Confirmed),
            AUTHORIZE => self.authorize(invocation).await.map(Outcome::Requested),
            CLAIM => self.claim(invocation).await.map(Outcome::Claimed),
            DELEGATE => self.delegate(invocation).await.map(Outcome::Delegated),
            REVOKE => self.revoke(invocation).await.map(Outcome::Revoked),
            PROVIDER_ADD => self.provider_add(invocation).await.map(Outcome::Provisioned),
            SPACE_INFO => self.space_info(invocation).await.map(Outcome::Space),
            other => Err(AccessError::UnsupportedAbility(other.to_string())),
        };
        outcome.map_err(|error| {
            debug!(%error, "invocation failed");
            ServiceError::from(error)
        })
    }

    /// Store the delegations named in `nb.delegations` on behalf of a
    /// space.
    ///
    /// The delegations must be attached to the invocation. Storing the same
    /// delegations again changes nothing.
    ///
    /// # Errors
    ///
    /// Fails with [`AccessError::InsufficientStorage`] if the space has no
    /// provider and [`AccessError::UnknownDelegation`] if a named
    /// delegation is not attached.
    #[instrument(skip_all, fields(invocation = %invocation.cid()))]
    pub async fn delegate(&self, invocation: &Invocation) -> Result<Vec<Cid>, AccessError> {
        expect(invocation, DELEGATE)?;
        self.validate(invocation)?;
        let capability = invocation.capability();
        let space = resource(capability)?;
        let links: BTreeMap<String, Cid> = caveat(capability, "delegations")?;

        // Not atomic with the write below; concurrent first writers may race.
        if self.provisions.providers(&space).await?.is_empty() {
            return Err(AccessError::InsufficientStorage(space));
        }

        let attached = attached(invocation);
        let delegations = links
            .values()
            .map(|cid| {
                attached
                    .get(cid)
                    .map(|delegation| (*delegation).clone())
                    .ok_or(AccessError::UnknownDelegation(*cid))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let stored: Vec<Cid> = delegations.iter().map(|delegation| delegation.cid()).collect();
        self.delegations.put_many(delegations).await?;
        info!(%space, count = stored.len(), "delegations stored");
        Ok(stored)
    }

    /// Revoke the delegation named in `nb.ucan` as the resource principal.
    ///
    /// The revoked delegation must be attached, and the revoker must issue
    /// it or one of its attached proofs.
    ///
    /// # Errors
    ///
    /// Fails with [`AccessError::UnknownDelegation`] if the delegation is
    /// not attached and [`AccessError::NotRevocable`] if the revoker is not
    /// in its chain.
    #[instrument(skip_all, fields(invocation = %invocation.cid()))]
    pub async fn revoke(&self, invocation: &Invocation) -> Result<Revocation, AccessError> {
        expect(invocation, REVOKE)?;
        self.validate(invocation)?;
        let capability = invocation.capability();
        let revoker = resource(capability)?;
        let ucan: Cid = caveat(capability, "ucan")?;
        let proof: Vec<Cid> = optional_caveat(capability, "proof")?.unwrap_or_default();

        let target = attached(invocation)
            .remove(&ucan)
            .ok_or(AccessError::UnknownDelegation(ucan))?;
        let issuers: BTreeSet<&Did> = target
            .iter_all()
            .into_iter()
            .map(Delegation::issuer)
            .collect();
        if !issuers.contains(&revoker) {
            return Err(AccessError::NotRevocable { ucan, revoker });
        }

        let revocation = Revocation {
            ucan,
            revoker,
            proof,
        };
        self.revocations.record(revocation.clone());
        info!(%ucan, revoker = %revocation.revoker, "delegation revoked");
        Ok(revocation)
    }

    /// Provision the space `nb.consumer` with `nb.provider` on behalf of
    /// the account.
    ///
    /// # Errors
    ///
    /// Fails with [`AccessError::UnknownProvider`] for providers this
    /// service does not offer and [`AccessError::ProviderConflict`] if
    /// another account already provisioned the space with the provider.
    #[instrument(skip_all, fields(invocation = %invocation.cid()))]
    pub async fn provider_add(&self, invocation: &Invocation) -> Result<Provision, AccessError> {
        expect(invocation, PROVIDER_ADD)?;
        self.validate(invocation)?;
        let capability = invocation.capability();
        let account = resource(capability)?;
        let provider: Did = caveat(capability, "provider")?;
        let space: Did = caveat(capability, "consumer")?;

        if !self.config.offers(&provider) {
            return Err(AccessError::UnknownProvider(provider));
        }
        // Best effort: a concurrent provider/add for the same space can
        // pass this check too.
        let existing = self.provisions.providers(&space).await?;
        if let Some(provision) = existing.into_iter().find(|p| p.provider == provider) {
            if provision.account != account {
                return Err(AccessError::ProviderConflict {
                    space,
                    provider,
                    account: provision.account,
                });
            }
            return Ok(provision);
        }

        let provision = Provision {
            space,
            provider,
            account,
            cause: invocation.cid(),
        };
        self.provisions.add_provider(provision.clone()).await?;
        info!(
            space = %provision.space,
            provider = %provision.provider,
            account = %provision.account,
            "space provisioned"
        );
        Ok(provision)
    }

    /// Describe the space the invocation is on.
    ///
    /// # Errors
    ///
    /// Fails with [`AccessError::SpaceUnknown`] if the space has no
    /// provider.
    #[instrument(skip_all, fields(invocation = %invocation.cid()))]
    pub async fn space_info(&self, invocation: &Invocation) -> Result<SpaceInfo, AccessError> {
        expect(invocation, SPACE_INFO)?;
        self.validate(invocation)?;
        let space = resource(invocation.capability())?;
        let providers = self.provisions.providers(&space).await?;
        if providers.is_empty() {
            return Err(AccessError::SpaceUnknown(space));
        }
        Ok(SpaceInfo {
            did: space,
            providers: providers.into_iter().map(|p| p.provider).collect(),
        })
    }
}

/// Delegations attached to `invocation`, transitively, by CID.
fn attached(invocation: &Invocation) -> BTreeMap<Cid, &Delegation> {
    invocation
        .iter_all()
        .into_iter()
        .filter(|delegation| delegation.cid() != invocation.cid())
        .map(|delegation| (delegation.cid(), delegation))
        .collect()
}

pub(crate) fn expect(invocation: &Invocation, can: &'static str) -> Result<(), AccessError> {
    let actual = &invocation.capability().can;
    if actual == can {
        Ok(())
    } else {
        Err(AccessError::WrongAbility {
            expected: can,
            actual: actual.clone(),
        })
    }
}

/// The capability's resource as a DID.
pub(crate) fn resource(capability: &Capability) -> Result<Did, AccessError> {
    capability
        .with
        .parse()
        .map_err(|error: access_principal::DidParseError| AccessError::Caveat {
            can: capability.can.clone(),
            field: "with",
            reason: error.to_string(),
        })
}

/// A required caveat.
pub(crate) fn caveat<T: DeserializeOwned>(
    capability: &Capability,
    field: &'static str,
) -> Result<T, AccessError> {
    optional_caveat(capability, field)?.ok_or_else(|| AccessError::Caveat {
        can: capability.can.clone(),
        field,
        reason: "missing".into(),
    })
}

/// An optional caveat.
pub(crate) fn optional_caveat<T: DeserializeOwned>(
    capability: &Capability,
    field: &'static str,
) -> Result<Option<T>, AccessError> {
    capability
        .caveat(field)
        .map(|value| {
            from_ipld(value.clone()).map_err(|error| AccessError::Caveat {
                can: capability.can.clone(),
                field,
                reason: error.to_string(),
            })
        })
        .transpose()
}
