//! The authorization handshake.
//!
//! An agent asks to act for an account with `access/authorize`. The service
//! answers by emailing the account a link carrying a self-issued
//! `access/confirm` delegation. Following the link hands the artifact to
//! [`AccessService::confirm`], which mints:
//!
//! - a delegation from the account (an absentee principal) to the agent for
//!   the requested abilities on `ucan:*`, with the account's stored
//!   delegations as proofs, and
//! - an attestation from the service vouching for that delegation.
//!
//! The agent collects both with [`AccessService::poll`] or `access/claim`.
//!
//! In the pin flow the service emails a pin instead. The pin and the
//! account DID derive a disposable signer, to which the account delegates
//! `access/authorize`. The agent, once the human enters the pin, signs the
//! approval as that signer ([`AccessService::confirm_pin`]).

use std::collections::BTreeMap;

use access_capability::{ANY_RESOURCE, Capability};
use access_principal::{Absentee, Did, Principal};
use access_ucan::{Cid, Delegation, Expiration, Invocation, Ipld, Timestamp, attest};
use futures::TryStreamExt;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::{
    email::{PinEmail, ValidationEmail},
    error::{AccessError, ConfirmationError},
    pin::Pin,
    request::{AuthorizationRequest, CapabilityRequest, RequestState},
    service::{AUTHORIZE, AccessService, CLAIM, CONFIRM, caveat, expect, optional_caveat, resource},
    session::Session,
    store::Query,
};

/// How long a lapsed request is kept so that polls report it as expired.
const REQUEST_RETENTION: u64 = 60 * 60;

/// Delegations minted when an account approves an agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    /// The approved request.
    pub request: Cid,
    /// The approving account.
    pub account: Did,
    /// The approved agent.
    pub agent: Did,
    /// Account-to-agent delegation.
    pub delegation: Delegation,
    /// The service's attestation of `delegation`.
    pub attestation: Delegation,
}

/// What the agent receives when the pin flow starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinChallenge {
    /// The pending request.
    pub request: AuthorizationRequest,
    /// Account-to-disposable-signer `access/authorize` delegation.
    pub delegation: Delegation,
    /// The service's attestation of `delegation`.
    pub attestation: Delegation,
}

/// Result of [`AccessService::poll`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus {
    /// Not confirmed yet; poll again.
    Pending,
    /// Confirmed; archives of the delegation and attestation by CID.
    Ready(BTreeMap<Cid, Vec<u8>>),
    /// Lapsed, refused, or already collected.
    Expired,
}

impl AccessService {
    /// Start the email handshake for an `access/authorize` invocation on an
    /// agent.
    ///
    /// # Errors
    ///
    /// Fails if the invocation is invalid or the email cannot be sent. In
    /// the latter case the request is marked
    /// [`RequestState::Rejected`].
    #[instrument(skip_all, fields(invocation = %invocation.cid()))]
    pub async fn authorize(
        &self,
        invocation: &Invocation,
    ) -> Result<AuthorizationRequest, AccessError> {
        let mut request = self.receive(invocation).await?;
        let confirmation = self.confirmation(&request)?;
        let email = ValidationEmail {
            to: mailbox(&request.account)?,
            url: self.confirmation_url(&confirmation)?,
        };
        let to = email.to.clone();
        if let Err(source) = self.email.send_validation(email).await {
            warn!(request = %request.id, %source, "confirmation email failed");
            self.advance(&mut request, RequestState::Rejected).await?;
            return Err(AccessError::Email { to, source });
        }
        self.advance(&mut request, RequestState::ConfirmationSent)
            .await?;
        Ok(request)
    }

    /// Link that confirms `artifact`.
    ///
    /// # Errors
    ///
    /// Fails if the artifact cannot be encoded.
    pub fn confirmation_url(&self, artifact: &Delegation) -> Result<Url, AccessError> {
        let mut url = self.config.public_url.join("validate-email")?;
        url.query_pairs_mut()
            .append_pair("ucan", &artifact.format()?)
            .append_pair("mode", "authorize");
        Ok(url)
    }

    /// Approve a request with the artifact from a confirmation link.
    ///
    /// Nothing is stored unless the artifact is accepted.
    ///
    /// # Errors
    ///
    /// Fails with [`ConfirmationError::Malformed`] if the artifact is not a
    /// valid `access/confirm` delegation from this service,
    /// [`ConfirmationError::WrongService`] if another service issued it and
    /// [`ConfirmationError::Expired`] once it lapsed.
    #[instrument(skip_all)]
    pub async fn confirm(&self, artifact: &str) -> Result<Confirmation, AccessError> {
        let now = self.clock.now();
        let invocation = self
            .read_confirmation(artifact, now)
            .inspect_err(|error| warn!(%error, "confirmation refused"))?;
        let capability = invocation.capability();
        let account: Did = caveat(capability, "iss")?;
        let agent: Did = caveat(capability, "aud")?;
        let requested: Vec<CapabilityRequest> = caveat(capability, "att")?;
        let cause: Option<Cid> = optional_caveat(capability, "cause")?;
        self.approve(
            &account,
            &agent,
            &requested,
            cause.unwrap_or_else(|| invocation.cid()),
            now,
        )
        .await
    }

    /// Decode and check a confirmation artifact.
    fn read_confirmation(
        &self,
        artifact: &str,
        now: Timestamp,
    ) -> Result<Invocation, ConfirmationError> {
        let invocation = Invocation::parse(artifact)
            .map_err(|error| ConfirmationError::Malformed(error.to_string()))?;
        let capability = invocation.capability();
        if capability.can != CONFIRM {
            return Err(ConfirmationError::Malformed(format!(
                "expected {CONFIRM}, got {}",
                capability.can
            )));
        }
        if capability.with != self.did().as_str() {
            return Err(ConfirmationError::WrongService {
                expected: self.did().clone(),
                actual: capability.with.clone(),
            });
        }
        if let Expiration::At(expiration) = invocation.expiration() {
            if now > expiration {
                return Err(ConfirmationError::Expired { expiration });
            }
        }
        self.validator
            .authorize(&invocation, &[], now)
            .map_err(|error| ConfirmationError::Malformed(error.to_string()))?;
        Ok(invocation)
    }

    /// Delegations addressed to the resource of an `access/claim`.
    ///
    /// # Errors
    ///
    /// Fails if the invocation is invalid or the store fails.
    #[instrument(skip_all, fields(invocation = %invocation.cid()))]
    pub async fn claim(
        &self,
        invocation: &Invocation,
    ) -> Result<BTreeMap<Cid, Vec<u8>>, AccessError> {
        expect(invocation, CLAIM)?;
        self.validate(invocation)?;
        self.claim_for(&resource(invocation.capability())?).await
    }

    /// Archives of every stored delegation addressed to `audience`, by CID.
    ///
    /// # Errors
    ///
    /// Fails if the store fails.
    pub async fn claim_for(&self, audience: &Did) -> Result<BTreeMap<Cid, Vec<u8>>, AccessError> {
        let delegations: Vec<Delegation> = self
            .delegations
            .find(Query::audience(audience))
            .try_collect()
            .await?;
        archives(delegations)
    }

    /// Collect the delegations of a confirmed request.
    ///
    /// Delegations are handed out once; the request is then
    /// [`RequestState::Claimed`].
    ///
    /// # Errors
    ///
    /// Fails with [`AccessError::UnknownRequest`] if `agent` made no such
    /// request.
    #[instrument(skip_all, fields(%agent, %request))]
    pub async fn poll(&self, agent: &Did, request: &Cid) -> Result<PollStatus, AccessError> {
        let now = self.clock.now();
        let stored = self
            .requests
            .get(request)
            .await?
            .filter(|stored| &stored.agent == agent);

        if let Some(session) = self.sessions.take(agent, request, now).await? {
            if let Some(mut stored) = stored {
                self.advance(&mut stored, RequestState::Claimed).await?;
            }
            return Ok(PollStatus::Ready(archives(session.delegations)?));
        }

        let mut stored = stored.ok_or(AccessError::UnknownRequest(*request))?;
        match stored.state {
            RequestState::Requested | RequestState::ConfirmationSent
                if now <= stored.expires_at =>
            {
                Ok(PollStatus::Pending)
            }
            RequestState::Requested | RequestState::ConfirmationSent => {
                self.advance(&mut stored, RequestState::Expired).await?;
                Ok(PollStatus::Expired)
            }
            RequestState::Confirmed
            | RequestState::Claimed
            | RequestState::Expired
            | RequestState::Rejected => Ok(PollStatus::Expired),
        }
    }

    /// Start the pin flow for an `access/authorize` invocation on an agent.
    ///
    /// The pin is emailed to the account. The agent receives the
    /// delegation to the pin-derived signer and its attestation.
    ///
    /// # Errors
    ///
    /// Fails if the invocation is invalid or the email cannot be sent.
    #[instrument(skip_all, fields(invocation = %invocation.cid()))]
    pub async fn authorize_with_pin(
        &self,
        invocation: &Invocation,
    ) -> Result<PinChallenge, AccessError> {
        let mut request = self.receive(invocation).await?;
        let pin = Pin::generate(self.config.pin_length, &mut rand::thread_rng())?;
        let disposable = pin.signer(&request.account)?.did();

        let delegation = Delegation::builder()
            .audience(&disposable)
            .capability(
                Capability::new(AUTHORIZE, request.account.as_str())
                    .with_nb("agent", request.agent.as_str())
                    .with_nb("access", CapabilityRequest::to_access(&request.requested)),
            )
            .expiration(Expiration::At(request.expires_at))
            .fact(BTreeMap::from([(
                "cause".to_string(),
                Ipld::Link(request.id),
            )]))
            .sign(&Absentee::new(request.account.clone()))?;
        let attestation = attest(&self.signer, &disposable, delegation.cid())?;

        let to = mailbox(&request.account)?;
        let email = PinEmail {
            to: to.clone(),
            pin,
        };
        if let Err(source) = self.email.send_pin(email).await {
            warn!(request = %request.id, %source, "pin email failed");
            self.advance(&mut request, RequestState::Rejected).await?;
            return Err(AccessError::Email { to, source });
        }
        self.advance(&mut request, RequestState::ConfirmationSent)
            .await?;
        Ok(PinChallenge {
            request,
            delegation,
            attestation,
        })
    }

    /// Approve a request with an `access/authorize {agent, access}`
    /// invocation on the account, signed by the pin-derived signer.
    ///
    /// # Errors
    ///
    /// Fails if the invocation is invalid, or the request lapsed.
    #[instrument(skip_all, fields(invocation = %invocation.cid()))]
    pub async fn confirm_pin(&self, invocation: &Invocation) -> Result<Confirmation, AccessError> {
        expect(invocation, AUTHORIZE)?;
        let authorization = self.validate(invocation)?;
        let capability = invocation.capability();
        let account = resource(capability)?;
        if !account.is_mailto() {
            return Err(AccessError::Caveat {
                can: capability.can.clone(),
                field: "with",
                reason: "must be an account".into(),
            });
        }
        let agent: Did = caveat(capability, "agent")?;
        let access: BTreeMap<String, Ipld> = caveat(capability, "access")?;
        let requested: Vec<CapabilityRequest> =
            access.into_keys().map(CapabilityRequest::new).collect();

        let cause = authorization
            .chain
            .first()
            .and_then(|cid| {
                invocation
                    .iter_all()
                    .into_iter()
                    .find(|delegation| delegation.cid() == *cid)
            })
            .and_then(request_cause)
            .unwrap_or_else(|| invocation.cid());
        self.approve(&account, &agent, &requested, cause, self.clock.now())
            .await
    }

    /// Validate an `access/authorize` invocation on an agent and record the
    /// request.
    async fn receive(&self, invocation: &Invocation) -> Result<AuthorizationRequest, AccessError> {
        expect(invocation, AUTHORIZE)?;
        self.validate(invocation)?;
        let capability = invocation.capability();
        let agent = resource(capability)?;
        if agent.method() != "key" {
            return Err(AccessError::Caveat {
                can: capability.can.clone(),
                field: "with",
                reason: "must be an agent".into(),
            });
        }
        let account: Did = caveat(capability, "iss")?;
        let requested: Vec<CapabilityRequest> = caveat(capability, "att")?;
        let now = self.clock.now();
        self.sweep(now).await?;
        let request = AuthorizationRequest {
            id: invocation.cid(),
            agent,
            account,
            requested,
            created_at: now,
            expires_at: now.saturating_add(self.config.confirmation_ttl_secs),
            state: RequestState::Requested,
        };
        self.requests.put(request.clone()).await?;
        info!(
            request = %request.id,
            agent = %request.agent,
            account = %request.account,
            "authorization requested"
        );
        Ok(request)
    }

    /// Self-issued `access/confirm` for `request`, valid until the request
    /// lapses.
    fn confirmation(&self, request: &AuthorizationRequest) -> Result<Delegation, AccessError> {
        let capability = Capability::new(CONFIRM, self.did().as_str())
            .with_nb("iss", request.account.as_str())
            .with_nb("aud", request.agent.as_str())
            .with_nb("att", CapabilityRequest::to_att(&request.requested))
            .with_nb("cause", request.id);
        Ok(Delegation::builder()
            .audience(self.did())
            .capability(capability)
            .expiration(Expiration::At(request.expires_at))
            .sign(&self.signer)?)
    }

    /// Mint, store and bind the account-to-agent delegation and its
    /// attestation.
    async fn approve(
        &self,
        account: &Did,
        agent: &Did,
        requested: &[CapabilityRequest],
        cause: Cid,
        now: Timestamp,
    ) -> Result<Confirmation, AccessError> {
        let mut request = self.requests.get(&cause).await?;
        if let Some(request) = &request {
            if matches!(
                request.state,
                RequestState::Expired | RequestState::Rejected
            ) || request.is_expired(now)
            {
                return Err(ConfirmationError::Expired {
                    expiration: request.expires_at,
                }
                .into());
            }
        }

        let proofs: Vec<Delegation> = self
            .delegations
            .find(Query::audience(account))
            .try_collect()
            .await?;
        let delegation = Delegation::builder()
            .audience(agent)
            .capabilities(requested.iter().map(|request| request.on(ANY_RESOURCE)))
            .expiration(Expiration::Never)
            .proofs(proofs)
            .sign(&Absentee::new(account.clone()))?;
        let attestation = attest(&self.signer, agent, delegation.cid())?;

        self.delegations
            .put_many(vec![delegation.clone(), attestation.clone()])
            .await?;
        self.sessions
            .put(
                agent.clone(),
                Session {
                    request: cause,
                    delegations: vec![delegation.clone(), attestation.clone()],
                    expires_at: now.saturating_add(self.config.session_ttl_secs),
                },
            )
            .await?;
        if let Some(request) = request.as_mut() {
            self.advance(request, RequestState::Confirmed).await?;
        }
        info!(
            %account,
            %agent,
            delegation = %delegation.cid(),
            "authorization confirmed"
        );

        Ok(Confirmation {
            request: cause,
            account: account.clone(),
            agent: agent.clone(),
            delegation,
            attestation,
        })
    }

    /// Drop sessions that lapsed and requests that lapsed more than
    /// [`REQUEST_RETENTION`] ago.
    async fn sweep(&self, now: Timestamp) -> Result<(), AccessError> {
        let sessions = self.sessions.purge(now).await?;
        let requests = self
            .requests
            .purge(now.saturating_sub(REQUEST_RETENTION))
            .await?;
        if sessions + requests > 0 {
            debug!(sessions, requests, "purged lapsed handshake state");
        }
        Ok(())
    }

    /// Move `request` to `next` and store it, if the lifecycle allows.
    async fn advance(
        &self,
        request: &mut AuthorizationRequest,
        next: RequestState,
    ) -> Result<(), AccessError> {
        if request.transition(next) {
            self.requests.put(request.clone()).await?;
            info!(request = %request.id, state = %next, "authorization request updated");
        }
        Ok(())
    }
}

/// The mailbox of an account.
fn mailbox(account: &Did) -> Result<String, AccessError> {
    account.email().ok_or_else(|| AccessError::Caveat {
        can: AUTHORIZE.to_string(),
        field: "iss",
        reason: format!("{account} has no mailbox"),
    })
}

/// The request a pin delegation was minted for.
fn request_cause(delegation: &Delegation) -> Option<Cid> {
    delegation
        .facts()
        .iter()
        .find_map(|fact| match fact.get("cause") {
            Some(Ipld::Link(cid)) => Some(*cid),
            _ => None,
        })
}

fn archives(
    delegations: impl IntoIterator<Item = Delegation>,
) -> Result<BTreeMap<Cid, Vec<u8>>, AccessError> {
    delegations
        .into_iter()
        .map(|delegation| Ok((delegation.cid(), delegation.archive()?)))
        .collect()
}
