//! Capability-based access service.
//!
//! Agents obtain delegations from accounts through an authorization
//! handshake, either by email confirmation link or by pin, and then use
//! them to deposit delegations, revoke them and provision spaces. Every
//! invocation is validated against its proof chain before it is performed.
//!
//! Storage, email and time are collaborators behind traits, with in-memory
//! implementations for tests and single-process use.

pub mod clock;
pub mod config;
pub mod email;
pub mod error;
pub mod handshake;
pub mod pin;
pub mod provision;
pub mod request;
pub mod service;
pub mod session;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, ServiceConfig};
pub use email::{Email, EmailError, Outbox, PinEmail, ValidationEmail};
pub use error::{AccessError, ConfirmationError, ErrorCode, ServiceError};
pub use handshake::{Confirmation, PinChallenge, PollStatus};
pub use pin::{Pin, PinError};
pub use provision::{MemoryProvisions, Provision, Provisions};
pub use request::{
    AuthorizationRequest, CapabilityRequest, MemoryRequestStore, RequestState, RequestStore,
};
pub use service::{AccessService, Outcome, SpaceInfo};
pub use session::{MemorySessionStore, Session, SessionStore};
pub use store::{DelegationStore, MemoryDelegationStore, Query, StoreError, StorePoisoned};
