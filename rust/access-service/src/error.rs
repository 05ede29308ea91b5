//! Error types for the access service.
//!
//! [`AccessError`] is what service operations return. Before crossing the
//! invocation boundary it is converted to a [`ServiceError`], which carries
//! an [`ErrorCode`] that maps to an HTTP status code and tells the caller
//! whether retrying can help.

use std::fmt;

use access_principal::Did;
use access_ucan::{BuildError, Cid, CodecError, InvalidClaim, ProofFailure, Timestamp};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{email::EmailError, pin::PinError, store::StoreError};

/// Error codes returned by the access service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // 400 Bad Request
    /// Caveats do not fit the ability's schema, or the input cannot be
    /// decoded
    Malformed,
    /// Delegations referenced by an invocation are not among its proofs
    UnknownDelegation,

    // 401 Unauthorized
    /// Expired delegation, invocation or confirmation
    Expired,
    /// Delegation used before its `nbf`
    NotYetValid,
    /// Signature verification failed
    InvalidSignature,
    /// A proof in the chain is not available
    MissingProof,

    // 403 Forbidden
    /// A claimed capability exceeds what its proof grants
    Escalation,
    /// A delegation in the chain was revoked
    Revoked,
    /// The proof chain does not reach the resource owner
    Unauthorized,
    /// A confirmation artifact was issued by another service
    WrongService,

    // 404 Not Found
    /// Provider is not offered by this service
    UnknownProvider,
    /// Space has never been provisioned
    SpaceUnknown,
    /// No authorization request has the identifier
    UnknownRequest,

    // 409 Conflict
    /// Space is already provisioned with this provider by someone else
    ProviderConflict,

    // 502 Bad Gateway
    /// The email collaborator failed
    EmailFailed,

    // 507 Insufficient Storage
    /// The space has no storage provider
    InsufficientStorage,

    // 500 Internal Server Error
    /// Internal server error
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorCode::Malformed | ErrorCode::UnknownDelegation => 400,

            ErrorCode::Expired
            | ErrorCode::NotYetValid
            | ErrorCode::InvalidSignature
            | ErrorCode::MissingProof => 401,

            ErrorCode::Escalation
            | ErrorCode::Revoked
            | ErrorCode::Unauthorized
            | ErrorCode::WrongService => 403,

            ErrorCode::UnknownProvider | ErrorCode::SpaceUnknown | ErrorCode::UnknownRequest => 404,

            ErrorCode::ProviderConflict => 409,

            ErrorCode::EmailFailed => 502,

            ErrorCode::InsufficientStorage => 507,

            ErrorCode::InternalError => 500,
        }
    }

    /// Whether the same request can succeed later without changes.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::InsufficientStorage | ErrorCode::EmailFailed | ErrorCode::InternalError
        )
    }
}

/// Service error with code and message.
///
/// This is the structured form of a failure returned across the invocation
/// boundary. It serializes as `{ "code": "...", "message": "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceError {
    /// The error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
}

impl ServiceError {
    /// Create a new service error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        self.code.status_code()
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for ServiceError {}

/// Why a confirmation artifact was refused.
///
/// These are reported separately from chain validation failures so the
/// page that receives the confirmation link can tell the human what went
/// wrong.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfirmationError {
    /// The artifact is not an `access/confirm` delegation.
    #[error("Not a valid access/confirm delegation: {0}")]
    Malformed(String),

    /// The artifact was issued for another service.
    #[error("Not a valid access/confirm delegation: issued for {actual}, expected {expected}")]
    WrongService {
        /// This service.
        expected: Did,
        /// The artifact's resource.
        actual: String,
    },

    /// The confirmation window has passed.
    #[error("Email confirmation expired.")]
    Expired {
        /// When it expired.
        expiration: Timestamp,
    },
}

impl ConfirmationError {
    /// The code reported to the caller.
    pub fn code(&self) -> ErrorCode {
        match self {
            ConfirmationError::Malformed(_) => ErrorCode::Malformed,
            ConfirmationError::WrongService { .. } => ErrorCode::WrongService,
            ConfirmationError::Expired { .. } => ErrorCode::Expired,
        }
    }
}

/// Error type for access service operations.
#[derive(Debug, Error)]
pub enum AccessError {
    /// The invocation does not pass validation.
    #[error(transparent)]
    Invalid(#[from] InvalidClaim),

    /// A confirmation artifact was refused.
    #[error(transparent)]
    Confirmation(#[from] ConfirmationError),

    /// An operation received an invocation of another ability.
    #[error("expected an invocation of {expected}, got {actual}")]
    WrongAbility {
        /// Ability the operation handles.
        expected: &'static str,
        /// Ability invoked.
        actual: String,
    },

    /// No operation handles the invoked ability.
    #[error("{0} is not handled by this service")]
    UnsupportedAbility(String),

    /// Caveats are missing or have the wrong shape.
    #[error("invalid {field} in {can}: {reason}")]
    Caveat {
        /// Invoked ability.
        can: String,
        /// Offending caveat.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// A referenced delegation is not among the invocation's proofs.
    #[error("delegation {0} is not included with the invocation")]
    UnknownDelegation(Cid),

    /// The space has no storage provider.
    #[error("{0} has no storage provider")]
    InsufficientStorage(Did),

    /// The provider is not offered by this service.
    #[error("{0} is not a provider offered by this service")]
    UnknownProvider(Did),

    /// The space has never been provisioned.
    #[error("space {0} is unknown")]
    SpaceUnknown(Did),

    /// The space is already provisioned with the provider by another
    /// account.
    #[error("{space} is already provisioned with {provider} by {account}")]
    ProviderConflict {
        /// The space.
        space: Did,
        /// The provider.
        provider: Did,
        /// The account that provisioned it.
        account: Did,
    },

    /// The revoker does not issue anything in the revoked delegation's
    /// chain.
    #[error("{revoker} is not an issuer in the chain of {ucan}")]
    NotRevocable {
        /// Delegation to revoke.
        ucan: Cid,
        /// Would-be revoker.
        revoker: Did,
    },

    /// No authorization request has this identifier.
    #[error("authorization request {0} is unknown")]
    UnknownRequest(Cid),

    /// The email collaborator failed.
    #[error("failed to email {to}: {source}")]
    Email {
        /// Recipient.
        to: String,
        /// Failure.
        source: EmailError,
    },

    /// Pin generation failed.
    #[error(transparent)]
    Pin(#[from] PinError),

    /// A store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A delegation could not be built.
    #[error(transparent)]
    Build(#[from] BuildError),

    /// A delegation could not be encoded or decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A confirmation URL could not be built.
    #[error("invalid confirmation url: {0}")]
    Url(#[from] url::ParseError),
}

impl AccessError {
    /// The code reported to the caller.
    pub fn code(&self) -> ErrorCode {
        match self {
            AccessError::Invalid(claim) => claim_code(claim),
            AccessError::Confirmation(error) => error.code(),
            AccessError::WrongAbility { .. }
            | AccessError::UnsupportedAbility(_)
            | AccessError::Caveat { .. }
            | AccessError::Codec(_) => ErrorCode::Malformed,
            AccessError::UnknownDelegation(_) => ErrorCode::UnknownDelegation,
            AccessError::InsufficientStorage(_) => ErrorCode::InsufficientStorage,
            AccessError::UnknownProvider(_) => ErrorCode::UnknownProvider,
            AccessError::SpaceUnknown(_) => ErrorCode::SpaceUnknown,
            AccessError::UnknownRequest(_) => ErrorCode::UnknownRequest,
            AccessError::ProviderConflict { .. } => ErrorCode::ProviderConflict,
            AccessError::NotRevocable { .. } => ErrorCode::Unauthorized,
            AccessError::Email { .. } => ErrorCode::EmailFailed,
            AccessError::Pin(_)
            | AccessError::Store(_)
            | AccessError::Build(_)
            | AccessError::Url(_) => ErrorCode::InternalError,
        }
    }

    /// Whether the same request can succeed later without changes.
    pub fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }
}

fn claim_code(claim: &InvalidClaim) -> ErrorCode {
    match claim {
        InvalidClaim::Malformed(_) | InvalidClaim::WildcardInvocation(_) => ErrorCode::Malformed,
        InvalidClaim::WrongAudience { .. } => ErrorCode::Unauthorized,
        InvalidClaim::Invocation(_) | InvalidClaim::Unauthorized { .. } => claim
            .leaves()
            .first()
            .map_or(ErrorCode::Unauthorized, |failure| failure_code(failure)),
    }
}

fn failure_code(failure: &ProofFailure) -> ErrorCode {
    match failure {
        ProofFailure::Unknown(_) => ErrorCode::MissingProof,
        ProofFailure::Expired { .. } => ErrorCode::Expired,
        ProofFailure::NotYetValid { .. } => ErrorCode::NotYetValid,
        ProofFailure::Revoked { .. } => ErrorCode::Revoked,
        ProofFailure::InvalidSignature { .. } => ErrorCode::InvalidSignature,
        ProofFailure::Escalation { .. } => ErrorCode::Escalation,
        ProofFailure::AudienceMismatch { .. }
        | ProofFailure::Unresolvable { .. }
        | ProofFailure::Unattested { .. }
        | ProofFailure::Upstream { .. }
        | ProofFailure::Cycle(_) => ErrorCode::Unauthorized,
    }
}

impl From<AccessError> for ServiceError {
    fn from(error: AccessError) -> Self {
        ServiceError::new(error.code(), error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use access_principal::did;
    use pretty_assertions::assert_eq;

    #[test]
    fn codes_serialize_screaming_snake_case() {
        let error = ServiceError::new(ErrorCode::InsufficientStorage, "no provider");
        assert_eq!(
            serde_json::to_string(&error).unwrap(),
            r#"{"code":"INSUFFICIENT_STORAGE","message":"no provider"}"#
        );
        assert_eq!(error.status_code(), 507);
    }

    #[test]
    fn confirmation_failures_are_distinct() {
        let wrong = ConfirmationError::WrongService {
            expected: did!("web:access.example.com"),
            actual: "did:web:elsewhere.example.com".into(),
        };
        let expired = ConfirmationError::Expired { expiration: 10 };
        assert!(
            wrong
                .to_string()
                .starts_with("Not a valid access/confirm delegation")
        );
        assert_eq!(expired.to_string(), "Email confirmation expired.");
        assert_eq!(wrong.code(), ErrorCode::WrongService);
        assert_eq!(expired.code(), ErrorCode::Expired);
    }

    #[test]
    fn only_provisioning_and_transport_failures_retry() {
        assert!(AccessError::InsufficientStorage(did!("key:space")).is_retryable());
        assert!(!AccessError::SpaceUnknown(did!("key:space")).is_retryable());
        assert!(!AccessError::UnknownProvider(did!("web:provider")).is_retryable());
    }

    #[test]
    fn service_error_carries_the_message() {
        let error: ServiceError = AccessError::UnknownProvider(did!("web:nope.example.com")).into();
        assert_eq!(error.code, ErrorCode::UnknownProvider);
        assert_eq!(
            error.message,
            "did:web:nope.example.com is not a provider offered by this service"
        );
    }
}
