use thiserror::Error;

/// Placeholder shown in messages when a caveat is absent.
pub(crate) const MISSING: &str = "<missing>";

/// A claimed capability asks for more than its parent grants.
///
/// The message follows the fixed form
/// `"<claimed> violates imposed <constraint> constraint <imposed>"`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{claimed} violates imposed {constraint} constraint {imposed}")]
pub struct Escalation {
    /// Name of the violated constraint (`with`, `can` or an `nb` field).
    pub constraint: String,
    /// Value found on the claim.
    pub claimed: String,
    /// Value imposed by the parent.
    pub imposed: String,
}

impl Escalation {
    pub(crate) fn new(
        constraint: impl Into<String>,
        claimed: impl Into<String>,
        imposed: impl Into<String>,
    ) -> Self {
        Self {
            constraint: constraint.into(),
            claimed: claimed.into(),
            imposed: imposed.into(),
        }
    }
}

/// A capability does not match the shape its ability declares.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Malformed {
    /// No descriptor is registered for the ability.
    #[error("unknown ability {0}")]
    UnknownAbility(String),

    /// The resource is not accepted by the ability.
    #[error("{can}: expected with to be {expected}, instead got {actual}")]
    Resource {
        /// Ability being checked.
        can: String,
        /// Human readable description of accepted resources.
        expected: String,
        /// The offending resource.
        actual: String,
    },

    /// A required caveat is absent.
    #[error("{can}: missing nb.{field}")]
    MissingField {
        /// Ability being checked.
        can: String,
        /// The absent field.
        field: String,
    },

    /// A caveat has the wrong shape.
    #[error("{can}: nb.{field} expected {expected}, instead got {actual}")]
    FieldType {
        /// Ability being checked.
        can: String,
        /// The offending field, with a path for nested values.
        field: String,
        /// Expected kind.
        expected: String,
        /// The offending value.
        actual: String,
    },
}

/// Error type for single-step derivation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeriveError {
    /// The claimed ability is not registered.
    #[error("unknown ability {0}")]
    UnknownAbility(String),

    /// The claim escalates the parent.
    #[error(transparent)]
    Escalation(#[from] Escalation),
}

impl DeriveError {
    /// The escalation, if this is one.
    #[must_use]
    pub fn escalation(&self) -> Option<&Escalation> {
        match self {
            DeriveError::Escalation(escalation) => Some(escalation),
            DeriveError::UnknownAbility(_) => None,
        }
    }
}
