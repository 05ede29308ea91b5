//! Capabilities of the access protocol and the rules for deriving one
//! capability from another.
//!
//! A [`Capability`] is a `{ can, with, nb }` triple. Each ability is
//! described by a [`Descriptor`] in a [`Registry`]: the resources it applies
//! to, the shape of its caveats and a `derives` rule built from the
//! [`constraint`] primitives. [`can_derive`] combines them into the
//! single-step check used when walking a proof chain.

pub mod abilities;
pub mod capability;
pub mod constraint;
pub mod derive;
pub mod error;
pub mod registry;
pub mod schema;

pub use capability::{ANY_RESOURCE, Capability, Caveats, is_wildcard};
pub use derive::{can_derive, rebind, upstream};
pub use error::{DeriveError, Escalation, Malformed};
pub use registry::{Derives, Descriptor, Registry};
pub use schema::{Field, FieldKind, ResourceMatcher};
