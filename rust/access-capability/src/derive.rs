//! Single-step derivation of a claimed capability from a parent.

use std::borrow::Cow;

use tracing::trace;

use crate::{
    capability::{ANY_RESOURCE, Capability},
    constraint::{self, WILDCARD, equal_with, uri_prefix},
    error::DeriveError,
    registry::Registry,
};

/// Bind a parent granting `ucan:*` or a `*`-suffixed resource to the
/// claim's resource. Other parents are returned unchanged.
#[must_use]
pub fn rebind<'a>(claim: &Capability, parent: &'a Capability) -> Cow<'a, Capability> {
    if binds_any(claim, parent) {
        Cow::Owned(parent.rebind(&claim.with))
    } else {
        Cow::Borrowed(parent)
    }
}

fn binds_any(claim: &Capability, parent: &Capability) -> bool {
    parent.with == ANY_RESOURCE
        || (parent.with.ends_with(WILDCARD)
            && uri_prefix(&claim.with, Some(&parent.with), "with").is_ok())
}

/// The capability the issuer of `parent` must itself hold for `claim` to
/// be delegated through it.
///
/// A concrete parent is proven as granted. A parent granting `ucan:*` or a
/// `*`-suffixed resource only vouches for what the claim uses, so the claim's
/// ability and resource go upstream with the parent's caveats underneath the
/// claim's own.
#[must_use]
pub fn upstream<'a>(claim: &Capability, parent: &'a Capability) -> Cow<'a, Capability> {
    if !binds_any(claim, parent) {
        return Cow::Borrowed(parent);
    }
    let mut nb = parent.nb.clone();
    nb.extend(claim.nb.iter().map(|(k, v)| (k.clone(), v.clone())));
    Cow::Owned(Capability {
        can: claim.can.clone(),
        with: claim.with.clone(),
        nb,
    })
}

/// Decide whether `claim` can be derived from `parent`.
///
/// Checks the resource, then the ability hierarchy, then the claimed
/// ability's own narrowing rule.
///
/// # Errors
///
/// Returns [`DeriveError::UnknownAbility`] when the claimed ability is not
/// registered and [`DeriveError::Escalation`] for the first violated
/// constraint.
pub fn can_derive(
    registry: &Registry,
    claim: &Capability,
    parent: &Capability,
) -> Result<(), DeriveError> {
    let descriptor = registry
        .get(&claim.can)
        .ok_or_else(|| DeriveError::UnknownAbility(claim.can.clone()))?;
    let parent = rebind(claim, parent);
    trace!(claim = %claim, parent = %parent, "deriving capability");

    equal_with(claim, &parent)?;
    constraint::ability(&claim.can, &parent.can)?;
    (descriptor.derives)(claim, &parent)?;
    Ok(())
}
