//! Reusable derivation predicates.
//!
//! Each primitive compares a value on the claimed capability (the child)
//! against the value imposed by a parent capability. An absent parent value
//! leaves the field unconstrained. Mismatches are reported as
//! [`Escalation`]s, never as panics.

use ipld_core::ipld::Ipld;

use crate::{
    capability::{Capability, display},
    error::{Escalation, MISSING},
};

/// Parent value that leaves a field unconstrained.
pub const WILDCARD: &str = "*";

fn shown(value: Option<&Ipld>) -> String {
    value.map_or_else(|| MISSING.to_string(), display)
}

fn is_unconstrained(parent: Option<&Ipld>) -> bool {
    match parent {
        None => true,
        Some(Ipld::String(s)) => s == WILDCARD,
        Some(_) => false,
    }
}

/// Fails unless both capabilities target the same resource.
///
/// # Errors
///
/// Returns an [`Escalation`] on the `with` constraint.
pub fn equal_with(claim: &Capability, parent: &Capability) -> Result<(), Escalation> {
    if claim.with == parent.with {
        Ok(())
    } else {
        Err(Escalation::new("with", &claim.with, &parent.with))
    }
}

/// Requires `child` to equal `parent` unless the parent is absent or `"*"`.
///
/// Values are compared by their canonical string form.
///
/// # Errors
///
/// Returns an [`Escalation`] naming `name` and both values.
pub fn equal(child: Option<&Ipld>, parent: Option<&Ipld>, name: &str) -> Result<(), Escalation> {
    if is_unconstrained(parent) {
        return Ok(());
    }
    let child = shown(child);
    let parent = shown(parent);
    if child == parent {
        Ok(())
    } else {
        Err(Escalation::new(name, child, parent))
    }
}

/// [`equal`] for links.
///
/// A link and its string form compare equal, so a caveat written as a CID
/// string still matches a CID.
///
/// # Errors
///
/// Returns an [`Escalation`] naming `name` and both CIDs.
pub fn check_link(
    child: Option<&Ipld>,
    parent: Option<&Ipld>,
    name: &str,
) -> Result<(), Escalation> {
    equal(child, parent, name)
}

/// Derivability of URI-like values: the parent is absent, identical, or
/// ends in `*` and prefixes the child.
///
/// # Errors
///
/// Returns an [`Escalation`] naming `name` and both values.
pub fn uri_prefix(child: &str, parent: Option<&str>, name: &str) -> Result<(), Escalation> {
    let Some(parent) = parent else {
        return Ok(());
    };
    let derivable = match parent.strip_suffix(WILDCARD) {
        Some(prefix) => child.starts_with(prefix),
        None => child == parent,
    };
    if derivable {
        Ok(())
    } else {
        Err(Escalation::new(name, child, parent))
    }
}

/// Returns `true` if ability `parent` hierarchically covers `child`.
///
/// `*` covers everything. A child `*` is covered only by `*`. Otherwise
/// segments are compared left to right, and a `*` segment in the parent
/// covers any remainder of the child.
#[must_use]
pub fn ability_covers(child: &str, parent: &str) -> bool {
    if parent == WILDCARD {
        return true;
    }
    if child == WILDCARD {
        return false;
    }
    let mut child = child.split('/');
    for segment in parent.split('/') {
        if segment == WILDCARD {
            return true;
        }
        if child.next() != Some(segment) {
            return false;
        }
    }
    child.next().is_none()
}

/// Fails unless `child` ability is covered by `parent` ability.
///
/// # Errors
///
/// Returns an [`Escalation`] on the `can` constraint.
pub fn ability(child: &str, parent: &str) -> Result<(), Escalation> {
    if ability_covers(child, parent) {
        Ok(())
    } else {
        Err(Escalation::new("can", child, parent))
    }
}

/// Abilities named by an `att` list (`[{ can }]`) or an `access` dictionary
/// keyed by ability.
fn abilities(value: &Ipld) -> Vec<String> {
    match value {
        Ipld::List(items) => items
            .iter()
            .filter_map(|item| match item {
                Ipld::Map(entry) => match entry.get("can") {
                    Some(Ipld::String(can)) => Some(can.clone()),
                    _ => None,
                },
                Ipld::String(can) => Some(can.clone()),
                _ => None,
            })
            .collect(),
        Ipld::Map(entries) => entries.keys().cloned().collect(),
        Ipld::String(can) => vec![can.clone()],
        _ => Vec::new(),
    }
}

/// Every ability requested by `child` must be covered by some ability in
/// `parent`. An absent parent, or one that grants `*`, imposes nothing.
///
/// # Errors
///
/// Returns an [`Escalation`] naming `name`, the first uncovered ability and
/// the abilities the parent grants.
pub fn subset_capabilities(
    child: Option<&Ipld>,
    parent: Option<&Ipld>,
    name: &str,
) -> Result<(), Escalation> {
    let Some(parent) = parent else {
        return Ok(());
    };
    let granted = abilities(parent);
    if granted.iter().any(|can| can == WILDCARD) {
        return Ok(());
    }
    let requested = child.map(abilities).unwrap_or_default();
    for can in requested {
        if !granted.iter().any(|grant| ability_covers(&can, grant)) {
            return Err(Escalation::new(
                name,
                can,
                format!("[{}]", granted.join(", ")),
            ));
        }
    }
    Ok(())
}

/// Links held by a list or by the values of a dictionary.
fn links(value: &Ipld) -> Vec<String> {
    match value {
        Ipld::List(items) => items.iter().map(display).collect(),
        Ipld::Map(entries) => entries.values().map(display).collect(),
        other => vec![display(other)],
    }
}

/// Every link in `child` must also appear in `parent`.
///
/// # Errors
///
/// Returns an [`Escalation`] naming `name` and the first link the parent
/// does not hold.
pub fn subset_links(
    child: Option<&Ipld>,
    parent: Option<&Ipld>,
    name: &str,
) -> Result<(), Escalation> {
    let Some(parent) = parent else {
        return Ok(());
    };
    let allowed = links(parent);
    for link in child.map(links).unwrap_or_default() {
        if !allowed.contains(&link) {
            return Err(Escalation::new(name, link, display(parent)));
        }
    }
    Ok(())
}

/// Integer ceiling: `child` must not exceed `parent`.
///
/// # Errors
///
/// Returns an [`Escalation`] naming `name` when the child is larger, absent
/// or not an integer while the parent imposes a limit.
pub fn at_most(child: Option<&Ipld>, parent: Option<&Ipld>, name: &str) -> Result<(), Escalation> {
    let Some(parent) = parent else {
        return Ok(());
    };
    match (child, parent) {
        (Some(Ipld::Integer(claimed)), Ipld::Integer(limit)) if claimed <= limit => Ok(()),
        _ => Err(Escalation::new(name, shown(child), display(parent))),
    }
}
