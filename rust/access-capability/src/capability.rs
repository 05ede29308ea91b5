//! The `{ can, with, nb }` capability triple.

use std::{collections::BTreeMap, fmt};

use ipld_core::ipld::Ipld;
use serde::{Deserialize, Serialize};

/// Resource that stands for "every resource the issuer has access to".
pub const ANY_RESOURCE: &str = "ucan:*";

/// Ability-specific caveats.
///
/// Keys are kept sorted so the canonical encoding does not depend on the
/// order fields were inserted in.
pub type Caveats = BTreeMap<String, Ipld>;

/// A claim to perform `can` on the resource `with`, narrowed by `nb`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    /// Hierarchical ability, e.g. `store/add` or `*`.
    pub can: String,

    /// Resource URI, usually a DID.
    pub with: String,

    /// Named parameters constraining the ability.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub nb: Caveats,
}

impl Capability {
    /// A capability without caveats.
    pub fn new(can: impl Into<String>, with: impl Into<String>) -> Self {
        Self {
            can: can.into(),
            with: with.into(),
            nb: Caveats::new(),
        }
    }

    /// Add a caveat.
    #[must_use]
    pub fn with_nb(mut self, name: impl Into<String>, value: impl Into<Ipld>) -> Self {
        self.nb.insert(name.into(), value.into());
        self
    }

    /// Look up a caveat by name.
    #[must_use]
    pub fn caveat(&self, name: &str) -> Option<&Ipld> {
        self.nb.get(name)
    }

    /// Same ability and caveats, different resource.
    #[must_use]
    pub fn rebind(&self, with: impl Into<String>) -> Self {
        Self {
            can: self.can.clone(),
            with: with.into(),
            nb: self.nb.clone(),
        }
    }

    /// Returns `true` for `*` and `namespace/*` abilities.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        is_wildcard(&self.can)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{can: {}, with: {}", self.can, self.with)?;
        if !self.nb.is_empty() {
            write!(f, ", nb: {{")?;
            for (i, (name, value)) in self.nb.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{name}: {}", display(value))?;
            }
            write!(f, "}}")?;
        }
        write!(f, "}}")
    }
}

/// Returns `true` for `*` and abilities ending in `/*`.
#[must_use]
pub fn is_wildcard(can: &str) -> bool {
    can == "*" || can.ends_with("/*")
}

/// Canonical string form of a caveat value, used for comparisons and error
/// messages.
#[must_use]
pub fn display(value: &Ipld) -> String {
    match value {
        Ipld::Null => "null".into(),
        Ipld::Bool(b) => b.to_string(),
        Ipld::Integer(i) => i.to_string(),
        Ipld::Float(f) => f.to_string(),
        Ipld::String(s) => s.clone(),
        Ipld::Bytes(bytes) => format!("<{} bytes>", bytes.len()),
        Ipld::Link(cid) => cid.to_string(),
        Ipld::List(items) => {
            let items: Vec<String> = items.iter().map(display).collect();
            format!("[{}]", items.join(", "))
        }
        Ipld::Map(entries) => {
            let entries: Vec<String> = entries
                .iter()
                .map(|(k, v)| format!("{k}: {}", display(v)))
                .collect();
            format!("{{{}}}", entries.join(", "))
        }
    }
}
