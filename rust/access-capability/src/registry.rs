//! Ability descriptors keyed by their `can` string.

use std::collections::BTreeMap;

use crate::{
    abilities,
    capability::{Capability, is_wildcard},
    error::{Escalation, Malformed},
    schema::{self, Field, ResourceMatcher},
};

/// Ability-specific derivation rule, `(claim, parent)`.
pub type Derives = fn(&Capability, &Capability) -> Result<(), Escalation>;

/// Definition of one ability.
#[derive(Debug, Clone, Copy)]
pub struct Descriptor {
    /// The ability, e.g. `store/add`.
    pub can: &'static str,
    /// Accepted resources.
    pub with: ResourceMatcher,
    /// Caveat schema.
    pub nb: &'static [Field],
    /// Narrowing rule applied when a claim of this ability is derived from a
    /// parent capability.
    pub derives: Derives,
}

impl Descriptor {
    /// `*` and `namespace/*` descriptors can only appear in proofs.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        is_wildcard(self.can)
    }

    /// Validate `capability` against this descriptor's schema.
    ///
    /// # Errors
    ///
    /// Returns [`Malformed`] when the resource or a caveat does not fit.
    pub fn validate(&self, capability: &Capability) -> Result<(), Malformed> {
        schema::validate(capability, self.with, self.nb)
    }
}

/// Lookup table of [`Descriptor`]s.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    descriptors: BTreeMap<&'static str, Descriptor>,
}

impl Registry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every ability of the access protocol.
    #[must_use]
    pub fn standard() -> Self {
        abilities::ALL
            .iter()
            .copied()
            .fold(Self::new(), Self::with)
    }

    /// Add or replace a descriptor.
    #[must_use]
    pub fn with(mut self, descriptor: Descriptor) -> Self {
        self.register(descriptor);
        self
    }

    /// Add or replace a descriptor.
    pub fn register(&mut self, descriptor: Descriptor) {
        self.descriptors.insert(descriptor.can, descriptor);
    }

    /// Descriptor for `can`.
    #[must_use]
    pub fn get(&self, can: &str) -> Option<&Descriptor> {
        self.descriptors.get(can)
    }

    /// Iterate descriptors in ability order.
    pub fn iter(&self) -> impl Iterator<Item = &Descriptor> {
        self.descriptors.values()
    }

    /// Validate `capability` against the descriptor of its ability.
    ///
    /// # Errors
    ///
    /// Returns [`Malformed::UnknownAbility`] for unregistered abilities and
    /// the schema violation otherwise.
    pub fn validate(&self, capability: &Capability) -> Result<(), Malformed> {
        self.get(&capability.can)
            .ok_or_else(|| Malformed::UnknownAbility(capability.can.clone()))?
            .validate(capability)
    }
}
