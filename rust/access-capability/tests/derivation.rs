use access_capability::{Capability, Registry, can_derive, constraint::ability_covers};
use proptest::prelude::*;

/// Concrete abilities with caveats that are narrowed by equality.
const EQUAL_FIELDS: &[(&str, &str)] = &[
    ("access/authorize", "iss"),
    ("access/authorize", "agent"),
    ("access/confirm", "iss"),
    ("access/confirm", "aud"),
    ("access/confirm", "cause"),
    ("store/add", "link"),
    ("store/add", "origin"),
    ("store/remove", "link"),
    ("upload/add", "root"),
    ("upload/remove", "root"),
    ("ucan/attest", "proof"),
    ("ucan/revoke", "ucan"),
    ("provider/add", "provider"),
    ("provider/add", "consumer"),
];

fn registry() -> Registry {
    Registry::standard()
}

fn concrete_abilities() -> Vec<&'static str> {
    registry()
        .iter()
        .filter(|d| !d.is_wildcard())
        .map(|d| d.can)
        .collect()
}

fn arb_did() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9]{6,12}".prop_map(|id| format!("did:key:z{id}"))
}

fn arb_ability() -> impl Strategy<Value = &'static str> {
    prop::sample::select(concrete_abilities())
}

proptest! {
    #[test]
    fn wildcards_derive_every_covered_ability(can in arb_ability(), with in arb_did()) {
        let registry = registry();
        let claim = Capability::new(can, &with);
        for wildcard in registry.iter().filter(|d| d.is_wildcard()) {
            if ability_covers(can, wildcard.can) {
                let parent = Capability::new(wildcard.can, &with);
                prop_assert!(
                    can_derive(&registry, &claim, &parent).is_ok(),
                    "{} should derive from {}", can, wildcard.can
                );
            }
        }
    }

    #[test]
    fn escalating_with_always_fails(a in arb_did(), b in arb_did()) {
        prop_assume!(a != b);
        let registry = registry();
        for descriptor in registry.iter() {
            let claim = Capability::new(descriptor.can, &a);
            let parent = Capability::new(descriptor.can, &b);
            let err = can_derive(&registry, &claim, &parent);
            prop_assert!(err.is_err(), "{} derived across resources", descriptor.can);
            let err = err.unwrap_err();
            prop_assert_eq!(
                err.escalation().map(|e| e.constraint.clone()),
                Some("with".to_string())
            );
        }
    }

    #[test]
    fn growing_size_names_the_field(limit in 0i64..1_000_000, extra in 1i64..1_000, with in arb_did()) {
        let registry = registry();
        let parent = Capability::new("store/add", &with).with_nb("size", limit);
        let within = Capability::new("store/add", &with).with_nb("size", limit);
        let beyond = Capability::new("store/add", &with).with_nb("size", limit + extra);
        prop_assert!(can_derive(&registry, &within, &parent).is_ok());
        let err = can_derive(&registry, &beyond, &parent).unwrap_err();
        prop_assert_eq!(
            err.to_string(),
            format!("{} violates imposed size constraint {}", limit + extra, limit)
        );
    }

    #[test]
    fn changing_an_equal_field_names_it(
        index in 0..EQUAL_FIELDS.len(),
        imposed in "[a-z]{8}",
        claimed in "[a-z]{8}",
        with in arb_did(),
    ) {
        prop_assume!(imposed != claimed);
        let (can, field) = EQUAL_FIELDS[index];
        let registry = registry();
        let parent = Capability::new(can, &with).with_nb(field, imposed.as_str());
        let claim = Capability::new(can, &with).with_nb(field, claimed.as_str());
        let err = can_derive(&registry, &claim, &parent).unwrap_err();
        prop_assert_eq!(
            err.to_string(),
            format!("{claimed} violates imposed {field} constraint {imposed}")
        );
        let same = Capability::new(can, &with).with_nb(field, imposed.as_str());
        prop_assert!(can_derive(&registry, &same, &parent).is_ok());
    }
}

#[test]
fn every_concrete_ability_derives_from_itself() {
    let registry = registry();
    for can in concrete_abilities() {
        let cap = Capability::new(can, "did:key:z6MkSpace");
        assert!(can_derive(&registry, &cap, &cap).is_ok(), "{can}");
    }
}
