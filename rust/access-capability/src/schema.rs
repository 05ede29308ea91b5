//! Structural schemas for capability resources and caveats.

use ipld_core::ipld::Ipld;

use crate::{
    capability::{Capability, display},
    error::Malformed,
};

/// Accepted resources of an ability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceMatcher {
    /// Any DID.
    AnyDid,
    /// A DID using one of the listed methods.
    Did(&'static [&'static str]),
}

impl ResourceMatcher {
    /// Returns `true` if `with` is accepted.
    #[must_use]
    pub fn matches(&self, with: &str) -> bool {
        let Some(rest) = with.strip_prefix("did:") else {
            return false;
        };
        let Some((method, id)) = rest.split_once(':') else {
            return false;
        };
        if method.is_empty() || id.is_empty() {
            return false;
        }
        match self {
            ResourceMatcher::AnyDid => true,
            ResourceMatcher::Did(methods) => methods.contains(&method),
        }
    }

    fn describe(&self) -> String {
        match self {
            ResourceMatcher::AnyDid => "a did".into(),
            ResourceMatcher::Did(methods) => {
                let methods: Vec<String> = methods.iter().map(|m| format!("did:{m}")).collect();
                methods.join(" or ")
            }
        }
    }
}

/// Shape of a caveat value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// UTF-8 string.
    String,
    /// Integer.
    Integer,
    /// Boolean.
    Boolean,
    /// Content identifier.
    Link,
    /// DID string using one of the listed methods, any method when empty.
    Did(&'static [&'static str]),
    /// List of values of one kind.
    List(&'static FieldKind),
    /// String-keyed dictionary of values of one kind.
    Dictionary(&'static FieldKind),
    /// Nested struct.
    Struct(&'static [Field]),
    /// Any value.
    Any,
}

/// A named caveat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Caveat name.
    pub name: &'static str,
    /// Expected shape.
    pub kind: FieldKind,
    /// Whether the caveat must be present.
    pub required: bool,
}

impl Field {
    /// A required caveat.
    #[must_use]
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    /// An optional caveat.
    #[must_use]
    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }
}

impl FieldKind {
    fn describe(&self) -> String {
        match self {
            FieldKind::String => "string".into(),
            FieldKind::Integer => "integer".into(),
            FieldKind::Boolean => "boolean".into(),
            FieldKind::Link => "link".into(),
            FieldKind::Did(methods) if methods.is_empty() => "did".into(),
            FieldKind::Did(methods) => {
                let methods: Vec<String> = methods.iter().map(|m| format!("did:{m}")).collect();
                methods.join(" or ")
            }
            FieldKind::List(item) => format!("list of {}", item.describe()),
            FieldKind::Dictionary(item) => format!("dictionary of {}", item.describe()),
            FieldKind::Struct(_) => "struct".into(),
            FieldKind::Any => "any".into(),
        }
    }

    /// Check `value`, reporting nested failures with a dotted `path`.
    fn check(&self, can: &str, path: &str, value: &Ipld) -> Result<(), Malformed> {
        let mismatch = || Malformed::FieldType {
            can: can.into(),
            field: path.into(),
            expected: self.describe(),
            actual: display(value),
        };
        match (self, value) {
            (FieldKind::Any, _)
            | (FieldKind::String, Ipld::String(_))
            | (FieldKind::Integer, Ipld::Integer(_))
            | (FieldKind::Boolean, Ipld::Bool(_))
            | (FieldKind::Link, Ipld::Link(_)) => Ok(()),
            (FieldKind::Did(methods), Ipld::String(did)) => {
                let matcher = if methods.is_empty() {
                    ResourceMatcher::AnyDid
                } else {
                    ResourceMatcher::Did(methods)
                };
                if matcher.matches(did) {
                    Ok(())
                } else {
                    Err(mismatch())
                }
            }
            (FieldKind::List(item), Ipld::List(items)) => {
                for (index, value) in items.iter().enumerate() {
                    item.check(can, &format!("{path}.{index}"), value)?;
                }
                Ok(())
            }
            (FieldKind::Dictionary(item), Ipld::Map(entries)) => {
                for (key, value) in entries {
                    item.check(can, &format!("{path}.{key}"), value)?;
                }
                Ok(())
            }
            (FieldKind::Struct(fields), Ipld::Map(entries)) => {
                for field in *fields {
                    let field_path = format!("{path}.{}", field.name);
                    match entries.get(field.name) {
                        Some(value) => field.kind.check(can, &field_path, value)?,
                        None if field.required => {
                            return Err(Malformed::MissingField {
                                can: can.into(),
                                field: field_path,
                            });
                        }
                        None => {}
                    }
                }
                Ok(())
            }
            _ => Err(mismatch()),
        }
    }
}

/// Validate a capability's resource and caveats against a schema.
///
/// Caveats not named by the schema are allowed.
///
/// # Errors
///
/// Returns [`Malformed`] for the first violation found.
pub fn validate(
    capability: &Capability,
    with: ResourceMatcher,
    fields: &[Field],
) -> Result<(), Malformed> {
    if !with.matches(&capability.with) {
        return Err(Malformed::Resource {
            can: capability.can.clone(),
            expected: with.describe(),
            actual: capability.with.clone(),
        });
    }
    for field in fields {
        match capability.nb.get(field.name) {
            Some(value) => field.kind.check(&capability.can, field.name, value)?,
            None if field.required => {
                return Err(Malformed::MissingField {
                    can: capability.can.clone(),
                    field: field.name.into(),
                });
            }
            None => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const REQUEST_FIELDS: &[Field] = &[Field::required("can", FieldKind::String)];
    const REQUEST: FieldKind = FieldKind::Struct(REQUEST_FIELDS);
    const FIELDS: &[Field] = &[
        Field::required("iss", FieldKind::Did(&["mailto"])),
        Field::optional("att", FieldKind::List(&REQUEST)),
        Field::optional("size", FieldKind::Integer),
    ];

    #[test]
    fn it_checks_resources() {
        let matcher = ResourceMatcher::Did(&["key"]);
        assert!(matcher.matches("did:key:z6Mk"));
        assert!(!matcher.matches("did:web:example.com"));
        assert!(!matcher.matches("ucan:*"));
        assert!(ResourceMatcher::AnyDid.matches("did:web:example.com"));

        let cap = Capability::new("store/add", "did:web:example.com")
            .with_nb("iss", "did:mailto:example.com:alice");
        let err = validate(&cap, matcher, FIELDS).unwrap_err();
        assert_eq!(
            err.to_string(),
            "store/add: expected with to be did:key, instead got did:web:example.com"
        );
    }

    #[test]
    fn it_reports_missing_required_fields() {
        let cap = Capability::new("access/confirm", "did:key:z6Mk");
        assert_eq!(
            validate(&cap, ResourceMatcher::AnyDid, FIELDS),
            Err(Malformed::MissingField {
                can: "access/confirm".into(),
                field: "iss".into()
            })
        );
    }

    #[test]
    fn it_reports_nested_type_errors() {
        let cap = Capability::new("access/confirm", "did:key:z6Mk")
            .with_nb("iss", "did:mailto:example.com:alice")
            .with_nb(
                "att",
                Ipld::List(vec![Ipld::Map([("can".to_string(), Ipld::Integer(1))].into())]),
            );
        let err = validate(&cap, ResourceMatcher::AnyDid, FIELDS).unwrap_err();
        assert!(matches!(err, Malformed::FieldType { ref field, .. } if field == "att.0.can"));
    }

    #[test]
    fn it_checks_did_methods() {
        let cap = Capability::new("access/confirm", "did:key:z6Mk").with_nb("iss", "did:key:z6Mk");
        assert!(matches!(
            validate(&cap, ResourceMatcher::AnyDid, FIELDS),
            Err(Malformed::FieldType { .. })
        ));
    }

    #[test]
    fn unknown_fields_are_allowed() {
        let cap = Capability::new("access/confirm", "did:key:z6Mk")
            .with_nb("iss", "did:mailto:example.com:alice")
            .with_nb("extra", true);
        assert!(validate(&cap, ResourceMatcher::AnyDid, FIELDS).is_ok());
    }
}
