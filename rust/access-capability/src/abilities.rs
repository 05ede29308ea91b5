//! Abilities of the access protocol.
//!
//! Every `derives` rule starts with [`equal_with`] and then narrows the
//! ability-specific caveats, stopping at the first failure.

use crate::{
    capability::Capability,
    constraint::{at_most, check_link, equal, equal_with, subset_capabilities, subset_links},
    error::Escalation,
    registry::Descriptor,
    schema::{Field, FieldKind, ResourceMatcher},
};

const KEY: ResourceMatcher = ResourceMatcher::Did(&["key"]);

const CAN_FIELDS: &[Field] = &[Field::required("can", FieldKind::String)];
const CAPABILITY_REQUEST: FieldKind = FieldKind::Struct(CAN_FIELDS);
const LINK: FieldKind = FieldKind::Link;
const ANY: FieldKind = FieldKind::Any;

const LIST_NB: &[Field] = &[
    Field::optional("cursor", FieldKind::String),
    Field::optional("size", FieldKind::Integer),
    Field::optional("pre", FieldKind::Boolean),
];

fn resource(claim: &Capability, parent: &Capability) -> Result<(), Escalation> {
    equal_with(claim, parent)
}

/// `*`: everything the issuer can do on a resource.
pub const TOP: Descriptor = Descriptor {
    can: "*",
    with: ResourceMatcher::AnyDid,
    nb: &[],
    derives: resource,
};

/// `access/*`.
pub const ACCESS: Descriptor = Descriptor {
    can: "access/*",
    with: KEY,
    nb: &[],
    derives: resource,
};

const AUTHORIZE_NB: &[Field] = &[
    Field::optional("iss", FieldKind::Did(&["mailto"])),
    Field::optional("att", FieldKind::List(&CAPABILITY_REQUEST)),
    Field::optional("agent", FieldKind::Did(&["key"])),
    Field::optional("access", FieldKind::Dictionary(&ANY)),
];

fn authorize(claim: &Capability, parent: &Capability) -> Result<(), Escalation> {
    equal_with(claim, parent)?;
    equal(claim.caveat("iss"), parent.caveat("iss"), "iss")?;
    equal(claim.caveat("agent"), parent.caveat("agent"), "agent")?;
    subset_capabilities(claim.caveat("att"), parent.caveat("att"), "att")?;
    subset_capabilities(claim.caveat("access"), parent.caveat("access"), "access")
}

/// `access/authorize`: request that an account authorize an agent.
pub const ACCESS_AUTHORIZE: Descriptor = Descriptor {
    can: "access/authorize",
    with: ResourceMatcher::Did(&["key", "mailto"]),
    nb: AUTHORIZE_NB,
    derives: authorize,
};

const CONFIRM_NB: &[Field] = &[
    Field::required("iss", FieldKind::Did(&["mailto"])),
    Field::required("aud", FieldKind::Did(&["key"])),
    Field::required("att", FieldKind::List(&CAPABILITY_REQUEST)),
    Field::optional("cause", FieldKind::Link),
];

fn confirm(claim: &Capability, parent: &Capability) -> Result<(), Escalation> {
    equal_with(claim, parent)?;
    equal(claim.caveat("iss"), parent.caveat("iss"), "iss")?;
    equal(claim.caveat("aud"), parent.caveat("aud"), "aud")?;
    subset_capabilities(claim.caveat("att"), parent.caveat("att"), "att")?;
    check_link(claim.caveat("cause"), parent.caveat("cause"), "cause")
}

/// `access/confirm`: the account approves an authorization request.
pub const ACCESS_CONFIRM: Descriptor = Descriptor {
    can: "access/confirm",
    with: ResourceMatcher::Did(&["web", "key"]),
    nb: CONFIRM_NB,
    derives: confirm,
};

/// `access/claim`: collect delegations addressed to the resource.
pub const ACCESS_CLAIM: Descriptor = Descriptor {
    can: "access/claim",
    with: ResourceMatcher::Did(&["key", "mailto"]),
    nb: &[],
    derives: resource,
};

const DELEGATE_NB: &[Field] = &[Field::required(
    "delegations",
    FieldKind::Dictionary(&LINK),
)];

fn delegate(claim: &Capability, parent: &Capability) -> Result<(), Escalation> {
    equal_with(claim, parent)?;
    subset_links(
        claim.caveat("delegations"),
        parent.caveat("delegations"),
        "delegations",
    )
}

/// `access/delegate`: store delegations on behalf of a space.
pub const ACCESS_DELEGATE: Descriptor = Descriptor {
    can: "access/delegate",
    with: KEY,
    nb: DELEGATE_NB,
    derives: delegate,
};

/// `space/*`.
pub const SPACE: Descriptor = Descriptor {
    can: "space/*",
    with: KEY,
    nb: &[],
    derives: resource,
};

/// `space/info`: describe a space.
pub const SPACE_INFO: Descriptor = Descriptor {
    can: "space/info",
    with: KEY,
    nb: &[],
    derives: resource,
};

/// `store/*`.
pub const STORE: Descriptor = Descriptor {
    can: "store/*",
    with: KEY,
    nb: &[],
    derives: resource,
};

const STORE_ADD_NB: &[Field] = &[
    Field::required("link", FieldKind::Link),
    Field::required("size", FieldKind::Integer),
    Field::optional("origin", FieldKind::Link),
];

fn store_add(claim: &Capability, parent: &Capability) -> Result<(), Escalation> {
    equal_with(claim, parent)?;
    check_link(claim.caveat("link"), parent.caveat("link"), "link")?;
    check_link(claim.caveat("origin"), parent.caveat("origin"), "origin")?;
    at_most(claim.caveat("size"), parent.caveat("size"), "size")
}

/// `store/add`: add a CAR shard to a space.
pub const STORE_ADD: Descriptor = Descriptor {
    can: "store/add",
    with: KEY,
    nb: STORE_ADD_NB,
    derives: store_add,
};

const STORE_REMOVE_NB: &[Field] = &[Field::required("link", FieldKind::Link)];

fn store_remove(claim: &Capability, parent: &Capability) -> Result<(), Escalation> {
    equal_with(claim, parent)?;
    check_link(claim.caveat("link"), parent.caveat("link"), "link")
}

/// `store/remove`: remove a CAR shard from a space.
pub const STORE_REMOVE: Descriptor = Descriptor {
    can: "store/remove",
    with: KEY,
    nb: STORE_REMOVE_NB,
    derives: store_remove,
};

/// `store/list`: page through shards.
pub const STORE_LIST: Descriptor = Descriptor {
    can: "store/list",
    with: KEY,
    nb: LIST_NB,
    derives: resource,
};

/// `upload/*`.
pub const UPLOAD: Descriptor = Descriptor {
    can: "upload/*",
    with: KEY,
    nb: &[],
    derives: resource,
};

const UPLOAD_ADD_NB: &[Field] = &[
    Field::required("root", FieldKind::Link),
    Field::optional("shards", FieldKind::List(&LINK)),
];

fn upload_add(claim: &Capability, parent: &Capability) -> Result<(), Escalation> {
    equal_with(claim, parent)?;
    check_link(claim.caveat("root"), parent.caveat("root"), "root")?;
    subset_links(claim.caveat("shards"), parent.caveat("shards"), "shards")
}

/// `upload/add`: register an upload made of shards.
pub const UPLOAD_ADD: Descriptor = Descriptor {
    can: "upload/add",
    with: KEY,
    nb: UPLOAD_ADD_NB,
    derives: upload_add,
};

const UPLOAD_REMOVE_NB: &[Field] = &[Field::required("root", FieldKind::Link)];

fn upload_remove(claim: &Capability, parent: &Capability) -> Result<(), Escalation> {
    equal_with(claim, parent)?;
    check_link(claim.caveat("root"), parent.caveat("root"), "root")
}

/// `upload/remove`: forget an upload.
pub const UPLOAD_REMOVE: Descriptor = Descriptor {
    can: "upload/remove",
    with: KEY,
    nb: UPLOAD_REMOVE_NB,
    derives: upload_remove,
};

/// `upload/list`: page through uploads.
pub const UPLOAD_LIST: Descriptor = Descriptor {
    can: "upload/list",
    with: KEY,
    nb: LIST_NB,
    derives: resource,
};

const ATTEST_NB: &[Field] = &[Field::required("proof", FieldKind::Link)];

fn attest(claim: &Capability, parent: &Capability) -> Result<(), Escalation> {
    equal_with(claim, parent)?;
    check_link(claim.caveat("proof"), parent.caveat("proof"), "proof")
}

/// `ucan/attest`: a service vouches for a delegation it verified out of
/// band.
pub const UCAN_ATTEST: Descriptor = Descriptor {
    can: "ucan/attest",
    with: ResourceMatcher::Did(&["web", "key"]),
    nb: ATTEST_NB,
    derives: attest,
};

const REVOKE_NB: &[Field] = &[
    Field::required("ucan", FieldKind::Link),
    Field::optional("proof", FieldKind::List(&LINK)),
];

fn revoke(claim: &Capability, parent: &Capability) -> Result<(), Escalation> {
    equal_with(claim, parent)?;
    check_link(claim.caveat("ucan"), parent.caveat("ucan"), "ucan")
}

/// `ucan/revoke`: void a delegation for every chain through the revoker.
pub const UCAN_REVOKE: Descriptor = Descriptor {
    can: "ucan/revoke",
    with: ResourceMatcher::AnyDid,
    nb: REVOKE_NB,
    derives: revoke,
};

const PROVIDER_ADD_NB: &[Field] = &[
    Field::required("provider", FieldKind::Did(&["web"])),
    Field::required("consumer", FieldKind::Did(&["key"])),
];

fn provider_add(claim: &Capability, parent: &Capability) -> Result<(), Escalation> {
    equal_with(claim, parent)?;
    equal(
        claim.caveat("provider"),
        parent.caveat("provider"),
        "provider",
    )?;
    equal(
        claim.caveat("consumer"),
        parent.caveat("consumer"),
        "consumer",
    )
}

/// `provider/add`: an account provisions a space with a storage provider.
pub const PROVIDER_ADD: Descriptor = Descriptor {
    can: "provider/add",
    with: ResourceMatcher::Did(&["mailto"]),
    nb: PROVIDER_ADD_NB,
    derives: provider_add,
};

/// Every ability of the protocol.
pub const ALL: &[Descriptor] = &[
    TOP,
    ACCESS,
    ACCESS_AUTHORIZE,
    ACCESS_CONFIRM,
    ACCESS_CLAIM,
    ACCESS_DELEGATE,
    SPACE,
    SPACE_INFO,
    STORE,
    STORE_ADD,
    STORE_REMOVE,
    STORE_LIST,
    UPLOAD,
    UPLOAD_ADD,
    UPLOAD_REMOVE,
    UPLOAD_LIST,
    UCAN_ATTEST,
    UCAN_REVOKE,
    PROVIDER_ADD,
];
