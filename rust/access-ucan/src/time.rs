//! Time utilities.
//!
//! Timestamps are seconds since the Unix epoch.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use web_time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch.
pub type Timestamp = u64;

/// Current time.
#[must_use]
pub fn now() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// When a delegation stops being valid.
///
/// `Never` is encoded as `null`, so "never expires" survives encoding as a
/// distinct value rather than a large integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Expiration {
    /// Valid up to and including this second.
    At(Timestamp),
    /// Never expires.
    Never,
}

impl Expiration {
    /// Expiration `seconds` after `now`.
    #[must_use]
    pub const fn after(now: Timestamp, seconds: u64) -> Self {
        Expiration::At(now.saturating_add(seconds))
    }

    /// Returns `true` once `now` is past the expiration.
    #[must_use]
    pub const fn is_expired(&self, now: Timestamp) -> bool {
        match self {
            Expiration::At(exp) => now > *exp,
            Expiration::Never => false,
        }
    }

    /// The timestamp, `None` for [`Expiration::Never`].
    #[must_use]
    pub const fn timestamp(&self) -> Option<Timestamp> {
        match self {
            Expiration::At(exp) => Some(*exp),
            Expiration::Never => None,
        }
    }
}

impl From<Option<Timestamp>> for Expiration {
    fn from(value: Option<Timestamp>) -> Self {
        value.map_or(Expiration::Never, Expiration::At)
    }
}

impl fmt::Display for Expiration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expiration::At(exp) => write!(f, "{exp}"),
            Expiration::Never => f.write_str("never"),
        }
    }
}

impl Serialize for Expiration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Expiration::At(exp) => serializer.serialize_u64(*exp),
            Expiration::Never => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for Expiration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<Timestamp>::deserialize(deserializer).map(Expiration::from)
    }
}
