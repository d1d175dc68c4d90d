//! Strong type definitions for Souma.
//!
//! All identifiers are newtypes to prevent mixing a star id with a persona
//! id at compile time. Every id is 32 lowercase hex characters (16 random
//! bytes), the form peers exchange on the wire.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Length of every entity identifier, in characters.
pub const ID_LEN: usize = 32;

fn random_hex_id() -> String {
    let mut bytes = [0u8; ID_LEN / 2];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn normalize_id(kind: &'static str, value: &str) -> Result<String, CoreError> {
    if value.len() != ID_LEN || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(CoreError::InvalidId {
            kind,
            value: value.to_string(),
        });
    }
    Ok(value.to_ascii_lowercase())
}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Generate a fresh random identifier.
            pub fn generate() -> Self {
                Self(random_hex_id())
            }

            /// Parse and normalize an identifier.
            pub fn parse(value: &str) -> Result<Self, CoreError> {
                normalize_id($kind, value).map(Self)
            }

            /// Get the identifier text.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// The first six characters, for log lines.
            pub fn short(&self) -> &str {
                &self.0[..6]
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.short())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = CoreError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(&value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id!(
    /// Identifier of a Persona (a user identity).
    PersonaId,
    "persona"
);
define_id!(
    /// Identifier of a Souma (a node identity).
    SoumaId,
    "souma"
);
define_id!(
    /// Identifier of a Star (a post).
    StarId,
    "star"
);
define_id!(
    /// Identifier of a Planet (an attachment).
    PlanetId,
    "planet"
);
define_id!(
    /// Identifier of a Oneup (a vote).
    OneupId,
    "oneup"
);
define_id!(
    /// Identifier of a Starmap.
    StarmapId,
    "starmap"
);
define_id!(
    /// Identifier of a stored Vesicle.
    VesicleId,
    "vesicle"
);

/// Offset subtracted from unix seconds when ranking stars (2012-12-21).
pub const RANKING_EPOCH_SECS: i64 = 1_356_048_000;

/// A UTC instant with millisecond precision, stored as unix milliseconds.
///
/// The canonical text form is RFC 3339 with milliseconds and a `Z` suffix,
/// which is what exports and signatures use.
#[derive(
    Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// The current wall-clock time.
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    /// Create from unix milliseconds.
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Unix milliseconds.
    pub const fn as_millis(&self) -> i64 {
        self.0
    }

    /// Canonical RFC 3339 form, e.g. `2013-12-20T18:40:00.000Z`.
    pub fn to_canonical(&self) -> String {
        match Utc.timestamp_millis_opt(self.0).single() {
            Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Millis, true),
            None => self.0.to_string(),
        }
    }

    /// Parse an RFC 3339 string.
    pub fn parse_canonical(s: &str) -> Result<Self, CoreError> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| Self(dt.timestamp_millis()))
            .map_err(|e| CoreError::InvalidTimestamp(format!("{s:?}: {e}")))
    }

    /// Seconds since the ranking epoch, used by hot scores.
    pub fn ranking_seconds(&self) -> f64 {
        self.0 as f64 / 1000.0 - RANKING_EPOCH_SECS as f64
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.to_canonical())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_canonical())
    }
}

impl From<i64> for Timestamp {
    fn from(millis: i64) -> Self {
        Self(millis)
    }
}
