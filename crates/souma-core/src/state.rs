//! Publishing state machines.
//!
//! States are flat validated integers: any storable code may replace any
//! other, there is no transition graph. The only check is membership.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// A state enum with a fixed integer domain and symbolic labels.
pub trait StateCode: Sized + Copy {
    /// Map a storable integer code to a state.
    fn from_code(code: i64) -> Option<Self>;

    /// The integer code of this state.
    fn code(self) -> i64;

    /// The symbolic label of this state.
    fn label(self) -> &'static str;

    /// Validate a code for the named entity.
    fn validate(entity: &'static str, code: i64) -> Result<Self, CoreError> {
        Self::from_code(code).ok_or(CoreError::InvalidState { entity, code })
    }
}

/// Publishing state of Stars and Planets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(i8)]
pub enum ContentState {
    Deleted = -2,
    Unavailable = -1,
    #[default]
    Published = 0,
    Draft = 1,
    Private = 2,
    Updating = 3,
}

impl ContentState {
    /// All states, in code order.
    pub const ALL: [ContentState; 6] = [
        ContentState::Deleted,
        ContentState::Unavailable,
        ContentState::Published,
        ContentState::Draft,
        ContentState::Private,
        ContentState::Updating,
    ];

    /// Whether content in this state belongs on a public profile.
    pub fn is_public(self) -> bool {
        self == ContentState::Published
    }
}

impl StateCode for ContentState {
    fn from_code(code: i64) -> Option<Self> {
        match code {
            -2 => Some(Self::Deleted),
            -1 => Some(Self::Unavailable),
            0 => Some(Self::Published),
            1 => Some(Self::Draft),
            2 => Some(Self::Private),
            3 => Some(Self::Updating),
            _ => None,
        }
    }

    fn code(self) -> i64 {
        self as i64
    }

    fn label(self) -> &'static str {
        match self {
            Self::Deleted => "deleted",
            Self::Unavailable => "unavailable",
            Self::Published => "published",
            Self::Draft => "draft",
            Self::Private => "private",
            Self::Updating => "updating",
        }
    }
}

impl fmt::Display for ContentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// State of a Oneup.
///
/// `UnknownCreator` is a display sentinel for votes whose author cannot be
/// resolved. Its code is reserved and never accepted for storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(i8)]
pub enum OneupState {
    Disabled = -1,
    #[default]
    Active = 0,
    UnknownCreator = 1,
}

impl OneupState {
    /// Reserved code of the unknown-creator sentinel.
    pub const UNKNOWN_CREATOR_CODE: i64 = 1;

    /// The state a toggle moves to from this one.
    pub fn toggled(self) -> Self {
        match self {
            Self::Active => Self::Disabled,
            _ => Self::Active,
        }
    }

    pub fn is_active(self) -> bool {
        self == Self::Active
    }
}

impl StateCode for OneupState {
    fn from_code(code: i64) -> Option<Self> {
        match code {
            -1 => Some(Self::Disabled),
            0 => Some(Self::Active),
            _ => None,
        }
    }

    fn code(self) -> i64 {
        self as i64
    }

    fn label(self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Active => "active",
            Self::UnknownCreator => "unknown creator",
        }
    }
}

impl fmt::Display for OneupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
