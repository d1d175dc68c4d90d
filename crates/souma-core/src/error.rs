//! Error types for Souma Core.

use std::fmt;

use thiserror::Error;

/// Which of the four keyring blobs an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    SignPrivate,
    SignPublic,
    CryptPrivate,
    CryptPublic,
}

impl KeyKind {
    /// Column/field name of this key.
    pub fn as_str(self) -> &'static str {
        match self {
            KeyKind::SignPrivate => "sign_private",
            KeyKind::SignPublic => "sign_public",
            KeyKind::CryptPrivate => "crypt_private",
            KeyKind::CryptPublic => "crypt_public",
        }
    }
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core errors raised by identity, state and encoding operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("no {key} key found for {identity}")]
    MissingKey { identity: String, key: KeyKind },

    #[error("malformed {key} key for {identity}")]
    MalformedKey { identity: String, key: KeyKind },

    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("{code} is not a valid {entity} state")]
    InvalidState { entity: &'static str, code: i64 },

    #[error("invalid {kind} id: {value:?}")]
    InvalidId { kind: &'static str, value: String },

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("encoding error: {0}")]
    Encoding(String),
}

impl CoreError {
    /// True for errors caused by absent key material.
    pub fn is_missing_key(&self) -> bool {
        matches!(self, CoreError::MissingKey { .. })
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
