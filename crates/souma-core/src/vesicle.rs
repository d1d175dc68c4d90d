//! Vesicles: signed export records exchanged between nodes.
//!
//! The transport is not part of this crate. A vesicle here is the stored
//! form: who wrote it, which souma relayed it, the exported JSON payload and
//! the author's signature over the canonical header-plus-payload bytes.

use std::fmt;

use crate::error::Result;
use crate::export::{Export, ExportOptions, ExportValue};
use crate::identity::Persona;
use crate::keys::{KeyIdentity, Signature};
use crate::types::{PersonaId, SoumaId, Timestamp, VesicleId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vesicle {
    pub id: VesicleId,
    pub created: Timestamp,
    pub author_id: PersonaId,
    pub source_id: Option<SoumaId>,
    /// Exported JSON of the carried entity.
    pub payload: String,
    pub signature: Signature,
}

impl Vesicle {
    /// Sign `payload` as `author`. The author must be controlled.
    pub fn seal(
        id: VesicleId,
        author: &Persona,
        payload: String,
        source_id: Option<SoumaId>,
        now: Timestamp,
    ) -> Result<Self> {
        let mut vesicle = Self {
            id,
            created: now,
            author_id: author.id.clone(),
            source_id,
            payload,
            signature: Signature::from_bytes([0u8; 64]),
        };
        vesicle.signature = author.sign(&vesicle.signing_bytes()?)?;
        Ok(vesicle)
    }

    /// The bytes covered by the signature.
    pub fn signing_bytes(&self) -> Result<Vec<u8>> {
        self.json(&ExportOptions::new())
    }

    /// Check the signature against `author`'s public key.
    ///
    /// False when `author` is not the recorded author.
    pub fn verify(&self, author: &Persona) -> Result<bool> {
        if author.id != self.author_id {
            return Ok(false);
        }
        author.verify(&self.signing_bytes()?, self.signature.as_bytes())
    }
}

impl fmt::Display for Vesicle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Vesicle {} by {}>",
            self.id.short(),
            self.author_id.short()
        )
    }
}

impl Export for Vesicle {
    const DEFAULT_FIELDS: &'static [&'static str] =
        &["id", "created", "author_id", "source_id", "payload"];

    fn field(&self, name: &str) -> Option<ExportValue> {
        let value: ExportValue = match name {
            "id" => self.id.to_string().into(),
            "created" => self.created.into(),
            "author_id" => self.author_id.to_string().into(),
            "source_id" => self.source_id.as_ref().map(|s| s.to_string()).into(),
            "payload" => self.payload.as_str().into(),
            "signature" => self.signature.to_hex().into(),
            _ => return None,
        };
        Some(value)
    }
}
