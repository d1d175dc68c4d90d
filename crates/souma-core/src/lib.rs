//! # Souma Core
//!
//! Pure primitives for the Souma nucleus: identities, the content graph,
//! publishing state machines, starmaps and the export contract.
//!
//! This crate contains no storage and no networking. Every operation is a
//! computation over in-memory entities; persistence lives in `souma-store`
//! and orchestration in `souma-nucleus`.
//!
//! ## Key Types
//!
//! - [`Persona`] / [`Souma`] - identities owning a [`Keyring`]
//! - [`KeyIdentity`] - the sign/verify/encrypt/decrypt capability
//! - [`Star`], [`Oneup`], [`Planet`] - the content graph
//! - [`Starmap`] - an ordered, author-scoped index of stars
//! - [`Export`] - canonical field selection and JSON encoding
//! - [`Vesicle`] - a signed export as handed to the transport layer
//!
//! ## Canonical Encoding
//!
//! Exports are ordered maps of strings. Their compact JSON encoding is the
//! byte source for signatures. See the [`export`] module.

pub mod content;
pub mod error;
pub mod export;
pub mod identity;
pub mod keys;
pub mod starmap;
pub mod state;
pub mod types;
pub mod vesicle;

pub use content::{Oneup, Planet, PlanetKind, Star, StarView};
pub use error::{CoreError, KeyKind, Result};
pub use export::{Export, ExportMap, ExportOptions, ExportValue};
pub use identity::{Persona, Souma};
pub use keys::{encrypt_for, KeyIdentity, KeyMaterial, Keyring, Signature};
pub use starmap::{Starmap, StarmapView};
pub use state::{ContentState, OneupState, StateCode};
pub use types::{OneupId, PersonaId, PlanetId, SoumaId, StarId, StarmapId, Timestamp, VesicleId};
pub use vesicle::Vesicle;
