//! # Souma Nucleus
//!
//! The unified API for a Souma node: identities, the content graph, votes,
//! starmaps and signed vesicles over a pluggable store.
//!
//! ## Overview
//!
//! - **Personas**: user identities. Controlled personas hold private keys on
//!   this node; foreign personas are known by their public keys only.
//! - **Stars**: short posts with attached planets (pictures, links).
//! - **Oneups**: at most one vote per (persona, star), toggled on and off.
//! - **Starmaps**: ordered star indexes. Every persona owns a profile and an
//!   index.
//! - **Vesicles**: signed exports handed to the transport layer.
//!
//! Every operation that needs a principal takes the acting persona
//! explicitly. There is no ambient "current user".
//!
//! ## Usage
//!
//! ```rust,no_run
//! use souma_nucleus::{Nucleus, NucleusConfig};
//! use souma_nucleus::store::SqliteStore;
//!
//! async fn example() -> souma_nucleus::Result<()> {
//!     let store = SqliteStore::open("souma.db")?;
//!     let nucleus = Nucleus::new(store, NucleusConfig::default());
//!
//!     let ada = nucleus.create_persona(Some("ada".into()), None).await?;
//!     let star = nucleus.create_star(&ada.id, "hello, world").await?;
//!     nucleus.toggle_oneup(&star.id, &ada.id).await?;
//!
//!     assert_eq!(nucleus.oneup_count(&star.id).await?, 1);
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `souma_nucleus::core` - entities, keys and the export contract
//! - `souma_nucleus::store` - storage abstraction, memory and SQLite

pub mod config;
pub mod error;
pub mod nucleus;

pub use souma_core as core;
pub use souma_store as store;

pub use config::NucleusConfig;
pub use error::{NucleusError, Result};
pub use nucleus::{AcceptOutcome, Nucleus, ToggleKind, ToggleOutcome};

pub use souma_core::{
    Export, ExportMap, ExportOptions, KeyIdentity, Oneup, Persona, PersonaId, Planet, PlanetId,
    Souma, SoumaId, Star, StarId, StarView, Starmap, StarmapId, StarmapView, Vesicle,
};
