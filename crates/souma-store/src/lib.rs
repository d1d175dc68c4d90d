//! # Souma Store
//!
//! Storage abstraction for the Souma nucleus. Provides a trait-based
//! interface for entity persistence with SQLite and in-memory
//! implementations.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all storage operations
//! - [`StoreExt`] - Aggregate lookups (star views, starmap views)
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`InsertResult`] - Result of inserting a uniquely keyed row
//!
//! ## Usage
//!
//! ```rust,no_run
//! use souma_core::{Persona, PersonaId, Timestamp};
//! use souma_store::{SqliteStore, Store};
//!
//! async fn example() -> souma_store::Result<()> {
//!     let store = SqliteStore::open("nucleus.db")?;
//!
//!     let persona = Persona::new(PersonaId::generate(), Some("ada".into()), None, Timestamp::now());
//!     store.put_persona(&persona).await?;
//!     assert!(store.get_persona(&persona.id).await?.is_some());
//!     Ok(())
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **One vote per pair**: a second Oneup for the same (creator, star)
//!   returns `Conflict` carrying the existing id
//! - **Derived counts**: active votes are counted per query, never cached
//! - **Weak starmap references**: starmap index rows never own stars

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{InsertResult, Store, StoreExt};
