//! Store trait: the abstract interface for entity persistence.
//!
//! The nucleus only needs keyed create/read/update plus a handful of
//! relationship queries. Implementations include SQLite (primary) and
//! in-memory (for tests).

use async_trait::async_trait;
use souma_core::{
    Oneup, OneupId, Persona, PersonaId, Planet, PlanetId, Souma, SoumaId, Star, StarId, StarView,
    Starmap, StarmapId, StarmapView, Vesicle, VesicleId,
};

use crate::error::Result;

/// Result of inserting a row under a uniqueness rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertResult<Id> {
    /// Row was inserted.
    Inserted,
    /// A row with the same id already exists (idempotent, not an error).
    AlreadyExists,
    /// A different row already occupies the unique slot.
    Conflict {
        /// Id of the row holding the slot.
        existing: Id,
    },
}

/// The Store trait: async interface for entity persistence.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, `spawn_blocking` keeps the runtime free.
///
/// # Design Notes
///
/// - **Upserts**: `put_*` inserts or replaces the whole entity, including
///   its edge rows (contacts, satellites, starmap index).
/// - **One vote per pair**: at most one Oneup exists per (creator, star).
///   Inserting a second one with a different id yields `Conflict`.
/// - **Derived counts**: vote counts are computed at query time.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Identities
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert or replace a persona, contacts included.
    async fn put_persona(&self, persona: &Persona) -> Result<()>;

    async fn get_persona(&self, id: &PersonaId) -> Result<Option<Persona>>;

    /// All personas, optionally only those holding private keys.
    async fn list_personas(&self, controlled_only: bool) -> Result<Vec<Persona>>;

    async fn put_souma(&self, souma: &Souma) -> Result<()>;

    async fn get_souma(&self, id: &SoumaId) -> Result<Option<Souma>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Content
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert or replace a star and its planet references.
    async fn put_star(&self, star: &Star) -> Result<()>;

    async fn get_star(&self, id: &StarId) -> Result<Option<Star>>;

    /// Stars written by `creator`, oldest first.
    async fn stars_by_creator(&self, creator: &PersonaId) -> Result<Vec<Star>>;

    /// Ids of stars referencing `planet`.
    async fn stars_with_planet(&self, planet: &PlanetId) -> Result<Vec<StarId>>;

    async fn put_planet(&self, planet: &Planet) -> Result<()>;

    async fn get_planet(&self, id: &PlanetId) -> Result<Option<Planet>>;

    /// Planets with the given ids. Unknown ids are skipped.
    async fn get_planets(&self, ids: &[PlanetId]) -> Result<Vec<Planet>>;

    /// Delete a planet. Star references are left alone. Returns false if it
    /// did not exist.
    async fn delete_planet(&self, id: &PlanetId) -> Result<bool>;

    // ─────────────────────────────────────────────────────────────────────────
    // Votes
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a new vote.
    ///
    /// # Returns
    /// - `Inserted` if no vote existed for (creator, star).
    /// - `AlreadyExists` if this exact id is already stored.
    /// - `Conflict` if another vote holds the (creator, star) slot.
    async fn insert_oneup(&self, oneup: &Oneup) -> Result<InsertResult<OneupId>>;

    /// Update an existing vote's state and modification time.
    async fn update_oneup(&self, oneup: &Oneup) -> Result<()>;

    /// The vote `creator` cast on `star`, if any.
    async fn find_oneup(&self, creator: &PersonaId, star: &StarId) -> Result<Option<Oneup>>;

    async fn oneups_for_star(&self, star: &StarId) -> Result<Vec<Oneup>>;

    /// Number of active votes on `star`.
    async fn count_active_oneups(&self, star: &StarId) -> Result<u64>;

    // ─────────────────────────────────────────────────────────────────────────
    // Starmaps
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert or replace a starmap and its ordered index.
    async fn put_starmap(&self, starmap: &Starmap) -> Result<()>;

    async fn get_starmap(&self, id: &StarmapId) -> Result<Option<Starmap>>;

    /// Ids of starmaps whose index references `star`.
    async fn starmaps_indexing(&self, star: &StarId) -> Result<Vec<StarmapId>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Vesicles
    // ─────────────────────────────────────────────────────────────────────────

    /// Store a vesicle. Vesicles are immutable; a repeated id is
    /// `AlreadyExists`.
    async fn insert_vesicle(&self, vesicle: &Vesicle) -> Result<InsertResult<VesicleId>>;

    async fn get_vesicle(&self, id: &VesicleId) -> Result<Option<Vesicle>>;

    /// Vesicles by `author`, oldest first.
    async fn vesicles_by_author(&self, author: &PersonaId) -> Result<Vec<Vesicle>>;
}

/// Extension trait for resolving aggregates out of several lookups.
pub trait StoreExt: Store {
    /// A star together with its planets.
    fn star_view(
        &self,
        id: &StarId,
    ) -> impl std::future::Future<Output = Result<Option<StarView>>> + Send;

    /// Stars referenced by a starmap, in index order. Dangling references
    /// are skipped.
    fn stars_in_starmap(
        &self,
        starmap: &Starmap,
    ) -> impl std::future::Future<Output = Result<Vec<Star>>> + Send;

    /// A starmap with every entry resolved.
    fn starmap_view(
        &self,
        id: &StarmapId,
    ) -> impl std::future::Future<Output = Result<Option<StarmapView>>> + Send;
}

impl<S: Store + ?Sized> StoreExt for S {
    async fn star_view(&self, id: &StarId) -> Result<Option<StarView>> {
        let Some(star) = self.get_star(id).await? else {
            return Ok(None);
        };
        let ids: Vec<PlanetId> = star.planet_ids().cloned().collect();
        let planets = self.get_planets(&ids).await?;
        Ok(Some(StarView::new(star, planets)))
    }

    async fn stars_in_starmap(&self, starmap: &Starmap) -> Result<Vec<Star>> {
        let mut stars = Vec::with_capacity(starmap.len());
        for id in starmap.index() {
            if let Some(star) = self.get_star(id).await? {
                stars.push(star);
            }
        }
        Ok(stars)
    }

    async fn starmap_view(&self, id: &StarmapId) -> Result<Option<StarmapView>> {
        let Some(starmap) = self.get_starmap(id).await? else {
            return Ok(None);
        };
        let mut entries = Vec::with_capacity(starmap.len());
        for star_id in starmap.index() {
            if let Some(view) = self.star_view(star_id).await? {
                entries.push(view);
            }
        }
        Ok(Some(StarmapView::new(starmap, entries)))
    }
}
