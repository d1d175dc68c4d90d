//! The Nucleus: unified API over the content graph.
//!
//! The nucleus owns a store and applies the rules that span several
//! entities: who may act, which starmaps a star belongs to, when a planet
//! is garbage, and how votes are toggled. Every operation that needs a
//! principal takes the acting persona id explicitly.

use std::sync::Arc;

use souma_core::{
    Export, ExportMap, ExportOptions, KeyIdentity, Oneup, OneupId, Persona, PersonaId, Planet,
    PlanetId, PlanetKind, Souma, SoumaId, Star, StarId, StarView, Starmap, StarmapId,
    StarmapView, Timestamp, Vesicle, VesicleId,
};
use souma_store::{InsertResult, Store, StoreExt};

use crate::config::NucleusConfig;
use crate::error::{NucleusError, Result};

/// How a toggle changed the vote slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleKind {
    /// A new active vote was created.
    Added,
    /// An existing vote changed state.
    Flipped,
}

/// The vote after a toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleOutcome {
    pub oneup: Oneup,
    pub kind: ToggleKind,
}

/// Result of accepting a vesicle from a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptOutcome {
    /// Stored for the first time.
    Accepted,
    /// Already stored (idempotent).
    Duplicate,
}

/// The main Nucleus struct.
///
/// Provides a unified API for:
/// - Creating personas and soumas
/// - Authoring stars and their planets
/// - Toggling votes
/// - Maintaining starmaps
/// - Exporting views and exchanging signed vesicles
pub struct Nucleus<S: Store> {
    store: Arc<S>,
    config: NucleusConfig,
}

impl<S: Store> Nucleus<S> {
    /// Create a new nucleus over `store`.
    pub fn new(store: S, config: NucleusConfig) -> Self {
        Self::with_shared(Arc::new(store), config)
    }

    /// Create a nucleus over a store shared with other owners.
    pub fn with_shared(store: Arc<S>, config: NucleusConfig) -> Self {
        Self { store, config }
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &NucleusConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Identities
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a controlled persona with fresh keys, a profile and an index.
    pub async fn create_persona(
        &self,
        username: Option<String>,
        email: Option<String>,
    ) -> Result<Persona> {
        let now = Timestamp::now();
        let mut persona = Persona::new(PersonaId::generate(), username, email, now);
        persona.generate_keys()?;

        let profile = Starmap::new(StarmapId::generate(), Some(persona.id.clone()), now);
        let index = Starmap::new(StarmapId::generate(), Some(persona.id.clone()), now);
        persona.profile_id = Some(profile.id.clone());
        persona.index_id = Some(index.id.clone());

        self.store.put_starmap(&profile).await?;
        self.store.put_starmap(&index).await?;
        self.store.put_persona(&persona).await?;

        tracing::info!(persona = %persona.id, "Created {persona}");
        Ok(persona)
    }

    /// Record a persona learned from a peer. Private keys are never
    /// imported, and a locally controlled persona is never overwritten.
    pub async fn import_persona(&self, persona: &Persona) -> Result<Persona> {
        if let Some(existing) = self.store.get_persona(&persona.id).await? {
            if existing.is_controlled() {
                return Err(NucleusError::InvalidOperation(format!(
                    "{existing} is controlled by this node"
                )));
            }
        }

        let mut imported = persona.clone();
        imported.keyring = persona.keyring.to_public();
        self.store.put_persona(&imported).await?;

        tracing::debug!(persona = %imported.id, "Imported {imported}");
        Ok(imported)
    }

    pub async fn persona(&self, id: &PersonaId) -> Result<Persona> {
        self.store
            .get_persona(id)
            .await?
            .ok_or_else(|| NucleusError::PersonaNotFound(id.clone()))
    }

    /// Personas holding private keys on this node.
    pub async fn controlled_personas(&self) -> Result<Vec<Persona>> {
        Ok(self.store.list_personas(true).await?)
    }

    /// Replace a controlled persona's keys.
    pub async fn regenerate_keys(&self, id: &PersonaId) -> Result<Persona> {
        let mut persona = self.controlled(id, "regenerate keys").await?;
        persona.generate_keys()?;
        persona.modified = Timestamp::now();
        self.store.put_persona(&persona).await?;

        tracing::info!(persona = %persona.id, "Regenerated keys of {persona}");
        Ok(persona)
    }

    /// Add `contact` to `owner`'s contacts. Returns false if already present.
    pub async fn add_contact(&self, owner: &PersonaId, contact: &PersonaId) -> Result<bool> {
        let mut persona = self.controlled(owner, "edit contacts").await?;
        self.persona(contact).await?;

        if persona.id == *contact {
            return Err(NucleusError::InvalidOperation(format!(
                "{persona} cannot add itself as a contact"
            )));
        }

        let added = persona.add_contact(contact.clone(), Timestamp::now());
        if added {
            self.store.put_persona(&persona).await?;
        }
        Ok(added)
    }

    pub async fn remove_contact(&self, owner: &PersonaId, contact: &PersonaId) -> Result<bool> {
        let mut persona = self.controlled(owner, "edit contacts").await?;
        let removed = persona.remove_contact(contact, Timestamp::now());
        if removed {
            self.store.put_persona(&persona).await?;
        }
        Ok(removed)
    }

    /// Create this node's souma with fresh keys and its own starmap.
    pub async fn create_souma(&self) -> Result<Souma> {
        let mut souma = Souma::generate(SoumaId::generate())?;
        let starmap = Starmap::new(StarmapId::generate(), None, Timestamp::now());
        souma.starmap_id = Some(starmap.id.clone());

        self.store.put_starmap(&starmap).await?;
        self.store.put_souma(&souma).await?;

        tracing::info!(souma = %souma.id, "Created {souma}");
        Ok(souma)
    }

    pub async fn souma(&self, id: &SoumaId) -> Result<Option<Souma>> {
        Ok(self.store.get_souma(id).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Stars
    // ─────────────────────────────────────────────────────────────────────────

    /// Write a new star as `author`.
    ///
    /// The star joins the author's index, and the profile too when
    /// `publish_to_profile` is set.
    pub async fn create_star(&self, author_id: &PersonaId, text: &str) -> Result<Star> {
        let author = self.controlled(author_id, "write stars").await?;
        let now = Timestamp::now();
        let star = Star::new(StarId::generate(), text, author.id.clone(), now);
        self.store.put_star(&star).await?;

        if let Some(index_id) = &author.index_id {
            self.starmap_add(index_id, &star.id).await?;
        }
        self.sync_profile(&author, &star).await?;

        tracing::info!(star = %star.id, "Created {star}");
        Ok(star)
    }

    /// Store a star received from a peer together with its planets.
    ///
    /// A known star may only be refreshed by the same foreign creator.
    /// Stars written on this node are never overwritten.
    pub async fn import_star(&self, view: &StarView) -> Result<()> {
        let creator = self.store.get_persona(view.star.creator_id()).await?;
        if creator.is_some_and(|c| c.is_controlled()) {
            return Err(NucleusError::Unauthorized(format!(
                "{} belongs to a persona controlled by this node",
                view.star
            )));
        }
        if let Some(existing) = self.store.get_star(&view.star.id).await? {
            if existing.creator_id() != view.star.creator_id() {
                return Err(NucleusError::InvalidOperation(format!(
                    "{existing} cannot change creator on import"
                )));
            }
        }

        for planet in &view.planets {
            self.store_planet(planet).await?;
        }
        self.store.put_star(&view.star).await?;
        tracing::debug!(star = %view.star.id, "Imported {}", view.star);
        Ok(())
    }

    pub async fn star(&self, id: &StarId) -> Result<Star> {
        self.store
            .get_star(id)
            .await?
            .ok_or_else(|| NucleusError::StarNotFound(id.clone()))
    }

    /// Move a star to the state with `code`. Only its creator may do so.
    pub async fn set_star_state(
        &self,
        star_id: &StarId,
        actor_id: &PersonaId,
        code: i64,
    ) -> Result<Star> {
        let (actor, mut star) = self.authored(star_id, actor_id, "change the state of").await?;
        star.set_state(code)?;
        star.touch(Timestamp::now());
        self.store.put_star(&star).await?;
        self.sync_profile(&actor, &star).await?;

        tracing::info!(star = %star.id, state = star.get_state(), "State of {star} changed");
        Ok(star)
    }

    /// Replace a star's text.
    pub async fn edit_star(&self, star_id: &StarId, actor_id: &PersonaId, text: &str) -> Result<Star> {
        let (_, mut star) = self.authored(star_id, actor_id, "edit").await?;
        star.set_text(text, Timestamp::now());
        self.store.put_star(&star).await?;
        Ok(star)
    }

    /// Attach `planet` to a star. Pictures must use an allowed extension.
    pub async fn attach_planet(
        &self,
        star_id: &StarId,
        actor_id: &PersonaId,
        planet: &Planet,
    ) -> Result<Star> {
        if let PlanetKind::Picture { filename } = planet.kind() {
            if !self.config.allows_file(filename) {
                return Err(NucleusError::InvalidOperation(format!(
                    "file type of {filename:?} is not allowed"
                )));
            }
        }

        let (_, mut star) = self.authored(star_id, actor_id, "attach planets to").await?;
        self.store_planet(planet).await?;
        if star.attach_planet(planet.id.clone(), Timestamp::now()) {
            self.store.put_star(&star).await?;
        }
        Ok(star)
    }

    /// Detach a planet. It is deleted once no star references it anymore.
    pub async fn detach_planet(
        &self,
        star_id: &StarId,
        actor_id: &PersonaId,
        planet_id: &PlanetId,
    ) -> Result<Star> {
        let (_, mut star) = self.authored(star_id, actor_id, "detach planets from").await?;
        if !star.detach_planet(planet_id, Timestamp::now()) {
            return Err(NucleusError::PlanetNotFound(planet_id.clone()));
        }
        self.store.put_star(&star).await?;

        if self.store.stars_with_planet(planet_id).await?.is_empty() {
            self.store.delete_planet(planet_id).await?;
            tracing::debug!(planet = %planet_id, "Deleted orphaned planet");
        }
        Ok(star)
    }

    /// Ranking score of a star. The active vote count is the score, with a
    /// floor of one so unvoted stars still rank by age.
    pub async fn hot(&self, star_id: &StarId) -> Result<f64> {
        let star = self.star(star_id).await?;
        let count = self.store.count_active_oneups(star_id).await?;
        Ok(star.hot(count.max(1) as f64))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Votes
    // ─────────────────────────────────────────────────────────────────────────

    /// Toggle `author`'s vote on a star.
    ///
    /// Creates an active vote if none exists, otherwise flips the existing
    /// one. A concurrent insert that lost the uniqueness race is reported as
    /// [`NucleusError::Conflict`].
    pub async fn toggle_oneup(&self, star_id: &StarId, author_id: &PersonaId) -> Result<ToggleOutcome> {
        let author = self.controlled(author_id, "vote").await?;
        let star = self.star(star_id).await?;
        let now = Timestamp::now();

        if let Some(mut oneup) = self.store.find_oneup(&author.id, &star.id).await? {
            oneup.flip(now);
            self.store.update_oneup(&oneup).await?;
            tracing::info!(oneup = %oneup.id, state = oneup.get_state(), "Toggled {oneup}");
            return Ok(ToggleOutcome {
                oneup,
                kind: ToggleKind::Flipped,
            });
        }

        let oneup = Oneup::new(OneupId::generate(), author.id.clone(), star.id.clone(), now);
        match self.store.insert_oneup(&oneup).await? {
            InsertResult::Inserted | InsertResult::AlreadyExists => {
                tracing::info!(oneup = %oneup.id, "Added {oneup}");
                Ok(ToggleOutcome {
                    oneup,
                    kind: ToggleKind::Added,
                })
            }
            InsertResult::Conflict { existing } => Err(NucleusError::Conflict {
                creator: author.id,
                star: star.id,
                existing,
            }),
        }
    }

    /// Number of active votes on a star.
    pub async fn oneup_count(&self, star_id: &StarId) -> Result<u64> {
        Ok(self.store.count_active_oneups(star_id).await?)
    }

    /// Whether `viewer` currently has an active vote on the star.
    pub async fn oneupped(&self, star_id: &StarId, viewer_id: &PersonaId) -> Result<bool> {
        Ok(self
            .store
            .find_oneup(viewer_id, star_id)
            .await?
            .is_some_and(|oneup| oneup.is_active()))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Starmaps
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn starmap(&self, id: &StarmapId) -> Result<Starmap> {
        self.store
            .get_starmap(id)
            .await?
            .ok_or_else(|| NucleusError::StarmapNotFound(id.clone()))
    }

    /// Append a star to a starmap. Returns false if it was already indexed.
    pub async fn starmap_add(&self, starmap_id: &StarmapId, star_id: &StarId) -> Result<bool> {
        let mut starmap = self.starmap(starmap_id).await?;
        self.star(star_id).await?;

        let added = starmap.add(star_id.clone(), Timestamp::now());
        if added {
            self.store.put_starmap(&starmap).await?;
        }
        Ok(added)
    }

    /// Drop a star from a starmap. The star itself is untouched.
    pub async fn starmap_remove(&self, starmap_id: &StarmapId, star_id: &StarId) -> Result<bool> {
        let mut starmap = self.starmap(starmap_id).await?;
        let removed = starmap.remove(star_id, Timestamp::now());
        if removed {
            self.store.put_starmap(&starmap).await?;
        }
        Ok(removed)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Views and Export
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn star_view(&self, id: &StarId) -> Result<StarView> {
        self.store
            .star_view(id)
            .await?
            .ok_or_else(|| NucleusError::StarNotFound(id.clone()))
    }

    pub async fn starmap_view(&self, id: &StarmapId) -> Result<StarmapView> {
        self.store
            .starmap_view(id)
            .await?
            .ok_or_else(|| NucleusError::StarmapNotFound(id.clone()))
    }

    pub async fn export_persona(&self, id: &PersonaId, options: &ExportOptions) -> Result<ExportMap> {
        Ok(self.persona(id).await?.export(options))
    }

    pub async fn export_star(&self, id: &StarId, options: &ExportOptions) -> Result<ExportMap> {
        Ok(self.star_view(id).await?.export(options))
    }

    pub async fn export_starmap(&self, id: &StarmapId, options: &ExportOptions) -> Result<ExportMap> {
        Ok(self.starmap_view(id).await?.export(options))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Vesicles
    // ─────────────────────────────────────────────────────────────────────────

    /// Seal the export of a star, signed by its creator, and store it.
    pub async fn publish_star(&self, star_id: &StarId, source: Option<&SoumaId>) -> Result<Vesicle> {
        let view = self.star_view(star_id).await?;
        let author = self
            .controlled(view.star.creator_id(), "publish")
            .await?;

        let payload = view.export(&ExportOptions::new()).to_json_string()?;
        let vesicle = Vesicle::seal(
            VesicleId::generate(),
            &author,
            payload,
            source.cloned(),
            Timestamp::now(),
        )?;
        self.store.insert_vesicle(&vesicle).await?;

        tracing::info!(vesicle = %vesicle.id, "Published {vesicle}");
        Ok(vesicle)
    }

    /// Accept a vesicle from a peer.
    ///
    /// The author must be known. With `verify_vesicles` set the signature
    /// must verify against the author's stored public key. On first receipt
    /// the author's myelin offset advances to the vesicle's creation time.
    pub async fn accept_vesicle(&self, vesicle: &Vesicle) -> Result<AcceptOutcome> {
        let Some(mut author) = self.store.get_persona(&vesicle.author_id).await? else {
            tracing::warn!(vesicle = %vesicle.id, "Rejected {vesicle}: unknown author");
            return Err(NucleusError::PersonaNotFound(vesicle.author_id.clone()));
        };

        if self.config.verify_vesicles && !vesicle.verify(&author)? {
            tracing::warn!(vesicle = %vesicle.id, "Rejected {vesicle}: invalid signature");
            return Err(NucleusError::InvalidSignature(author.id));
        }

        match self.store.insert_vesicle(vesicle).await? {
            InsertResult::Inserted => {
                if author.advance_myelin(vesicle.created) {
                    self.store.put_persona(&author).await?;
                }
                tracing::info!(vesicle = %vesicle.id, "Accepted {vesicle}");
                Ok(AcceptOutcome::Accepted)
            }
            InsertResult::AlreadyExists | InsertResult::Conflict { .. } => {
                Ok(AcceptOutcome::Duplicate)
            }
        }
    }

    pub async fn vesicles_by(&self, author_id: &PersonaId) -> Result<Vec<Vesicle>> {
        Ok(self.store.vesicles_by_author(author_id).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    /// Resolve a persona that must hold private keys on this node.
    async fn controlled(&self, id: &PersonaId, action: &str) -> Result<Persona> {
        let persona = self.persona(id).await?;
        if !persona.is_controlled() {
            return Err(NucleusError::Unauthorized(format!(
                "{persona} is not controlled by this node and cannot {action}"
            )));
        }
        Ok(persona)
    }

    /// Resolve a star together with its creator acting on it.
    async fn authored(
        &self,
        star_id: &StarId,
        actor_id: &PersonaId,
        action: &str,
    ) -> Result<(Persona, Star)> {
        let actor = self.controlled(actor_id, action).await?;
        let star = self.star(star_id).await?;
        if star.creator_id() != &actor.id {
            return Err(NucleusError::Unauthorized(format!(
                "{actor} cannot {action} {star}"
            )));
        }
        Ok((actor, star))
    }

    /// Store a planet unless it is already known. A known planet is never
    /// rewritten, and reusing its id for a different attachment fails.
    async fn store_planet(&self, planet: &Planet) -> Result<Planet> {
        match self.store.get_planet(&planet.id).await? {
            Some(existing) if existing.kind() == planet.kind() => Ok(existing),
            Some(existing) => Err(NucleusError::InvalidOperation(format!(
                "{existing} already exists as a different {}",
                existing.kind().name()
            ))),
            None => {
                self.store.put_planet(planet).await?;
                Ok(planet.clone())
            }
        }
    }

    /// Keep a star's profile membership in line with its state.
    async fn sync_profile(&self, author: &Persona, star: &Star) -> Result<()> {
        let Some(profile_id) = &author.profile_id else {
            return Ok(());
        };
        if self.config.publish_to_profile && star.state().is_public() {
            self.starmap_add(profile_id, &star.id).await?;
        } else {
            self.starmap_remove(profile_id, &star.id).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use souma_core::{ContentState, StateCode};
    use souma_store::MemoryStore;

    fn nucleus() -> Nucleus<MemoryStore> {
        Nucleus::new(MemoryStore::new(), NucleusConfig::default())
    }

    async fn foreign(nucleus: &Nucleus<MemoryStore>) -> Persona {
        let mut remote = Persona::new(PersonaId::generate(), Some("remote".into()), None, Timestamp::now());
        remote.generate_keys().unwrap();
        nucleus.import_persona(&remote).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_persona_sets_up_starmaps() {
        let nucleus = nucleus();
        let persona = nucleus
            .create_persona(Some("ada".into()), Some("ada@example.org".into()))
            .await
            .unwrap();

        assert!(persona.is_controlled());
        let profile = nucleus.starmap(persona.profile_id.as_ref().unwrap()).await.unwrap();
        let index = nucleus.starmap(persona.index_id.as_ref().unwrap()).await.unwrap();
        assert_eq!(profile.author_id.as_ref(), Some(&persona.id));
        assert_eq!(index.author_id.as_ref(), Some(&persona.id));
        assert_ne!(profile.id, index.id);
    }

    #[tokio::test]
    async fn test_import_strips_private_keys() {
        let nucleus = nucleus();
        let imported = foreign(&nucleus).await;
        assert!(!imported.is_controlled());
        assert!(nucleus.controlled_personas().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_import_does_not_overwrite_controlled() {
        let nucleus = nucleus();
        let local = nucleus.create_persona(None, None).await.unwrap();
        let err = nucleus.import_persona(&local).await.unwrap_err();
        assert!(matches!(err, NucleusError::InvalidOperation(_)));
        assert!(nucleus.persona(&local.id).await.unwrap().is_controlled());
    }

    #[tokio::test]
    async fn test_create_star_indexes_and_profiles() {
        let nucleus = nucleus();
        let author = nucleus.create_persona(None, None).await.unwrap();
        let star = nucleus.create_star(&author.id, "hello").await.unwrap();

        let index = nucleus.starmap(author.index_id.as_ref().unwrap()).await.unwrap();
        let profile = nucleus.starmap(author.profile_id.as_ref().unwrap()).await.unwrap();
        assert!(index.contains(&star.id));
        assert!(profile.contains(&star.id));
    }

    #[tokio::test]
    async fn test_foreign_author_cannot_write() {
        let nucleus = nucleus();
        let remote = foreign(&nucleus).await;
        let err = nucleus.create_star(&remote.id, "nope").await.unwrap_err();
        assert!(matches!(err, NucleusError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_set_star_state_updates_profile() {
        let nucleus = nucleus();
        let author = nucleus.create_persona(None, None).await.unwrap();
        let star = nucleus.create_star(&author.id, "draft me").await.unwrap();
        let profile_id = author.profile_id.clone().unwrap();

        let draft = ContentState::Draft.code();
        let star = nucleus.set_star_state(&star.id, &author.id, draft).await.unwrap();
        assert_eq!(star.get_state(), "draft");
        assert!(!nucleus.starmap(&profile_id).await.unwrap().contains(&star.id));

        let published = ContentState::Published.code();
        nucleus.set_star_state(&star.id, &author.id, published).await.unwrap();
        assert!(nucleus.starmap(&profile_id).await.unwrap().contains(&star.id));
    }

    #[tokio::test]
    async fn test_set_star_state_rejects_bad_code() {
        let nucleus = nucleus();
        let author = nucleus.create_persona(None, None).await.unwrap();
        let star = nucleus.create_star(&author.id, "x").await.unwrap();

        let err = nucleus.set_star_state(&star.id, &author.id, 9).await.unwrap_err();
        assert!(matches!(err, NucleusError::Core(_)));
        assert_eq!(nucleus.star(&star.id).await.unwrap().get_state(), "published");
    }

    #[tokio::test]
    async fn test_only_creator_changes_state() {
        let nucleus = nucleus();
        let author = nucleus.create_persona(None, None).await.unwrap();
        let other = nucleus.create_persona(None, None).await.unwrap();
        let star = nucleus.create_star(&author.id, "mine").await.unwrap();

        let err = nucleus.set_star_state(&star.id, &other.id, 1).await.unwrap_err();
        assert!(matches!(err, NucleusError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_picture_extension_enforced() {
        let nucleus = nucleus();
        let author = nucleus.create_persona(None, None).await.unwrap();
        let star = nucleus.create_star(&author.id, "pic").await.unwrap();

        let bad = Planet::picture(PlanetId::generate(), None, "virus.exe", Timestamp::now());
        let err = nucleus.attach_planet(&star.id, &author.id, &bad).await.unwrap_err();
        assert!(matches!(err, NucleusError::InvalidOperation(_)));
        assert!(nucleus.store().get_planet(&bad.id).await.unwrap().is_none());

        let link = Planet::link(PlanetId::generate(), None, "https://example.org", Timestamp::now());
        let star = nucleus.attach_planet(&star.id, &author.id, &link).await.unwrap();
        assert!(star.has_planet(&link.id));
    }

    #[tokio::test]
    async fn test_toggle_counts() {
        let nucleus = nucleus();
        let author = nucleus.create_persona(None, None).await.unwrap();
        let star = nucleus.create_star(&author.id, "vote").await.unwrap();

        let first = nucleus.toggle_oneup(&star.id, &author.id).await.unwrap();
        assert_eq!(first.kind, ToggleKind::Added);
        assert!(nucleus.oneupped(&star.id, &author.id).await.unwrap());

        let second = nucleus.toggle_oneup(&star.id, &author.id).await.unwrap();
        assert_eq!(second.kind, ToggleKind::Flipped);
        assert_eq!(second.oneup.id, first.oneup.id);
        assert_eq!(nucleus.oneup_count(&star.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_toggle_unknown_star() {
        let nucleus = nucleus();
        let author = nucleus.create_persona(None, None).await.unwrap();
        let err = nucleus
            .toggle_oneup(&StarId::generate(), &author.id)
            .await
            .unwrap_err();
        assert!(matches!(err, NucleusError::StarNotFound(_)));
    }

    #[tokio::test]
    async fn test_hot_grows_with_votes() {
        let nucleus = nucleus();
        let author = nucleus.create_persona(None, None).await.unwrap();
        let star = nucleus.create_star(&author.id, "rank").await.unwrap();

        let cold = nucleus.hot(&star.id).await.unwrap();
        assert!(cold > 0.0);
        assert_eq!(cold, star.hot(1.0));

        nucleus.toggle_oneup(&star.id, &author.id).await.unwrap();
        assert_eq!(nucleus.hot(&star.id).await.unwrap(), cold);

        let other = nucleus.create_persona(None, None).await.unwrap();
        nucleus.toggle_oneup(&star.id, &other.id).await.unwrap();
        let warm = nucleus.hot(&star.id).await.unwrap();
        assert!(warm > cold);
    }

    #[tokio::test]
    async fn test_unvoted_stars_rank_by_age() {
        let nucleus = nucleus();
        let author = nucleus.create_persona(None, None).await.unwrap();
        let old = Star::new(StarId::generate(), "old", author.id.clone(), Timestamp::from_millis(1_400_000_000_000));
        let new = Star::new(StarId::generate(), "new", author.id.clone(), Timestamp::from_millis(1_700_000_000_000));
        nucleus.store().put_star(&old).await.unwrap();
        nucleus.store().put_star(&new).await.unwrap();

        assert!(nucleus.hot(&new.id).await.unwrap() > nucleus.hot(&old.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_contacts() {
        let nucleus = nucleus();
        let owner = nucleus.create_persona(None, None).await.unwrap();
        let remote = foreign(&nucleus).await;

        assert!(nucleus.add_contact(&owner.id, &remote.id).await.unwrap());
        assert!(!nucleus.add_contact(&owner.id, &remote.id).await.unwrap());
        assert!(nucleus.persona(&owner.id).await.unwrap().has_contact(&remote.id));

        let err = nucleus.add_contact(&owner.id, &owner.id).await.unwrap_err();
        assert!(matches!(err, NucleusError::InvalidOperation(_)));

        assert!(nucleus.remove_contact(&owner.id, &remote.id).await.unwrap());
        assert!(nucleus.persona(&owner.id).await.unwrap().contacts.is_empty());
    }

    #[tokio::test]
    async fn test_create_souma() {
        let nucleus = nucleus();
        let souma = nucleus.create_souma().await.unwrap();
        assert!(souma.is_controlled());
        let stored = nucleus.souma(&souma.id).await.unwrap().unwrap();
        assert_eq!(stored, souma);
        nucleus.starmap(souma.starmap_id.as_ref().unwrap()).await.unwrap();
    }

    #[tokio::test]
    async fn test_import_star_cannot_change_creator() {
        let nucleus = nucleus();
        let alice = nucleus.create_persona(None, None).await.unwrap();
        let mallory = foreign(&nucleus).await;
        let star = nucleus.create_star(&alice.id, "original").await.unwrap();

        let forged = Star::restore(
            star.id.clone(),
            "hijacked".into(),
            star.created,
            Timestamp::now(),
            ContentState::Published,
            mallory.id.clone(),
            Vec::new(),
        );
        let err = nucleus
            .import_star(&StarView::new(forged, Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, NucleusError::InvalidOperation(_)));

        let stored = nucleus.star(&star.id).await.unwrap();
        assert_eq!(stored.creator_id(), &alice.id);
        assert_eq!(stored.text, "original");
    }

    #[tokio::test]
    async fn test_import_star_cannot_overwrite_local_author() {
        let nucleus = nucleus();
        let alice = nucleus.create_persona(None, None).await.unwrap();
        let star = nucleus.create_star(&alice.id, "original").await.unwrap();

        let mut edited = star.clone();
        edited.set_text("rewritten", Timestamp::now());
        let err = nucleus
            .import_star(&StarView::new(edited, Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, NucleusError::Unauthorized(_)));
        assert_eq!(nucleus.star(&star.id).await.unwrap().text, "original");
    }

    #[tokio::test]
    async fn test_import_star_refreshes_foreign_star() {
        let nucleus = nucleus();
        let remote = foreign(&nucleus).await;
        let mut star = Star::new(StarId::generate(), "v1", remote.id.clone(), Timestamp::now());
        nucleus.import_star(&StarView::new(star.clone(), Vec::new())).await.unwrap();

        star.set_text("v2", Timestamp::now());
        nucleus.import_star(&StarView::new(star.clone(), Vec::new())).await.unwrap();
        assert_eq!(nucleus.star(&star.id).await.unwrap().text, "v2");
    }

    #[tokio::test]
    async fn test_planet_id_cannot_change_kind() {
        let nucleus = nucleus();
        let alice = nucleus.create_persona(None, None).await.unwrap();
        let bob = nucleus.create_persona(None, None).await.unwrap();
        let s1 = nucleus.create_star(&alice.id, "sun").await.unwrap();
        let s2 = nucleus.create_star(&bob.id, "mine now").await.unwrap();

        let picture = Planet::picture(PlanetId::generate(), Some("sun".into()), "sun.jpg", Timestamp::now());
        nucleus.attach_planet(&s1.id, &alice.id, &picture).await.unwrap();

        let link = Planet::link(picture.id.clone(), None, "https://evil.example", Timestamp::now());
        let err = nucleus.attach_planet(&s2.id, &bob.id, &link).await.unwrap_err();
        assert!(matches!(err, NucleusError::InvalidOperation(_)));
        assert!(!nucleus.star(&s2.id).await.unwrap().has_planet(&picture.id));

        let stored = nucleus.store().get_planet(&picture.id).await.unwrap().unwrap();
        assert_eq!(stored, picture);
    }

    #[tokio::test]
    async fn test_shared_planet_is_not_rewritten() {
        let nucleus = nucleus();
        let alice = nucleus.create_persona(None, None).await.unwrap();
        let bob = nucleus.create_persona(None, None).await.unwrap();
        let s1 = nucleus.create_star(&alice.id, "one").await.unwrap();
        let s2 = nucleus.create_star(&bob.id, "two").await.unwrap();

        let picture = Planet::picture(PlanetId::generate(), Some("sun".into()), "sun.jpg", Timestamp::now());
        nucleus.attach_planet(&s1.id, &alice.id, &picture).await.unwrap();

        let mut retitled = picture.clone();
        retitled.title = Some("renamed".into());
        let s2 = nucleus.attach_planet(&s2.id, &bob.id, &retitled).await.unwrap();
        assert!(s2.has_planet(&picture.id));

        let stored = nucleus.store().get_planet(&picture.id).await.unwrap().unwrap();
        assert_eq!(stored.title.as_deref(), Some("sun"));
    }
}
