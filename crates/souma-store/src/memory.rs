//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use souma_core::{
    KeyIdentity, Oneup, OneupId, Persona, PersonaId, Planet, PlanetId, Souma, SoumaId, Star,
    StarId, Starmap, StarmapId, Vesicle, VesicleId,
};

use crate::error::{Result, StoreError};
use crate::traits::{InsertResult, Store};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    personas: HashMap<PersonaId, Persona>,
    soumas: HashMap<SoumaId, Souma>,
    stars: HashMap<StarId, Star>,
    planets: HashMap<PlanetId, Planet>,

    /// Votes indexed by id.
    oneups: HashMap<OneupId, Oneup>,

    /// Uniqueness index: (creator, star) -> vote id.
    oneup_slots: HashMap<(PersonaId, StarId), OneupId>,

    starmaps: HashMap<StarmapId, Starmap>,
    vesicles: HashMap<VesicleId, Vesicle>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::InvalidData(format!("lock poisoned: {e}")))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::InvalidData(format!("lock poisoned: {e}")))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn put_persona(&self, persona: &Persona) -> Result<()> {
        let mut inner = self.write()?;
        inner.personas.insert(persona.id.clone(), persona.clone());
        Ok(())
    }

    async fn get_persona(&self, id: &PersonaId) -> Result<Option<Persona>> {
        Ok(self.read()?.personas.get(id).cloned())
    }

    async fn list_personas(&self, controlled_only: bool) -> Result<Vec<Persona>> {
        let inner = self.read()?;
        let mut personas: Vec<Persona> = inner
            .personas
            .values()
            .filter(|p| !controlled_only || p.is_controlled())
            .cloned()
            .collect();
        personas.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(personas)
    }

    async fn put_souma(&self, souma: &Souma) -> Result<()> {
        let mut inner = self.write()?;
        inner.soumas.insert(souma.id.clone(), souma.clone());
        Ok(())
    }

    async fn get_souma(&self, id: &SoumaId) -> Result<Option<Souma>> {
        Ok(self.read()?.soumas.get(id).cloned())
    }

    async fn put_star(&self, star: &Star) -> Result<()> {
        let mut inner = self.write()?;
        inner.stars.insert(star.id.clone(), star.clone());
        Ok(())
    }

    async fn get_star(&self, id: &StarId) -> Result<Option<Star>> {
        Ok(self.read()?.stars.get(id).cloned())
    }

    async fn stars_by_creator(&self, creator: &PersonaId) -> Result<Vec<Star>> {
        let inner = self.read()?;
        let mut stars: Vec<Star> = inner
            .stars
            .values()
            .filter(|s| s.creator_id() == creator)
            .cloned()
            .collect();
        stars.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));
        Ok(stars)
    }

    async fn stars_with_planet(&self, planet: &PlanetId) -> Result<Vec<StarId>> {
        let inner = self.read()?;
        let mut ids: Vec<StarId> = inner
            .stars
            .values()
            .filter(|s| s.has_planet(planet))
            .map(|s| s.id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn put_planet(&self, planet: &Planet) -> Result<()> {
        let mut inner = self.write()?;
        inner.planets.insert(planet.id.clone(), planet.clone());
        Ok(())
    }

    async fn get_planet(&self, id: &PlanetId) -> Result<Option<Planet>> {
        Ok(self.read()?.planets.get(id).cloned())
    }

    async fn get_planets(&self, ids: &[PlanetId]) -> Result<Vec<Planet>> {
        let inner = self.read()?;
        Ok(ids
            .iter()
            .filter_map(|id| inner.planets.get(id).cloned())
            .collect())
    }

    async fn delete_planet(&self, id: &PlanetId) -> Result<bool> {
        let mut inner = self.write()?;
        Ok(inner.planets.remove(id).is_some())
    }

    async fn insert_oneup(&self, oneup: &Oneup) -> Result<InsertResult<OneupId>> {
        let mut inner = self.write()?;

        if inner.oneups.contains_key(&oneup.id) {
            return Ok(InsertResult::AlreadyExists);
        }

        let slot = (oneup.creator_id().clone(), oneup.star_id().clone());
        if let Some(existing) = inner.oneup_slots.get(&slot) {
            return Ok(InsertResult::Conflict {
                existing: existing.clone(),
            });
        }

        inner.oneup_slots.insert(slot, oneup.id.clone());
        inner.oneups.insert(oneup.id.clone(), oneup.clone());
        Ok(InsertResult::Inserted)
    }

    async fn update_oneup(&self, oneup: &Oneup) -> Result<()> {
        let mut inner = self.write()?;
        let stored = inner
            .oneups
            .get_mut(&oneup.id)
            .ok_or_else(|| StoreError::not_found("oneup", &oneup.id))?;
        *stored = oneup.clone();
        Ok(())
    }

    async fn find_oneup(&self, creator: &PersonaId, star: &StarId) -> Result<Option<Oneup>> {
        let inner = self.read()?;
        let slot = (creator.clone(), star.clone());
        Ok(inner
            .oneup_slots
            .get(&slot)
            .and_then(|id| inner.oneups.get(id))
            .cloned())
    }

    async fn oneups_for_star(&self, star: &StarId) -> Result<Vec<Oneup>> {
        let inner = self.read()?;
        let mut oneups: Vec<Oneup> = inner
            .oneups
            .values()
            .filter(|o| o.star_id() == star)
            .cloned()
            .collect();
        oneups.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));
        Ok(oneups)
    }

    async fn count_active_oneups(&self, star: &StarId) -> Result<u64> {
        let inner = self.read()?;
        Ok(inner
            .oneups
            .values()
            .filter(|o| o.star_id() == star && o.is_active())
            .count() as u64)
    }

    async fn put_starmap(&self, starmap: &Starmap) -> Result<()> {
        let mut inner = self.write()?;
        inner.starmaps.insert(starmap.id.clone(), starmap.clone());
        Ok(())
    }

    async fn get_starmap(&self, id: &StarmapId) -> Result<Option<Starmap>> {
        Ok(self.read()?.starmaps.get(id).cloned())
    }

    async fn starmaps_indexing(&self, star: &StarId) -> Result<Vec<StarmapId>> {
        let inner = self.read()?;
        let mut ids: Vec<StarmapId> = inner
            .starmaps
            .values()
            .filter(|m| m.contains(star))
            .map(|m| m.id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn insert_vesicle(&self, vesicle: &Vesicle) -> Result<InsertResult<VesicleId>> {
        let mut inner = self.write()?;
        if inner.vesicles.contains_key(&vesicle.id) {
            return Ok(InsertResult::AlreadyExists);
        }
        inner.vesicles.insert(vesicle.id.clone(), vesicle.clone());
        Ok(InsertResult::Inserted)
    }

    async fn get_vesicle(&self, id: &VesicleId) -> Result<Option<Vesicle>> {
        Ok(self.read()?.vesicles.get(id).cloned())
    }

    async fn vesicles_by_author(&self, author: &PersonaId) -> Result<Vec<Vesicle>> {
        let inner = self.read()?;
        let mut vesicles: Vec<Vesicle> = inner
            .vesicles
            .values()
            .filter(|v| &v.author_id == author)
            .cloned()
            .collect();
        vesicles.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));
        Ok(vesicles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use souma_core::Timestamp;

    fn vote(creator: &PersonaId, star: &StarId) -> Oneup {
        Oneup::new(
            OneupId::generate(),
            creator.clone(),
            star.clone(),
            Timestamp::from_millis(1_000),
        )
    }

    #[tokio::test]
    async fn test_memory_store_persona_roundtrip() {
        let store = MemoryStore::new();
        let mut persona = Persona::new(PersonaId::generate(), Some("ada".into()), None, Timestamp::now());
        persona.generate_keys().unwrap();
        store.put_persona(&persona).await.unwrap();

        let loaded = store.get_persona(&persona.id).await.unwrap().unwrap();
        assert_eq!(loaded, persona);
        assert_eq!(store.list_personas(true).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_memory_store_oneup_slot() {
        let store = MemoryStore::new();
        let creator = PersonaId::generate();
        let star = StarId::generate();

        let first = vote(&creator, &star);
        let r1 = store.insert_oneup(&first).await.unwrap();
        assert_eq!(r1, InsertResult::Inserted);

        let r2 = store.insert_oneup(&first).await.unwrap();
        assert_eq!(r2, InsertResult::AlreadyExists);

        let second = vote(&creator, &star);
        let r3 = store.insert_oneup(&second).await.unwrap();
        assert_eq!(r3, InsertResult::Conflict { existing: first.id.clone() });

        assert_eq!(store.oneups_for_star(&star).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_memory_store_update_missing_oneup() {
        let store = MemoryStore::new();
        let o = vote(&PersonaId::generate(), &StarId::generate());
        let err = store.update_oneup(&o).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "oneup", .. }));
    }
}
