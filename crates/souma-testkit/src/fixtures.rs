//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use souma_core::{
    KeyIdentity, Keyring, Persona, PersonaId, Planet, PlanetId, Star, StarId, Timestamp,
};
use souma_nucleus::{Nucleus, NucleusConfig, Result};
use souma_store::{MemoryStore, Store};

/// A persona with deterministic id and keys derived from `seed`.
///
/// The persona is controlled but has no profile or index and is not
/// stored anywhere.
pub fn seeded_persona(seed: u8, username: &str) -> Persona {
    let mut id_bytes = [0u8; 16];
    id_bytes[0] = seed;
    id_bytes[15] = 0x01;
    let id = PersonaId::parse(&hex::encode(id_bytes)).expect("16 bytes encode to a valid id");

    let mut persona = Persona::new(id, Some(username.to_string()), None, Timestamp::from_millis(0));
    persona.keyring = Keyring::from_seeds(&[seed; 32], &[seed.wrapping_add(0x80); 32]);
    persona
}

/// A test fixture with a nucleus over a memory store.
pub struct TestFixture {
    pub nucleus: Nucleus<MemoryStore>,
}

impl TestFixture {
    /// Create a new test fixture with the default configuration.
    pub fn new() -> Self {
        Self::with_config(NucleusConfig::default())
    }

    pub fn with_config(config: NucleusConfig) -> Self {
        Self {
            nucleus: Nucleus::new(MemoryStore::new(), config),
        }
    }

    /// Get the store reference.
    pub fn store(&self) -> &MemoryStore {
        self.nucleus.store()
    }

    /// Create a controlled persona with a profile and an index.
    pub async fn persona(&self, username: &str) -> Result<Persona> {
        self.nucleus
            .create_persona(Some(username.to_string()), None)
            .await
    }

    /// Import a foreign persona: fresh keys, only the public half stored.
    ///
    /// Returns the full persona so tests can still sign as it.
    pub async fn foreign_persona(&self, username: &str) -> Result<Persona> {
        let mut remote = Persona::new(
            PersonaId::generate(),
            Some(username.to_string()),
            None,
            Timestamp::now(),
        );
        remote.generate_keys()?;
        self.nucleus.import_persona(&remote).await?;
        Ok(remote)
    }

    /// Write a star as `author`.
    pub async fn star(&self, author: &Persona, text: &str) -> Result<Star> {
        self.nucleus.create_star(&author.id, text).await
    }

    /// Store a star written by someone this node does not control.
    pub async fn foreign_star(&self, creator: &PersonaId, text: &str) -> Result<Star> {
        let star = Star::new(StarId::generate(), text, creator.clone(), Timestamp::now());
        self.store().put_star(&star).await?;
        Ok(star)
    }

    /// A picture planet with an allowed file name.
    pub fn picture(&self, filename: &str) -> Planet {
        Planet::picture(PlanetId::generate(), None, filename, Timestamp::now())
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Create multiple independent nodes for multi-party tests.
pub fn multi_party_fixtures(count: usize) -> Vec<TestFixture> {
    (0..count).map(|_| TestFixture::new()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_persona_is_deterministic() {
        let a = seeded_persona(7, "ada");
        let b = seeded_persona(7, "ada");
        let c = seeded_persona(8, "ada");

        assert_eq!(a, b);
        assert_ne!(a.id, c.id);
        assert_ne!(a.keyring, c.keyring);
        assert!(a.is_controlled());
    }

    #[tokio::test]
    async fn test_fixture_persona_and_star() {
        let fixture = TestFixture::new();
        let ada = fixture.persona("ada").await.unwrap();
        let star = fixture.star(&ada, "hello").await.unwrap();

        assert_eq!(star.creator_id(), &ada.id);
        assert_eq!(fixture.store().stars_by_creator(&ada.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_foreign_persona_is_public_only() {
        let fixture = TestFixture::new();
        let remote = fixture.foreign_persona("bob").await.unwrap();

        assert!(remote.is_controlled());
        let stored = fixture.nucleus.persona(&remote.id).await.unwrap();
        assert!(!stored.is_controlled());
        assert_eq!(stored.keyring.sign_public, remote.keyring.sign_public);
    }

    #[test]
    fn test_multi_party_fixtures_are_independent() {
        let nodes = multi_party_fixtures(3);
        assert_eq!(nodes.len(), 3);
    }
}
