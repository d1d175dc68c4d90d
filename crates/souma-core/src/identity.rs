//! Persona and Souma identities.
//!
//! Both carry a [`Keyring`] and implement [`KeyIdentity`]; they share no
//! other structure. A Persona is a user, a Souma is a node.

use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::Result;
use crate::export::{Export, ExportMap, ExportValue};
use crate::keys::{KeyIdentity, KeyMaterial, Keyring};
use crate::types::{PersonaId, SoumaId, StarmapId, Timestamp};

/// A user identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    pub id: PersonaId,
    pub username: Option<String>,
    pub email: Option<String>,
    pub keyring: Keyring,
    pub modified: Timestamp,
    /// Public-facing content index.
    pub profile_id: Option<StarmapId>,
    /// Full content index.
    pub index_id: Option<StarmapId>,
    pub contacts: Vec<PersonaId>,
    /// Creation time of the newest vesicle received for this persona.
    pub myelin_offset: Option<Timestamp>,
}

impl Persona {
    /// A persona without keys. Call [`KeyIdentity::generate_keys`] to make it
    /// controlled.
    pub fn new(
        id: PersonaId,
        username: Option<String>,
        email: Option<String>,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            username,
            email,
            keyring: Keyring::default(),
            modified: now,
            profile_id: None,
            index_id: None,
            contacts: Vec::new(),
            myelin_offset: None,
        }
    }

    /// A persona known only by its public keys.
    pub fn foreign(
        id: PersonaId,
        username: Option<String>,
        sign_public: KeyMaterial,
        crypt_public: KeyMaterial,
        now: Timestamp,
    ) -> Self {
        let mut persona = Self::new(id, username, None, now);
        persona.keyring = Keyring::public_only(sign_public, crypt_public);
        persona
    }

    /// Add a contact. Returns false for duplicates and for self.
    pub fn add_contact(&mut self, contact: PersonaId, now: Timestamp) -> bool {
        if contact == self.id || self.contacts.contains(&contact) {
            return false;
        }
        self.contacts.push(contact);
        self.modified = now;
        true
    }

    pub fn remove_contact(&mut self, contact: &PersonaId, now: Timestamp) -> bool {
        let before = self.contacts.len();
        self.contacts.retain(|c| c != contact);
        let removed = self.contacts.len() != before;
        if removed {
            self.modified = now;
        }
        removed
    }

    pub fn has_contact(&self, contact: &PersonaId) -> bool {
        self.contacts.contains(contact)
    }

    /// Lowercase hex SHA-256 of the email address, used for avatar lookups.
    pub fn email_hash(&self) -> Option<String> {
        self.email
            .as_ref()
            .map(|email| hex::encode(Sha256::digest(email.as_bytes())))
    }

    /// The newest vesicle time seen, never moving backwards.
    pub fn advance_myelin(&mut self, created: Timestamp) -> bool {
        match self.myelin_offset {
            Some(offset) if offset >= created => false,
            _ => {
                self.myelin_offset = Some(created);
                true
            }
        }
    }

    fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or("anonymous")
    }
}

impl KeyIdentity for Persona {
    fn keyring(&self) -> &Keyring {
        &self.keyring
    }

    fn keyring_mut(&mut self) -> &mut Keyring {
        &mut self.keyring
    }

    fn identity_label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} [{}]>", self.display_name(), self.id.short())
    }
}

fn key_value(material: &KeyMaterial) -> ExportValue {
    if material.is_empty() {
        ExportValue::Null
    } else {
        ExportValue::Text(material.to_hex())
    }
}

impl Export for Persona {
    const DEFAULT_FIELDS: &'static [&'static str] = &[
        "id",
        "username",
        "email",
        "crypt_public",
        "sign_public",
        "modified",
        "profile_id",
        "index_id",
    ];

    fn field(&self, name: &str) -> Option<ExportValue> {
        let value: ExportValue = match name {
            "id" => self.id.to_string().into(),
            "username" => self.username.clone().into(),
            "email" => self.email.clone().into(),
            "email_hash" => self.email_hash().into(),
            "crypt_public" => key_value(&self.keyring.crypt_public),
            "sign_public" => key_value(&self.keyring.sign_public),
            "modified" => self.modified.into(),
            "profile_id" => self.profile_id.as_ref().map(|id| id.to_string()).into(),
            "index_id" => self.index_id.as_ref().map(|id| id.to_string()).into(),
            "myelin_offset" => self.myelin_offset.into(),
            _ => return None,
        };
        Some(value)
    }

    fn extend_export(&self, map: &mut ExportMap) {
        let contacts = self
            .contacts
            .iter()
            .map(|c| ExportMap::new().with("id", c.to_string()))
            .collect::<Vec<_>>();
        map.insert("contacts", contacts);
    }
}

/// A node identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Souma {
    pub id: SoumaId,
    pub keyring: Keyring,
    pub starmap_id: Option<StarmapId>,
}

impl Souma {
    pub fn new(id: SoumaId) -> Self {
        Self {
            id,
            keyring: Keyring::default(),
            starmap_id: None,
        }
    }

    /// A new souma with freshly generated keys.
    pub fn generate(id: SoumaId) -> Result<Self> {
        let mut souma = Self::new(id);
        souma.generate_keys()?;
        Ok(souma)
    }

    /// A souma known only by its public keys.
    pub fn foreign(id: SoumaId, sign_public: KeyMaterial, crypt_public: KeyMaterial) -> Self {
        Self {
            id,
            keyring: Keyring::public_only(sign_public, crypt_public),
            starmap_id: None,
        }
    }
}

impl KeyIdentity for Souma {
    fn keyring(&self) -> &Keyring {
        &self.keyring
    }

    fn keyring_mut(&mut self) -> &mut Keyring {
        &mut self.keyring
    }

    fn identity_label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Souma {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Souma [{}]>", self.id.short())
    }
}

impl Export for Souma {
    const DEFAULT_FIELDS: &'static [&'static str] =
        &["id", "crypt_public", "sign_public", "starmap_id"];

    fn field(&self, name: &str) -> Option<ExportValue> {
        let value: ExportValue = match name {
            "id" => self.id.to_string().into(),
            "crypt_public" => key_value(&self.keyring.crypt_public),
            "sign_public" => key_value(&self.keyring.sign_public),
            "starmap_id" => self.starmap_id.as_ref().map(|id| id.to_string()).into(),
            _ => return None,
        };
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::export::ExportOptions;
    use crate::keys::encrypt_for;

    fn alice() -> Persona {
        let mut p = Persona::new(
            PersonaId::generate(),
            Some("alice".into()),
            Some("alice@example.org".into()),
            Timestamp::from_millis(1_000),
        );
        p.keyring = Keyring::from_seeds(&[1; 32], &[2; 32]);
        p
    }

    #[test]
    fn test_new_persona_is_foreign_until_keys_generated() {
        let mut p = Persona::new(PersonaId::generate(), None, None, Timestamp::now());
        assert!(!p.is_controlled());
        p.generate_keys().unwrap();
        assert!(p.is_controlled());
    }

    #[test]
    fn test_foreign_persona_can_verify_but_not_sign() {
        let a = alice();
        let sig = a.sign(b"hello").unwrap();

        let b = Persona::foreign(
            a.id.clone(),
            a.username.clone(),
            a.keyring.sign_public.clone(),
            a.keyring.crypt_public.clone(),
            Timestamp::now(),
        );
        assert!(!b.is_controlled());
        assert!(b.verify(b"hello", sig.as_bytes()).unwrap());
        let err = b.sign(b"hello").unwrap_err();
        assert!(err.is_missing_key());
    }

    #[test]
    fn test_encrypt_for_foreign_persona() {
        let a = alice();
        let public = Persona::foreign(
            a.id.clone(),
            None,
            a.keyring.sign_public.clone(),
            a.keyring.crypt_public.clone(),
            Timestamp::now(),
        );
        let sealed = encrypt_for(b"secret", &public).unwrap();
        assert_eq!(a.decrypt(&sealed).unwrap(), b"secret");
        assert!(matches!(
            public.decrypt(&sealed),
            Err(CoreError::MissingKey { .. })
        ));
    }

    #[test]
    fn test_contacts() {
        let mut a = alice();
        let b = PersonaId::generate();
        let now = Timestamp::from_millis(5_000);
        assert!(a.add_contact(b.clone(), now));
        assert!(!a.add_contact(b.clone(), now));
        assert!(!a.add_contact(a.id.clone(), now));
        assert!(a.has_contact(&b));
        assert_eq!(a.modified, now);
        assert!(a.remove_contact(&b, now));
        assert!(!a.remove_contact(&b, now));
    }

    #[test]
    fn test_email_hash() {
        let a = alice();
        let hash = a.email_hash().unwrap();
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hex::encode(Sha256::digest(b"alice@example.org")));
    }

    #[test]
    fn test_myelin_never_moves_back() {
        let mut a = alice();
        assert!(a.advance_myelin(Timestamp::from_millis(10)));
        assert!(!a.advance_myelin(Timestamp::from_millis(5)));
        assert!(a.advance_myelin(Timestamp::from_millis(20)));
        assert_eq!(a.myelin_offset, Some(Timestamp::from_millis(20)));
    }

    #[test]
    fn test_display() {
        let a = alice();
        assert_eq!(a.to_string(), format!("<alice [{}]>", a.id.short()));
        let s = Souma::new(SoumaId::generate());
        assert_eq!(s.to_string(), format!("<Souma [{}]>", s.id.short()));
    }

    #[test]
    fn test_persona_export_defaults() {
        let mut a = alice();
        a.add_contact(PersonaId::generate(), Timestamp::from_millis(2_000));
        let map = a.export(&ExportOptions::new());
        let keys: Vec<_> = map.keys().collect();
        assert_eq!(
            keys,
            vec![
                "id",
                "username",
                "email",
                "crypt_public",
                "sign_public",
                "modified",
                "profile_id",
                "index_id",
                "contacts"
            ]
        );
        assert_eq!(map.text("modified"), Some("1970-01-01T00:00:02.000Z"));
        assert_eq!(map.get("profile_id"), Some(&ExportValue::Null));
        assert_eq!(map.get("contacts").unwrap().as_list().unwrap().len(), 1);
    }

    #[test]
    fn test_private_keys_never_exported() {
        let a = alice();
        let opts = ExportOptions::new()
            .include("sign_private")
            .include("crypt_private");
        let json = String::from_utf8(a.json(&opts).unwrap()).unwrap();
        assert!(!json.contains("sign_private"));
        assert!(!json.contains(&a.keyring.sign_private.to_hex()));
    }

    #[test]
    fn test_export_is_deterministic() {
        let a = alice();
        let opts = ExportOptions::new();
        assert_eq!(a.json(&opts).unwrap(), a.json(&opts).unwrap());
    }

    #[test]
    fn test_souma_export() {
        let s = Souma::generate(SoumaId::generate()).unwrap();
        let map = s.export(&ExportOptions::new().exclude("starmap_id"));
        let keys: Vec<_> = map.keys().collect();
        assert_eq!(keys, vec!["id", "crypt_public", "sign_public"]);
        assert_eq!(
            map.text("sign_public"),
            Some(s.keyring.sign_public.to_hex().as_str())
        );
    }
}
