//! Keypair identity: signing and encryption keys for Personas and Soumas.
//!
//! Every identity carries a [`Keyring`] of four opaque blobs. Signing uses
//! Ed25519; encryption seals to the recipient's X25519 key with an ephemeral
//! key agreement, Blake3 key derivation and ChaCha20-Poly1305.
//!
//! An empty blob means the key is absent. An identity with both private
//! blobs present is *controlled*; one with only public blobs is *foreign*.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};

use crate::error::{CoreError, KeyKind, Result};

/// Blake3 derive-key context for sealed payloads.
const SEAL_CONTEXT: &str = "souma-nucleus-v0-seal";

/// Envelope format byte for ephemeral X25519 + ChaCha20-Poly1305.
const SEAL_FORMAT_V0: u8 = 1;

/// Opaque key material. Empty means absent.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyMaterial(Vec<u8>);

impl KeyMaterial {
    /// Wrap raw bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// An absent key.
    pub const fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> std::result::Result<Self, hex::FromHexError> {
        hex::decode(s).map(Self)
    }

    fn to_array(&self) -> Option<[u8; 32]> {
        self.0.as_slice().try_into().ok()
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyMaterial({} bytes)", self.0.len())
    }
}

/// A 64-byte Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub [u8; 64]);

impl Signature {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a byte slice of exactly 64 bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(Self)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}...)", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for Signature {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// The four key blobs of an identity.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyring {
    pub sign_private: KeyMaterial,
    pub sign_public: KeyMaterial,
    pub crypt_private: KeyMaterial,
    pub crypt_public: KeyMaterial,
}

impl Keyring {
    /// Generate a fresh signing keypair and a fresh encryption keypair.
    ///
    /// The two pairs come from independent OS randomness. Nothing is
    /// assigned until both are ready.
    pub fn generate() -> Result<Self> {
        let mut sign_seed = [0u8; 32];
        let mut crypt_seed = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut sign_seed)
            .map_err(|e| CoreError::KeyGeneration(e.to_string()))?;
        OsRng
            .try_fill_bytes(&mut crypt_seed)
            .map_err(|e| CoreError::KeyGeneration(e.to_string()))?;
        Ok(Self::from_seeds(&sign_seed, &crypt_seed))
    }

    /// Build a keyring deterministically from two 32-byte seeds.
    pub fn from_seeds(sign_seed: &[u8; 32], crypt_seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(sign_seed);
        let crypt_secret = StaticSecret::from(*crypt_seed);
        let crypt_public = PublicKey::from(&crypt_secret);

        Self {
            sign_private: KeyMaterial::new(signing_key.to_bytes().to_vec()),
            sign_public: KeyMaterial::new(signing_key.verifying_key().to_bytes().to_vec()),
            crypt_private: KeyMaterial::new(crypt_secret.to_bytes().to_vec()),
            crypt_public: KeyMaterial::new(crypt_public.as_bytes().to_vec()),
        }
    }

    /// A keyring known only by its public halves.
    pub fn public_only(sign_public: KeyMaterial, crypt_public: KeyMaterial) -> Self {
        Self {
            sign_public,
            crypt_public,
            ..Self::default()
        }
    }

    /// True iff both private blobs are present.
    pub fn is_controlled(&self) -> bool {
        !self.sign_private.is_empty() && !self.crypt_private.is_empty()
    }

    /// A copy with the private halves stripped.
    pub fn to_public(&self) -> Self {
        Self::public_only(self.sign_public.clone(), self.crypt_public.clone())
    }

    fn require(&self, owner: &str, kind: KeyKind) -> Result<&KeyMaterial> {
        let material = match kind {
            KeyKind::SignPrivate => &self.sign_private,
            KeyKind::SignPublic => &self.sign_public,
            KeyKind::CryptPrivate => &self.crypt_private,
            KeyKind::CryptPublic => &self.crypt_public,
        };
        if material.is_empty() {
            return Err(CoreError::MissingKey {
                identity: owner.to_string(),
                key: kind,
            });
        }
        Ok(material)
    }

    fn require_array(&self, owner: &str, kind: KeyKind) -> Result<[u8; 32]> {
        self.require(owner, kind)?
            .to_array()
            .ok_or_else(|| CoreError::MalformedKey {
                identity: owner.to_string(),
                key: kind,
            })
    }

    /// Sign a message with the private signing key.
    pub fn sign(&self, owner: &str, message: &[u8]) -> Result<Signature> {
        let seed = self.require_array(owner, KeyKind::SignPrivate)?;
        let signing_key = SigningKey::from_bytes(&seed);
        Ok(Signature(signing_key.sign(message).to_bytes()))
    }

    /// Verify a signature with the public signing key.
    ///
    /// Only an absent key is an error; anything that fails to check out,
    /// including unparseable key bytes, is `false`.
    pub fn verify(&self, owner: &str, message: &[u8], signature: &[u8]) -> Result<bool> {
        let public = self.require(owner, KeyKind::SignPublic)?;

        let Some(key_bytes) = public.to_array() else {
            return Ok(false);
        };
        let Ok(verifying_key) = VerifyingKey::from_bytes(&key_bytes) else {
            return Ok(false);
        };
        let Some(sig) = Signature::from_slice(signature) else {
            return Ok(false);
        };

        let sig = ed25519_dalek::Signature::from_bytes(&sig.0);
        Ok(verifying_key.verify(message, &sig).is_ok())
    }

    /// Seal a plaintext to this keyring's public encryption key.
    pub fn seal(&self, owner: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
        let recipient = PublicKey::from(self.require_array(owner, KeyKind::CryptPublic)?);

        let ephemeral = EphemeralSecret::random_from_rng(rand::thread_rng());
        let ephemeral_public = PublicKey::from(&ephemeral);
        let shared = ephemeral.diffie_hellman(&recipient);

        let key = derive_seal_key(shared.as_bytes(), &ephemeral_public, &recipient);
        let mut nonce = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut nonce);

        let cipher = ChaCha20Poly1305::new_from_slice(&key)
            .map_err(|e| CoreError::Encoding(e.to_string()))?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|e| CoreError::Encoding(e.to_string()))?;

        SealedEnvelope {
            format: SEAL_FORMAT_V0,
            ephemeral: *ephemeral_public.as_bytes(),
            nonce,
            ciphertext,
        }
        .to_bytes()
    }

    /// Open a sealed payload with the private encryption key.
    pub fn open(&self, owner: &str, sealed: &[u8]) -> Result<Vec<u8>> {
        let secret = StaticSecret::from(self.require_array(owner, KeyKind::CryptPrivate)?);
        let own_public = PublicKey::from(&secret);

        let envelope = SealedEnvelope::from_bytes(sealed)?;
        if envelope.format != SEAL_FORMAT_V0 {
            return Err(CoreError::Decryption(format!(
                "unsupported envelope format {}",
                envelope.format
            )));
        }

        let ephemeral_public = PublicKey::from(envelope.ephemeral);
        let shared = secret.diffie_hellman(&ephemeral_public);
        let key = derive_seal_key(shared.as_bytes(), &ephemeral_public, &own_public);

        let cipher = ChaCha20Poly1305::new_from_slice(&key)
            .map_err(|e| CoreError::Decryption(e.to_string()))?;
        cipher
            .decrypt(Nonce::from_slice(&envelope.nonce), envelope.ciphertext.as_slice())
            .map_err(|_| CoreError::Decryption("authentication failed".into()))
    }
}

impl fmt::Debug for Keyring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keyring")
            .field("sign_public", &self.sign_public.to_hex())
            .field("crypt_public", &self.crypt_public.to_hex())
            .field("controlled", &self.is_controlled())
            .finish()
    }
}

fn derive_seal_key(shared: &[u8; 32], ephemeral: &PublicKey, recipient: &PublicKey) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(SEAL_CONTEXT);
    hasher.update(shared);
    hasher.update(ephemeral.as_bytes());
    hasher.update(recipient.as_bytes());
    *hasher.finalize().as_bytes()
}

/// Wire form of a sealed payload.
#[derive(Debug, Serialize, Deserialize)]
struct SealedEnvelope {
    format: u8,
    ephemeral: [u8; 32],
    nonce: [u8; 12],
    ciphertext: Vec<u8>,
}

impl SealedEnvelope {
    fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).map_err(|e| CoreError::Encoding(e.to_string()))?;
        Ok(buf)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes)
            .map_err(|e| CoreError::Decryption(format!("malformed envelope: {e}")))
    }
}

/// The cryptographic capability shared by Personas and Soumas.
///
/// Implementors only expose their keyring; signing, verification and
/// sealing are provided.
pub trait KeyIdentity {
    /// The identity's keys.
    fn keyring(&self) -> &Keyring;

    /// Mutable access, used when keys are regenerated.
    fn keyring_mut(&mut self) -> &mut Keyring;

    /// Human-readable name used in error messages.
    fn identity_label(&self) -> String;

    /// True iff private key material is present locally.
    fn is_controlled(&self) -> bool {
        self.keyring().is_controlled()
    }

    /// Replace both keypairs with freshly generated ones.
    ///
    /// Does not persist anything; the caller must store the identity.
    fn generate_keys(&mut self) -> Result<()> {
        let staged = Keyring::generate()?;
        *self.keyring_mut() = staged;
        Ok(())
    }

    /// Sign a message.
    fn sign(&self, message: &[u8]) -> Result<Signature> {
        self.keyring().sign(&self.identity_label(), message)
    }

    /// Verify a signature made by this identity.
    fn verify(&self, message: &[u8], signature: &[u8]) -> Result<bool> {
        self.keyring()
            .verify(&self.identity_label(), message, signature)
    }

    /// Encrypt a plaintext so that only this identity can read it.
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        self.keyring().seal(&self.identity_label(), plaintext)
    }

    /// Decrypt a payload sealed to this identity.
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.keyring().open(&self.identity_label(), ciphertext)
    }
}

/// Encrypt `plaintext` for `recipient` using its public encryption key.
pub fn encrypt_for<R: KeyIdentity + ?Sized>(plaintext: &[u8], recipient: &R) -> Result<Vec<u8>> {
    recipient.encrypt(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    struct Bare(Keyring);

    impl KeyIdentity for Bare {
        fn keyring(&self) -> &Keyring {
            &self.0
        }

        fn keyring_mut(&mut self) -> &mut Keyring {
            &mut self.0
        }

        fn identity_label(&self) -> String {
            "bare".into()
        }
    }

    fn controlled() -> Bare {
        Bare(Keyring::from_seeds(&[0x42; 32], &[0x43; 32]))
    }

    #[test]
    fn test_generate_is_controlled() {
        let keyring = Keyring::generate().unwrap();
        assert!(keyring.is_controlled());
        assert_eq!(keyring.sign_public.as_bytes().len(), 32);
        assert_eq!(keyring.crypt_public.as_bytes().len(), 32);
        assert_ne!(keyring.sign_public, keyring.crypt_public);
    }

    #[test]
    fn test_generate_keys_replaces_both_pairs() {
        let mut identity = controlled();
        let before = identity.keyring().clone();
        identity.generate_keys().unwrap();
        assert_ne!(identity.keyring().sign_public, before.sign_public);
        assert_ne!(identity.keyring().crypt_public, before.crypt_public);
    }

    #[test]
    fn test_sign_verify() {
        let identity = controlled();
        let signature = identity.sign(b"hello world").unwrap();

        assert!(identity.verify(b"hello world", &signature.0).unwrap());
        assert!(!identity.verify(b"hello worlD", &signature.0).unwrap());
    }

    #[test]
    fn test_sign_is_deterministic() {
        let identity = controlled();
        assert_eq!(identity.sign(b"m").unwrap(), identity.sign(b"m").unwrap());
    }

    #[test]
    fn test_verify_rejects_garbage_signature() {
        let identity = controlled();
        assert!(!identity.verify(b"m", b"short").unwrap());
        assert!(!identity.verify(b"m", &[0xff; 64]).unwrap());
    }

    #[test]
    fn test_verify_with_foreign_identity() {
        let signer = controlled();
        let foreign = Bare(signer.keyring().to_public());
        let signature = signer.sign(b"payload").unwrap();

        assert!(!foreign.is_controlled());
        assert!(foreign.verify(b"payload", &signature.0).unwrap());
        assert!(foreign.sign(b"payload").unwrap_err().is_missing_key());
    }

    #[test]
    fn test_verify_without_public_key() {
        let empty = Bare(Keyring::default());
        let err = empty.verify(b"m", &[0u8; 64]).unwrap_err();
        assert!(matches!(
            err,
            CoreError::MissingKey {
                key: KeyKind::SignPublic,
                ..
            }
        ));
    }

    #[test]
    fn test_encrypt_decrypt() {
        let identity = controlled();
        let sealed = identity.encrypt(b"secret message").unwrap();
        assert_ne!(sealed, b"secret message");
        assert_eq!(identity.decrypt(&sealed).unwrap(), b"secret message");
    }

    #[test]
    fn test_encrypt_for_foreign_recipient() {
        let recipient = controlled();
        let foreign_view = Bare(recipient.keyring().to_public());

        let sealed = encrypt_for(b"for your eyes", &foreign_view).unwrap();
        assert_eq!(recipient.decrypt(&sealed).unwrap(), b"for your eyes");
        assert!(foreign_view.decrypt(&sealed).unwrap_err().is_missing_key());
    }

    #[test]
    fn test_encrypt_without_public_key() {
        let empty = Bare(Keyring::default());
        let err = encrypt_for(b"x", &empty).unwrap_err();
        assert!(matches!(
            err,
            CoreError::MissingKey {
                key: KeyKind::CryptPublic,
                ..
            }
        ));
    }

    #[test]
    fn test_decrypt_tampered() {
        let identity = controlled();
        let mut sealed = identity.encrypt(b"secret").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;

        assert!(matches!(
            identity.decrypt(&sealed),
            Err(CoreError::Decryption(_))
        ));
    }

    #[test]
    fn test_decrypt_malformed() {
        let identity = controlled();
        assert!(matches!(
            identity.decrypt(b"not an envelope"),
            Err(CoreError::Decryption(_))
        ));
    }

    #[test]
    fn test_decrypt_wrong_recipient() {
        let alice = controlled();
        let bob = Bare(Keyring::from_seeds(&[0x01; 32], &[0x02; 32]));
        let sealed = alice.encrypt(b"for alice").unwrap();
        assert!(matches!(bob.decrypt(&sealed), Err(CoreError::Decryption(_))));
    }

    #[test]
    fn test_malformed_private_key() {
        let mut keyring = Keyring::from_seeds(&[0x42; 32], &[0x43; 32]);
        keyring.sign_private = KeyMaterial::new(vec![1, 2, 3]);
        let err = keyring.sign("bare", b"m").unwrap_err();
        assert!(matches!(err, CoreError::MalformedKey { .. }));
    }

    #[test]
    fn test_debug_hides_private_material() {
        let keyring = Keyring::from_seeds(&[0x42; 32], &[0x43; 32]);
        let debug = format!("{:?}", keyring);
        assert!(!debug.contains(&keyring.sign_private.to_hex()));
        assert!(!debug.contains(&keyring.crypt_private.to_hex()));
    }

    #[test]
    fn test_flipped_signature_byte_fails() {
        let identity = controlled();
        let signature = identity.sign(b"flip me").unwrap();

        for i in 0..64 {
            let mut bytes = signature.0;
            bytes[i] ^= 0x01;
            assert!(
                !identity.verify(b"flip me", &bytes).unwrap(),
                "byte {i} flipped still verifies"
            );
        }
    }

    proptest! {
        #[test]
        fn prop_sign_verify_roundtrip(message in any::<Vec<u8>>()) {
            let identity = controlled();
            let signature = identity.sign(&message).unwrap();
            prop_assert!(identity.verify(&message, &signature.0).unwrap());
        }

        #[test]
        fn prop_seal_open_roundtrip(message in any::<Vec<u8>>()) {
            let identity = controlled();
            let sealed = identity.encrypt(&message).unwrap();
            prop_assert_eq!(identity.decrypt(&sealed).unwrap(), message);
        }
    }
}
