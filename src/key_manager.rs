/// Key manager
///
/// Owns the local X25519 key pair and the wallet's public key, and derives
/// the shared secret used for every encrypted message. The key pair is
/// created lazily and persisted; the derived secret is kept in memory only.
///
use std::fmt;

use alloy::hex;
use hkdf::Hkdf;
use log::{debug, info};
use sha2::Sha256;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::constants::{KEY_LENGTH, OWN_PRIVATE_KEY, OWN_PUBLIC_KEY, PEER_PUBLIC_KEY};
use crate::error::{Error, Result};
use crate::storage::ScopedStorage;
use crate::utils::random_bytes32;

/// Symmetric key shared with the wallet.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedSecret([u8; KEY_LENGTH]);

impl SharedSecret {
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }
}

impl From<[u8; KEY_LENGTH]> for SharedSecret {
    fn from(bytes: [u8; KEY_LENGTH]) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(..)")
    }
}

/// ECDH followed by HKDF-SHA256 (no salt, empty info).
pub fn derive_shared_secret(own: &StaticSecret, peer: &PublicKey) -> Result<SharedSecret> {
    let dh = own.diffie_hellman(peer);
    let mut key = [0u8; KEY_LENGTH];
    Hkdf::<Sha256>::new(None, dh.as_bytes()).expand(&[], &mut key)?;
    Ok(SharedSecret(key))
}

pub fn export_public_key_hex(public_key: &PublicKey) -> String {
    hex::encode(public_key.as_bytes())
}

pub fn import_public_key_hex(encoded: &str) -> Result<PublicKey> {
    let bytes = hex::decode(encoded)?;
    let bytes: [u8; KEY_LENGTH] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| Error::InvalidPublicKey(bytes.len()))?;
    Ok(PublicKey::from(bytes))
}

fn import_private_key_hex(encoded: &str) -> Result<StaticSecret> {
    let bytes = hex::decode(encoded)?;
    let bytes: [u8; KEY_LENGTH] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| Error::internal("stored private key is malformed"))?;
    Ok(StaticSecret::from(bytes))
}

pub struct KeyManager {
    storage: ScopedStorage,
    own_private_key: Option<StaticSecret>,
    own_public_key: Option<PublicKey>,
    peer_public_key: Option<PublicKey>,
    shared_secret: Option<SharedSecret>,
}

impl KeyManager {
    pub fn new(storage: ScopedStorage) -> Self {
        Self {
            storage,
            own_private_key: None,
            own_public_key: None,
            peer_public_key: None,
            shared_secret: None,
        }
    }

    pub async fn get_own_public_key(&mut self) -> Result<PublicKey> {
        self.load_keys_if_needed().await?;
        match self.own_public_key {
            Some(key) => Ok(key),
            None => Err(Error::internal("own public key unavailable")),
        }
    }

    pub async fn get_own_public_key_hex(&mut self) -> Result<String> {
        Ok(export_public_key_hex(&self.get_own_public_key().await?))
    }

    /// `None` until a peer public key has been set.
    pub async fn get_shared_secret(&mut self) -> Result<Option<SharedSecret>> {
        self.load_keys_if_needed().await?;
        Ok(self.shared_secret.clone())
    }

    pub async fn set_peer_public_key(&mut self, key: PublicKey) -> Result<()> {
        self.storage
            .store_object(PEER_PUBLIC_KEY, &export_public_key_hex(&key))
            .await?;
        self.shared_secret = None;
        self.peer_public_key = Some(key);
        self.load_keys_if_needed().await
    }

    /// Forgets all keys, persisted and in memory. The next call generates a
    /// fresh key pair.
    pub async fn clear(&mut self) -> Result<()> {
        self.own_private_key = None;
        self.own_public_key = None;
        self.peer_public_key = None;
        self.shared_secret = None;
        self.storage.remove(OWN_PRIVATE_KEY).await?;
        self.storage.remove(OWN_PUBLIC_KEY).await?;
        self.storage.remove(PEER_PUBLIC_KEY).await?;
        debug!("key manager cleared");
        Ok(())
    }

    async fn generate_key_pair(&mut self) -> Result<()> {
        let secret = StaticSecret::from(random_bytes32());
        let public = PublicKey::from(&secret);
        self.storage
            .store_object(OWN_PRIVATE_KEY, &hex::encode(secret.to_bytes()))
            .await?;
        self.storage
            .store_object(OWN_PUBLIC_KEY, &export_public_key_hex(&public))
            .await?;
        info!("generated key pair {}", export_public_key_hex(&public));
        self.own_private_key = Some(secret);
        self.own_public_key = Some(public);
        Ok(())
    }

    async fn load_keys_if_needed(&mut self) -> Result<()> {
        if self.own_private_key.is_none() {
            self.own_private_key = match self.storage.load_object::<String>(OWN_PRIVATE_KEY).await? {
                Some(encoded) => Some(import_private_key_hex(&encoded)?),
                None => None,
            };
        }

        if self.own_public_key.is_none() {
            self.own_public_key = match self.storage.load_object::<String>(OWN_PUBLIC_KEY).await? {
                Some(encoded) => Some(import_public_key_hex(&encoded)?),
                None => None,
            };
        }

        if self.own_private_key.is_none() || self.own_public_key.is_none() {
            self.generate_key_pair().await?;
        }

        if self.peer_public_key.is_none() {
            self.peer_public_key = match self.storage.load_object::<String>(PEER_PUBLIC_KEY).await? {
                Some(encoded) => Some(import_public_key_hex(&encoded)?),
                None => None,
            };
        }

        if self.shared_secret.is_none() {
            if let (Some(own), Some(peer)) = (&self.own_private_key, &self.peer_public_key) {
                self.shared_secret = Some(derive_shared_secret(own, peer)?);
            }
        }

        Ok(())
    }
}
