/// Cipher
///
/// Payloads are serialized to JSON, zlib compressed, then sealed with
/// AES-256-GCM under a fresh random IV.
///
use std::io::{Read, Write};

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, Nonce};
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::constants::IV_LENGTH;
use crate::error::{Error, Result};
use crate::key_manager::SharedSecret;
use crate::message::EncryptedData;

fn cipher(secret: &SharedSecret) -> Aes256Gcm {
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(secret.as_bytes()))
}

pub fn encrypt_bytes(plain: &[u8], secret: &SharedSecret) -> Result<EncryptedData> {
    let iv = Aes256Gcm::generate_nonce(&mut OsRng);
    let cipher_text = cipher(secret).encrypt(&iv, plain)?;
    Ok(EncryptedData {
        iv: iv.to_vec(),
        cipher_text,
    })
}

pub fn decrypt_bytes(encrypted: &EncryptedData, secret: &SharedSecret) -> Result<Vec<u8>> {
    if encrypted.iv.len() != IV_LENGTH {
        return Err(Error::InvalidIvLength(encrypted.iv.len()));
    }
    let nonce = Nonce::from_slice(&encrypted.iv);
    Ok(cipher(secret).decrypt(nonce, encrypted.cipher_text.as_slice())?)
}

pub fn encrypt_content<T: Serialize>(content: &T, secret: &SharedSecret) -> Result<EncryptedData> {
    let json = serde_json::to_vec(content)?;
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    encrypt_bytes(&encoder.finish()?, secret)
}

pub fn decrypt_content<T: DeserializeOwned>(
    encrypted: &EncryptedData,
    secret: &SharedSecret,
) -> Result<T> {
    let compressed = decrypt_bytes(encrypted, secret)?;
    let mut json = Vec::new();
    ZlibDecoder::new(compressed.as_slice()).read_to_end(&mut json)?;
    Ok(serde_json::from_slice(&json)?)
}
