//! AES-256-CBC codec for secret values at rest.
//!
//! Every `encrypt` call draws a fresh 16-byte IV from the OS RNG. The IV and
//! the ciphertext are hex-encoded and must always be stored together.
//!
//! CBC carries no authentication tag: a tampered ciphertext is only detected
//! when it happens to break the PKCS#7 padding or the UTF-8 check. Callers
//! must not treat a successful decrypt as proof of integrity.

use aes::Aes256;
use cbc::cipher::{
    block_padding::Pkcs7, generic_array::GenericArray, BlockDecryptMut, BlockEncryptMut, KeyIvInit,
};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use zeroize::Zeroizing;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// AES-256 key size in bytes.
pub const KEY_LEN: usize = 32;

/// CBC initialization vector size in bytes (one AES block).
pub const IV_LEN: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecKeyError {
    #[error("encryption key is not valid hex")]
    InvalidHex,

    #[error("encryption key must be {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("decryption failed: {0}")]
pub struct DecryptionError(pub String);

/// 256-bit symmetric key, wiped from memory on drop.
#[derive(Clone)]
pub struct EncryptionKey(Zeroizing<[u8; KEY_LEN]>);

impl EncryptionKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecKeyError> {
        if bytes.len() != KEY_LEN {
            return Err(CodecKeyError::InvalidLength {
                expected: KEY_LEN,
                actual: bytes.len(),
            });
        }
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        key.copy_from_slice(bytes);
        Ok(Self(key))
    }

    pub fn from_hex(hex_key: &str) -> Result<Self, CodecKeyError> {
        let bytes = Zeroizing::new(hex::decode(hex_key.trim()).map_err(|_| CodecKeyError::InvalidHex)?);
        Self::from_bytes(&bytes)
    }

    /// Generate a random key, hex-encoded (used by `secrets-api gen-key`).
    pub fn generate_hex() -> String {
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        OsRng.fill_bytes(key.as_mut());
        hex::encode(&key[..])
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey(<redacted>)")
    }
}

/// Ciphertext paired with the IV it was produced with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedValue {
    pub iv: String,
    pub ciphertext: String,
}

#[derive(Debug, Clone)]
pub struct SecretCodec {
    key: EncryptionKey,
}

impl SecretCodec {
    pub fn new(key: EncryptionKey) -> Self {
        Self { key }
    }

    pub fn encrypt(&self, plaintext: &str) -> EncryptedValue {
        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);

        let ciphertext = Aes256CbcEnc::new(
            GenericArray::from_slice(&self.key.0[..]),
            GenericArray::from_slice(&iv),
        )
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

        EncryptedValue {
            iv: hex::encode(iv),
            ciphertext: hex::encode(ciphertext),
        }
    }

    pub fn decrypt(&self, value: &EncryptedValue) -> Result<String, DecryptionError> {
        let iv = hex::decode(&value.iv).map_err(|_| DecryptionError("IV is not valid hex".into()))?;
        if iv.len() != IV_LEN {
            return Err(DecryptionError(format!(
                "IV must be {IV_LEN} bytes, got {}",
                iv.len()
            )));
        }

        let ciphertext = hex::decode(&value.ciphertext)
            .map_err(|_| DecryptionError("ciphertext is not valid hex".into()))?;
        if ciphertext.is_empty() || ciphertext.len() % IV_LEN != 0 {
            return Err(DecryptionError(format!(
                "ciphertext length {} is not a positive multiple of the block size",
                ciphertext.len()
            )));
        }

        let plaintext = Aes256CbcDec::new(
            GenericArray::from_slice(&self.key.0[..]),
            GenericArray::from_slice(&iv),
        )
        .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
        .map_err(|_| DecryptionError("bad padding (wrong key or corrupted data)".into()))?;

        String::from_utf8(plaintext).map_err(|_| DecryptionError("plaintext is not valid UTF-8".into()))
    }
}
