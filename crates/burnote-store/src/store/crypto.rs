//! Cipher engine: AES-256-GCM with Argon2id key derivation, plus Argon2id
//! password hashing.
//!
//! Every encryption draws a fresh salt and nonce, derives a one-off key from
//! the master key and packs everything the decryptor needs into one blob:
//!
//! ```text
//! salt (32) ‖ nonce (16) ‖ tag (16) ‖ ciphertext (n)
//! ```
//!
//! The blob travels base64-encoded. Password hash records are
//! `hex(salt):hex(hash)`.

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::AesGcm;
use argon2::{Algorithm, Argon2, Params, Version};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use constant_time_eq::constant_time_eq;
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::{Error, Result};

/// AES-256-GCM with a 128-bit nonce.
type Aes256Gcm16 = AesGcm<Aes256, U16>;

pub const SALT_LEN: usize = 32;
pub const NONCE_LEN: usize = 16;
pub const TAG_LEN: usize = 16;
const KEY_LEN: usize = 32;
const HEADER_LEN: usize = SALT_LEN + NONCE_LEN + TAG_LEN;

const PASSWORD_SALT_LEN: usize = 16;
const PASSWORD_HASH_LEN: usize = 64;
const MIN_SALT_LEN: usize = 8;
const MIN_HASH_LEN: usize = 4;

/// Argon2id work factor shared by key derivation and password hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub iterations: u32,
    /// Degree of parallelism (lanes).
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 65536, // 64 MiB
            iterations: 3,
            parallelism: 1,
        }
    }
}

impl KdfParams {
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Self {
        Self {
            memory_kib,
            iterations,
            parallelism,
        }
    }

    fn to_argon2(self) -> Result<Params> {
        Params::new(self.memory_kib, self.iterations, self.parallelism, None)
            .map_err(|e| Error::Config(format!("argon2 params: {e}")))
    }
}

/// Symmetric payload encryption and one-way password hashing.
#[derive(Clone)]
pub struct CipherEngine {
    params: Params,
}

impl std::fmt::Debug for CipherEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherEngine")
            .field("m_cost", &self.params.m_cost())
            .field("t_cost", &self.params.t_cost())
            .field("p_cost", &self.params.p_cost())
            .finish()
    }
}

impl CipherEngine {
    /// Build an engine, rejecting Argon2 parameters the library would refuse.
    pub fn new(params: KdfParams) -> Result<Self> {
        Ok(Self {
            params: params.to_argon2()?,
        })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    fn derive_key(&self, master_key: &[u8], salt: &[u8]) -> Result<Zeroizing<[u8; KEY_LEN]>> {
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        self.argon2()
            .hash_password_into(master_key, salt, key.as_mut_slice())
            .map_err(|e| Error::KeyDerivation(e.to_string()))?;
        Ok(key)
    }

    /// Encrypt `plaintext` under a key derived from `master_key`, returning
    /// the base64 blob.
    pub fn encrypt(&self, plaintext: &[u8], master_key: &[u8]) -> Result<String> {
        if plaintext.is_empty() {
            return Err(Error::InvalidInput("plaintext cannot be empty".into()));
        }
        if master_key.is_empty() {
            return Err(Error::InvalidInput("master key is required".into()));
        }

        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let key = self.derive_key(master_key, &salt)?;
        let cipher = Aes256Gcm16::new(GenericArray::from_slice(key.as_slice()));

        let mut buffer = plaintext.to_vec();
        let tag = cipher
            .encrypt_in_place_detached(GenericArray::from_slice(&nonce), &[], &mut buffer)
            .map_err(|_| Error::InvalidInput("plaintext too large".into()))?;

        let mut blob = Vec::with_capacity(HEADER_LEN + buffer.len());
        blob.extend_from_slice(&salt);
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(tag.as_slice());
        blob.extend_from_slice(&buffer);

        Ok(STANDARD.encode(blob))
    }

    /// Decrypt a blob produced by [`CipherEngine::encrypt`].
    ///
    /// Bad encoding, truncation, a wrong key and tag mismatch all return
    /// [`Error::AuthenticationFailure`].
    pub fn decrypt(&self, blob: &str, master_key: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        if master_key.is_empty() {
            return Err(Error::InvalidInput("master key is required".into()));
        }

        let data = STANDARD
            .decode(blob.trim())
            .map_err(|_| Error::AuthenticationFailure)?;
        if data.len() < HEADER_LEN {
            return Err(Error::AuthenticationFailure);
        }

        let (salt, rest) = data.split_at(SALT_LEN);
        let (nonce, rest) = rest.split_at(NONCE_LEN);
        let (tag, ciphertext) = rest.split_at(TAG_LEN);

        let key = self.derive_key(master_key, salt)?;
        let cipher = Aes256Gcm16::new(GenericArray::from_slice(key.as_slice()));

        let mut buffer = Zeroizing::new(ciphertext.to_vec());
        cipher
            .decrypt_in_place_detached(
                GenericArray::from_slice(nonce),
                &[],
                buffer.as_mut_slice(),
                GenericArray::from_slice(tag),
            )
            .map_err(|_| Error::AuthenticationFailure)?;

        Ok(buffer)
    }

    /// Hash `password` with a fresh salt.
    pub fn hash_password(&self, password: &str) -> Result<String> {
        if password.is_empty() {
            return Err(Error::InvalidInput("password cannot be empty".into()));
        }

        let mut salt = [0u8; PASSWORD_SALT_LEN];
        OsRng.fill_bytes(&mut salt);

        let mut hash = Zeroizing::new([0u8; PASSWORD_HASH_LEN]);
        self.argon2()
            .hash_password_into(password.as_bytes(), &salt, hash.as_mut_slice())
            .map_err(|e| Error::KeyDerivation(e.to_string()))?;

        Ok(format!("{}:{}", hex::encode(salt), hex::encode(hash.as_slice())))
    }

    /// Check `password` against a record from [`CipherEngine::hash_password`].
    ///
    /// A mismatch is `Ok(false)`; only an unparseable record is an error.
    pub fn verify_password(&self, password: &str, hash_record: &str) -> Result<bool> {
        let (salt_hex, hash_hex) = hash_record
            .split_once(':')
            .ok_or_else(|| Error::InvalidInput("malformed password hash record".into()))?;
        let salt = hex::decode(salt_hex)
            .map_err(|e| Error::InvalidInput(format!("password hash salt: {e}")))?;
        let expected = hex::decode(hash_hex)
            .map_err(|e| Error::InvalidInput(format!("password hash digest: {e}")))?;
        if salt.len() < MIN_SALT_LEN || expected.len() < MIN_HASH_LEN {
            return Err(Error::InvalidInput(
                "password hash record too short".into(),
            ));
        }

        let mut actual = Zeroizing::new(vec![0u8; expected.len()]);
        self.argon2()
            .hash_password_into(password.as_bytes(), &salt, actual.as_mut_slice())
            .map_err(|e| Error::KeyDerivation(e.to_string()))?;

        Ok(constant_time_eq(actual.as_slice(), &expected))
    }
}

#[cfg(test)]
pub(crate) fn test_engine() -> CipherEngine {
    // Minimal work factor so tests stay fast.
    CipherEngine::new(KdfParams::new(256, 1, 1)).unwrap()
}
