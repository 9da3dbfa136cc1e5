//! Crypto Envelope Module
//!
//! Seals serialized values with AES-256-GCM or ChaCha20-Poly1305 under a fixed
//! secret key and a process-local, strictly advancing nonce.

use std::fmt;
use std::sync::OnceLock;

use aes_gcm::{
    aead::{Aead, KeyInit, Payload as AeadPayload},
    Aes256Gcm,
};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use parking_lot::Mutex;
use rand::{rngs::OsRng, RngCore};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::cache::payload::{self, Envelope, NONCE_LEN};
use crate::error::{CacheError, Result};

/// Secret key length in bytes
pub const KEY_LEN: usize = 32;

const SELF_TEST_PLAINTEXT: &[u8] = b"ABC test 123 test xyz";
const SELF_TEST_NONCE: [u8; NONCE_LEN] = [
    0x74, 0xb9, 0xe8, 0x52, 0xb1, 0x72, 0xdf, 0x7f, 0x57, 0xff, 0x4a, 0xb4,
];

static DETECTED_CIPHER: OnceLock<Cipher> = OnceLock::new();

// == Secret Key ==
/// A 32-byte secret, zeroized on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey([u8; KEY_LEN]);

impl SecretKey {
    /// Parses a secret from 64 hex characters or 32 raw bytes.
    ///
    /// Input made only of hex digits is always decoded as hex.
    ///
    /// # Errors
    /// `InvalidArgument` when the decoded key is not 32 bytes or consists
    /// solely of printable ASCII.
    pub fn parse(input: &[u8]) -> Result<Self> {
        if !input.is_empty() && input.iter().all(u8::is_ascii_hexdigit) {
            if input.len() != KEY_LEN * 2 {
                return Err(wrong_size(input.len() / 2));
            }
            let mut decoded = hex::decode(input)
                .map_err(|e| CacheError::InvalidArgument(format!("Invalid hex secret key: {}", e)))?;
            let key = Self::from_slice(&decoded);
            decoded.zeroize();
            return key;
        }
        Self::from_slice(input)
    }

    fn from_slice(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; KEY_LEN] = bytes.try_into().map_err(|_| wrong_size(bytes.len()))?;
        Self::from_bytes(raw)
    }

    /// Wraps raw key bytes, rejecting keys made only of printable characters.
    pub fn from_bytes(raw: [u8; KEY_LEN]) -> Result<Self> {
        let key = Self(raw);
        if key.0.iter().all(|b| (0x20..=0x7e).contains(b)) {
            return Err(CacheError::InvalidArgument(
                "The secret key you supplied only contains printable characters.".to_string(),
            ));
        }
        Ok(key)
    }

    /// Generates a fresh random key.
    pub fn generate() -> Self {
        loop {
            let mut raw = [0u8; KEY_LEN];
            OsRng.fill_bytes(&mut raw);
            if let Ok(key) = Self::from_bytes(raw) {
                return key;
            }
        }
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}

fn wrong_size(bytes: usize) -> CacheError {
    CacheError::InvalidArgument(format!(
        "The secret key must be {} bytes. You provided a {} byte key.",
        KEY_LEN, bytes
    ))
}

// == Cipher ==
/// AEAD construction used for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Cipher {
    Aes256Gcm,
    ChaCha20Poly1305,
}

impl Cipher {
    /// AES-256-GCM when the CPU accelerates it, ChaCha20-Poly1305 otherwise.
    /// Probed once per process.
    pub fn detect() -> Self {
        *DETECTED_CIPHER.get_or_init(|| {
            let cipher = if aes_hardware_available() {
                Cipher::Aes256Gcm
            } else {
                Cipher::ChaCha20Poly1305
            };
            debug!("Selected cipher {}", cipher.name());
            cipher
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Cipher::Aes256Gcm => "aes-256-gcm",
            Cipher::ChaCha20Poly1305 => "chacha20-poly1305",
        }
    }
}

#[cfg(target_arch = "x86_64")]
fn aes_hardware_available() -> bool {
    std::arch::is_x86_feature_detected!("aes") && std::arch::is_x86_feature_detected!("pclmulqdq")
}

#[cfg(target_arch = "aarch64")]
fn aes_hardware_available() -> bool {
    std::arch::is_aarch64_feature_detected!("aes")
        && std::arch::is_aarch64_feature_detected!("pmull")
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
fn aes_hardware_available() -> bool {
    false
}

enum KeyedCipher {
    Aes(Box<Aes256Gcm>),
    ChaCha(ChaCha20Poly1305),
}

impl KeyedCipher {
    fn new(cipher: Cipher, key: &SecretKey) -> Result<Self> {
        let keyed = match cipher {
            Cipher::Aes256Gcm => Aes256Gcm::new_from_slice(key.as_bytes()).map(|c| Self::Aes(Box::new(c))),
            Cipher::ChaCha20Poly1305 => ChaCha20Poly1305::new_from_slice(key.as_bytes()).map(Self::ChaCha),
        };
        keyed.map_err(|e| CacheError::Setup(format!("Failed to create {} cipher: {}", cipher.name(), e)))
    }

    /// Encrypts with the nonce doubling as associated data.
    fn encrypt(&self, nonce: &[u8; NONCE_LEN], plaintext: &[u8]) -> Option<Vec<u8>> {
        let payload = AeadPayload {
            msg: plaintext,
            aad: nonce,
        };
        let nonce = Nonce::from_slice(nonce);
        match self {
            Self::Aes(c) => c.encrypt(nonce, payload).ok(),
            Self::ChaCha(c) => c.encrypt(nonce, payload).ok(),
        }
    }

    fn decrypt(&self, nonce: &[u8], ciphertext: &[u8]) -> Option<Vec<u8>> {
        let payload = AeadPayload {
            msg: ciphertext,
            aad: nonce,
        };
        let nonce = Nonce::from_slice(nonce);
        match self {
            Self::Aes(c) => c.decrypt(nonce, payload).ok(),
            Self::ChaCha(c) => c.decrypt(nonce, payload).ok(),
        }
    }
}

// == Crypto Envelope ==
/// Owns the keyed cipher and the nonce counter.
pub struct CryptoEnvelope {
    cipher: Cipher,
    keyed: KeyedCipher,
    /// Last nonce handed out; None until the first encryption
    nonce: Mutex<Option<[u8; NONCE_LEN]>>,
}

impl CryptoEnvelope {
    /// Installs `key` with the process-wide cipher.
    pub fn new(key: &SecretKey) -> Result<Self> {
        Self::with_cipher(key, Cipher::detect())
    }

    /// Installs `key` with an explicit cipher.
    ///
    /// The key is accepted only after a fixed plaintext survives an
    /// encrypt/decrypt round trip under a fixed test nonce.
    pub fn with_cipher(key: &SecretKey, cipher: Cipher) -> Result<Self> {
        let keyed = KeyedCipher::new(cipher, key)?;
        let round_trip = keyed
            .encrypt(&SELF_TEST_NONCE, SELF_TEST_PLAINTEXT)
            .and_then(|ct| keyed.decrypt(&SELF_TEST_NONCE, &ct));
        if round_trip.as_deref() != Some(SELF_TEST_PLAINTEXT) {
            return Err(CacheError::Setup(format!(
                "The secret key failed the {} self-test",
                cipher.name()
            )));
        }
        Ok(Self {
            cipher,
            keyed,
            nonce: Mutex::new(None),
        })
    }

    pub fn cipher(&self) -> Cipher {
        self.cipher
    }

    /// Serializes and seals `value`.
    ///
    /// # Errors
    /// `Serialization` if the value cannot be serialized, `NonceReuse` if the
    /// nonce failed to advance.
    pub fn seal<T: Serialize + ?Sized>(&self, value: &T) -> Result<Envelope> {
        let mut plaintext = payload::encode(value)?;
        let sealed = self.seal_bytes(&plaintext);
        plaintext.zeroize();
        sealed
    }

    /// Seals raw bytes.
    pub fn seal_bytes(&self, plaintext: &[u8]) -> Result<Envelope> {
        // Advancing the nonce and encrypting under it is one critical section.
        let mut state = self.nonce.lock();
        let nonce = advance_nonce(&mut state)?;
        let ciphertext = self
            .keyed
            .encrypt(&nonce, plaintext)
            .ok_or_else(|| CacheError::Setup(format!("{} encryption failed", self.cipher.name())))?;
        drop(state);

        Ok(Envelope {
            nonce: nonce.to_vec(),
            ciphertext,
        })
    }

    /// Opens an envelope. None on malformed envelopes and authentication
    /// failure, so tampered or foreign ciphertext reads as a miss.
    pub fn open(&self, envelope: &Envelope) -> Option<Vec<u8>> {
        if !envelope.is_well_formed() {
            warn!("Discarding malformed envelope");
            return None;
        }
        let plaintext = self.keyed.decrypt(&envelope.nonce, &envelope.ciphertext);
        if plaintext.is_none() {
            warn!("Envelope failed authentication under {}", self.cipher.name());
        }
        plaintext
    }

    /// Opens an envelope and deserializes its plaintext.
    pub fn open_value<T: DeserializeOwned>(&self, envelope: &Envelope) -> Option<T> {
        let mut plaintext = self.open(envelope)?;
        let value = payload::decode(&plaintext);
        plaintext.zeroize();
        value
    }
}

impl fmt::Debug for CryptoEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptoEnvelope")
            .field("cipher", &self.cipher)
            .finish_non_exhaustive()
    }
}

// == Nonce Discipline ==
/// Draws the first nonce at random, then increments it as a big-endian counter.
fn advance_nonce(state: &mut Option<[u8; NONCE_LEN]>) -> Result<[u8; NONCE_LEN]> {
    let previous = *state;
    let next = match previous {
        None => {
            let mut fresh = [0u8; NONCE_LEN];
            OsRng.fill_bytes(&mut fresh);
            fresh
        }
        Some(mut current) => {
            increment(&mut current);
            current
        }
    };
    ensure_advanced(previous, next)?;
    *state = Some(next);
    Ok(next)
}

fn increment(nonce: &mut [u8; NONCE_LEN]) {
    for byte in nonce.iter_mut().rev() {
        *byte = byte.wrapping_add(1);
        if *byte != 0 {
            break;
        }
    }
}

fn ensure_advanced(previous: Option<[u8; NONCE_LEN]>, next: [u8; NONCE_LEN]) -> Result<()> {
    if previous == Some(next) {
        return Err(CacheError::NonceReuse);
    }
    Ok(())
}
