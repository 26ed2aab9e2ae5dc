//! AES-256-CFB stream cipher keyed from a shared password.
//!
//! The key is `SHA-256(password)`. Each direction of a connection runs its own
//! CFB keystream: the writer picks a random 16-byte IV and sends it once in
//! front of its first ciphertext, the reader initializes from the IV it
//! receives. A [`Cipher`] belongs to exactly one connection.

use std::fmt;

use aes::Aes256;
use aes::cipher::KeyInit;
use cfb_mode::cipher::InnerIvInit;
use cfb_mode::{BufDecryptor, BufEncryptor};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

use crate::error::{Direction, TransportError};

/// AES-256 key length.
pub const KEY_LEN: usize = 32;
/// AES block size, and so the CFB IV length.
pub const IV_LEN: usize = 16;

/// Per-direction initialization vector.
pub type Iv = [u8; IV_LEN];

/// Key derived from the shared password.
#[derive(Clone, PartialEq, Eq)]
pub struct Key([u8; KEY_LEN]);

impl Key {
    pub fn derive(password: &str) -> Self {
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&Sha256::digest(password.as_bytes()));
        Self(key)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Key(..)")
    }
}

/// Block cipher plus the two lazily initialized keystream states.
pub struct Cipher {
    block: Aes256,
    encrypt_state: Option<BufEncryptor<Aes256>>,
    decrypt_state: Option<BufDecryptor<Aes256>>,
}

impl Cipher {
    /// Derive the key from `password` and build a cipher with no keystream yet.
    pub fn new(password: &str) -> Result<Self, TransportError> {
        Self::from_key(&Key::derive(password))
    }

    pub fn from_key(key: &Key) -> Result<Self, TransportError> {
        let block = Aes256::new_from_slice(key.as_bytes())
            .map_err(|_| TransportError::Config("invalid AES-256 key length".into()))?;
        Ok(Self {
            block,
            encrypt_state: None,
            decrypt_state: None,
        })
    }

    /// Generate a fresh IV, start the encrypt keystream with it and return it.
    ///
    /// Must be called once, before the first [`encrypt`](Self::encrypt).
    pub fn init_encrypt_state(&mut self) -> Result<Iv, TransportError> {
        if self.encrypt_state.is_some() {
            return Err(TransportError::KeystreamReinitialized(Direction::Encrypt));
        }
        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);
        let state = BufEncryptor::inner_iv_slice_init(self.block.clone(), &iv)
            .map_err(|_| TransportError::Config("invalid IV length".into()))?;
        self.encrypt_state = Some(state);
        Ok(iv)
    }

    /// Start the decrypt keystream from the peer's IV.
    pub fn init_decrypt_state(&mut self, iv: &Iv) -> Result<(), TransportError> {
        if self.decrypt_state.is_some() {
            return Err(TransportError::KeystreamReinitialized(Direction::Decrypt));
        }
        let state = BufDecryptor::inner_iv_slice_init(self.block.clone(), iv)
            .map_err(|_| TransportError::Config("invalid IV length".into()))?;
        self.decrypt_state = Some(state);
        Ok(())
    }

    pub fn is_encrypt_ready(&self) -> bool {
        self.encrypt_state.is_some()
    }

    pub fn is_decrypt_ready(&self) -> bool {
        self.decrypt_state.is_some()
    }

    /// Encrypt `buf` in place, continuing the keystream.
    pub fn encrypt(&mut self, buf: &mut [u8]) -> Result<(), TransportError> {
        let state = self
            .encrypt_state
            .as_mut()
            .ok_or(TransportError::KeystreamUninitialized(Direction::Encrypt))?;
        state.encrypt(buf);
        Ok(())
    }

    /// Decrypt `buf` in place, continuing the keystream.
    pub fn decrypt(&mut self, buf: &mut [u8]) -> Result<(), TransportError> {
        let state = self
            .decrypt_state
            .as_mut()
            .ok_or(TransportError::KeystreamUninitialized(Direction::Decrypt))?;
        state.decrypt(buf);
        Ok(())
    }
}

impl fmt::Debug for Cipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cipher")
            .field("encrypt_ready", &self.is_encrypt_ready())
            .field("decrypt_ready", &self.is_decrypt_ready())
            .finish()
    }
}
