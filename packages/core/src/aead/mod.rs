//! Authenticated encryption with associated data.
//!
//! ## Architecture
//!
//! ```text
//! AeadDescriptor (static, shared)        AeadContext (per key)
//!   name / nid / key_len                   descriptor
//!   nonce_lens / max_tag_len     ──init──► key: Box<dyn AeadKey>
//!   algorithm: &dyn AeadAlgorithm          tag_len
//! ```
//!
//! Nonce uniqueness per key is the caller's responsibility; nothing here
//! tracks nonces that were already used.

pub mod chacha;
pub mod gcm;

use std::fmt;

use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::config::Config;
use crate::error::AeadError;
use crate::rng::{self, CryptoRngCore};

/// Full-length tag produced by every backend.
pub const MAX_TAG_LENGTH: usize = 16;

/// Keyed AEAD instance. Backends always compute the full tag.
pub trait AeadKey: Send + Sync {
    /// Encrypt `buf` in place and return the full tag.
    fn seal(&self, nonce: &[u8], ad: &[u8], buf: &mut [u8]) -> Result<[u8; MAX_TAG_LENGTH], AeadError>;

    /// Check `tag` (possibly truncated) and decrypt `buf` in place.
    ///
    /// On `AuthFailure` the contents of `buf` are unspecified.
    fn open(&self, nonce: &[u8], ad: &[u8], buf: &mut [u8], tag: &[u8]) -> Result<(), AeadError>;

    fn box_clone(&self) -> Box<dyn AeadKey>;
}

impl Clone for Box<dyn AeadKey> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

pub trait AeadAlgorithm: Send + Sync {
    fn key_schedule(&self, key: &[u8]) -> Result<Box<dyn AeadKey>, AeadError>;
}

pub struct AeadDescriptor {
    pub name: &'static str,
    pub nid: u32,
    pub key_len: usize,
    /// Accepted nonce lengths; the first one is the default
    pub nonce_lens: &'static [usize],
    pub min_tag_len: usize,
    pub max_tag_len: usize,
    /// Largest plaintext the construction can protect
    pub max_input: u64,
    pub algorithm: &'static dyn AeadAlgorithm,
}

impl AeadDescriptor {
    pub fn default_nonce_len(&self) -> usize {
        self.nonce_lens.first().copied().unwrap_or(0)
    }

    pub fn accepts_nonce(&self, len: usize) -> bool {
        self.nonce_lens.contains(&len)
    }
}

impl fmt::Debug for AeadDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AeadDescriptor")
            .field("name", &self.name)
            .field("nid", &self.nid)
            .field("key_len", &self.key_len)
            .field("nonce_lens", &self.nonce_lens)
            .field("max_tag_len", &self.max_tag_len)
            .finish()
    }
}

/// Every AEAD compiled into this build.
pub static ALL: [&AeadDescriptor; 4] = [
    &gcm::AES_128_GCM,
    &gcm::AES_256_GCM,
    &chacha::CHACHA20_POLY1305,
    &chacha::XCHACHA20_POLY1305,
];

#[derive(Clone)]
pub struct AeadContext {
    descriptor: &'static AeadDescriptor,
    key: Option<Box<dyn AeadKey>>,
    tag_len: usize,
}

impl AeadContext {
    /// Key a new context. `tag_len == 0` picks the configured default,
    /// which itself defaults to the descriptor maximum.
    pub fn init(
        descriptor: &'static AeadDescriptor,
        key: &[u8],
        tag_len: usize,
    ) -> Result<Self, AeadError> {
        if key.len() != descriptor.key_len {
            return Err(AeadError::InvalidKeyLength {
                expected: descriptor.key_len,
                actual: key.len(),
            });
        }

        let tag_len = match tag_len {
            0 => match Config::global().aead_default_tag_len {
                0 => descriptor.max_tag_len,
                n => n,
            },
            n => n,
        };
        if tag_len < descriptor.min_tag_len || tag_len > descriptor.max_tag_len {
            return Err(AeadError::InvalidTagLength {
                requested: tag_len,
                max: descriptor.max_tag_len,
            });
        }

        let key = descriptor.algorithm.key_schedule(key)?;
        debug!(
            target: "cryptoframe::aead",
            aead = descriptor.name,
            tag_len,
            "AEAD context initialized"
        );

        Ok(Self {
            descriptor,
            key: Some(key),
            tag_len,
        })
    }

    pub fn descriptor(&self) -> &'static AeadDescriptor {
        self.descriptor
    }

    pub fn tag_len(&self) -> usize {
        self.tag_len
    }

    /// Fresh random nonce of the descriptor's default length.
    pub fn generate_nonce(&self, rng: &mut dyn CryptoRngCore) -> Result<Vec<u8>, AeadError> {
        let mut nonce = vec![0u8; self.descriptor.default_nonce_len()];
        rng::fill(rng, &mut nonce).map_err(|e| AeadError::Backend(e.to_string()))?;
        Ok(nonce)
    }

    /// Drop the key. Later calls fail with `NotInitialized`.
    pub fn cleanup(&mut self) {
        self.key = None;
    }

    fn live_key(&self, nonce: &[u8], len: usize) -> Result<&dyn AeadKey, AeadError> {
        let key = self.key.as_deref().ok_or(AeadError::NotInitialized)?;
        if !self.descriptor.accepts_nonce(nonce.len()) {
            return Err(AeadError::InvalidNonceLength {
                name: self.descriptor.name,
                actual: nonce.len(),
            });
        }
        if len as u64 > self.descriptor.max_input {
            return Err(AeadError::InputTooLong { len });
        }
        Ok(key)
    }

    /// `plaintext` encrypted, followed by `tag_len` tag bytes.
    pub fn seal(&self, nonce: &[u8], plaintext: &[u8], ad: &[u8]) -> Result<Vec<u8>, AeadError> {
        let mut out = vec![0u8; plaintext.len() + self.tag_len];
        self.seal_into(nonce, plaintext, ad, &mut out)?;
        Ok(out)
    }

    pub fn seal_into(
        &self,
        nonce: &[u8],
        plaintext: &[u8],
        ad: &[u8],
        out: &mut [u8],
    ) -> Result<usize, AeadError> {
        let key = self.live_key(nonce, plaintext.len())?;
        let total = plaintext.len() + self.tag_len;
        if out.len() < total {
            return Err(AeadError::BufferTooSmall {
                needed: total,
                available: out.len(),
            });
        }

        let (body, rest) = out.split_at_mut(plaintext.len());
        body.copy_from_slice(plaintext);
        let tag = key.seal(nonce, ad, body)?;
        rest[..self.tag_len].copy_from_slice(&tag[..self.tag_len]);
        Ok(total)
    }

    /// Verify and decrypt `sealed` (ciphertext ‖ tag).
    pub fn open(&self, nonce: &[u8], sealed: &[u8], ad: &[u8]) -> Result<Vec<u8>, AeadError> {
        let mut scratch = self.open_scratch(nonce, sealed, ad)?;
        Ok(std::mem::take(&mut *scratch))
    }

    /// Like [`open`](Self::open); `out` is left untouched unless the tag verifies.
    pub fn open_into(
        &self,
        nonce: &[u8],
        sealed: &[u8],
        ad: &[u8],
        out: &mut [u8],
    ) -> Result<usize, AeadError> {
        let needed = sealed.len().saturating_sub(self.tag_len);
        if out.len() < needed {
            return Err(AeadError::BufferTooSmall {
                needed,
                available: out.len(),
            });
        }
        let scratch = self.open_scratch(nonce, sealed, ad)?;
        out[..scratch.len()].copy_from_slice(&scratch);
        Ok(scratch.len())
    }

    fn open_scratch(
        &self,
        nonce: &[u8],
        sealed: &[u8],
        ad: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, AeadError> {
        if sealed.len() < self.tag_len {
            let _ = self.live_key(nonce, 0)?;
            return Err(AeadError::AuthFailure);
        }
        let (ct, tag) = sealed.split_at(sealed.len() - self.tag_len);
        let key = self.live_key(nonce, ct.len())?;

        let mut scratch = Zeroizing::new(ct.to_vec());
        if let Err(e) = key.open(nonce, ad, &mut scratch, tag) {
            warn!(
                target: "cryptoframe::aead",
                aead = self.descriptor.name,
                len = sealed.len(),
                "AEAD open rejected"
            );
            return Err(e);
        }
        Ok(scratch)
    }
}

impl fmt::Debug for AeadContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AeadContext")
            .field("aead", &self.descriptor.name)
            .field("tag_len", &self.tag_len)
            .field("keyed", &self.key.is_some())
            .finish()
    }
}
