//! AES-GCM via `aes-gcm`, with truncated tags down to one byte.

use aes_gcm::aead::consts::{U12, U16};
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{AeadCore, AeadInPlace, KeyInit};
use aes_gcm::{Aes128Gcm, Aes256Gcm};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use super::{AeadAlgorithm, AeadDescriptor, AeadKey, MAX_TAG_LENGTH};
use crate::error::AeadError;

const GCM_NONCE: usize = 12;

#[derive(Clone)]
struct GcmKey<C>(C);

impl<C> AeadKey for GcmKey<C>
where
    C: AeadInPlace + AeadCore<NonceSize = U12, TagSize = U16> + Clone + Send + Sync + 'static,
{
    fn seal(&self, nonce: &[u8], ad: &[u8], buf: &mut [u8]) -> Result<[u8; MAX_TAG_LENGTH], AeadError> {
        if nonce.len() != GCM_NONCE {
            return Err(AeadError::InvalidNonceLength { name: "gcm", actual: nonce.len() });
        }
        let tag = self
            .0
            .encrypt_in_place_detached(GenericArray::from_slice(nonce), ad, buf)
            .map_err(|e| AeadError::Backend(e.to_string()))?;
        let mut out = [0u8; MAX_TAG_LENGTH];
        out.copy_from_slice(&tag);
        Ok(out)
    }

    fn open(&self, nonce: &[u8], ad: &[u8], buf: &mut [u8], tag: &[u8]) -> Result<(), AeadError> {
        if nonce.len() != GCM_NONCE {
            return Err(AeadError::InvalidNonceLength { name: "gcm", actual: nonce.len() });
        }
        let nonce = GenericArray::from_slice(nonce);

        if tag.len() == MAX_TAG_LENGTH {
            return self
                .0
                .decrypt_in_place_detached(nonce, ad, buf, GenericArray::from_slice(tag))
                .map_err(|_| AeadError::AuthFailure);
        }

        // Truncated tag: run CTR to get the candidate plaintext, re-seal a copy
        // of it to recompute the full tag over the original ciphertext.
        self.0
            .encrypt_in_place_detached(nonce, ad, buf)
            .map_err(|e| AeadError::Backend(e.to_string()))?;
        let mut resealed = Zeroizing::new(buf.to_vec());
        let full = self
            .0
            .encrypt_in_place_detached(nonce, ad, &mut resealed)
            .map_err(|e| AeadError::Backend(e.to_string()))?;

        if bool::from(full[..tag.len()].ct_eq(tag)) {
            Ok(())
        } else {
            Err(AeadError::AuthFailure)
        }
    }

    fn box_clone(&self) -> Box<dyn AeadKey> {
        Box::new(self.clone())
    }
}

pub struct GcmAlgorithm;

impl AeadAlgorithm for GcmAlgorithm {
    fn key_schedule(&self, key: &[u8]) -> Result<Box<dyn AeadKey>, AeadError> {
        let invalid = |expected| AeadError::InvalidKeyLength { expected, actual: key.len() };
        match key.len() {
            16 => Ok(Box::new(GcmKey(
                Aes128Gcm::new_from_slice(key).map_err(|_| invalid(16))?,
            ))),
            32 => Ok(Box::new(GcmKey(
                Aes256Gcm::new_from_slice(key).map_err(|_| invalid(32))?,
            ))),
            _ => Err(invalid(16)),
        }
    }
}

pub static GCM: GcmAlgorithm = GcmAlgorithm;

// 2^39 - 256 bits per NIST SP 800-38D
const GCM_MAX_INPUT: u64 = (1 << 36) - 32;

pub static AES_128_GCM: AeadDescriptor = AeadDescriptor {
    name: "aes-128-gcm",
    nid: 895,
    key_len: 16,
    nonce_lens: &[GCM_NONCE],
    min_tag_len: 1,
    max_tag_len: MAX_TAG_LENGTH,
    max_input: GCM_MAX_INPUT,
    algorithm: &GCM,
};

pub static AES_256_GCM: AeadDescriptor = AeadDescriptor {
    name: "aes-256-gcm",
    nid: 901,
    key_len: 32,
    nonce_lens: &[GCM_NONCE],
    min_tag_len: 1,
    max_tag_len: MAX_TAG_LENGTH,
    max_input: GCM_MAX_INPUT,
    algorithm: &GCM,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aead::AeadContext;

    #[test]
    fn test_truncated_tag_is_prefix_of_full_tag() {
        let key = [0x42u8; 16];
        let nonce = [9u8; 12];
        let full = AeadContext::init(&AES_128_GCM, &key, 16).unwrap();
        let short = AeadContext::init(&AES_128_GCM, &key, 8).unwrap();

        let a = full.seal(&nonce, b"payload", b"ad").unwrap();
        let b = short.seal(&nonce, b"payload", b"ad").unwrap();
        assert_eq!(b.len(), 7 + 8);
        assert_eq!(&a[..15], &b[..]);

        assert_eq!(short.open(&nonce, &b, b"ad").unwrap(), b"payload");
        let mut bad = b.clone();
        bad[14] ^= 0x80;
        assert_eq!(short.open(&nonce, &bad, b"ad").unwrap_err(), AeadError::AuthFailure);
    }

    #[test]
    fn test_key_length_picks_variant() {
        assert!(GCM.key_schedule(&[0u8; 16]).is_ok());
        assert!(GCM.key_schedule(&[0u8; 32]).is_ok());
        assert!(matches!(
            GCM.key_schedule(&[0u8; 24]),
            Err(AeadError::InvalidKeyLength { actual: 24, .. })
        ));
    }
}
