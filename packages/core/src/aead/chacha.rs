//! ChaCha20-Poly1305, built from the `chacha20` stream cipher and `poly1305`.
//!
//! | nonce | keystream               | MAC input                                           |
//! |-------|-------------------------|-----------------------------------------------------|
//! | 8     | ChaCha20 (64-bit nonce) | `AD ‖ le64(len AD) ‖ CT ‖ le64(len CT)`             |
//! | 12    | ChaCha20 (RFC 8439)     | `AD ‖ pad16 ‖ CT ‖ pad16 ‖ le64(len AD) ‖ le64(len CT)` |
//! | 24    | XChaCha20               | as for 12                                           |
//!
//! The Poly1305 key is the first 32 bytes of keystream block 0; the payload
//! is encrypted starting at block 1.

use chacha20::cipher::{KeyIvInit, StreamCipher, StreamCipherSeek};
use chacha20::{ChaCha20, ChaCha20Legacy, XChaCha20};
use poly1305::universal_hash::KeyInit;
use poly1305::Poly1305;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use super::{AeadAlgorithm, AeadDescriptor, AeadKey, MAX_TAG_LENGTH};
use crate::error::AeadError;

const KEY_LEN: usize = 32;
const BLOCK: u64 = 64;

#[derive(Clone)]
struct ChaChaPolyKey {
    key: Zeroizing<[u8; KEY_LEN]>,
}

fn mac_input(ad: &[u8], ct: &[u8], padded: bool) -> Vec<u8> {
    let pad = |len: usize| if padded { (16 - len % 16) % 16 } else { 0 };
    let mut data = Vec::with_capacity(ad.len() + ct.len() + 48);

    data.extend_from_slice(ad);
    if padded {
        data.resize(data.len() + pad(ad.len()), 0);
    } else {
        data.extend_from_slice(&(ad.len() as u64).to_le_bytes());
    }
    data.extend_from_slice(ct);
    if padded {
        data.resize(data.len() + pad(ct.len()), 0);
        data.extend_from_slice(&(ad.len() as u64).to_le_bytes());
    }
    data.extend_from_slice(&(ct.len() as u64).to_le_bytes());
    data
}

/// Keystream cipher positioned at block 1, plus the one-time MAC key.
fn setup<C>(key: &[u8], nonce: &[u8]) -> Result<(C, Zeroizing<[u8; 32]>), AeadError>
where
    C: KeyIvInit + StreamCipher + StreamCipherSeek,
{
    let mut cipher = C::new_from_slices(key, nonce).map_err(|e| AeadError::Backend(e.to_string()))?;
    let mut mac_key = Zeroizing::new([0u8; 32]);
    cipher.apply_keystream(&mut mac_key[..]);
    cipher.seek(BLOCK);
    Ok((cipher, mac_key))
}

fn tag(mac_key: &[u8; 32], ad: &[u8], ct: &[u8], padded: bool) -> [u8; MAX_TAG_LENGTH] {
    let mac = Poly1305::new(poly1305::Key::from_slice(mac_key));
    let computed = mac.compute_unpadded(&mac_input(ad, ct, padded));
    let mut out = [0u8; MAX_TAG_LENGTH];
    out.copy_from_slice(&computed);
    out
}

fn seal_with<C>(
    key: &[u8],
    nonce: &[u8],
    ad: &[u8],
    buf: &mut [u8],
    padded: bool,
) -> Result<[u8; MAX_TAG_LENGTH], AeadError>
where
    C: KeyIvInit + StreamCipher + StreamCipherSeek,
{
    let (mut cipher, mac_key) = setup::<C>(key, nonce)?;
    cipher.apply_keystream(buf);
    Ok(tag(&mac_key, ad, buf, padded))
}

fn open_with<C>(
    key: &[u8],
    nonce: &[u8],
    ad: &[u8],
    buf: &mut [u8],
    expected: &[u8],
    padded: bool,
) -> Result<(), AeadError>
where
    C: KeyIvInit + StreamCipher + StreamCipherSeek,
{
    let (mut cipher, mac_key) = setup::<C>(key, nonce)?;
    let computed = tag(&mac_key, ad, buf, padded);
    if !bool::from(computed[..expected.len()].ct_eq(expected)) {
        return Err(AeadError::AuthFailure);
    }
    cipher.apply_keystream(buf);
    Ok(())
}

impl AeadKey for ChaChaPolyKey {
    fn seal(&self, nonce: &[u8], ad: &[u8], buf: &mut [u8]) -> Result<[u8; MAX_TAG_LENGTH], AeadError> {
        let key = &self.key[..];
        match nonce.len() {
            8 => seal_with::<ChaCha20Legacy>(key, nonce, ad, buf, false),
            12 => seal_with::<ChaCha20>(key, nonce, ad, buf, true),
            24 => seal_with::<XChaCha20>(key, nonce, ad, buf, true),
            other => Err(AeadError::InvalidNonceLength { name: "chacha20-poly1305", actual: other }),
        }
    }

    fn open(&self, nonce: &[u8], ad: &[u8], buf: &mut [u8], tag: &[u8]) -> Result<(), AeadError> {
        let key = &self.key[..];
        match nonce.len() {
            8 => open_with::<ChaCha20Legacy>(key, nonce, ad, buf, tag, false),
            12 => open_with::<ChaCha20>(key, nonce, ad, buf, tag, true),
            24 => open_with::<XChaCha20>(key, nonce, ad, buf, tag, true),
            other => Err(AeadError::InvalidNonceLength { name: "chacha20-poly1305", actual: other }),
        }
    }

    fn box_clone(&self) -> Box<dyn AeadKey> {
        Box::new(self.clone())
    }
}

pub struct ChaChaPolyAlgorithm;

impl AeadAlgorithm for ChaChaPolyAlgorithm {
    fn key_schedule(&self, key: &[u8]) -> Result<Box<dyn AeadKey>, AeadError> {
        let key: [u8; KEY_LEN] = key.try_into().map_err(|_| AeadError::InvalidKeyLength {
            expected: KEY_LEN,
            actual: key.len(),
        })?;
        Ok(Box::new(ChaChaPolyKey {
            key: Zeroizing::new(key),
        }))
    }
}

pub static CHACHA_POLY: ChaChaPolyAlgorithm = ChaChaPolyAlgorithm;

pub static CHACHA20_POLY1305: AeadDescriptor = AeadDescriptor {
    name: "chacha20-poly1305",
    nid: 1018,
    key_len: KEY_LEN,
    nonce_lens: &[12, 8],
    min_tag_len: MAX_TAG_LENGTH,
    max_tag_len: MAX_TAG_LENGTH,
    // 32-bit block counter, block 0 reserved for the MAC key
    max_input: ((1u64 << 32) - 1) * BLOCK,
    algorithm: &CHACHA_POLY,
};

pub static XCHACHA20_POLY1305: AeadDescriptor = AeadDescriptor {
    name: "xchacha20-poly1305",
    nid: 0,
    key_len: KEY_LEN,
    nonce_lens: &[24],
    min_tag_len: MAX_TAG_LENGTH,
    max_tag_len: MAX_TAG_LENGTH,
    max_input: ((1u64 << 32) - 1) * BLOCK,
    algorithm: &CHACHA_POLY,
};
