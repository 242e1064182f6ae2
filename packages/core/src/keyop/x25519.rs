//! X25519 key agreement.

use tracing::info;
use x25519_dalek::{PublicKey, StaticSecret};

use super::{AsymKey, CheckOutcome, KeyMaterial, KeyOpMethod, KeyType, OpEnv, Operation};
use crate::error::KeyOpError;
use crate::rng::RngHandle;

pub struct X25519Method;

pub static X25519_METHOD: X25519Method = X25519Method;

fn mismatch(key: &AsymKey) -> KeyOpError {
    KeyOpError::KeyTypeMismatch {
        expected: KeyType::X25519,
        actual: key.key_type(),
    }
}

fn public_of(key: &AsymKey) -> Result<PublicKey, KeyOpError> {
    match key.material() {
        KeyMaterial::X25519Private(k) => Ok(PublicKey::from(k)),
        KeyMaterial::X25519Public(k) => Ok(*k),
        _ => Err(mismatch(key)),
    }
}

impl KeyOpMethod for X25519Method {
    fn key_type(&self) -> KeyType {
        KeyType::X25519
    }

    fn supports(&self, op: Operation) -> bool {
        matches!(op, Operation::KeyGen | Operation::Derive)
    }

    fn keygen(&self, env: &mut OpEnv<'_>) -> Result<AsymKey, KeyOpError> {
        env.report(0, 0)?;
        let secret = StaticSecret::random_from_rng(RngHandle::new(&mut *env.rng));
        info!(target: "cryptoframe::keyop", "Generated X25519 key");
        env.report(3, 0)?;
        Ok(AsymKey::from_material(KeyMaterial::X25519Private(secret)))
    }

    /// Fails on a low-order peer point (all-zero shared secret).
    fn derive(&self, env: &mut OpEnv<'_>) -> Result<Vec<u8>, KeyOpError> {
        let key = env.key()?;
        let secret = match key.material() {
            KeyMaterial::X25519Private(k) => k,
            KeyMaterial::X25519Public(_) => return Err(KeyOpError::PrivateKeyRequired),
            _ => return Err(mismatch(key)),
        };
        let peer = public_of(env.peer()?)?;

        let shared = secret.diffie_hellman(&peer);
        if !shared.was_contributory() {
            return Err(KeyOpError::InvalidParameter(
                "peer public key has small order".to_string(),
            ));
        }
        Ok(shared.as_bytes().to_vec())
    }

    fn check(&self, key: &AsymKey) -> Result<CheckOutcome, KeyOpError> {
        match key.material() {
            KeyMaterial::X25519Private(_) => self.public_check(key),
            KeyMaterial::X25519Public(_) => Err(KeyOpError::PrivateKeyRequired),
            _ => Err(mismatch(key)),
        }
    }

    fn public_check(&self, key: &AsymKey) -> Result<CheckOutcome, KeyOpError> {
        let public = public_of(key)?;
        // clamped scalars are multiples of the cofactor, so small-order points map to zero
        let probe = StaticSecret::from([8u8; 32]);
        if !probe.diffie_hellman(&public).was_contributory() {
            return Ok(CheckOutcome::fail("public key has small order"));
        }
        Ok(CheckOutcome::pass())
    }
}
