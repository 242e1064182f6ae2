//! Pure Ed25519: the message is signed as-is, no prehash.

use ed25519_dalek::{Signature, Signer, SigningKey};
use tracing::info;

use super::{AsymKey, CheckOutcome, KeyMaterial, KeyOpMethod, KeyType, OpEnv, Operation};
use crate::error::KeyOpError;

pub struct Ed25519Method;

pub static ED25519_METHOD: Ed25519Method = Ed25519Method;

fn mismatch(key: &AsymKey) -> KeyOpError {
    KeyOpError::KeyTypeMismatch {
        expected: KeyType::Ed25519,
        actual: key.key_type(),
    }
}

impl KeyOpMethod for Ed25519Method {
    fn key_type(&self) -> KeyType {
        KeyType::Ed25519
    }

    fn supports(&self, op: Operation) -> bool {
        matches!(op, Operation::KeyGen | Operation::Sign | Operation::Verify)
    }

    fn keygen(&self, env: &mut OpEnv<'_>) -> Result<AsymKey, KeyOpError> {
        env.report(0, 0)?;
        let key = SigningKey::generate(&mut *env.rng);
        info!(target: "cryptoframe::keyop", "Generated Ed25519 key");
        env.report(3, 0)?;
        Ok(AsymKey::from_material(KeyMaterial::Ed25519Private(key)))
    }

    fn sign(&self, env: &mut OpEnv<'_>, tbs: &[u8]) -> Result<Vec<u8>, KeyOpError> {
        let key = env.key()?;
        match key.material() {
            KeyMaterial::Ed25519Private(k) => Ok(k.sign(tbs).to_bytes().to_vec()),
            KeyMaterial::Ed25519Public(_) => Err(KeyOpError::PrivateKeyRequired),
            _ => Err(mismatch(key)),
        }
    }

    fn verify(&self, env: &mut OpEnv<'_>, sig: &[u8], tbs: &[u8]) -> Result<(), KeyOpError> {
        let key = env.key()?;
        let verifying = match key.material() {
            KeyMaterial::Ed25519Private(k) => k.verifying_key(),
            KeyMaterial::Ed25519Public(k) => *k,
            _ => return Err(mismatch(key)),
        };
        let sig = Signature::from_slice(sig).map_err(|_| KeyOpError::BadSignature)?;
        verifying
            .verify_strict(tbs, &sig)
            .map_err(|_| KeyOpError::BadSignature)
    }

    fn check(&self, key: &AsymKey) -> Result<CheckOutcome, KeyOpError> {
        match key.material() {
            KeyMaterial::Ed25519Private(_) => self.public_check(key),
            KeyMaterial::Ed25519Public(_) => Err(KeyOpError::PrivateKeyRequired),
            _ => Err(mismatch(key)),
        }
    }

    fn public_check(&self, key: &AsymKey) -> Result<CheckOutcome, KeyOpError> {
        let verifying = match key.material() {
            KeyMaterial::Ed25519Private(k) => k.verifying_key(),
            KeyMaterial::Ed25519Public(k) => *k,
            _ => return Err(mismatch(key)),
        };
        if verifying.is_weak() {
            return Ok(CheckOutcome::fail("public key is a small-order point"));
        }
        Ok(CheckOutcome::pass())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyop::KeyOpData;

    // RFC 8032 section 7.1, test 1
    const SECRET: &str = "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60";
    const PUBLIC: &str = "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a";
    const SIGNATURE: &str = "e5564300c360ac729086e2cc806e828a84877f1eb8e5d974d873e06522490155\
                             5fb8821590a33bacc61e39701cf9b46bd25bf5f0595bbe24655141438e7a100b";

    #[test]
    fn test_rfc8032_empty_message() {
        let key = AsymKey::ed25519_private_from_bytes(&hex::decode(SECRET).unwrap()).unwrap();
        assert_eq!(hex::encode(key.public_bytes().unwrap()), PUBLIC);

        let mut data = KeyOpData::Empty;
        let mut rng = crate::rng::OsRng;
        let mut env = OpEnv::new(Operation::Sign, &mut data, Some(&key), None, &mut rng, None);
        let sig = ED25519_METHOD.sign(&mut env, b"").unwrap();
        assert_eq!(hex::encode(&sig), SIGNATURE);
        ED25519_METHOD.verify(&mut env, &sig, b"").unwrap();
        assert_eq!(
            ED25519_METHOD.verify(&mut env, &sig, b"x").unwrap_err(),
            KeyOpError::BadSignature
        );
    }

    #[test]
    fn test_public_only_cannot_sign() {
        let key = AsymKey::ed25519_public_from_bytes(&hex::decode(PUBLIC).unwrap()).unwrap();
        assert!(ED25519_METHOD.public_check(&key).unwrap().passed);
        assert_eq!(ED25519_METHOD.check(&key).unwrap_err(), KeyOpError::PrivateKeyRequired);

        let mut data = KeyOpData::Empty;
        let mut rng = crate::rng::OsRng;
        let mut env = OpEnv::new(Operation::Sign, &mut data, Some(&key), None, &mut rng, None);
        assert_eq!(
            ED25519_METHOD.sign(&mut env, b"msg").unwrap_err(),
            KeyOpError::PrivateKeyRequired
        );
    }
}
