//! NIST P-256: parameter generation, ECDSA over a prehash, ECDH.
//!
//! Signatures are the fixed-width `r ‖ s` encoding (64 bytes).

use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use tracing::info;

use super::{
    AsymKey, CheckOutcome, EcCurve, KeyMaterial, KeyOpCtrl, KeyOpData, KeyOpMethod, KeyType,
    OpEnv, Operation,
};
use crate::digest::DigestDescriptor;
use crate::error::KeyOpError;
use crate::rng::RngHandle;

#[derive(Debug, Clone, Copy, Default)]
pub struct EcOpData {
    /// Curve for paramgen/keygen when no parameter key is bound
    pub curve: Option<EcCurve>,
    pub digest: Option<&'static DigestDescriptor>,
}

pub struct EcMethod;

pub static EC_METHOD: EcMethod = EcMethod;

fn settings(env: &OpEnv<'_>) -> Result<EcOpData, KeyOpError> {
    match &*env.data {
        KeyOpData::Ec(data) => Ok(*data),
        _ => Err(KeyOpError::Backend("EC context without EC data".to_string())),
    }
}

fn mismatch(key: &AsymKey) -> KeyOpError {
    KeyOpError::KeyTypeMismatch {
        expected: KeyType::Ec,
        actual: key.key_type(),
    }
}

fn secret_of(key: &AsymKey) -> Result<&p256::SecretKey, KeyOpError> {
    match key.material() {
        KeyMaterial::EcPrivate { secret, .. } => Ok(secret),
        KeyMaterial::EcPublic(_) | KeyMaterial::EcParams(_) => Err(KeyOpError::PrivateKeyRequired),
        _ => Err(mismatch(key)),
    }
}

fn public_of(key: &AsymKey) -> Result<p256::PublicKey, KeyOpError> {
    match key.material() {
        KeyMaterial::EcPrivate { public, .. } => Ok(public.clone()),
        KeyMaterial::EcPublic(k) => Ok(k.clone()),
        KeyMaterial::EcParams(_) => Err(KeyOpError::NoKey),
        _ => Err(mismatch(key)),
    }
}

fn check_digest_len(data: &EcOpData, tbs: &[u8]) -> Result<(), KeyOpError> {
    match data.digest {
        Some(md) if md.md_size != tbs.len() => Err(KeyOpError::InvalidParameter(format!(
            "input is {} bytes, {} produces {}",
            tbs.len(),
            md.name,
            md.md_size
        ))),
        _ => Ok(()),
    }
}

fn target_curve(env: &OpEnv<'_>, data: &EcOpData) -> Result<EcCurve, KeyOpError> {
    if let Some(curve) = env.key.and_then(AsymKey::ec_curve) {
        return Ok(curve);
    }
    data.curve
        .ok_or_else(|| KeyOpError::InvalidParameter("no curve selected".to_string()))
}

impl KeyOpMethod for EcMethod {
    fn key_type(&self) -> KeyType {
        KeyType::Ec
    }

    fn supports(&self, op: Operation) -> bool {
        matches!(
            op,
            Operation::ParamGen
                | Operation::KeyGen
                | Operation::Sign
                | Operation::Verify
                | Operation::SignCtx
                | Operation::VerifyCtx
                | Operation::Derive
        )
    }

    fn new_data(&self) -> KeyOpData {
        KeyOpData::Ec(EcOpData::default())
    }

    fn paramgen(&self, env: &mut OpEnv<'_>) -> Result<AsymKey, KeyOpError> {
        let data = settings(env)?;
        let curve = data
            .curve
            .ok_or_else(|| KeyOpError::InvalidParameter("no curve selected".to_string()))?;
        Ok(AsymKey::from_material(KeyMaterial::EcParams(curve)))
    }

    fn keygen(&self, env: &mut OpEnv<'_>) -> Result<AsymKey, KeyOpError> {
        let data = settings(env)?;
        let curve = target_curve(env, &data)?;
        env.report(0, 0)?;

        let secret = match curve {
            EcCurve::P256 => p256::SecretKey::random(&mut RngHandle::new(&mut *env.rng)),
        };
        info!(target: "cryptoframe::keyop", curve = ?curve, "Generated EC key");
        env.report(3, 0)?;

        Ok(AsymKey::from_material(KeyMaterial::ec_private(secret)))
    }

    fn sign(&self, env: &mut OpEnv<'_>, tbs: &[u8]) -> Result<Vec<u8>, KeyOpError> {
        check_digest_len(&settings(env)?, tbs)?;
        let signing = SigningKey::from(secret_of(env.key()?)?);
        let sig: Signature = signing
            .sign_prehash(tbs)
            .map_err(|e| KeyOpError::InvalidParameter(e.to_string()))?;
        Ok(sig.to_bytes().to_vec())
    }

    fn verify(&self, env: &mut OpEnv<'_>, sig: &[u8], tbs: &[u8]) -> Result<(), KeyOpError> {
        check_digest_len(&settings(env)?, tbs)?;
        let public = public_of(env.key()?)?;
        let verifying = VerifyingKey::from(&public);
        let sig = Signature::from_slice(sig).map_err(|_| KeyOpError::BadSignature)?;
        verifying
            .verify_prehash(tbs, &sig)
            .map_err(|_| KeyOpError::BadSignature)
    }

    fn derive(&self, env: &mut OpEnv<'_>) -> Result<Vec<u8>, KeyOpError> {
        let secret = secret_of(env.key()?)?;
        let peer = public_of(env.peer()?)?;
        let shared = p256::ecdh::diffie_hellman(secret.to_nonzero_scalar(), peer.as_affine());
        Ok(shared.raw_secret_bytes().to_vec())
    }

    fn ctrl(&self, env: &mut OpEnv<'_>, ctl: KeyOpCtrl) -> Result<(), KeyOpError> {
        let KeyOpData::Ec(data) = &mut *env.data else {
            return Err(KeyOpError::Backend("EC context without EC data".to_string()));
        };
        match ctl {
            KeyOpCtrl::SetEcParamgenCurve(curve) => data.curve = Some(curve),
            KeyOpCtrl::SetDigest(md) => data.digest = Some(md),
            other => return Err(KeyOpError::UnsupportedControl(format!("{:?}", other))),
        }
        Ok(())
    }

    fn check(&self, key: &AsymKey) -> Result<CheckOutcome, KeyOpError> {
        let secret = secret_of(key)?;
        let stored = public_of(key)?;
        // the scalar is non-zero and below the group order by construction
        if secret.public_key() != stored {
            return Ok(CheckOutcome::fail("public point does not match the private scalar"));
        }
        self.public_check(key)
    }

    fn public_check(&self, key: &AsymKey) -> Result<CheckOutcome, KeyOpError> {
        let public = public_of(key)?;
        let point = public.to_encoded_point(false);
        // cofactor 1: an on-curve point other than the identity has full order
        match p256::PublicKey::from_sec1_bytes(point.as_bytes()) {
            Ok(reparsed) if reparsed == public => Ok(CheckOutcome::pass()),
            Ok(_) => Ok(CheckOutcome::fail("public point does not re-encode")),
            Err(e) => Ok(CheckOutcome::fail(e.to_string())),
        }
    }

    fn param_check(&self, key: &AsymKey) -> Result<CheckOutcome, KeyOpError> {
        match key.ec_curve() {
            Some(EcCurve::P256) => Ok(CheckOutcome::pass()),
            None => Err(mismatch(key)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::algorithms::SHA256;
    use crate::digest::digest;
    use ::rand::rngs::StdRng;
    use ::rand::SeedableRng;

    fn env_parts() -> (KeyOpData, StdRng) {
        (EC_METHOD.new_data(), StdRng::seed_from_u64(42))
    }

    #[test]
    fn test_paramgen_requires_curve() {
        let (mut data, mut rng) = env_parts();
        let mut env = OpEnv::new(Operation::ParamGen, &mut data, None, None, &mut rng, None);
        assert!(matches!(
            EC_METHOD.paramgen(&mut env),
            Err(KeyOpError::InvalidParameter(_))
        ));

        EC_METHOD
            .ctrl(&mut env, KeyOpCtrl::SetEcParamgenCurve(EcCurve::P256))
            .unwrap();
        let params = EC_METHOD.paramgen(&mut env).unwrap();
        assert!(params.is_params_only());
        assert!(EC_METHOD.param_check(&params).unwrap().passed);
    }

    #[test]
    fn test_keygen_from_params_sign_verify() {
        let params = AsymKey::from_material(KeyMaterial::EcParams(EcCurve::P256));
        let (mut data, mut rng) = env_parts();
        let key = {
            let mut env =
                OpEnv::new(Operation::KeyGen, &mut data, Some(&params), None, &mut rng, None);
            EC_METHOD.keygen(&mut env).unwrap()
        };
        assert!(EC_METHOD.check(&key).unwrap().passed);

        let hash = digest(&SHA256, b"message");
        let mut env = OpEnv::new(Operation::Sign, &mut data, Some(&key), None, &mut rng, None);
        let sig = EC_METHOD.sign(&mut env, &hash).unwrap();
        assert_eq!(sig.len(), 64);
        EC_METHOD.verify(&mut env, &sig, &hash).unwrap();

        let other = digest(&SHA256, b"massage");
        assert_eq!(
            EC_METHOD.verify(&mut env, &sig, &other).unwrap_err(),
            KeyOpError::BadSignature
        );
    }

    #[test]
    fn test_check_needs_private_half() {
        let key = AsymKey::ec_private_from_bytes(&[0x11; 32]).unwrap();
        let public = key.public_key().unwrap();
        assert_eq!(EC_METHOD.check(&public).unwrap_err(), KeyOpError::PrivateKeyRequired);
        assert!(EC_METHOD.public_check(&public).unwrap().passed);
    }

    #[test]
    fn test_check_catches_spliced_pair() {
        let other = AsymKey::ec_private_from_bytes(&[0x22; 32]).unwrap();
        let spliced =
            AsymKey::ec_private_from_parts(&[0x11; 32], &other.public_bytes().unwrap()).unwrap();
        let outcome = EC_METHOD.check(&spliced).unwrap();
        assert!(!outcome.passed);
        // the stored point alone is still a valid curve point
        assert!(EC_METHOD.public_check(&spliced).unwrap().passed);

        let own = AsymKey::ec_public_from_sec1(
            &AsymKey::ec_private_from_bytes(&[0x11; 32]).unwrap().public_bytes().unwrap(),
        )
        .unwrap();
        let matched =
            AsymKey::ec_private_from_parts(&[0x11; 32], &own.public_bytes().unwrap()).unwrap();
        assert!(EC_METHOD.check(&matched).unwrap().passed);
    }
}
