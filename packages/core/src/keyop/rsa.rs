//! RSA key operations (PKCS#1 v1.5, PSS, OAEP).

use rsa::hazmat::rsa_encrypt;
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, Oaep, Pkcs1v15Encrypt, Pkcs1v15Sign, Pss, RsaPrivateKey, RsaPublicKey};
use sha2::{Sha224, Sha256, Sha384, Sha512, Sha512_224, Sha512_256};
use tracing::info;

use super::{
    AsymKey, CheckOutcome, KeyMaterial, KeyOpCtrl, KeyOpData, KeyOpMethod, KeyType, OpEnv,
    Operation, PssSaltLen, RsaPadding,
};
use crate::config::Config;
use crate::digest::algorithms::SHA256;
use crate::digest::DigestDescriptor;
use crate::error::KeyOpError;
use crate::rng::RngHandle;

/// Per-context RSA settings, adjusted through `ctrl`.
#[derive(Debug, Clone, Copy)]
pub struct RsaOpData {
    pub padding: RsaPadding,
    pub digest: Option<&'static DigestDescriptor>,
    pub pss_salt: PssSaltLen,
    pub keygen_bits: usize,
    pub keygen_exponent: u64,
}

impl Default for RsaOpData {
    fn default() -> Self {
        let config = Config::global();
        Self {
            padding: RsaPadding::Pkcs1,
            digest: None,
            pss_salt: PssSaltLen::Digest,
            keygen_bits: config.rsa_default_bits,
            keygen_exponent: config.rsa_default_public_exponent,
        }
    }
}

pub struct RsaMethod;

pub static RSA_METHOD: RsaMethod = RsaMethod;

fn settings(env: &OpEnv<'_>) -> Result<RsaOpData, KeyOpError> {
    match &*env.data {
        KeyOpData::Rsa(data) => Ok(*data),
        _ => Err(KeyOpError::Backend("RSA context without RSA data".to_string())),
    }
}

fn private_key<'a>(env: &OpEnv<'a>) -> Result<&'a RsaPrivateKey, KeyOpError> {
    match env.key()?.material() {
        KeyMaterial::RsaPrivate(k) => Ok(k),
        KeyMaterial::RsaPublic(_) => Err(KeyOpError::PrivateKeyRequired),
        _ => Err(KeyOpError::KeyTypeMismatch {
            expected: KeyType::Rsa,
            actual: env.key()?.key_type(),
        }),
    }
}

fn public_key<'a>(env: &OpEnv<'a>) -> Result<&'a RsaPublicKey, KeyOpError> {
    public_of(env.key()?)
}

fn public_of(key: &AsymKey) -> Result<&RsaPublicKey, KeyOpError> {
    match key.material() {
        KeyMaterial::RsaPrivate(k) => Ok(k.as_ref()),
        KeyMaterial::RsaPublic(k) => Ok(k),
        _ => Err(KeyOpError::KeyTypeMismatch {
            expected: KeyType::Rsa,
            actual: key.key_type(),
        }),
    }
}

fn unsupported_digest(md: &DigestDescriptor) -> KeyOpError {
    KeyOpError::InvalidParameter(format!("digest {} cannot be used with RSA", md.name))
}

fn pkcs1_sign_scheme(md: Option<&DigestDescriptor>) -> Result<Pkcs1v15Sign, KeyOpError> {
    let Some(md) = md else {
        return Ok(Pkcs1v15Sign::new_unprefixed());
    };
    Ok(match md.nid {
        675 => Pkcs1v15Sign::new::<Sha224>(),
        672 => Pkcs1v15Sign::new::<Sha256>(),
        673 => Pkcs1v15Sign::new::<Sha384>(),
        674 => Pkcs1v15Sign::new::<Sha512>(),
        1094 => Pkcs1v15Sign::new::<Sha512_224>(),
        1095 => Pkcs1v15Sign::new::<Sha512_256>(),
        _ => return Err(unsupported_digest(md)),
    })
}

fn pss_scheme(md: &DigestDescriptor, salt_len: usize) -> Result<Pss, KeyOpError> {
    Ok(match md.nid {
        675 => Pss::new_with_salt::<Sha224>(salt_len),
        672 => Pss::new_with_salt::<Sha256>(salt_len),
        673 => Pss::new_with_salt::<Sha384>(salt_len),
        674 => Pss::new_with_salt::<Sha512>(salt_len),
        1094 => Pss::new_with_salt::<Sha512_224>(salt_len),
        1095 => Pss::new_with_salt::<Sha512_256>(salt_len),
        _ => return Err(unsupported_digest(md)),
    })
}

fn oaep_scheme(md: &DigestDescriptor) -> Result<Oaep, KeyOpError> {
    Ok(match md.nid {
        675 => Oaep::new::<Sha224>(),
        672 => Oaep::new::<Sha256>(),
        673 => Oaep::new::<Sha384>(),
        674 => Oaep::new::<Sha512>(),
        1094 => Oaep::new::<Sha512_224>(),
        1095 => Oaep::new::<Sha512_256>(),
        _ => return Err(unsupported_digest(md)),
    })
}

/// Salt length in bytes for a PSS operation with a `bits`-bit modulus.
fn pss_salt_len(salt: PssSaltLen, md: &DigestDescriptor, bits: usize) -> Result<usize, KeyOpError> {
    let em_len = (bits + 6) / 8;
    let max = em_len
        .checked_sub(md.md_size + 2)
        .ok_or_else(|| KeyOpError::InvalidParameter("modulus too small for PSS".to_string()))?;
    match salt {
        PssSaltLen::Digest => Ok(md.md_size.min(max)),
        PssSaltLen::Max => Ok(max),
        PssSaltLen::Fixed(n) if n <= max => Ok(n),
        PssSaltLen::Fixed(n) => Err(KeyOpError::InvalidParameter(format!(
            "PSS salt length {} exceeds maximum {}",
            n, max
        ))),
    }
}

fn check_digest_len(data: &RsaOpData, tbs: &[u8]) -> Result<(), KeyOpError> {
    if let Some(md) = data.digest {
        if tbs.len() != md.md_size {
            return Err(KeyOpError::InvalidParameter(format!(
                "input is {} bytes, {} produces {}",
                tbs.len(),
                md.name,
                md.md_size
            )));
        }
    }
    Ok(())
}

/// Undo the PKCS#1 type-1 block `00 01 FF.. 00 payload`.
fn strip_type1_padding(em: &[u8]) -> Result<&[u8], KeyOpError> {
    if em.len() < 11 || em[0] != 0x00 || em[1] != 0x01 {
        return Err(KeyOpError::BadSignature);
    }
    let sep = em[2..]
        .iter()
        .position(|&b| b != 0xff)
        .map(|i| i + 2)
        .ok_or(KeyOpError::BadSignature)?;
    if em[sep] != 0x00 || sep < 10 {
        return Err(KeyOpError::BadSignature);
    }
    Ok(&em[sep + 1..])
}

fn bit_bounds(bits: usize) -> Option<String> {
    let config = Config::global();
    if bits < config.rsa_min_bits {
        Some(format!("modulus of {} bits is below minimum {}", bits, config.rsa_min_bits))
    } else if bits > config.rsa_max_bits {
        Some(format!("modulus of {} bits exceeds maximum {}", bits, config.rsa_max_bits))
    } else {
        None
    }
}

fn exponent_problem(e: &BigUint) -> Option<String> {
    let odd = e.to_bytes_le().first().map_or(false, |b| b & 1 == 1);
    if *e < BigUint::from(3u32) || !odd {
        Some("public exponent must be odd and at least 3".to_string())
    } else {
        None
    }
}

impl KeyOpMethod for RsaMethod {
    fn key_type(&self) -> KeyType {
        KeyType::Rsa
    }

    fn supports(&self, op: Operation) -> bool {
        matches!(
            op,
            Operation::KeyGen
                | Operation::Sign
                | Operation::Verify
                | Operation::VerifyRecover
                | Operation::SignCtx
                | Operation::VerifyCtx
                | Operation::Encrypt
                | Operation::Decrypt
        )
    }

    fn new_data(&self) -> KeyOpData {
        KeyOpData::Rsa(RsaOpData::default())
    }

    fn keygen(&self, env: &mut OpEnv<'_>) -> Result<AsymKey, KeyOpError> {
        let data = settings(env)?;
        if let Some(problem) = bit_bounds(data.keygen_bits) {
            return Err(KeyOpError::InvalidParameter(problem));
        }
        let exponent = BigUint::from(data.keygen_exponent);
        if let Some(problem) = exponent_problem(&exponent) {
            return Err(KeyOpError::InvalidParameter(problem));
        }

        env.report(0, 0)?;
        info!(
            target: "cryptoframe::keyop",
            bits = data.keygen_bits,
            exponent = data.keygen_exponent,
            "Generating RSA key"
        );
        let key = RsaPrivateKey::new_with_exp(
            &mut RngHandle::new(&mut *env.rng),
            data.keygen_bits,
            &exponent,
        )?;
        env.report(3, 0)?;

        Ok(AsymKey::from(key))
    }

    fn sign(&self, env: &mut OpEnv<'_>, tbs: &[u8]) -> Result<Vec<u8>, KeyOpError> {
        let data = settings(env)?;
        let key = private_key(env)?;
        check_digest_len(&data, tbs)?;

        let mut rng = RngHandle::new(&mut *env.rng);
        match data.padding {
            RsaPadding::Pkcs1 => Ok(key.sign_with_rng(&mut rng, pkcs1_sign_scheme(data.digest)?, tbs)?),
            RsaPadding::Pss => {
                let md = data.digest.unwrap_or(&SHA256);
                let salt = pss_salt_len(data.pss_salt, md, key.n().bits())?;
                Ok(key.sign_with_rng(&mut rng, pss_scheme(md, salt)?, tbs)?)
            }
            RsaPadding::Oaep => Err(KeyOpError::InvalidParameter(
                "OAEP padding cannot be used for signatures".to_string(),
            )),
        }
    }

    fn verify(&self, env: &mut OpEnv<'_>, sig: &[u8], tbs: &[u8]) -> Result<(), KeyOpError> {
        let data = settings(env)?;
        let key = public_key(env)?;
        check_digest_len(&data, tbs)?;

        match data.padding {
            RsaPadding::Pkcs1 => Ok(key.verify(pkcs1_sign_scheme(data.digest)?, tbs, sig)?),
            RsaPadding::Pss => {
                let md = data.digest.unwrap_or(&SHA256);
                let salt = pss_salt_len(data.pss_salt, md, key.n().bits())?;
                Ok(key.verify(pss_scheme(md, salt)?, tbs, sig)?)
            }
            RsaPadding::Oaep => Err(KeyOpError::InvalidParameter(
                "OAEP padding cannot be used for signatures".to_string(),
            )),
        }
    }

    fn verify_recover(&self, env: &mut OpEnv<'_>, sig: &[u8]) -> Result<Vec<u8>, KeyOpError> {
        let data = settings(env)?;
        if data.padding != RsaPadding::Pkcs1 {
            return Err(KeyOpError::InvalidParameter(
                "verify_recover needs PKCS#1 v1.5 padding".to_string(),
            ));
        }
        let key = public_key(env)?;
        let k = key.size();
        if sig.len() != k {
            return Err(KeyOpError::BadSignature);
        }
        let c = BigUint::from_bytes_be(sig);
        if &c >= key.n() {
            return Err(KeyOpError::BadSignature);
        }

        let m = rsa_encrypt(key, &c)?.to_bytes_be();
        if m.len() > k {
            return Err(KeyOpError::BadSignature);
        }
        let mut em = vec![0u8; k];
        em[k - m.len()..].copy_from_slice(&m);
        let payload = strip_type1_padding(&em)?;

        let Some(md) = data.digest else {
            return Ok(payload.to_vec());
        };
        let scheme = pkcs1_sign_scheme(Some(md))?;
        match payload.strip_prefix(&scheme.prefix[..]) {
            Some(hash) if hash.len() == md.md_size => Ok(hash.to_vec()),
            _ => Err(KeyOpError::BadSignature),
        }
    }

    fn encrypt(&self, env: &mut OpEnv<'_>, pt: &[u8]) -> Result<Vec<u8>, KeyOpError> {
        let data = settings(env)?;
        let key = public_key(env)?;
        let mut rng = RngHandle::new(&mut *env.rng);
        match data.padding {
            RsaPadding::Pkcs1 => Ok(key.encrypt(&mut rng, Pkcs1v15Encrypt, pt)?),
            RsaPadding::Oaep => {
                let scheme = oaep_scheme(data.digest.unwrap_or(&SHA256))?;
                Ok(key.encrypt(&mut rng, scheme, pt)?)
            }
            RsaPadding::Pss => Err(KeyOpError::InvalidParameter(
                "PSS padding cannot be used for encryption".to_string(),
            )),
        }
    }

    fn decrypt(&self, env: &mut OpEnv<'_>, ct: &[u8]) -> Result<Vec<u8>, KeyOpError> {
        let data = settings(env)?;
        let key = private_key(env)?;
        let mut rng = RngHandle::new(&mut *env.rng);
        match data.padding {
            RsaPadding::Pkcs1 => Ok(key.decrypt_blinded(&mut rng, Pkcs1v15Encrypt, ct)?),
            RsaPadding::Oaep => {
                let scheme = oaep_scheme(data.digest.unwrap_or(&SHA256))?;
                Ok(key.decrypt_blinded(&mut rng, scheme, ct)?)
            }
            RsaPadding::Pss => Err(KeyOpError::InvalidParameter(
                "PSS padding cannot be used for encryption".to_string(),
            )),
        }
    }

    fn ctrl(&self, env: &mut OpEnv<'_>, ctl: KeyOpCtrl) -> Result<(), KeyOpError> {
        let KeyOpData::Rsa(data) = &mut *env.data else {
            return Err(KeyOpError::Backend("RSA context without RSA data".to_string()));
        };
        match ctl {
            KeyOpCtrl::SetDigest(md) => {
                if md.xof {
                    return Err(unsupported_digest(md));
                }
                data.digest = Some(md);
            }
            KeyOpCtrl::SetRsaPadding(padding) => data.padding = padding,
            KeyOpCtrl::SetRsaPssSaltLen(salt) => data.pss_salt = salt,
            KeyOpCtrl::SetRsaKeygenBits(bits) => {
                if let Some(problem) = bit_bounds(bits) {
                    return Err(KeyOpError::InvalidParameter(problem));
                }
                data.keygen_bits = bits;
            }
            KeyOpCtrl::SetRsaKeygenPublicExponent(e) => {
                if let Some(problem) = exponent_problem(&BigUint::from(e)) {
                    return Err(KeyOpError::InvalidParameter(problem));
                }
                data.keygen_exponent = e;
            }
            other => return Err(KeyOpError::UnsupportedControl(format!("{:?}", other))),
        }
        Ok(())
    }

    fn check(&self, key: &AsymKey) -> Result<CheckOutcome, KeyOpError> {
        let private = match key.material() {
            KeyMaterial::RsaPrivate(k) => k,
            KeyMaterial::RsaPublic(_) => return Err(KeyOpError::PrivateKeyRequired),
            _ => {
                return Err(KeyOpError::KeyTypeMismatch {
                    expected: KeyType::Rsa,
                    actual: key.key_type(),
                })
            }
        };
        if let Err(e) = private.validate() {
            return Ok(CheckOutcome::fail(e.to_string()));
        }
        self.public_check(key)
    }

    fn public_check(&self, key: &AsymKey) -> Result<CheckOutcome, KeyOpError> {
        let public = public_of(key)?;
        if let Some(problem) = bit_bounds(public.n().bits()) {
            return Ok(CheckOutcome::fail(problem));
        }
        if let Some(problem) = exponent_problem(public.e()) {
            return Ok(CheckOutcome::fail(problem));
        }
        Ok(CheckOutcome::pass())
    }
}
