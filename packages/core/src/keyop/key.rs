//! Typed asymmetric key container.
//!
//! Private material lives inside the backing crates' key types, all of which
//! wipe themselves on drop.

use std::fmt;

use ed25519_dalek::{SigningKey, VerifyingKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};

use crate::error::KeyOpError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    Rsa,
    Ec,
    Ed25519,
    X25519,
}

impl KeyType {
    pub fn nid(self) -> u32 {
        match self {
            KeyType::Rsa => 6,
            KeyType::Ec => 408,
            KeyType::X25519 => 1034,
            KeyType::Ed25519 => 1087,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            KeyType::Rsa => "rsa",
            KeyType::Ec => "ec",
            KeyType::Ed25519 => "ed25519",
            KeyType::X25519 => "x25519",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Named curves accepted for EC keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EcCurve {
    P256,
}

impl EcCurve {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "p-256" | "p256" | "prime256v1" | "secp256r1" => Some(EcCurve::P256),
            _ => None,
        }
    }

    pub fn nid(self) -> u32 {
        match self {
            EcCurve::P256 => 415,
        }
    }

    pub fn bits(self) -> usize {
        match self {
            EcCurve::P256 => 256,
        }
    }
}

#[derive(Clone)]
pub enum KeyMaterial {
    RsaPrivate(RsaPrivateKey),
    RsaPublic(RsaPublicKey),
    /// Domain parameters only, produced by EC paramgen
    EcParams(EcCurve),
    /// Scalar plus the public point it was imported or generated with
    EcPrivate {
        secret: p256::SecretKey,
        public: p256::PublicKey,
    },
    EcPublic(p256::PublicKey),
    Ed25519Private(SigningKey),
    Ed25519Public(VerifyingKey),
    X25519Private(StaticSecret),
    X25519Public(X25519Public),
}

impl KeyMaterial {
    /// EC private material with its public point derived from the scalar.
    pub fn ec_private(secret: p256::SecretKey) -> Self {
        let public = secret.public_key();
        KeyMaterial::EcPrivate { secret, public }
    }
}

#[derive(Clone)]
pub struct AsymKey {
    material: KeyMaterial,
}

impl AsymKey {
    pub fn from_material(material: KeyMaterial) -> Self {
        Self { material }
    }

    pub fn material(&self) -> &KeyMaterial {
        &self.material
    }

    pub fn key_type(&self) -> KeyType {
        match &self.material {
            KeyMaterial::RsaPrivate(_) | KeyMaterial::RsaPublic(_) => KeyType::Rsa,
            KeyMaterial::EcParams(_)
            | KeyMaterial::EcPrivate { .. }
            | KeyMaterial::EcPublic(_) => KeyType::Ec,
            KeyMaterial::Ed25519Private(_) | KeyMaterial::Ed25519Public(_) => KeyType::Ed25519,
            KeyMaterial::X25519Private(_) | KeyMaterial::X25519Public(_) => KeyType::X25519,
        }
    }

    pub fn has_private(&self) -> bool {
        matches!(
            self.material,
            KeyMaterial::RsaPrivate(_)
                | KeyMaterial::EcPrivate { .. }
                | KeyMaterial::Ed25519Private(_)
                | KeyMaterial::X25519Private(_)
        )
    }

    pub fn is_params_only(&self) -> bool {
        matches!(self.material, KeyMaterial::EcParams(_))
    }

    pub fn ec_curve(&self) -> Option<EcCurve> {
        match &self.material {
            KeyMaterial::EcParams(c) => Some(*c),
            KeyMaterial::EcPrivate { .. } | KeyMaterial::EcPublic(_) => Some(EcCurve::P256),
            _ => None,
        }
    }

    /// Security-relevant size: modulus bits for RSA, group order bits otherwise.
    pub fn bits(&self) -> usize {
        match &self.material {
            KeyMaterial::RsaPrivate(k) => k.n().bits(),
            KeyMaterial::RsaPublic(k) => k.n().bits(),
            KeyMaterial::EcParams(c) => c.bits(),
            KeyMaterial::EcPrivate { .. } | KeyMaterial::EcPublic(_) => EcCurve::P256.bits(),
            KeyMaterial::Ed25519Private(_) | KeyMaterial::Ed25519Public(_) => 256,
            KeyMaterial::X25519Private(_) | KeyMaterial::X25519Public(_) => 253,
        }
    }

    /// Public half of this key.
    pub fn public_key(&self) -> Result<AsymKey, KeyOpError> {
        let material = match &self.material {
            KeyMaterial::RsaPrivate(k) => KeyMaterial::RsaPublic(k.to_public_key()),
            KeyMaterial::RsaPublic(k) => KeyMaterial::RsaPublic(k.clone()),
            KeyMaterial::EcParams(_) => return Err(KeyOpError::NoKey),
            KeyMaterial::EcPrivate { public, .. } => KeyMaterial::EcPublic(public.clone()),
            KeyMaterial::EcPublic(k) => KeyMaterial::EcPublic(k.clone()),
            KeyMaterial::Ed25519Private(k) => KeyMaterial::Ed25519Public(k.verifying_key()),
            KeyMaterial::Ed25519Public(k) => KeyMaterial::Ed25519Public(*k),
            KeyMaterial::X25519Private(k) => KeyMaterial::X25519Public(X25519Public::from(k)),
            KeyMaterial::X25519Public(k) => KeyMaterial::X25519Public(*k),
        };
        Ok(AsymKey { material })
    }

    /// Raw public encoding: SEC1 uncompressed for EC, 32 bytes for the
    /// Edwards/Montgomery keys, big-endian modulus for RSA.
    pub fn public_bytes(&self) -> Result<Vec<u8>, KeyOpError> {
        Ok(match self.public_key()?.material {
            KeyMaterial::RsaPublic(k) => k.n().to_bytes_be(),
            KeyMaterial::EcPublic(k) => k.to_encoded_point(false).as_bytes().to_vec(),
            KeyMaterial::Ed25519Public(k) => k.to_bytes().to_vec(),
            KeyMaterial::X25519Public(k) => k.to_bytes().to_vec(),
            _ => return Err(KeyOpError::NoKey),
        })
    }

    // ============================================
    // Constructors from raw material
    // ============================================

    pub fn rsa_public_from_components(n: &[u8], e: &[u8]) -> Result<Self, KeyOpError> {
        let key = RsaPublicKey::new(BigUint::from_bytes_be(n), BigUint::from_bytes_be(e))?;
        Ok(Self::from_material(KeyMaterial::RsaPublic(key)))
    }

    pub fn ec_private_from_bytes(scalar: &[u8]) -> Result<Self, KeyOpError> {
        let secret = p256::SecretKey::from_slice(scalar)?;
        Ok(Self::from_material(KeyMaterial::ec_private(secret)))
    }

    /// Scalar and SEC1 public point imported side by side. The pair is not
    /// cross-checked here; `check` does that.
    pub fn ec_private_from_parts(scalar: &[u8], public_sec1: &[u8]) -> Result<Self, KeyOpError> {
        let secret = p256::SecretKey::from_slice(scalar)?;
        let public = p256::PublicKey::from_sec1_bytes(public_sec1)?;
        Ok(Self::from_material(KeyMaterial::EcPrivate { secret, public }))
    }

    pub fn ec_public_from_sec1(bytes: &[u8]) -> Result<Self, KeyOpError> {
        let key = p256::PublicKey::from_sec1_bytes(bytes)?;
        Ok(Self::from_material(KeyMaterial::EcPublic(key)))
    }

    pub fn ed25519_private_from_bytes(seed: &[u8]) -> Result<Self, KeyOpError> {
        let seed: [u8; 32] = seed
            .try_into()
            .map_err(|_| KeyOpError::InvalidParameter("Ed25519 seed must be 32 bytes".to_string()))?;
        Ok(Self::from_material(KeyMaterial::Ed25519Private(
            SigningKey::from_bytes(&seed),
        )))
    }

    pub fn ed25519_public_from_bytes(bytes: &[u8]) -> Result<Self, KeyOpError> {
        let bytes: &[u8; 32] = bytes.try_into().map_err(|_| {
            KeyOpError::InvalidParameter("Ed25519 public key must be 32 bytes".to_string())
        })?;
        let key = VerifyingKey::from_bytes(bytes)
            .map_err(|e| KeyOpError::Backend(e.to_string()))?;
        Ok(Self::from_material(KeyMaterial::Ed25519Public(key)))
    }

    pub fn x25519_private_from_bytes(bytes: &[u8]) -> Result<Self, KeyOpError> {
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| {
            KeyOpError::InvalidParameter("X25519 private key must be 32 bytes".to_string())
        })?;
        Ok(Self::from_material(KeyMaterial::X25519Private(
            StaticSecret::from(bytes),
        )))
    }

    pub fn x25519_public_from_bytes(bytes: &[u8]) -> Result<Self, KeyOpError> {
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| {
            KeyOpError::InvalidParameter("X25519 public key must be 32 bytes".to_string())
        })?;
        Ok(Self::from_material(KeyMaterial::X25519Public(
            X25519Public::from(bytes),
        )))
    }
}

impl From<RsaPrivateKey> for AsymKey {
    fn from(key: RsaPrivateKey) -> Self {
        Self::from_material(KeyMaterial::RsaPrivate(key))
    }
}

impl From<RsaPublicKey> for AsymKey {
    fn from(key: RsaPublicKey) -> Self {
        Self::from_material(KeyMaterial::RsaPublic(key))
    }
}

impl fmt::Debug for AsymKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsymKey")
            .field("type", &self.key_type())
            .field("bits", &self.bits())
            .field("private", &self.has_private())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_hides_secrets() {
        let key = AsymKey::x25519_private_from_bytes(&[0x42; 32]).unwrap();
        let shown = format!("{:?}", key);
        assert!(shown.contains("X25519"));
        assert!(!shown.contains("42, 42"));
    }

    #[test]
    fn test_public_key_drops_private_half() {
        let key = AsymKey::ed25519_private_from_bytes(&[7u8; 32]).unwrap();
        assert!(key.has_private());
        let public = key.public_key().unwrap();
        assert!(!public.has_private());
        assert_eq!(public.key_type(), KeyType::Ed25519);
        assert_eq!(public.public_bytes().unwrap().len(), 32);
    }

    #[test]
    fn test_params_only_key_has_no_public_half() {
        let params = AsymKey::from_material(KeyMaterial::EcParams(EcCurve::P256));
        assert!(params.is_params_only());
        assert_eq!(params.public_key().unwrap_err(), KeyOpError::NoKey);
        assert_eq!(params.bits(), 256);
    }

    #[test]
    fn test_curve_names() {
        assert_eq!(EcCurve::from_name("prime256v1"), Some(EcCurve::P256));
        assert_eq!(EcCurve::from_name("P-256"), Some(EcCurve::P256));
        assert_eq!(EcCurve::from_name("secp384r1"), None);
    }

    #[test]
    fn test_wrong_raw_lengths_rejected() {
        assert!(matches!(
            AsymKey::x25519_public_from_bytes(&[0u8; 31]),
            Err(KeyOpError::InvalidParameter(_))
        ));
        assert!(AsymKey::ec_public_from_sec1(&[4u8; 10]).is_err());
    }

    #[test]
    fn test_ec_public_half_is_the_stored_point() {
        let a = AsymKey::ec_private_from_bytes(&[1u8; 32]).unwrap();
        let b = AsymKey::ec_private_from_bytes(&[2u8; 32]).unwrap();
        let spliced =
            AsymKey::ec_private_from_parts(&[1u8; 32], &b.public_bytes().unwrap()).unwrap();

        assert_eq!(spliced.public_bytes().unwrap(), b.public_bytes().unwrap());
        assert_ne!(spliced.public_bytes().unwrap(), a.public_bytes().unwrap());
    }
}
