//! Name and numeric-id lookup of the built-in descriptors.
//!
//! The tables are built once on first use and are read-only afterwards.
//! Names are matched case-insensitively.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use tracing::debug;

use crate::aead::{self, AeadDescriptor};
use crate::cipher::{aes, CipherDescriptor};
use crate::digest::{algorithms, DigestDescriptor};
use crate::error::RegistryError;
use crate::keyop::{method_for, KeyOpMethod, KeyType};

const CIPHER_ALIASES: &[(&str, &str)] = &[
    ("aes128", "aes-128-cbc"),
    ("aes192", "aes-192-cbc"),
    ("aes256", "aes-256-cbc"),
    ("aes-128-cfb128", "aes-128-cfb"),
    ("aes-192-cfb128", "aes-192-cfb"),
    ("aes-256-cfb128", "aes-256-cfb"),
];

const KEY_TYPES: [KeyType; 4] = [KeyType::Rsa, KeyType::Ec, KeyType::Ed25519, KeyType::X25519];

struct Table<T: 'static> {
    by_name: HashMap<String, &'static T>,
    by_nid: HashMap<u32, &'static T>,
}

impl<T: 'static> Table<T> {
    fn build(items: impl IntoIterator<Item = (&'static str, u32, &'static T)>) -> Self {
        let mut by_name = HashMap::new();
        let mut by_nid = HashMap::new();
        for (name, nid, item) in items {
            by_name.insert(name.to_ascii_lowercase(), item);
            // nid 0 means "no assigned id"
            if nid != 0 {
                by_nid.insert(nid, item);
            }
        }
        Self { by_name, by_nid }
    }

    fn name(&self, name: &str) -> Option<&'static T> {
        self.by_name.get(&name.to_ascii_lowercase()).copied()
    }

    fn nid(&self, nid: u32) -> Option<&'static T> {
        self.by_nid.get(&nid).copied()
    }
}

struct Registry {
    ciphers: Table<CipherDescriptor>,
    digests: Table<DigestDescriptor>,
    aeads: Table<AeadDescriptor>,
}

impl Registry {
    fn builtin() -> Self {
        let mut ciphers = Table::build(aes::ALL.iter().map(|d| (d.name, d.nid, *d)));
        for (alias, target) in CIPHER_ALIASES {
            if let Some(desc) = ciphers.name(target) {
                ciphers.by_name.insert(alias.to_string(), desc);
            }
        }
        let digests = Table::build(algorithms::all().into_iter().map(|d| (d.name, d.nid, d)));
        let aeads = Table::build(aead::ALL.iter().map(|d| (d.name, d.nid, *d)));

        debug!(
            target: "cryptoframe::registry",
            ciphers = ciphers.by_name.len(),
            digests = digests.by_name.len(),
            aeads = aeads.by_name.len(),
            "Algorithm registry populated"
        );

        Self { ciphers, digests, aeads }
    }
}

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::builtin);

fn unknown(name: &str) -> RegistryError {
    RegistryError::Unknown(name.to_string())
}

pub fn cipher(name: &str) -> Result<&'static CipherDescriptor, RegistryError> {
    REGISTRY.ciphers.name(name).ok_or_else(|| unknown(name))
}

pub fn cipher_by_nid(nid: u32) -> Result<&'static CipherDescriptor, RegistryError> {
    REGISTRY.ciphers.nid(nid).ok_or_else(|| unknown(&nid.to_string()))
}

/// Digest by name. Names compiled out by feature flags report `Unsupported`.
pub fn digest(name: &str) -> Result<&'static DigestDescriptor, RegistryError> {
    if let Some(desc) = REGISTRY.digests.name(name) {
        return Ok(desc);
    }
    let lower = name.to_ascii_lowercase();
    if algorithms::KNOWN_NAMES.contains(&lower.as_str()) {
        return Err(RegistryError::Unsupported(lower));
    }
    Err(unknown(name))
}

pub fn digest_by_nid(nid: u32) -> Result<&'static DigestDescriptor, RegistryError> {
    REGISTRY.digests.nid(nid).ok_or_else(|| unknown(&nid.to_string()))
}

pub fn aead(name: &str) -> Result<&'static AeadDescriptor, RegistryError> {
    REGISTRY.aeads.name(name).ok_or_else(|| unknown(name))
}

pub fn aead_by_nid(nid: u32) -> Result<&'static AeadDescriptor, RegistryError> {
    REGISTRY.aeads.nid(nid).ok_or_else(|| unknown(&nid.to_string()))
}

/// Key-operation method by key type name (`rsa`, `ec`, `ed25519`, `x25519`).
pub fn keyop_method(name: &str) -> Result<&'static dyn KeyOpMethod, RegistryError> {
    let lower = name.to_ascii_lowercase();
    KEY_TYPES
        .iter()
        .find(|kt| kt.name() == lower)
        .map(|kt| method_for(*kt))
        .ok_or_else(|| unknown(name))
}

pub fn keyop_method_by_nid(nid: u32) -> Result<&'static dyn KeyOpMethod, RegistryError> {
    KEY_TYPES
        .iter()
        .find(|kt| kt.nid() == nid)
        .map(|kt| method_for(*kt))
        .ok_or_else(|| unknown(&nid.to_string()))
}

pub fn cipher_names() -> Vec<&'static str> {
    let mut names: Vec<_> = aes::ALL.iter().map(|d| d.name).collect();
    names.sort_unstable();
    names
}

pub fn digest_names() -> Vec<&'static str> {
    let mut names: Vec<_> = algorithms::all().into_iter().map(|d| d.name).collect();
    names.sort_unstable();
    names
}

pub fn aead_names() -> Vec<&'static str> {
    let mut names: Vec<_> = aead::ALL.iter().map(|d| d.name).collect();
    names.sort_unstable();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases_resolve_to_same_descriptor() {
        let a = cipher("aes128").unwrap();
        let b = cipher("AES-128-CBC").unwrap();
        assert!(std::ptr::eq(a, b));
        assert_eq!(cipher("aes-256-cfb128").unwrap().name, "aes-256-cfb");
    }

    #[test]
    fn test_nid_lookup() {
        assert_eq!(cipher_by_nid(419).unwrap().name, "aes-128-cbc");
        assert_eq!(digest_by_nid(672).unwrap().name, "sha256");
        assert_eq!(aead_by_nid(1018).unwrap().name, "chacha20-poly1305");
        assert!(cipher_by_nid(0).is_err());
    }

    #[test]
    fn test_unknown_is_distinct_from_unsupported() {
        assert_eq!(
            digest("whirlpool").unwrap_err(),
            RegistryError::Unknown("whirlpool".to_string())
        );
        assert!(matches!(aead("aes-128-ocb"), Err(RegistryError::Unknown(_))));
    }

    #[cfg(not(feature = "legacy-digests"))]
    #[test]
    fn test_compiled_out_digest_is_unsupported() {
        assert_eq!(
            digest("md5").unwrap_err(),
            RegistryError::Unsupported("md5".to_string())
        );
    }

    #[test]
    fn test_keyop_methods() {
        assert_eq!(keyop_method("EC").unwrap().key_type(), KeyType::Ec);
        assert_eq!(keyop_method_by_nid(1087).unwrap().key_type(), KeyType::Ed25519);
        assert!(keyop_method("dsa").is_err());
    }
}
