//! Asymmetric key operations.
//!
//! ## Architecture
//!
//! - [`KeyOpMethod`]: immutable per-algorithm capability table (RSA, EC,
//!   Ed25519, X25519). Every operation has a default that reports
//!   `Unsupported`, so a method only implements what its algorithm can do.
//! - [`KeyOpContext`]: mutable per-session state. Holds the key, an optional
//!   peer key, the current [`Operation`] and algorithm scratch data
//!   ([`KeyOpData`]).
//!
//! ## State machine
//!
//! ```text
//! None --sign_init--> Sign --sign()--> Sign --sign()--> ...
//!      --derive_init--> Derive --derive_set_peer--> Derive --derive()--> ...
//! ```
//!
//! A terminal call that does not match the last `*_init` fails with
//! `OperationNotInitialized`.

pub mod context;
pub mod ec;
pub mod ed25519;
pub mod key;
pub mod rsa;
pub mod x25519;

use std::fmt;

use crate::digest::{DigestContext, DigestDescriptor};
use crate::error::KeyOpError;
use crate::rng::CryptoRngCore;

pub use context::{KeyOpContext, ProgressCallback};
pub use key::{AsymKey, EcCurve, KeyMaterial, KeyType};

use self::ec::EcOpData;
use self::rsa::RsaOpData;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    None,
    ParamGen,
    KeyGen,
    Sign,
    Verify,
    VerifyRecover,
    SignCtx,
    VerifyCtx,
    Encrypt,
    Decrypt,
    Derive,
}

impl Operation {
    pub fn name(self) -> &'static str {
        match self {
            Operation::None => "none",
            Operation::ParamGen => "paramgen",
            Operation::KeyGen => "keygen",
            Operation::Sign => "sign",
            Operation::Verify => "verify",
            Operation::VerifyRecover => "verify_recover",
            Operation::SignCtx => "signctx",
            Operation::VerifyCtx => "verifyctx",
            Operation::Encrypt => "encrypt",
            Operation::Decrypt => "decrypt",
            Operation::Derive => "derive",
        }
    }

    /// Operations that need a key bound before `*_init`.
    pub fn needs_key(self) -> bool {
        !matches!(self, Operation::None | Operation::ParamGen | Operation::KeyGen)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RsaPadding {
    Pkcs1,
    Pss,
    Oaep,
}

impl RsaPadding {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "pkcs1" => Some(RsaPadding::Pkcs1),
            "pss" => Some(RsaPadding::Pss),
            "oaep" => Some(RsaPadding::Oaep),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PssSaltLen {
    /// Salt as long as the digest output
    Digest,
    /// Largest salt the modulus allows
    Max,
    Fixed(usize),
}

/// Typed parameter channel.
#[derive(Debug, Clone, Copy)]
pub enum KeyOpCtrl {
    SetDigest(&'static DigestDescriptor),
    SetRsaPadding(RsaPadding),
    SetRsaPssSaltLen(PssSaltLen),
    SetRsaKeygenBits(usize),
    SetRsaKeygenPublicExponent(u64),
    SetEcParamgenCurve(EcCurve),
    Custom { code: i32, int_arg: i64 },
}

impl KeyOpCtrl {
    /// Parse the string form used by `ctrl_str`.
    pub fn parse(name: &str, value: &str) -> Result<Self, KeyOpError> {
        let invalid = || KeyOpError::InvalidParameter(format!("{}={}", name, value));
        match name {
            "digest" => crate::registry::digest(value)
                .map(KeyOpCtrl::SetDigest)
                .map_err(|e| KeyOpError::InvalidParameter(e.to_string())),
            "rsa_padding_mode" => RsaPadding::from_name(value)
                .map(KeyOpCtrl::SetRsaPadding)
                .ok_or_else(invalid),
            "rsa_pss_saltlen" => match value {
                "digest" => Ok(KeyOpCtrl::SetRsaPssSaltLen(PssSaltLen::Digest)),
                "max" => Ok(KeyOpCtrl::SetRsaPssSaltLen(PssSaltLen::Max)),
                n => n
                    .parse()
                    .map(|n| KeyOpCtrl::SetRsaPssSaltLen(PssSaltLen::Fixed(n)))
                    .map_err(|_| invalid()),
            },
            "rsa_keygen_bits" => value
                .parse()
                .map(KeyOpCtrl::SetRsaKeygenBits)
                .map_err(|_| invalid()),
            "rsa_keygen_pubexp" => value
                .parse()
                .map(KeyOpCtrl::SetRsaKeygenPublicExponent)
                .map_err(|_| invalid()),
            "ec_paramgen_curve" => EcCurve::from_name(value)
                .map(KeyOpCtrl::SetEcParamgenCurve)
                .ok_or_else(invalid),
            other => Err(KeyOpError::UnsupportedControl(other.to_string())),
        }
    }
}

/// Result of a structural key check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub passed: bool,
    pub diagnostic: Option<String>,
}

impl CheckOutcome {
    pub fn pass() -> Self {
        Self {
            passed: true,
            diagnostic: None,
        }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            passed: false,
            diagnostic: Some(reason.into()),
        }
    }
}

/// Progress notification passed to the callback during long operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub operation: Operation,
    /// 0 = starting, 1 = candidate generated, 2 = candidate accepted, 3 = done
    pub phase: u32,
    pub step: u32,
}

/// Algorithm scratch data owned by the context.
#[derive(Debug, Clone, Default)]
pub enum KeyOpData {
    #[default]
    Empty,
    Rsa(RsaOpData),
    Ec(EcOpData),
}

/// Everything a method needs for one call.
pub struct OpEnv<'a> {
    pub operation: Operation,
    pub data: &'a mut KeyOpData,
    pub key: Option<&'a AsymKey>,
    pub peer: Option<&'a AsymKey>,
    pub rng: &'a mut dyn CryptoRngCore,
    progress: Option<&'a mut ProgressCallback>,
}

impl<'a> OpEnv<'a> {
    pub(crate) fn new(
        operation: Operation,
        data: &'a mut KeyOpData,
        key: Option<&'a AsymKey>,
        peer: Option<&'a AsymKey>,
        rng: &'a mut dyn CryptoRngCore,
        progress: Option<&'a mut ProgressCallback>,
    ) -> Self {
        Self {
            operation,
            data,
            key,
            peer,
            rng,
            progress,
        }
    }

    pub fn key(&self) -> Result<&'a AsymKey, KeyOpError> {
        self.key.ok_or(KeyOpError::NoKey)
    }

    pub fn peer(&self) -> Result<&'a AsymKey, KeyOpError> {
        self.peer.ok_or(KeyOpError::NoPeerKey)
    }

    /// Invoke the progress callback; `false` from it cancels the operation.
    pub fn report(&mut self, phase: u32, step: u32) -> Result<(), KeyOpError> {
        let operation = self.operation;
        if let Some(cb) = self.progress.as_deref_mut() {
            if !cb(Progress { operation, phase, step }) {
                return Err(KeyOpError::Cancelled);
            }
        }
        Ok(())
    }
}

/// Per-algorithm capability table.
pub trait KeyOpMethod: Send + Sync {
    fn key_type(&self) -> KeyType;

    fn supports(&self, op: Operation) -> bool;

    /// Scratch data for a fresh context.
    fn new_data(&self) -> KeyOpData {
        KeyOpData::Empty
    }

    /// Hook run by every `*_init` after the generic checks pass.
    fn op_init(&self, _env: &mut OpEnv<'_>) -> Result<(), KeyOpError> {
        Ok(())
    }

    fn paramgen(&self, _env: &mut OpEnv<'_>) -> Result<AsymKey, KeyOpError> {
        Err(KeyOpError::Unsupported("paramgen"))
    }

    fn keygen(&self, _env: &mut OpEnv<'_>) -> Result<AsymKey, KeyOpError> {
        Err(KeyOpError::Unsupported("keygen"))
    }

    fn sign(&self, _env: &mut OpEnv<'_>, _tbs: &[u8]) -> Result<Vec<u8>, KeyOpError> {
        Err(KeyOpError::Unsupported("sign"))
    }

    fn verify(&self, _env: &mut OpEnv<'_>, _sig: &[u8], _tbs: &[u8]) -> Result<(), KeyOpError> {
        Err(KeyOpError::Unsupported("verify"))
    }

    fn verify_recover(&self, _env: &mut OpEnv<'_>, _sig: &[u8]) -> Result<Vec<u8>, KeyOpError> {
        Err(KeyOpError::Unsupported("verify_recover"))
    }

    /// Sign the digest accumulated in `md`. The default finalizes a copy and
    /// hands the result to [`sign`](Self::sign), leaving `md` untouched.
    fn signctx(&self, env: &mut OpEnv<'_>, md: &DigestContext) -> Result<Vec<u8>, KeyOpError> {
        let digest = md.copy().finalize()?;
        self.sign(env, &digest)
    }

    fn verifyctx(
        &self,
        env: &mut OpEnv<'_>,
        sig: &[u8],
        md: &DigestContext,
    ) -> Result<(), KeyOpError> {
        let digest = md.copy().finalize()?;
        self.verify(env, sig, &digest)
    }

    fn encrypt(&self, _env: &mut OpEnv<'_>, _pt: &[u8]) -> Result<Vec<u8>, KeyOpError> {
        Err(KeyOpError::Unsupported("encrypt"))
    }

    fn decrypt(&self, _env: &mut OpEnv<'_>, _ct: &[u8]) -> Result<Vec<u8>, KeyOpError> {
        Err(KeyOpError::Unsupported("decrypt"))
    }

    fn derive(&self, _env: &mut OpEnv<'_>) -> Result<Vec<u8>, KeyOpError> {
        Err(KeyOpError::Unsupported("derive"))
    }

    fn ctrl(&self, _env: &mut OpEnv<'_>, ctl: KeyOpCtrl) -> Result<(), KeyOpError> {
        Err(KeyOpError::UnsupportedControl(format!("{:?}", ctl)))
    }

    fn ctrl_str(&self, env: &mut OpEnv<'_>, name: &str, value: &str) -> Result<(), KeyOpError> {
        let ctl = KeyOpCtrl::parse(name, value)?;
        self.ctrl(env, ctl)
    }

    fn check(&self, _key: &AsymKey) -> Result<CheckOutcome, KeyOpError> {
        Err(KeyOpError::Unsupported("check"))
    }

    fn public_check(&self, _key: &AsymKey) -> Result<CheckOutcome, KeyOpError> {
        Err(KeyOpError::Unsupported("public_check"))
    }

    fn param_check(&self, _key: &AsymKey) -> Result<CheckOutcome, KeyOpError> {
        Err(KeyOpError::Unsupported("param_check"))
    }
}

/// Built-in method for a key type.
pub fn method_for(key_type: KeyType) -> &'static dyn KeyOpMethod {
    match key_type {
        KeyType::Rsa => &rsa::RSA_METHOD,
        KeyType::Ec => &ec::EC_METHOD,
        KeyType::Ed25519 => &ed25519::ED25519_METHOD,
        KeyType::X25519 => &x25519::X25519_METHOD,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ctrl_str_parsing() {
        assert!(matches!(
            KeyOpCtrl::parse("rsa_padding_mode", "pss"),
            Ok(KeyOpCtrl::SetRsaPadding(RsaPadding::Pss))
        ));
        assert!(matches!(
            KeyOpCtrl::parse("rsa_pss_saltlen", "20"),
            Ok(KeyOpCtrl::SetRsaPssSaltLen(PssSaltLen::Fixed(20)))
        ));
        assert!(matches!(
            KeyOpCtrl::parse("rsa_keygen_bits", "3072"),
            Ok(KeyOpCtrl::SetRsaKeygenBits(3072))
        ));
        assert!(matches!(
            KeyOpCtrl::parse("ec_paramgen_curve", "prime256v1"),
            Ok(KeyOpCtrl::SetEcParamgenCurve(EcCurve::P256))
        ));
        match KeyOpCtrl::parse("digest", "sha384") {
            Ok(KeyOpCtrl::SetDigest(md)) => assert_eq!(md.name, "sha384"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_ctrl_str_errors() {
        assert!(matches!(
            KeyOpCtrl::parse("rsa_keygen_bits", "lots"),
            Err(KeyOpError::InvalidParameter(_))
        ));
        assert!(matches!(
            KeyOpCtrl::parse("no_such_knob", "1"),
            Err(KeyOpError::UnsupportedControl(_))
        ));
        assert!(matches!(
            KeyOpCtrl::parse("digest", "whirlpool"),
            Err(KeyOpError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_method_for_matches_key_type() {
        for kt in [KeyType::Rsa, KeyType::Ec, KeyType::Ed25519, KeyType::X25519] {
            assert_eq!(method_for(kt).key_type(), kt);
        }
    }
}
