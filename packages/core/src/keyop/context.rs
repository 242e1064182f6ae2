use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use super::{
    method_for, AsymKey, CheckOutcome, KeyOpCtrl, KeyOpData, KeyOpMethod, OpEnv, Operation,
    Progress,
};
use crate::digest::DigestContext;
use crate::error::KeyOpError;
use crate::rng::{CryptoRngCore, OsRng};

/// Progress hook; returning `false` aborts the running operation.
pub type ProgressCallback = Box<dyn FnMut(Progress) -> bool + Send>;

/// Per-session asymmetric operation state.
///
/// Every terminal operation must be preceded by the matching `*_init`. After
/// one init the terminal call may be repeated; all built-in methods are
/// stateless per call, including `derive`.
pub struct KeyOpContext {
    method: &'static dyn KeyOpMethod,
    key: Option<Arc<AsymKey>>,
    peer: Option<Arc<AsymKey>>,
    operation: Operation,
    data: KeyOpData,
    rng: Box<dyn CryptoRngCore + Send>,
    progress: Option<ProgressCallback>,
}

impl KeyOpContext {
    /// Context without a key, for keygen and paramgen.
    pub fn new(method: &'static dyn KeyOpMethod) -> Self {
        Self {
            method,
            key: None,
            peer: None,
            operation: Operation::None,
            data: method.new_data(),
            rng: Box::new(OsRng),
            progress: None,
        }
    }

    /// Context bound to `key`; the method is picked from the key type.
    pub fn for_key(key: Arc<AsymKey>) -> Self {
        let mut ctx = Self::new(method_for(key.key_type()));
        ctx.key = Some(key);
        ctx
    }

    /// Replace the default OS generator.
    pub fn with_rng<R>(mut self, rng: R) -> Self
    where
        R: CryptoRngCore + Send + 'static,
    {
        self.rng = Box::new(rng);
        self
    }

    pub fn set_progress_callback<F>(&mut self, callback: F)
    where
        F: FnMut(Progress) -> bool + Send + 'static,
    {
        self.progress = Some(Box::new(callback));
    }

    pub fn method(&self) -> &'static dyn KeyOpMethod {
        self.method
    }

    pub fn key(&self) -> Option<&Arc<AsymKey>> {
        self.key.as_ref()
    }

    pub fn peer(&self) -> Option<&Arc<AsymKey>> {
        self.peer.as_ref()
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    fn env(&mut self, operation: Operation) -> OpEnv<'_> {
        OpEnv::new(
            operation,
            &mut self.data,
            self.key.as_deref(),
            self.peer.as_deref(),
            &mut *self.rng,
            self.progress.as_mut(),
        )
    }

    fn init_op(&mut self, op: Operation) -> Result<(), KeyOpError> {
        let method = self.method;
        if !method.supports(op) {
            return Err(KeyOpError::Unsupported(op.name()));
        }
        if op.needs_key() && self.key.is_none() {
            return Err(KeyOpError::NoKey);
        }

        self.operation = Operation::None;
        method.op_init(&mut self.env(op))?;
        self.operation = op;

        debug!(
            target: "cryptoframe::keyop",
            key_type = %method.key_type(),
            operation = %op,
            "Key operation initialized"
        );
        Ok(())
    }

    fn expect_op(&self, expected: Operation) -> Result<(), KeyOpError> {
        if self.operation != expected {
            return Err(KeyOpError::OperationNotInitialized {
                expected,
                actual: self.operation,
            });
        }
        Ok(())
    }

    // ============================================
    // Генерация параметров и ключей
    // ============================================

    pub fn paramgen_init(&mut self) -> Result<(), KeyOpError> {
        self.init_op(Operation::ParamGen)
    }

    pub fn paramgen(&mut self) -> Result<AsymKey, KeyOpError> {
        self.expect_op(Operation::ParamGen)?;
        let method = self.method;
        let result = method.paramgen(&mut self.env(Operation::ParamGen));
        if let Err(e) = &result {
            warn!(target: "cryptoframe::keyop", error = %e, "Parameter generation failed");
        }
        result
    }

    pub fn keygen_init(&mut self) -> Result<(), KeyOpError> {
        self.init_op(Operation::KeyGen)
    }

    pub fn keygen(&mut self) -> Result<AsymKey, KeyOpError> {
        self.expect_op(Operation::KeyGen)?;
        let method = self.method;
        let result = method.keygen(&mut self.env(Operation::KeyGen));
        if let Err(e) = &result {
            warn!(target: "cryptoframe::keyop", error = %e, "Key generation failed");
        }
        result
    }

    // ============================================
    // Подпись и проверка
    // ============================================

    pub fn sign_init(&mut self) -> Result<(), KeyOpError> {
        self.init_op(Operation::Sign)
    }

    pub fn sign(&mut self, tbs: &[u8]) -> Result<Vec<u8>, KeyOpError> {
        self.expect_op(Operation::Sign)?;
        let method = self.method;
        method.sign(&mut self.env(Operation::Sign), tbs)
    }

    pub fn verify_init(&mut self) -> Result<(), KeyOpError> {
        self.init_op(Operation::Verify)
    }

    /// `Ok(())` on a valid signature, `BadSignature` otherwise.
    pub fn verify(&mut self, sig: &[u8], tbs: &[u8]) -> Result<(), KeyOpError> {
        self.expect_op(Operation::Verify)?;
        let method = self.method;
        method.verify(&mut self.env(Operation::Verify), sig, tbs)
    }

    pub fn verify_recover_init(&mut self) -> Result<(), KeyOpError> {
        self.init_op(Operation::VerifyRecover)
    }

    pub fn verify_recover(&mut self, sig: &[u8]) -> Result<Vec<u8>, KeyOpError> {
        self.expect_op(Operation::VerifyRecover)?;
        let method = self.method;
        method.verify_recover(&mut self.env(Operation::VerifyRecover), sig)
    }

    pub fn signctx_init(&mut self) -> Result<(), KeyOpError> {
        self.init_op(Operation::SignCtx)
    }

    /// Sign whatever `md` has accumulated so far. `md` itself is not consumed.
    pub fn signctx(&mut self, md: &DigestContext) -> Result<Vec<u8>, KeyOpError> {
        self.expect_op(Operation::SignCtx)?;
        let method = self.method;
        method.signctx(&mut self.env(Operation::SignCtx), md)
    }

    pub fn verifyctx_init(&mut self) -> Result<(), KeyOpError> {
        self.init_op(Operation::VerifyCtx)
    }

    pub fn verifyctx(&mut self, sig: &[u8], md: &DigestContext) -> Result<(), KeyOpError> {
        self.expect_op(Operation::VerifyCtx)?;
        let method = self.method;
        method.verifyctx(&mut self.env(Operation::VerifyCtx), sig, md)
    }

    // ============================================
    // Шифрование
    // ============================================

    pub fn encrypt_init(&mut self) -> Result<(), KeyOpError> {
        self.init_op(Operation::Encrypt)
    }

    pub fn encrypt(&mut self, pt: &[u8]) -> Result<Vec<u8>, KeyOpError> {
        self.expect_op(Operation::Encrypt)?;
        let method = self.method;
        method.encrypt(&mut self.env(Operation::Encrypt), pt)
    }

    pub fn decrypt_init(&mut self) -> Result<(), KeyOpError> {
        self.init_op(Operation::Decrypt)
    }

    pub fn decrypt(&mut self, ct: &[u8]) -> Result<Vec<u8>, KeyOpError> {
        self.expect_op(Operation::Decrypt)?;
        let method = self.method;
        method.decrypt(&mut self.env(Operation::Decrypt), ct)
    }

    // ============================================
    // Согласование ключей
    // ============================================

    pub fn derive_init(&mut self) -> Result<(), KeyOpError> {
        self.init_op(Operation::Derive)?;
        self.peer = None;
        Ok(())
    }

    /// Bind the peer's public key. Type and curve must match the local key.
    pub fn derive_set_peer(&mut self, peer: Arc<AsymKey>) -> Result<(), KeyOpError> {
        self.expect_op(Operation::Derive)?;
        let key = self.key.as_ref().ok_or(KeyOpError::NoKey)?;

        if peer.key_type() != key.key_type() {
            return Err(KeyOpError::KeyTypeMismatch {
                expected: key.key_type(),
                actual: peer.key_type(),
            });
        }
        if peer.is_params_only() {
            return Err(KeyOpError::NoPeerKey);
        }
        if key.ec_curve() != peer.ec_curve() {
            return Err(KeyOpError::InvalidParameter(
                "peer key is on a different curve".to_string(),
            ));
        }

        self.peer = Some(peer);
        Ok(())
    }

    pub fn derive(&mut self) -> Result<Vec<u8>, KeyOpError> {
        self.expect_op(Operation::Derive)?;
        if self.peer.is_none() {
            return Err(KeyOpError::NoPeerKey);
        }
        let method = self.method;
        method.derive(&mut self.env(Operation::Derive))
    }

    // ============================================
    // Параметры и проверки
    // ============================================

    pub fn ctrl(&mut self, ctl: KeyOpCtrl) -> Result<(), KeyOpError> {
        let method = self.method;
        let op = self.operation;
        method.ctrl(&mut self.env(op), ctl)
    }

    pub fn ctrl_str(&mut self, name: &str, value: &str) -> Result<(), KeyOpError> {
        let method = self.method;
        let op = self.operation;
        method.ctrl_str(&mut self.env(op), name, value)
    }

    /// Full key consistency check, private half included.
    pub fn check(&self) -> Result<CheckOutcome, KeyOpError> {
        let key = self.key.as_ref().ok_or(KeyOpError::NoKey)?;
        self.method.check(key)
    }

    pub fn public_check(&self) -> Result<CheckOutcome, KeyOpError> {
        let key = self.key.as_ref().ok_or(KeyOpError::NoKey)?;
        self.method.public_check(key)
    }

    pub fn param_check(&self) -> Result<CheckOutcome, KeyOpError> {
        let key = self.key.as_ref().ok_or(KeyOpError::NoKey)?;
        self.method.param_check(key)
    }
}

impl fmt::Debug for KeyOpContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyOpContext")
            .field("key_type", &self.method.key_type())
            .field("operation", &self.operation)
            .field("key", &self.key)
            .field("peer", &self.peer.is_some())
            .finish()
    }
}
