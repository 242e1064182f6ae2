//! Hash-then-sign on top of a [`DigestContext`].
//!
//! ```text
//! DigestContext::sign_init(sha256, key_op)   // key_op moves into the digest context
//!   .update(..) .update(..)
//!   .sign_final()                            // signs a copy; the hash keeps running
//! ```

use super::{DigestContext, DigestDescriptor};
use crate::error::{DigestError, KeyOpError};
use crate::keyop::{KeyOpContext, KeyOpCtrl};

impl DigestContext {
    /// Digest context that signs its running hash with `key_op`.
    pub fn sign_init(
        descriptor: &'static DigestDescriptor,
        mut key_op: KeyOpContext,
    ) -> Result<Self, KeyOpError> {
        key_op.signctx_init()?;
        key_op.ctrl(KeyOpCtrl::SetDigest(descriptor))?;

        let mut ctx = Self::new(descriptor);
        ctx.key_op = Some(Box::new(key_op));
        Ok(ctx)
    }

    pub fn verify_init(
        descriptor: &'static DigestDescriptor,
        mut key_op: KeyOpContext,
    ) -> Result<Self, KeyOpError> {
        key_op.verifyctx_init()?;
        key_op.ctrl(KeyOpCtrl::SetDigest(descriptor))?;

        let mut ctx = Self::new(descriptor);
        ctx.key_op = Some(Box::new(key_op));
        Ok(ctx)
    }

    /// Sign everything hashed so far. The context stays updatable.
    pub fn sign_final(&mut self) -> Result<Vec<u8>, KeyOpError> {
        let mut key_op = self.key_op.take().ok_or(DigestError::NoKeyOp)?;
        let result = key_op.signctx(self);
        self.key_op = Some(key_op);
        result
    }

    pub fn verify_final(&mut self, sig: &[u8]) -> Result<(), KeyOpError> {
        let mut key_op = self.key_op.take().ok_or(DigestError::NoKeyOp)?;
        let result = key_op.verifyctx(sig, self);
        self.key_op = Some(key_op);
        result
    }

    pub fn key_op(&self) -> Option<&KeyOpContext> {
        self.key_op.as_deref()
    }
}
