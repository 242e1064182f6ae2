//! Streaming hash contexts.
//!
//! A [`DigestContext`] owns the running state of one hash bound to an
//! immutable [`DigestDescriptor`]. It can also carry a key-operation context
//! for hash-then-sign flows (see [`signing`]).

pub mod algorithms;
pub mod signing;

use std::fmt;

use tracing::{debug, trace};

use crate::error::DigestError;
use crate::keyop::KeyOpContext;

/// Running state of one hash computation.
pub trait DigestState: Send + Sync {
    fn update(&mut self, data: &[u8]);

    /// Write `out.len()` bytes of output and return to the initial state.
    fn finalize_reset(&mut self, out: &mut [u8]);

    fn reset(&mut self);

    fn box_clone(&self) -> Box<dyn DigestState>;
}

pub struct DigestDescriptor {
    pub name: &'static str,
    pub nid: u32,
    /// Output size; for XOFs this is only the default length
    pub md_size: usize,
    pub block_size: usize,
    pub xof: bool,
    pub new_state: fn() -> Box<dyn DigestState>,
}

impl fmt::Debug for DigestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigestDescriptor")
            .field("name", &self.name)
            .field("nid", &self.nid)
            .field("md_size", &self.md_size)
            .field("block_size", &self.block_size)
            .field("xof", &self.xof)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestControl {
    /// Output length of an extendable-output function
    SetXofLength(usize),
    Custom { code: i32, arg: i64 },
}

pub struct DigestContext {
    descriptor: &'static DigestDescriptor,
    state: Box<dyn DigestState>,
    out_len: usize,
    finalized: bool,
    pub(crate) key_op: Option<Box<KeyOpContext>>,
}

impl DigestContext {
    pub fn new(descriptor: &'static DigestDescriptor) -> Self {
        debug!(
            target: "cryptoframe::digest",
            digest = descriptor.name,
            "Digest context initialized"
        );

        Self {
            descriptor,
            state: (descriptor.new_state)(),
            out_len: descriptor.md_size,
            finalized: false,
            key_op: None,
        }
    }

    /// Return to the empty-input state. Any XOF length setting is kept.
    pub fn init(&mut self) {
        self.state.reset();
        self.finalized = false;
    }

    pub fn descriptor(&self) -> &'static DigestDescriptor {
        self.descriptor
    }

    /// Bytes `finalize` will produce.
    pub fn size(&self) -> usize {
        self.out_len
    }

    pub fn update(&mut self, data: &[u8]) -> Result<(), DigestError> {
        if self.finalized {
            return Err(DigestError::Finalized);
        }
        trace!(
            target: "cryptoframe::digest",
            digest = self.descriptor.name,
            len = data.len(),
            "Digest update"
        );
        self.state.update(data);
        Ok(())
    }

    pub fn finalize(&mut self) -> Result<Vec<u8>, DigestError> {
        let mut out = vec![0u8; self.out_len];
        self.finalize_into(&mut out)?;
        Ok(out)
    }

    pub fn finalize_into(&mut self, out: &mut [u8]) -> Result<usize, DigestError> {
        if self.finalized {
            return Err(DigestError::Finalized);
        }
        if out.len() < self.out_len {
            return Err(DigestError::BufferTooSmall {
                needed: self.out_len,
                available: out.len(),
            });
        }
        self.state.finalize_reset(&mut out[..self.out_len]);
        self.finalized = true;
        Ok(self.out_len)
    }

    /// Independent copy of the running hash state.
    ///
    /// A bound key-operation context is not duplicated.
    pub fn copy(&self) -> DigestContext {
        DigestContext {
            descriptor: self.descriptor,
            state: self.state.box_clone(),
            out_len: self.out_len,
            finalized: self.finalized,
            key_op: None,
        }
    }

    pub fn control(&mut self, ctl: DigestControl) -> Result<(), DigestError> {
        match ctl {
            DigestControl::SetXofLength(len) if self.descriptor.xof => {
                if len == 0 {
                    return Err(DigestError::InvalidOutputLength {
                        name: self.descriptor.name,
                        requested: len,
                    });
                }
                self.out_len = len;
                Ok(())
            }
            DigestControl::SetXofLength(_) => Err(DigestError::UnsupportedControl(format!(
                "{} has a fixed output length",
                self.descriptor.name
            ))),
            DigestControl::Custom { code, .. } => Err(DigestError::UnsupportedControl(format!(
                "code {} for {}",
                code, self.descriptor.name
            ))),
        }
    }
}

impl fmt::Debug for DigestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigestContext")
            .field("digest", &self.descriptor.name)
            .field("out_len", &self.out_len)
            .field("finalized", &self.finalized)
            .field("key_op", &self.key_op.is_some())
            .finish()
    }
}

/// One-shot convenience: hash `data` with `descriptor`.
pub fn digest(descriptor: &'static DigestDescriptor, data: &[u8]) -> Vec<u8> {
    let mut state = (descriptor.new_state)();
    state.update(data);
    let mut out = vec![0u8; descriptor.md_size];
    state.finalize_reset(&mut out);
    out
}
