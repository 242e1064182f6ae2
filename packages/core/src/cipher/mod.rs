//! Symmetric block ciphers behind a uniform streaming interface.
//!
//! ## Layers
//!
//! 1. [`BlockAlgorithm`] / [`BlockTransform`]: a single-block primitive and
//!    its expanded key schedule (AES lives in [`aes`]).
//! 2. [`ModeEngine`]: ECB/CBC/CFB/OFB chaining over any transform, written
//!    once and parametrised by [`CipherMode`].
//! 3. [`CipherContext`]: per-session state (IV, partial block, padding)
//!    bound to one immutable [`CipherDescriptor`].
//!
//! ```text
//! registry::cipher("aes-128-cbc") -> &'static CipherDescriptor
//!   ↓
//! CipherContext::init(desc, key, iv, Direction::Encrypt)
//!   ↓ update() / update() / ...        (partial blocks buffered)
//!   ↓ finalize()                       (PKCS#7 trailer)
//! ```

pub mod aes;
pub mod context;
pub mod mode;

use std::fmt;

use crate::error::CipherError;

pub use context::{CipherContext, CipherControl, ControlValue};
pub use mode::ModeEngine;

/// Largest block any transform may declare.
pub const MAX_BLOCK_LENGTH: usize = 32;

/// Largest IV any descriptor may declare.
pub const MAX_IV_LENGTH: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Encrypt,
    Decrypt,
}

impl Direction {
    pub fn is_encrypt(self) -> bool {
        matches!(self, Direction::Encrypt)
    }
}

/// Number of keystream bits consumed per CFB step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedbackWidth {
    Bit,
    Byte,
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherMode {
    Ecb,
    Cbc,
    Cfb(FeedbackWidth),
    Ofb,
}

impl CipherMode {
    pub fn name(self) -> &'static str {
        match self {
            CipherMode::Ecb => "ECB",
            CipherMode::Cbc => "CBC",
            CipherMode::Cfb(FeedbackWidth::Bit) => "CFB1",
            CipherMode::Cfb(FeedbackWidth::Byte) => "CFB8",
            CipherMode::Cfb(FeedbackWidth::Block) => "CFB",
            CipherMode::Ofb => "OFB",
        }
    }

    /// ECB and CBC work on whole blocks and need padding; the rest are streams.
    pub fn is_block_mode(self) -> bool {
        matches!(self, CipherMode::Ecb | CipherMode::Cbc)
    }

    /// Modes that run the inverse transform when decrypting.
    pub fn needs_inverse(self) -> bool {
        self.is_block_mode()
    }
}

/// Advisory flags carried by a descriptor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CipherFlags {
    /// Key length may be changed through [`CipherControl::SetKeyLength`]
    pub variable_key_len: bool,
    /// Lengths passed to the context are bit counts, not byte counts (CFB1 only)
    pub length_bits: bool,
}

/// Single-block primitive with an expanded key.
///
/// Implementations own their key schedule and are expected to wipe it on drop.
pub trait BlockTransform: Send + Sync {
    fn block_size(&self) -> usize;

    fn encrypt_block(&self, block: &mut [u8]);

    fn decrypt_block(&self, block: &mut [u8]);

    /// Encrypt-only transforms return false; ECB/CBC decryption then fails.
    fn can_decrypt(&self) -> bool {
        true
    }

    /// Algorithm-specific control hook reached through `CipherControl::Custom`.
    fn control(&mut self, code: i32, _arg: i64) -> Result<i64, CipherError> {
        Err(CipherError::UnsupportedControl(format!("code {}", code)))
    }

    fn box_clone(&self) -> Box<dyn BlockTransform>;
}

impl Clone for Box<dyn BlockTransform> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

/// Factory for key schedules of one block algorithm.
pub trait BlockAlgorithm: Send + Sync {
    fn name(&self) -> &'static str;

    fn key_schedule(&self, key: &[u8]) -> Result<Box<dyn BlockTransform>, CipherError>;
}

/// Immutable description of one algorithm/mode combination.
pub struct CipherDescriptor {
    pub name: &'static str,
    /// Numeric identifier; 0 when the combination has no assigned id
    pub nid: u32,
    /// Buffering granularity: the transform block for ECB/CBC, 1 for streams
    pub block_size: usize,
    pub key_len: usize,
    pub iv_len: usize,
    pub mode: CipherMode,
    pub flags: CipherFlags,
    pub algorithm: &'static dyn BlockAlgorithm,
}

impl CipherDescriptor {
    /// Derive block and IV sizes from the mode and the transform block length.
    pub const fn new(
        name: &'static str,
        nid: u32,
        key_len: usize,
        transform_block: usize,
        mode: CipherMode,
        algorithm: &'static dyn BlockAlgorithm,
    ) -> Self {
        let (block_size, iv_len) = match mode {
            CipherMode::Ecb => (transform_block, 0),
            CipherMode::Cbc => (transform_block, transform_block),
            CipherMode::Cfb(_) | CipherMode::Ofb => (1, transform_block),
        };
        Self {
            name,
            nid,
            block_size,
            key_len,
            iv_len,
            mode,
            flags: CipherFlags {
                variable_key_len: false,
                length_bits: false,
            },
            algorithm,
        }
    }

    pub const fn with_flags(mut self, flags: CipherFlags) -> Self {
        self.flags = flags;
        self
    }
}

impl fmt::Debug for CipherDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherDescriptor")
            .field("name", &self.name)
            .field("nid", &self.nid)
            .field("block_size", &self.block_size)
            .field("key_len", &self.key_len)
            .field("iv_len", &self.iv_len)
            .field("mode", &self.mode)
            .field("flags", &self.flags)
            .field("algorithm", &self.algorithm.name())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Toy transforms used to show the mode engine does not assume AES.

    use super::*;

    /// 8-byte block "cipher": XOR with the key then rotate left by one byte.
    #[derive(Clone)]
    pub struct XorRotate {
        key: Vec<u8>,
        encrypt_only: bool,
    }

    impl BlockTransform for XorRotate {
        fn block_size(&self) -> usize {
            8
        }

        fn encrypt_block(&self, block: &mut [u8]) {
            for (b, k) in block.iter_mut().zip(self.key.iter().cycle()) {
                *b ^= k;
            }
            block.rotate_left(1);
        }

        fn decrypt_block(&self, block: &mut [u8]) {
            block.rotate_right(1);
            for (b, k) in block.iter_mut().zip(self.key.iter().cycle()) {
                *b ^= k;
            }
        }

        fn can_decrypt(&self) -> bool {
            !self.encrypt_only
        }

        fn box_clone(&self) -> Box<dyn BlockTransform> {
            Box::new(self.clone())
        }
    }

    pub struct XorRotateAlgorithm {
        pub encrypt_only: bool,
    }

    impl BlockAlgorithm for XorRotateAlgorithm {
        fn name(&self) -> &'static str {
            "XOR-ROT"
        }

        fn key_schedule(&self, key: &[u8]) -> Result<Box<dyn BlockTransform>, CipherError> {
            if key.is_empty() {
                return Err(CipherError::InvalidKeyLength { expected: 1, actual: 0 });
            }
            Ok(Box::new(XorRotate {
                key: key.to_vec(),
                encrypt_only: self.encrypt_only,
            }))
        }
    }

    pub static XOR_ROT: XorRotateAlgorithm = XorRotateAlgorithm { encrypt_only: false };
    pub static XOR_ROT_ENCRYPT_ONLY: XorRotateAlgorithm = XorRotateAlgorithm { encrypt_only: true };

    pub static XOR_ROT_CBC: CipherDescriptor = CipherDescriptor::new(
        "xor-rot-cbc",
        0,
        8,
        8,
        CipherMode::Cbc,
        &XOR_ROT,
    )
    .with_flags(CipherFlags {
        variable_key_len: true,
        length_bits: false,
    });

    pub static XOR_ROT_ECB_ENCRYPT_ONLY: CipherDescriptor = CipherDescriptor::new(
        "xor-rot-ecb-eo",
        0,
        8,
        8,
        CipherMode::Ecb,
        &XOR_ROT_ENCRYPT_ONLY,
    );

    pub static XOR_ROT_CFB_ENCRYPT_ONLY: CipherDescriptor = CipherDescriptor::new(
        "xor-rot-cfb-eo",
        0,
        8,
        8,
        CipherMode::Cfb(FeedbackWidth::Block),
        &XOR_ROT_ENCRYPT_ONLY,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_sizes_follow_mode() {
        let cbc = &aes::AES_128_CBC;
        assert_eq!(cbc.block_size, 16);
        assert_eq!(cbc.iv_len, 16);

        let ecb = &aes::AES_256_ECB;
        assert_eq!(ecb.iv_len, 0);
        assert_eq!(ecb.key_len, 32);

        let ofb = &aes::AES_192_OFB;
        assert_eq!(ofb.block_size, 1, "stream modes buffer nothing");
        assert_eq!(ofb.iv_len, 16);
    }

    #[test]
    fn test_only_bit_variants_carry_length_bits() {
        assert!(!aes::AES_128_CFB1.flags.length_bits);
        assert!(aes::AES_128_CFB1_BITS.flags.length_bits);
        assert_eq!(aes::AES_128_CFB1_BITS.mode, CipherMode::Cfb(FeedbackWidth::Bit));
    }
}
