//! AES block transform and the AES descriptor table.

use ::aes::cipher::generic_array::GenericArray;
use ::aes::cipher::{BlockDecrypt, BlockEncrypt, BlockSizeUser, KeyInit};
use ::aes::{Aes128, Aes192, Aes256};

use super::{
    BlockAlgorithm, BlockTransform, CipherDescriptor, CipherFlags, CipherMode, FeedbackWidth,
};
use crate::error::CipherError;

const AES_BLOCK: usize = 16;

/// Any RustCrypto block cipher as a [`BlockTransform`].
///
/// The wrapped cipher wipes its round keys on drop (`aes/zeroize`).
#[derive(Clone)]
pub struct BlockCipherTransform<C> {
    cipher: C,
}

impl<C> BlockCipherTransform<C>
where
    C: KeyInit,
{
    pub fn new(key: &[u8]) -> Result<Self, CipherError> {
        let cipher = C::new_from_slice(key).map_err(|_| CipherError::InvalidKeyLength {
            expected: C::key_size(),
            actual: key.len(),
        })?;
        Ok(Self { cipher })
    }
}

impl<C> BlockTransform for BlockCipherTransform<C>
where
    C: BlockEncrypt + BlockDecrypt + BlockSizeUser + Clone + Send + Sync + 'static,
{
    fn block_size(&self) -> usize {
        C::block_size()
    }

    fn encrypt_block(&self, block: &mut [u8]) {
        self.cipher.encrypt_block(GenericArray::from_mut_slice(block));
    }

    fn decrypt_block(&self, block: &mut [u8]) {
        self.cipher.decrypt_block(GenericArray::from_mut_slice(block));
    }

    fn box_clone(&self) -> Box<dyn BlockTransform> {
        Box::new(self.clone())
    }
}

/// AES with 128, 192 or 256-bit keys; the key length picks the variant.
pub struct AesAlgorithm;

impl BlockAlgorithm for AesAlgorithm {
    fn name(&self) -> &'static str {
        "AES"
    }

    fn key_schedule(&self, key: &[u8]) -> Result<Box<dyn BlockTransform>, CipherError> {
        match key.len() {
            16 => Ok(Box::new(BlockCipherTransform::<Aes128>::new(key)?)),
            24 => Ok(Box::new(BlockCipherTransform::<Aes192>::new(key)?)),
            32 => Ok(Box::new(BlockCipherTransform::<Aes256>::new(key)?)),
            other => Err(CipherError::InvalidKeyLength {
                expected: 16,
                actual: other,
            }),
        }
    }
}

pub static AES: AesAlgorithm = AesAlgorithm;

const BITS: CipherFlags = CipherFlags {
    variable_key_len: false,
    length_bits: true,
};

const CFB1: CipherMode = CipherMode::Cfb(FeedbackWidth::Bit);
const CFB8: CipherMode = CipherMode::Cfb(FeedbackWidth::Byte);
const CFB128: CipherMode = CipherMode::Cfb(FeedbackWidth::Block);

// AES-128
pub static AES_128_ECB: CipherDescriptor = CipherDescriptor::new("aes-128-ecb", 418, 16, AES_BLOCK, CipherMode::Ecb, &AES);
pub static AES_128_CBC: CipherDescriptor = CipherDescriptor::new("aes-128-cbc", 419, 16, AES_BLOCK, CipherMode::Cbc, &AES);
pub static AES_128_OFB: CipherDescriptor = CipherDescriptor::new("aes-128-ofb", 420, 16, AES_BLOCK, CipherMode::Ofb, &AES);
pub static AES_128_CFB: CipherDescriptor = CipherDescriptor::new("aes-128-cfb", 421, 16, AES_BLOCK, CFB128, &AES);
pub static AES_128_CFB1: CipherDescriptor = CipherDescriptor::new("aes-128-cfb1", 650, 16, AES_BLOCK, CFB1, &AES);
pub static AES_128_CFB8: CipherDescriptor = CipherDescriptor::new("aes-128-cfb8", 653, 16, AES_BLOCK, CFB8, &AES);
pub static AES_128_CFB1_BITS: CipherDescriptor = CipherDescriptor::new("aes-128-cfb1-bits", 0, 16, AES_BLOCK, CFB1, &AES).with_flags(BITS);

// AES-192
pub static AES_192_ECB: CipherDescriptor = CipherDescriptor::new("aes-192-ecb", 422, 24, AES_BLOCK, CipherMode::Ecb, &AES);
pub static AES_192_CBC: CipherDescriptor = CipherDescriptor::new("aes-192-cbc", 423, 24, AES_BLOCK, CipherMode::Cbc, &AES);
pub static AES_192_OFB: CipherDescriptor = CipherDescriptor::new("aes-192-ofb", 424, 24, AES_BLOCK, CipherMode::Ofb, &AES);
pub static AES_192_CFB: CipherDescriptor = CipherDescriptor::new("aes-192-cfb", 425, 24, AES_BLOCK, CFB128, &AES);
pub static AES_192_CFB1: CipherDescriptor = CipherDescriptor::new("aes-192-cfb1", 651, 24, AES_BLOCK, CFB1, &AES);
pub static AES_192_CFB8: CipherDescriptor = CipherDescriptor::new("aes-192-cfb8", 654, 24, AES_BLOCK, CFB8, &AES);
pub static AES_192_CFB1_BITS: CipherDescriptor = CipherDescriptor::new("aes-192-cfb1-bits", 0, 24, AES_BLOCK, CFB1, &AES).with_flags(BITS);

// AES-256
pub static AES_256_ECB: CipherDescriptor = CipherDescriptor::new("aes-256-ecb", 426, 32, AES_BLOCK, CipherMode::Ecb, &AES);
pub static AES_256_CBC: CipherDescriptor = CipherDescriptor::new("aes-256-cbc", 427, 32, AES_BLOCK, CipherMode::Cbc, &AES);
pub static AES_256_OFB: CipherDescriptor = CipherDescriptor::new("aes-256-ofb", 428, 32, AES_BLOCK, CipherMode::Ofb, &AES);
pub static AES_256_CFB: CipherDescriptor = CipherDescriptor::new("aes-256-cfb", 429, 32, AES_BLOCK, CFB128, &AES);
pub static AES_256_CFB1: CipherDescriptor = CipherDescriptor::new("aes-256-cfb1", 652, 32, AES_BLOCK, CFB1, &AES);
pub static AES_256_CFB8: CipherDescriptor = CipherDescriptor::new("aes-256-cfb8", 655, 32, AES_BLOCK, CFB8, &AES);
pub static AES_256_CFB1_BITS: CipherDescriptor = CipherDescriptor::new("aes-256-cfb1-bits", 0, 32, AES_BLOCK, CFB1, &AES).with_flags(BITS);

/// Every AES descriptor, in registration order.
pub static ALL: [&CipherDescriptor; 21] = [
    &AES_128_ECB, &AES_128_CBC, &AES_128_OFB, &AES_128_CFB, &AES_128_CFB1, &AES_128_CFB8, &AES_128_CFB1_BITS,
    &AES_192_ECB, &AES_192_CBC, &AES_192_OFB, &AES_192_CFB, &AES_192_CFB1, &AES_192_CFB8, &AES_192_CFB1_BITS,
    &AES_256_ECB, &AES_256_CBC, &AES_256_OFB, &AES_256_CFB, &AES_256_CFB1, &AES_256_CFB8, &AES_256_CFB1_BITS,
];
