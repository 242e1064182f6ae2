use thiserror::Error;

use crate::keyop::{KeyType, Operation};

/// Coarse classification shared by every error in the crate.
///
/// Callers that only care about "retry with a bigger buffer" versus
/// "the data is forged" can match on this instead of the concrete enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Wrong call ordering or mismatched init/operation pairing
    Usage,
    /// Malformed sizes, parameters or unsupported combinations
    Validation,
    /// Tag mismatch, bad padding or a signature that does not verify
    AuthFailure,
    /// Output buffer too small for a declared-length result
    Capacity,
    /// The underlying algorithm implementation reported a failure
    Backend,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModeError {
    #[error("Output buffer too short: need {needed} bytes, have {available}")]
    ShortBuffer { needed: usize, available: usize },
    #[error("Mode not supported by the block transform: {0}")]
    Unsupported(&'static str),
    #[error("Block size {0} is outside 1..={max}", max = crate::cipher::MAX_BLOCK_LENGTH)]
    InvalidBlockSize(usize),
    #[error("IV length mismatch: expected {expected}, got {actual}")]
    InvalidIvLength { expected: usize, actual: usize },
    #[error("Feedback offset {0} is past the end of the block")]
    InvalidOffset(usize),
}

impl ModeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ModeError::ShortBuffer { .. } => ErrorKind::Capacity,
            ModeError::Unsupported(_)
            | ModeError::InvalidBlockSize(_)
            | ModeError::InvalidIvLength { .. }
            | ModeError::InvalidOffset(_) => ErrorKind::Validation,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CipherError {
    #[error("Cipher context is not initialized")]
    NotInitialized,
    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },
    #[error("Invalid IV length: expected {expected}, got {actual}")]
    InvalidIvLength { expected: usize, actual: usize },
    #[error("Data not multiple of block length: {len} bytes, block {block_size}")]
    DataNotBlockAligned { len: usize, block_size: usize },
    #[error("Bad decrypt")]
    BadDecrypt,
    #[error("Wrong final block length")]
    WrongFinalBlockLength,
    #[error("Cipher {0} takes its length in bits; use update_bits")]
    LengthInBits(&'static str),
    #[error("Cipher {0} does not take bit lengths")]
    LengthInBytes(&'static str),
    #[error("Bit length {nbits} exceeds input of {available} bits")]
    BitLengthOutOfRange { nbits: usize, available: usize },
    #[error("Unsupported cipher control: {0}")]
    UnsupportedControl(String),
    #[error("Padding cannot be disabled while a decrypted block is held back")]
    PaddingLocked,
    #[error("Output buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },
    #[error(transparent)]
    Mode(#[from] ModeError),
    #[error("Block cipher backend failed: {0}")]
    Backend(String),
}

impl CipherError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CipherError::NotInitialized
            | CipherError::LengthInBits(_)
            | CipherError::LengthInBytes(_)
            | CipherError::PaddingLocked => ErrorKind::Usage,
            CipherError::InvalidKeyLength { .. }
            | CipherError::InvalidIvLength { .. }
            | CipherError::DataNotBlockAligned { .. }
            | CipherError::WrongFinalBlockLength
            | CipherError::BitLengthOutOfRange { .. }
            | CipherError::UnsupportedControl(_) => ErrorKind::Validation,
            CipherError::BadDecrypt => ErrorKind::AuthFailure,
            CipherError::BufferTooSmall { .. } => ErrorKind::Capacity,
            CipherError::Mode(e) => e.kind(),
            CipherError::Backend(_) => ErrorKind::Backend,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DigestError {
    #[error("Digest already finalized; call init first")]
    Finalized,
    #[error("Unsupported digest control: {0}")]
    UnsupportedControl(String),
    #[error("Invalid output length {requested} for {name}")]
    InvalidOutputLength { name: &'static str, requested: usize },
    #[error("Output buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },
    #[error("No key operation bound to digest context")]
    NoKeyOp,
}

impl DigestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DigestError::Finalized | DigestError::NoKeyOp => ErrorKind::Usage,
            DigestError::UnsupportedControl(_) | DigestError::InvalidOutputLength { .. } => {
                ErrorKind::Validation
            }
            DigestError::BufferTooSmall { .. } => ErrorKind::Capacity,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AeadError {
    #[error("AEAD authentication failed")]
    AuthFailure,
    #[error("Invalid AEAD key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },
    #[error("Invalid nonce length {actual} for {name}")]
    InvalidNonceLength { name: &'static str, actual: usize },
    #[error("Invalid tag length {requested}, maximum is {max}")]
    InvalidTagLength { requested: usize, max: usize },
    #[error("Input of {len} bytes exceeds the algorithm limit")]
    InputTooLong { len: usize },
    #[error("Output buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },
    #[error("AEAD context is not initialized")]
    NotInitialized,
    #[error("AEAD backend failed: {0}")]
    Backend(String),
}

impl AeadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AeadError::AuthFailure => ErrorKind::AuthFailure,
            AeadError::InvalidKeyLength { .. }
            | AeadError::InvalidNonceLength { .. }
            | AeadError::InvalidTagLength { .. } => ErrorKind::Validation,
            AeadError::InputTooLong { .. } | AeadError::BufferTooSmall { .. } => {
                ErrorKind::Capacity
            }
            AeadError::NotInitialized => ErrorKind::Usage,
            AeadError::Backend(_) => ErrorKind::Backend,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyOpError {
    #[error("No key bound to the operation context")]
    NoKey,
    #[error("No peer key set for derive")]
    NoPeerKey,
    #[error("Operation requires a private key")]
    PrivateKeyRequired,
    #[error("Operation not initialized: expected {expected}, context is in {actual}")]
    OperationNotInitialized { expected: Operation, actual: Operation },
    #[error("Operation not supported by this method: {0}")]
    Unsupported(&'static str),
    #[error("Unsupported control: {0}")]
    UnsupportedControl(String),
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Key type mismatch: expected {expected}, got {actual}")]
    KeyTypeMismatch { expected: KeyType, actual: KeyType },
    #[error("Operation cancelled by progress callback")]
    Cancelled,
    #[error("Signature verification failed")]
    BadSignature,
    #[error("Key operation backend failed: {0}")]
    Backend(String),
    #[error(transparent)]
    Digest(#[from] DigestError),
}

impl KeyOpError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            KeyOpError::NoKey
            | KeyOpError::NoPeerKey
            | KeyOpError::PrivateKeyRequired
            | KeyOpError::OperationNotInitialized { .. }
            | KeyOpError::Cancelled => ErrorKind::Usage,
            KeyOpError::Unsupported(_)
            | KeyOpError::UnsupportedControl(_)
            | KeyOpError::InvalidParameter(_)
            | KeyOpError::KeyTypeMismatch { .. } => ErrorKind::Validation,
            KeyOpError::BadSignature => ErrorKind::AuthFailure,
            KeyOpError::Backend(_) => ErrorKind::Backend,
            KeyOpError::Digest(e) => e.kind(),
        }
    }
}

impl From<rsa::Error> for KeyOpError {
    fn from(err: rsa::Error) -> Self {
        match err {
            rsa::Error::Verification => KeyOpError::BadSignature,
            other => KeyOpError::Backend(other.to_string()),
        }
    }
}

impl From<p256::elliptic_curve::Error> for KeyOpError {
    fn from(err: p256::elliptic_curve::Error) -> Self {
        KeyOpError::Backend(err.to_string())
    }
}

impl From<rand::Error> for KeyOpError {
    fn from(err: rand::Error) -> Self {
        KeyOpError::Backend(err.to_string()) // RNG failure
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Unknown algorithm: {0}")]
    Unknown(String),
    #[error("Algorithm {0} is known but not supported in this build")]
    Unsupported(String),
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Global configuration already installed")]
    AlreadyInstalled,
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Usage
    }
}

/// Umbrella error for callers that drive several component types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Mode(#[from] ModeError),
    #[error(transparent)]
    Cipher(#[from] CipherError),
    #[error(transparent)]
    Digest(#[from] DigestError),
    #[error(transparent)]
    Aead(#[from] AeadError),
    #[error(transparent)]
    KeyOp(#[from] KeyOpError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Mode(e) => e.kind(),
            Error::Cipher(e) => e.kind(),
            Error::Digest(e) => e.kind(),
            Error::Aead(e) => e.kind(),
            Error::KeyOp(e) => e.kind(),
            Error::Registry(e) => e.kind(),
            Error::Config(e) => e.kind(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
