// Cryptoframe Core
// Descriptor-driven dispatch for ciphers, digests, AEADs and key operations

#![warn(clippy::all)]
#![allow(clippy::too_many_arguments)]

// Модули
pub mod aead;
pub mod cipher;
pub mod config;
pub mod digest;
pub mod error;
pub mod keyop;
pub mod registry;
pub mod rng;

// Re-exports для удобства
pub use aead::{AeadContext, AeadDescriptor};
pub use cipher::{CipherContext, CipherControl, CipherDescriptor, CipherMode, Direction, ModeEngine};
pub use config::Config;
pub use digest::{DigestContext, DigestControl, DigestDescriptor};
pub use error::{Error, ErrorKind, Result};
pub use keyop::{AsymKey, KeyOpContext, KeyOpCtrl, KeyOpMethod, KeyType, Operation};
