//! Random-number capability.
//!
//! The crate never picks an RNG on its own behalf beyond defaulting to
//! [`OsRng`]; every consumer takes a `&mut dyn CryptoRngCore` so callers can
//! inject a deterministic generator in tests.

pub use ::rand::rngs::OsRng;
pub use rand_core::{CryptoRng, CryptoRngCore, RngCore};

/// Sized adapter over a borrowed trait-object RNG.
///
/// Some backends take their generator by value (`impl RngCore + CryptoRng`);
/// this lets them borrow the context's injected RNG instead.
pub struct RngHandle<'a>(&'a mut dyn CryptoRngCore);

impl<'a> RngHandle<'a> {
    pub fn new(rng: &'a mut dyn CryptoRngCore) -> Self {
        Self(rng)
    }
}

impl RngCore for RngHandle<'_> {
    fn next_u32(&mut self) -> u32 {
        self.0.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.0.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.0.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.0.try_fill_bytes(dest)
    }
}

impl CryptoRng for RngHandle<'_> {}

/// Fill `buf` from `rng`, surfacing generator failure instead of panicking.
pub fn fill(rng: &mut dyn CryptoRngCore, buf: &mut [u8]) -> Result<(), rand_core::Error> {
    rng.try_fill_bytes(buf)
}
