//! Hash algorithms backing the digest descriptors.

use sha2::digest::{Digest, ExtendableOutputReset, FixedOutputReset, Reset, Update};
use sha2::{Sha224, Sha256, Sha384, Sha512, Sha512_224, Sha512_256};

use super::{DigestDescriptor, DigestState};

/// Fixed-output hash from the RustCrypto `digest` family.
#[derive(Clone, Default)]
pub struct FixedState<D>(D);

impl<D> FixedState<D>
where
    D: Digest + FixedOutputReset + Default + Clone + Send + Sync + 'static,
{
    pub fn boxed() -> Box<dyn DigestState> {
        Box::new(Self(D::default()))
    }
}

impl<D> DigestState for FixedState<D>
where
    D: Digest + FixedOutputReset + Default + Clone + Send + Sync + 'static,
{
    fn update(&mut self, data: &[u8]) {
        Digest::update(&mut self.0, data);
    }

    fn finalize_reset(&mut self, out: &mut [u8]) {
        let digest = Digest::finalize_reset(&mut self.0);
        out.copy_from_slice(&digest[..out.len()]);
    }

    fn reset(&mut self) {
        Digest::reset(&mut self.0);
    }

    fn box_clone(&self) -> Box<dyn DigestState> {
        Box::new(self.clone())
    }
}

/// Extendable-output function; output length is chosen at finalize time.
#[derive(Clone, Default)]
pub struct XofState<X>(X);

impl<X> XofState<X>
where
    X: Update + ExtendableOutputReset + Reset + Default + Clone + Send + Sync + 'static,
{
    pub fn boxed() -> Box<dyn DigestState> {
        Box::new(Self(X::default()))
    }
}

impl<X> DigestState for XofState<X>
where
    X: Update + ExtendableOutputReset + Reset + Default + Clone + Send + Sync + 'static,
{
    fn update(&mut self, data: &[u8]) {
        Update::update(&mut self.0, data);
    }

    fn finalize_reset(&mut self, out: &mut [u8]) {
        self.0.finalize_xof_reset_into(out);
    }

    fn reset(&mut self) {
        Reset::reset(&mut self.0);
    }

    fn box_clone(&self) -> Box<dyn DigestState> {
        Box::new(self.clone())
    }
}

pub static SHA224: DigestDescriptor = DigestDescriptor {
    name: "sha224",
    nid: 675,
    md_size: 28,
    block_size: 64,
    xof: false,
    new_state: FixedState::<Sha224>::boxed,
};

pub static SHA256: DigestDescriptor = DigestDescriptor {
    name: "sha256",
    nid: 672,
    md_size: 32,
    block_size: 64,
    xof: false,
    new_state: FixedState::<Sha256>::boxed,
};

pub static SHA384: DigestDescriptor = DigestDescriptor {
    name: "sha384",
    nid: 673,
    md_size: 48,
    block_size: 128,
    xof: false,
    new_state: FixedState::<Sha384>::boxed,
};

pub static SHA512: DigestDescriptor = DigestDescriptor {
    name: "sha512",
    nid: 674,
    md_size: 64,
    block_size: 128,
    xof: false,
    new_state: FixedState::<Sha512>::boxed,
};

pub static SHA512_224: DigestDescriptor = DigestDescriptor {
    name: "sha512-224",
    nid: 1094,
    md_size: 28,
    block_size: 128,
    xof: false,
    new_state: FixedState::<Sha512_224>::boxed,
};

pub static SHA512_256: DigestDescriptor = DigestDescriptor {
    name: "sha512-256",
    nid: 1095,
    md_size: 32,
    block_size: 128,
    xof: false,
    new_state: FixedState::<Sha512_256>::boxed,
};

#[cfg(feature = "legacy-digests")]
pub static MD5: DigestDescriptor = DigestDescriptor {
    name: "md5",
    nid: 4,
    md_size: 16,
    block_size: 64,
    xof: false,
    new_state: FixedState::<md5::Md5>::boxed,
};

#[cfg(feature = "legacy-digests")]
pub static SHA1: DigestDescriptor = DigestDescriptor {
    name: "sha1",
    nid: 64,
    md_size: 20,
    block_size: 64,
    xof: false,
    new_state: FixedState::<sha1::Sha1>::boxed,
};

#[cfg(feature = "sha3")]
pub static SHA3_224: DigestDescriptor = DigestDescriptor {
    name: "sha3-224",
    nid: 1096,
    md_size: 28,
    block_size: 144,
    xof: false,
    new_state: FixedState::<sha3::Sha3_224>::boxed,
};

#[cfg(feature = "sha3")]
pub static SHA3_256: DigestDescriptor = DigestDescriptor {
    name: "sha3-256",
    nid: 1097,
    md_size: 32,
    block_size: 136,
    xof: false,
    new_state: FixedState::<sha3::Sha3_256>::boxed,
};

#[cfg(feature = "sha3")]
pub static SHA3_384: DigestDescriptor = DigestDescriptor {
    name: "sha3-384",
    nid: 1098,
    md_size: 48,
    block_size: 104,
    xof: false,
    new_state: FixedState::<sha3::Sha3_384>::boxed,
};

#[cfg(feature = "sha3")]
pub static SHA3_512: DigestDescriptor = DigestDescriptor {
    name: "sha3-512",
    nid: 1099,
    md_size: 64,
    block_size: 72,
    xof: false,
    new_state: FixedState::<sha3::Sha3_512>::boxed,
};

// XOF default output sizes follow the usual security-level convention
#[cfg(feature = "sha3")]
pub static SHAKE128: DigestDescriptor = DigestDescriptor {
    name: "shake128",
    nid: 1100,
    md_size: 16,
    block_size: 168,
    xof: true,
    new_state: XofState::<sha3::Shake128>::boxed,
};

#[cfg(feature = "sha3")]
pub static SHAKE256: DigestDescriptor = DigestDescriptor {
    name: "shake256",
    nid: 1101,
    md_size: 32,
    block_size: 136,
    xof: true,
    new_state: XofState::<sha3::Shake256>::boxed,
};

/// Descriptors compiled into this build.
pub fn all() -> Vec<&'static DigestDescriptor> {
    #[allow(unused_mut)]
    let mut list: Vec<&'static DigestDescriptor> =
        vec![&SHA224, &SHA256, &SHA384, &SHA512, &SHA512_224, &SHA512_256];
    #[cfg(feature = "legacy-digests")]
    list.extend([&MD5, &SHA1]);
    #[cfg(feature = "sha3")]
    list.extend([&SHA3_224, &SHA3_256, &SHA3_384, &SHA3_512, &SHAKE128, &SHAKE256]);
    list
}

/// Names that exist but may be compiled out by feature flags.
pub const KNOWN_NAMES: &[&str] = &[
    "sha224", "sha256", "sha384", "sha512", "sha512-224", "sha512-256", "md5", "sha1",
    "sha3-224", "sha3-256", "sha3-384", "sha3-512", "shake128", "shake256",
];
