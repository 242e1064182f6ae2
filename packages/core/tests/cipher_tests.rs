//! Block cipher integration tests
//!
//! This test suite covers:
//! - NIST SP 800-38A known answers for every mode
//! - Bit-length CFB1
//! - Chunked processing and arbitrary update splits
//! - Round trips for every registered cipher

mod common;

use cryptoframe_core::cipher::aes;
use cryptoframe_core::error::CipherError;
use cryptoframe_core::{registry, CipherContext, CipherControl, Direction, ErrorKind};
use proptest::prelude::*;

use common::{init_tracing, unhex};

const KEY_128: &str = "2b7e151628aed2a6abf7158809cf4f3c";
const KEY_256: &str = "603deb1015ca71be2b73aef0857d77811f352c073b6108d72d9810a30914dff4";
const IV: &str = "000102030405060708090a0b0c0d0e0f";
const PLAIN: &str = "6bc1bee22e409f96e93d7e117393172aae2d8a571e03ac9c9eb76fac45af8e51";

fn run(name: &str, key: &str, iv: &str, input: &[u8], direction: Direction) -> Vec<u8> {
    let desc = registry::cipher(name).unwrap();
    let mut ctx = CipherContext::init(desc, &unhex(key), &unhex(iv), direction).unwrap();
    ctx.control(CipherControl::SetPadding(false)).unwrap();
    let mut out = ctx.update(input).unwrap();
    out.extend(ctx.finalize().unwrap());
    out
}

fn check_known_answer(name: &str, key: &str, iv: &str, plain: &str, cipher: &str) {
    let ct = run(name, key, iv, &unhex(plain), Direction::Encrypt);
    assert_eq!(hex::encode(&ct), cipher, "{name} encrypt");
    let pt = run(name, key, iv, &ct, Direction::Decrypt);
    assert_eq!(hex::encode(&pt), plain, "{name} decrypt");
}

/// SP 800-38A F.1.1 / F.1.2
#[test]
fn test_aes128_ecb_known_answer() {
    init_tracing();
    check_known_answer(
        "aes-128-ecb",
        KEY_128,
        "",
        PLAIN,
        "3ad77bb40d7a3660a89ecaf32466ef97f5d3d58503b9699de785895a96fdbaaf",
    );
}

/// SP 800-38A F.2.1 / F.2.2
#[test]
fn test_aes128_cbc_known_answer() {
    check_known_answer(
        "aes-128-cbc",
        KEY_128,
        IV,
        PLAIN,
        "7649abac8119b246cee98e9b12e9197d5086cb9b507219ee95db113a917678b2",
    );
}

/// SP 800-38A F.2.5 / F.2.6
#[test]
fn test_aes256_cbc_known_answer() {
    check_known_answer(
        "aes-256-cbc",
        KEY_256,
        IV,
        PLAIN,
        "f58c4c04d6e5f1ba779eabfb5f7bfbd69cfc4e967edb808d679f777bc6702c7d",
    );
}

/// SP 800-38A F.3.13 / F.3.14
#[test]
fn test_aes128_cfb128_known_answer() {
    check_known_answer(
        "aes-128-cfb",
        KEY_128,
        IV,
        PLAIN,
        "3b3fd92eb72dad20333449f8e83cfb4ac8a64537a0b3a93fcde3cdad9f1ce58b",
    );
}

/// SP 800-38A F.4.1 / F.4.2
#[test]
fn test_aes128_ofb_known_answer() {
    check_known_answer(
        "aes-128-ofb",
        KEY_128,
        IV,
        PLAIN,
        "3b3fd92eb72dad20333449f8e83cfb4a7789508d16918f03f53c52dac54ed825",
    );
}

/// SP 800-38A F.3.7 / F.3.8
#[test]
fn test_aes128_cfb8_known_answer() {
    check_known_answer(
        "aes-128-cfb8",
        KEY_128,
        IV,
        "6bc1bee22e409f96e93d7e117393172aae2d",
        "3b79424c9c0dd436bace9e0ed4586a4f32b9",
    );
}

/// SP 800-38A F.3.1: the first 16 bits, fed as whole bytes
#[test]
fn test_aes128_cfb1_byte_input() {
    check_known_answer("aes-128-cfb1", KEY_128, IV, "6bc1", "68b3");
}

/// The same CFB1 vector through the bit-length interface, including a
/// stream that ends mid-byte
#[test]
fn test_aes128_cfb1_bit_input() {
    let mut ctx = CipherContext::init(
        &aes::AES_128_CFB1_BITS,
        &unhex(KEY_128),
        &unhex(IV),
        Direction::Encrypt,
    )
    .unwrap();
    assert_eq!(ctx.update_bits(&unhex("6bc1"), 16).unwrap(), unhex("68b3"));

    ctx.reset(&unhex(IV)).unwrap();
    let head = ctx.update_bits(&unhex("6bc1"), 12).unwrap();
    assert_eq!(head.len(), 2);
    // only the top 4 bits of the last byte are meaningful
    assert_eq!(head[0], 0x68);
    assert_eq!(head[1] & 0xf0, 0xb0);

    assert_eq!(
        ctx.update(b"bytes").unwrap_err(),
        CipherError::LengthInBits("aes-128-cfb1-bits")
    );
}

/// Byte-oriented descriptors refuse the bit interface
#[test]
fn test_update_bits_needs_bit_descriptor() {
    let mut ctx = CipherContext::init(
        &aes::AES_128_CFB1,
        &unhex(KEY_128),
        &unhex(IV),
        Direction::Encrypt,
    )
    .unwrap();
    let err = ctx.update_bits(&[0u8; 2], 16).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Usage);
}

/// Encrypt `input` as two updates split at `split`, under the given chunk
/// limit. Bit-length descriptors go through `update_bits`.
fn encrypt_split(
    name: &str,
    key: &[u8],
    iv: &[u8],
    input: &[u8],
    split: usize,
    limit: usize,
) -> Vec<u8> {
    let desc = registry::cipher(name).unwrap();
    // ECB takes no IV
    let mut ctx = CipherContext::init(desc, key, &iv[..desc.iv_len], Direction::Encrypt).unwrap();
    ctx.set_chunk_limit(limit);

    let (head, tail) = input.split_at(split);
    let mut out = Vec::with_capacity(input.len() + 16);
    if desc.flags.length_bits {
        out.extend(ctx.update_bits(head, head.len() * 8).unwrap());
        out.extend(ctx.update_bits(tail, tail.len() * 8).unwrap());
    } else {
        out.extend(ctx.update(head).unwrap());
        out.extend(ctx.update(tail).unwrap());
    }
    out.extend(ctx.finalize().unwrap());
    out
}

const CHUNKED_MODES: [&str; 7] = [
    "aes-128-ecb",
    "aes-128-cbc",
    "aes-128-cfb",
    "aes-128-ofb",
    "aes-128-cfb8",
    "aes-128-cfb1",
    "aes-128-cfb1-bits",
];

/// An input one byte longer than the chunk limit is processed identically
/// to an unchunked pass. For ECB and CBC the extra byte leaves a partial
/// tail that only padding consumes.
#[test]
fn test_chunk_limit_boundary() {
    const LIMIT: usize = 64;
    let key = unhex(KEY_128);
    let iv = unhex(IV);
    let input: Vec<u8> = (0..=LIMIT as u8).collect();
    assert_eq!(input.len(), LIMIT + 1);

    for name in CHUNKED_MODES {
        let chunked = encrypt_split(name, &key, &iv, &input, input.len(), LIMIT);
        let whole = encrypt_split(name, &key, &iv, &input, LIMIT, 1 << 20);
        assert_eq!(chunked, whole, "{name} output depends on chunking");
    }
}

/// A chunk limit smaller than a block, and one that is not a multiple of
/// eight, still give the single-pass result
#[test]
fn test_tiny_chunk_limits() {
    let key = unhex(KEY_128);
    let iv = unhex(IV);
    let input: Vec<u8> = (0..50u8).map(|b| b ^ 0xa5).collect();

    for name in CHUNKED_MODES {
        let reference = encrypt_split(name, &key, &iv, &input, input.len(), 1 << 20);
        for limit in [1, 3, 13] {
            assert_eq!(
                encrypt_split(name, &key, &iv, &input, input.len(), limit),
                reference,
                "{name} with chunk limit {limit}"
            );
        }
    }
}

/// Wrong padding on decrypt surfaces as an authentication-class error
#[test]
fn test_cbc_bad_padding() {
    let desc = registry::cipher("aes-128-cbc").unwrap();
    let key = unhex(KEY_128);
    let iv = unhex(IV);

    let mut enc = CipherContext::init(desc, &key, &iv, Direction::Encrypt).unwrap();
    let mut ct = enc.update(b"sixteen byte msg plus").unwrap();
    ct.extend(enc.finalize().unwrap());
    assert_eq!(ct.len(), 32);

    // flip the last byte of the second-to-last block, scrambling the pad
    ct[15] ^= 0x5c;
    let mut dec = CipherContext::init(desc, &key, &iv, Direction::Decrypt).unwrap();
    let _ = dec.update(&ct).unwrap();
    assert_eq!(dec.finalize().unwrap_err(), CipherError::BadDecrypt);
}

/// Every registered cipher round-trips a message of awkward length
#[test]
fn test_round_trip_all_ciphers() {
    init_tracing();
    let msg: Vec<u8> = (0..77u8).map(|b| b.wrapping_mul(31)).collect();

    for name in registry::cipher_names() {
        let desc = registry::cipher(name).unwrap();
        if desc.flags.length_bits {
            continue;
        }
        let key = vec![0x24u8; desc.key_len];
        let iv = vec![0x42u8; desc.iv_len];

        let mut enc = CipherContext::init(desc, &key, &iv, Direction::Encrypt).unwrap();
        let mut ct = enc.update(&msg).unwrap();
        ct.extend(enc.finalize().unwrap());

        let mut dec = CipherContext::init(desc, &key, &iv, Direction::Decrypt).unwrap();
        let mut pt = dec.update(&ct).unwrap();
        pt.extend(dec.finalize().unwrap());
        assert_eq!(pt, msg, "{name} round trip");
    }
}

proptest! {
    /// Neither the split point nor the chunk limit changes the output
    #[test]
    fn prop_split_invariance(
        msg in prop::collection::vec(any::<u8>(), 0..200),
        split in 0usize..200,
        limit in 1usize..80,
        which in 0usize..7,
    ) {
        let name = [
            "aes-256-ecb",
            "aes-256-cbc",
            "aes-256-cfb",
            "aes-256-ofb",
            "aes-256-cfb8",
            "aes-256-cfb1",
            "aes-256-cfb1-bits",
        ][which];
        let key = unhex(KEY_256);
        let iv = unhex(IV);
        let split = split.min(msg.len());

        let one = encrypt_split(name, &key, &iv, &msg, msg.len(), 1 << 20);
        let two = encrypt_split(name, &key, &iv, &msg, split, limit);
        prop_assert_eq!(one, two);
    }
}
