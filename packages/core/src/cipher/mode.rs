//! Generic mode-of-operation engine.
//!
//! One implementation of ECB/CBC/CFB/OFB for every block transform. Inputs
//! longer than the chunk limit are processed as several passes that share
//! the same IV and feedback offset, so no pass ever exceeds the limit.

use zeroize::Zeroize;

use super::{BlockTransform, CipherMode, Direction, FeedbackWidth, MAX_BLOCK_LENGTH};
use crate::config::Config;
use crate::error::ModeError;

#[derive(Debug, Clone)]
pub struct ModeEngine {
    mode: CipherMode,
    direction: Direction,
    chunk_limit: usize,
}

impl ModeEngine {
    pub fn new(mode: CipherMode, direction: Direction) -> Self {
        Self {
            mode,
            direction,
            chunk_limit: Config::global().chunk_limit,
        }
    }

    pub fn with_chunk_limit(mut self, limit: usize) -> Self {
        self.set_chunk_limit(limit);
        self
    }

    pub fn set_chunk_limit(&mut self, limit: usize) {
        self.chunk_limit = limit.max(1);
    }

    pub fn chunk_limit(&self) -> usize {
        self.chunk_limit
    }

    pub fn mode(&self) -> CipherMode {
        self.mode
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Number of bytes one call with `inl` input bytes will produce.
    pub fn output_len(&self, block_size: usize, inl: usize) -> usize {
        if self.mode.is_block_mode() {
            inl - inl % block_size
        } else {
            inl
        }
    }

    /// Bytes handed to one pass. Block modes round down to whole blocks;
    /// CFB1 expands every byte into eight steps so its byte budget shrinks.
    fn pass_len(&self, block_size: usize) -> usize {
        match self.mode {
            CipherMode::Ecb | CipherMode::Cbc => {
                (self.chunk_limit - self.chunk_limit % block_size).max(block_size)
            }
            CipherMode::Cfb(FeedbackWidth::Bit) => (self.chunk_limit >> 3).max(1),
            _ => self.chunk_limit,
        }
    }

    /// Shape checks the per-mode loops rely on: a block that fits the scratch
    /// buffers, an IV of exactly one block, and an in-range feedback offset.
    fn check_shape(&self, bl: usize, iv: &[u8], num: usize) -> Result<(), ModeError> {
        if bl == 0 || bl > MAX_BLOCK_LENGTH {
            return Err(ModeError::InvalidBlockSize(bl));
        }
        if self.mode != CipherMode::Ecb && iv.len() != bl {
            return Err(ModeError::InvalidIvLength {
                expected: bl,
                actual: iv.len(),
            });
        }
        if num >= bl {
            return Err(ModeError::InvalidOffset(num));
        }
        Ok(())
    }

    /// Run the mode over `input`, writing into `output`.
    ///
    /// `iv` is the working IV (updated in place) and `num` the offset into the
    /// current keystream block for CFB128/OFB. ECB and CBC consume whole
    /// blocks only; shorter input is a no-op returning 0.
    pub fn cipher(
        &self,
        transform: &dyn BlockTransform,
        iv: &mut [u8],
        num: &mut usize,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<usize, ModeError> {
        let bl = transform.block_size();
        self.check_shape(bl, iv, *num)?;
        if self.mode.needs_inverse() && !self.direction.is_encrypt() && !transform.can_decrypt() {
            return Err(ModeError::Unsupported(self.mode.name()));
        }

        let total = self.output_len(bl, input.len());
        if total == 0 {
            return Ok(0);
        }
        if output.len() < total {
            return Err(ModeError::ShortBuffer {
                needed: total,
                available: output.len(),
            });
        }

        let step = self.pass_len(bl);
        let mut done = 0;
        while done < total {
            let take = step.min(total - done);
            let src = &input[done..done + take];
            let dst = &mut output[done..done + take];
            match self.mode {
                CipherMode::Ecb => self.ecb(transform, src, dst),
                CipherMode::Cbc => self.cbc(transform, iv, src, dst),
                CipherMode::Cfb(FeedbackWidth::Block) => self.cfb128(transform, iv, num, src, dst),
                CipherMode::Cfb(FeedbackWidth::Byte) => self.cfb8(transform, iv, src, dst),
                CipherMode::Cfb(FeedbackWidth::Bit) => {
                    self.cfb1(transform, iv, src, dst, take * 8)
                }
                CipherMode::Ofb => self.ofb(transform, iv, num, src, dst),
            }
            done += take;
        }
        Ok(total)
    }

    /// CFB1 over an explicit bit count, MSB first.
    ///
    /// Bits of the last output byte past `nbits` are left as they were.
    /// Returns the number of output bytes touched.
    pub fn cipher_bits(
        &self,
        transform: &dyn BlockTransform,
        iv: &mut [u8],
        input: &[u8],
        output: &mut [u8],
        nbits: usize,
    ) -> Result<usize, ModeError> {
        if self.mode != CipherMode::Cfb(FeedbackWidth::Bit) {
            return Err(ModeError::Unsupported("bit-length input"));
        }
        self.check_shape(transform.block_size(), iv, 0)?;
        let bytes = (nbits + 7) / 8;
        if input.len() < bytes {
            return Err(ModeError::ShortBuffer {
                needed: bytes,
                available: input.len(),
            });
        }
        if output.len() < bytes {
            return Err(ModeError::ShortBuffer {
                needed: bytes,
                available: output.len(),
            });
        }

        let step = self.chunk_limit;
        let mut done = 0;
        while done < nbits {
            let take = step.min(nbits - done);
            for bit in done..done + take {
                self.cfb1_step(transform, iv, input, output, bit);
            }
            done += take;
        }
        Ok(bytes)
    }

    fn ecb(&self, transform: &dyn BlockTransform, input: &[u8], output: &mut [u8]) {
        let bl = transform.block_size();
        output.copy_from_slice(input);
        for block in output.chunks_exact_mut(bl) {
            match self.direction {
                Direction::Encrypt => transform.encrypt_block(block),
                Direction::Decrypt => transform.decrypt_block(block),
            }
        }
    }

    fn cbc(&self, transform: &dyn BlockTransform, iv: &mut [u8], input: &[u8], output: &mut [u8]) {
        let bl = transform.block_size();
        for (src, dst) in input.chunks_exact(bl).zip(output.chunks_exact_mut(bl)) {
            match self.direction {
                Direction::Encrypt => {
                    for ((d, s), v) in dst.iter_mut().zip(src).zip(iv.iter()) {
                        *d = s ^ v;
                    }
                    transform.encrypt_block(dst);
                    iv.copy_from_slice(dst);
                }
                Direction::Decrypt => {
                    dst.copy_from_slice(src);
                    transform.decrypt_block(dst);
                    for (d, v) in dst.iter_mut().zip(iv.iter()) {
                        *d ^= v;
                    }
                    iv.copy_from_slice(src);
                }
            }
        }
    }

    fn cfb128(
        &self,
        transform: &dyn BlockTransform,
        iv: &mut [u8],
        num: &mut usize,
        input: &[u8],
        output: &mut [u8],
    ) {
        let bl = transform.block_size();
        let mut n = *num;
        for (src, dst) in input.iter().zip(output.iter_mut()) {
            if n == 0 {
                transform.encrypt_block(iv);
            }
            let c = match self.direction {
                Direction::Encrypt => {
                    let c = src ^ iv[n];
                    *dst = c;
                    c
                }
                Direction::Decrypt => {
                    *dst = src ^ iv[n];
                    *src
                }
            };
            iv[n] = c;
            n = (n + 1) % bl;
        }
        *num = n;
    }

    fn ofb(
        &self,
        transform: &dyn BlockTransform,
        iv: &mut [u8],
        num: &mut usize,
        input: &[u8],
        output: &mut [u8],
    ) {
        let bl = transform.block_size();
        let mut n = *num;
        for (src, dst) in input.iter().zip(output.iter_mut()) {
            if n == 0 {
                transform.encrypt_block(iv);
            }
            *dst = src ^ iv[n];
            n = (n + 1) % bl;
        }
        *num = n;
    }

    fn cfb8(&self, transform: &dyn BlockTransform, iv: &mut [u8], input: &[u8], output: &mut [u8]) {
        let bl = transform.block_size();
        let mut ks = [0u8; MAX_BLOCK_LENGTH];
        for (src, dst) in input.iter().zip(output.iter_mut()) {
            ks[..bl].copy_from_slice(iv);
            transform.encrypt_block(&mut ks[..bl]);
            *dst = src ^ ks[0];
            let feedback = if self.direction.is_encrypt() { *dst } else { *src };
            iv.copy_within(1.., 0);
            iv[bl - 1] = feedback;
        }
        ks.zeroize();
    }

    fn cfb1(
        &self,
        transform: &dyn BlockTransform,
        iv: &mut [u8],
        input: &[u8],
        output: &mut [u8],
        nbits: usize,
    ) {
        for bit in 0..nbits {
            self.cfb1_step(transform, iv, input, output, bit);
        }
    }

    fn cfb1_step(
        &self,
        transform: &dyn BlockTransform,
        iv: &mut [u8],
        input: &[u8],
        output: &mut [u8],
        bit: usize,
    ) {
        let bl = transform.block_size();
        let mask = 0x80u8 >> (bit % 8);
        let in_bit = u8::from(input[bit / 8] & mask != 0);

        let mut ks = [0u8; MAX_BLOCK_LENGTH];
        ks[..bl].copy_from_slice(iv);
        transform.encrypt_block(&mut ks[..bl]);
        let out_bit = in_bit ^ (ks[0] >> 7);
        ks.zeroize();

        let slot = &mut output[bit / 8];
        *slot = (*slot & !mask) | if out_bit == 1 { mask } else { 0 };

        // shift register left by one bit, ciphertext bit enters at the bottom
        let feedback = if self.direction.is_encrypt() { out_bit } else { in_bit };
        for i in 0..bl - 1 {
            iv[i] = (iv[i] << 1) | (iv[i + 1] >> 7);
        }
        iv[bl - 1] = (iv[bl - 1] << 1) | feedback;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::aes::AES;
    use crate::cipher::testing::{XOR_ROT, XOR_ROT_ENCRYPT_ONLY};
    use crate::cipher::BlockAlgorithm;

    const KEY: [u8; 16] = [
        0x2b, 0x7e, 0x15, 0x16, 0x28, 0xae, 0xd2, 0xa6, 0xab, 0xf7, 0x15, 0x88, 0x09, 0xcf, 0x4f,
        0x3c,
    ];

    fn iv() -> [u8; 16] {
        let mut iv = [0u8; 16];
        for (i, b) in iv.iter_mut().enumerate() {
            *b = i as u8;
        }
        iv
    }

    fn run(engine: &ModeEngine, input: &[u8]) -> Vec<u8> {
        let transform = AES.key_schedule(&KEY).unwrap();
        let mut iv = iv();
        let mut num = 0;
        let mut out = vec![0u8; input.len()];
        let n = engine
            .cipher(transform.as_ref(), &mut iv, &mut num, input, &mut out)
            .unwrap();
        out.truncate(n);
        out
    }

    #[test]
    fn test_ecb_short_input_is_noop() {
        let engine = ModeEngine::new(CipherMode::Ecb, Direction::Encrypt);
        let transform = AES.key_schedule(&KEY).unwrap();
        let mut iv = [0u8; 16];
        let mut num = 0;
        let mut out = [0xAAu8; 16];

        let n = engine
            .cipher(transform.as_ref(), &mut iv, &mut num, &[1, 2, 3], &mut out)
            .unwrap();

        assert_eq!(n, 0);
        assert_eq!(out, [0xAAu8; 16], "output must be untouched");
        assert_eq!(iv, [0u8; 16]);
    }

    #[test]
    fn test_output_capacity_is_checked() {
        let engine = ModeEngine::new(CipherMode::Cbc, Direction::Encrypt);
        let transform = AES.key_schedule(&KEY).unwrap();
        let mut iv = iv();
        let mut num = 0;
        let mut out = [0u8; 16];

        let err = engine
            .cipher(transform.as_ref(), &mut iv, &mut num, &[0u8; 32], &mut out)
            .unwrap_err();
        assert_eq!(err, ModeError::ShortBuffer { needed: 32, available: 16 });
    }

    #[test]
    fn test_chunked_passes_match_single_pass() {
        let input: Vec<u8> = (0..200u32).map(|i| (i * 7 + 3) as u8).collect();
        let modes = [
            CipherMode::Ecb,
            CipherMode::Cbc,
            CipherMode::Cfb(FeedbackWidth::Bit),
            CipherMode::Cfb(FeedbackWidth::Byte),
            CipherMode::Cfb(FeedbackWidth::Block),
            CipherMode::Ofb,
        ];
        for mode in modes {
            for direction in [Direction::Encrypt, Direction::Decrypt] {
                let whole = ModeEngine::new(mode, direction);
                let chunked = ModeEngine::new(mode, direction).with_chunk_limit(17);
                assert_eq!(
                    run(&whole, &input),
                    run(&chunked, &input),
                    "{} {:?} differs under chunking",
                    mode.name(),
                    direction
                );
            }
        }
    }

    #[test]
    fn test_cbc_chunk_rounds_down_to_blocks() {
        let engine = ModeEngine::new(CipherMode::Cbc, Direction::Encrypt).with_chunk_limit(20);
        assert_eq!(engine.pass_len(16), 16);
        let engine = engine.with_chunk_limit(3);
        assert_eq!(engine.pass_len(16), 16, "never below one block");
    }

    #[test]
    fn test_encrypt_only_transform_rejects_cbc_decrypt() {
        let transform = XOR_ROT_ENCRYPT_ONLY.key_schedule(b"k").unwrap();
        let engine = ModeEngine::new(CipherMode::Cbc, Direction::Decrypt);
        let mut iv = [0u8; 8];
        let mut num = 0;
        let mut out = [0u8; 8];

        let err = engine
            .cipher(transform.as_ref(), &mut iv, &mut num, &[0u8; 8], &mut out)
            .unwrap_err();
        assert_eq!(err, ModeError::Unsupported("CBC"));

        // stream modes only ever run the forward transform
        let engine = ModeEngine::new(CipherMode::Ofb, Direction::Decrypt);
        assert!(engine
            .cipher(transform.as_ref(), &mut iv, &mut num, &[0u8; 8], &mut out)
            .is_ok());
    }

    #[test]
    fn test_eight_byte_block_cbc_round_trip() {
        let transform = XOR_ROT.key_schedule(b"secret").unwrap();
        let plain = b"0123456789abcdef01234567";
        let iv0 = [9u8; 8];

        let enc = ModeEngine::new(CipherMode::Cbc, Direction::Encrypt);
        let mut iv = iv0;
        let mut num = 0;
        let mut ct = [0u8; 24];
        enc.cipher(transform.as_ref(), &mut iv, &mut num, plain, &mut ct)
            .unwrap();
        assert_ne!(&ct[..], &plain[..]);
        assert_eq!(&iv[..], &ct[16..], "working IV is the last ciphertext block");

        let dec = ModeEngine::new(CipherMode::Cbc, Direction::Decrypt);
        let mut iv = iv0;
        let mut pt = [0u8; 24];
        dec.cipher(transform.as_ref(), &mut iv, &mut num, &ct, &mut pt)
            .unwrap();
        assert_eq!(&pt, plain);
    }

    #[derive(Clone)]
    struct WideBlock;

    impl BlockTransform for WideBlock {
        fn block_size(&self) -> usize {
            MAX_BLOCK_LENGTH * 2
        }

        fn encrypt_block(&self, block: &mut [u8]) {
            block.reverse();
        }

        fn decrypt_block(&self, block: &mut [u8]) {
            block.reverse();
        }

        fn box_clone(&self) -> Box<dyn BlockTransform> {
            Box::new(self.clone())
        }
    }

    #[test]
    fn test_oversized_block_is_rejected() {
        let bl = MAX_BLOCK_LENGTH * 2;
        let mut iv = vec![0u8; bl];
        let mut num = 0;
        let mut out = vec![0u8; bl];

        for mode in [CipherMode::Cfb(FeedbackWidth::Byte), CipherMode::Cfb(FeedbackWidth::Bit)] {
            let engine = ModeEngine::new(mode, Direction::Encrypt);
            let err = engine
                .cipher(&WideBlock, &mut iv, &mut num, &[0u8; 4], &mut out)
                .unwrap_err();
            assert_eq!(err, ModeError::InvalidBlockSize(bl));
        }

        let engine = ModeEngine::new(CipherMode::Cfb(FeedbackWidth::Bit), Direction::Encrypt);
        assert_eq!(
            engine.cipher_bits(&WideBlock, &mut iv, &[0u8; 1], &mut out, 8).unwrap_err(),
            ModeError::InvalidBlockSize(bl)
        );
    }

    #[test]
    fn test_iv_length_must_match_block() {
        let transform = AES.key_schedule(&KEY).unwrap();
        let mut num = 0;
        let mut out = [0u8; 16];

        for mode in [CipherMode::Cbc, CipherMode::Cfb(FeedbackWidth::Byte), CipherMode::Ofb] {
            let engine = ModeEngine::new(mode, Direction::Encrypt);
            let mut short_iv = [0u8; 12];
            let err = engine
                .cipher(transform.as_ref(), &mut short_iv, &mut num, &[0u8; 16], &mut out)
                .unwrap_err();
            assert_eq!(err, ModeError::InvalidIvLength { expected: 16, actual: 12 });
            assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
        }

        let engine = ModeEngine::new(CipherMode::Cfb(FeedbackWidth::Bit), Direction::Encrypt);
        let mut long_iv = [0u8; 20];
        assert!(matches!(
            engine.cipher_bits(transform.as_ref(), &mut long_iv, &[0u8; 1], &mut out, 8),
            Err(ModeError::InvalidIvLength { expected: 16, actual: 20 })
        ));

        // ECB has no IV to check
        let engine = ModeEngine::new(CipherMode::Ecb, Direction::Encrypt);
        assert_eq!(
            engine.cipher(transform.as_ref(), &mut [0u8; 0], &mut num, &[0u8; 16], &mut out),
            Ok(16)
        );
    }

    #[test]
    fn test_feedback_offset_out_of_range() {
        let transform = AES.key_schedule(&KEY).unwrap();
        let engine = ModeEngine::new(CipherMode::Ofb, Direction::Encrypt);
        let mut iv = iv();
        let mut num = 16;
        let mut out = [0u8; 4];
        assert_eq!(
            engine
                .cipher(transform.as_ref(), &mut iv, &mut num, &[0u8; 4], &mut out)
                .unwrap_err(),
            ModeError::InvalidOffset(16)
        );
    }

    #[test]
    fn test_cipher_bits_preserves_trailing_bits() {
        let transform = AES.key_schedule(&KEY).unwrap();
        let engine = ModeEngine::new(CipherMode::Cfb(FeedbackWidth::Bit), Direction::Encrypt);
        let mut iv = iv();
        let mut out = [0x0Fu8; 1];

        let n = engine
            .cipher_bits(transform.as_ref(), &mut iv, &[0x6b], &mut out, 4)
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(out[0] & 0x0F, 0x0F, "low nibble untouched");
    }

    #[test]
    fn test_cipher_bits_rejects_other_modes() {
        let transform = AES.key_schedule(&KEY).unwrap();
        let engine = ModeEngine::new(CipherMode::Cfb(FeedbackWidth::Byte), Direction::Encrypt);
        let mut iv = iv();
        let mut out = [0u8; 1];
        assert!(matches!(
            engine.cipher_bits(transform.as_ref(), &mut iv, &[0], &mut out, 8),
            Err(ModeError::Unsupported(_))
        ));
    }
}
