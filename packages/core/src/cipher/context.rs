//! Streaming cipher context.
//!
//! Owns the key schedule, working and original IV, the partial-block
//! buffer and (decrypting with padding) the held-back last block. All of
//! it is wiped on `cleanup` and on drop.

use tracing::{debug, trace, warn};
use zeroize::Zeroize;

use super::{
    BlockTransform, CipherDescriptor, Direction, ModeEngine, MAX_BLOCK_LENGTH, MAX_IV_LENGTH,
};
use crate::config::Config;
use crate::error::CipherError;

/// Parameter channel for [`CipherContext::control`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CipherControl<'a> {
    /// Replace the IV and restart the stream with the current key
    SetIv(&'a [u8]),
    /// Read the working (updated) IV
    GetIv,
    SetPadding(bool),
    /// Only for descriptors with `variable_key_len`; takes effect on the next `rekey`
    SetKeyLength(usize),
    GetKeyLength,
    /// Forwarded to the block transform
    Custom { code: i32, arg: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlValue {
    None,
    Iv(Vec<u8>),
    KeyLength(usize),
    Int(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Initialized,
    Finalized,
    Cleaned,
}

pub struct CipherContext {
    descriptor: &'static CipherDescriptor,
    direction: Direction,
    engine: ModeEngine,
    transform: Option<Box<dyn BlockTransform>>,
    oiv: [u8; MAX_IV_LENGTH],
    iv: [u8; MAX_IV_LENGTH],
    buf: [u8; MAX_BLOCK_LENGTH],
    buf_len: usize,
    num: usize,
    final_used: bool,
    final_block: [u8; MAX_BLOCK_LENGTH],
    padding: bool,
    key_len: usize,
    state: State,
}

impl CipherContext {
    /// Bind a descriptor to a key and IV.
    ///
    /// `iv` must be exactly `descriptor.iv_len` bytes (empty for ECB). The key
    /// must match `descriptor.key_len` unless the descriptor allows variable
    /// key lengths, in which case the algorithm validates it.
    pub fn init(
        descriptor: &'static CipherDescriptor,
        key: &[u8],
        iv: &[u8],
        direction: Direction,
    ) -> Result<Self, CipherError> {
        if !descriptor.flags.variable_key_len && key.len() != descriptor.key_len {
            return Err(CipherError::InvalidKeyLength {
                expected: descriptor.key_len,
                actual: key.len(),
            });
        }
        if descriptor.iv_len > MAX_IV_LENGTH {
            return Err(CipherError::InvalidIvLength {
                expected: MAX_IV_LENGTH,
                actual: descriptor.iv_len,
            });
        }
        Self::check_iv(descriptor, iv)?;

        let transform = descriptor.algorithm.key_schedule(key)?;
        let tb = transform.block_size();
        if tb > MAX_BLOCK_LENGTH || (descriptor.iv_len != 0 && descriptor.iv_len != tb) {
            return Err(CipherError::Backend(format!(
                "{} transform block {} does not fit descriptor",
                descriptor.name, tb
            )));
        }

        let config = Config::global();
        let mut ctx = Self {
            descriptor,
            direction,
            engine: ModeEngine::new(descriptor.mode, direction),
            transform: Some(transform),
            oiv: [0u8; MAX_IV_LENGTH],
            iv: [0u8; MAX_IV_LENGTH],
            buf: [0u8; MAX_BLOCK_LENGTH],
            buf_len: 0,
            num: 0,
            final_used: false,
            final_block: [0u8; MAX_BLOCK_LENGTH],
            padding: config.default_padding,
            key_len: key.len(),
            state: State::Initialized,
        };
        ctx.oiv[..iv.len()].copy_from_slice(iv);
        ctx.iv[..iv.len()].copy_from_slice(iv);

        debug!(
            target: "cryptoframe::cipher",
            cipher = descriptor.name,
            direction = ?direction,
            padding = ctx.padding,
            "Cipher context initialized"
        );

        Ok(ctx)
    }

    fn check_iv(descriptor: &CipherDescriptor, iv: &[u8]) -> Result<(), CipherError> {
        if iv.len() != descriptor.iv_len {
            return Err(CipherError::InvalidIvLength {
                expected: descriptor.iv_len,
                actual: iv.len(),
            });
        }
        Ok(())
    }

    pub fn descriptor(&self) -> &'static CipherDescriptor {
        self.descriptor
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn block_size(&self) -> usize {
        self.descriptor.block_size
    }

    pub fn key_len(&self) -> usize {
        self.key_len
    }

    pub fn padding(&self) -> bool {
        self.padding
    }

    /// Override the per-pass chunk limit inherited from [`Config`].
    pub fn set_chunk_limit(&mut self, limit: usize) {
        self.engine.set_chunk_limit(limit);
    }

    /// Restart the stream from `iv` with the current key schedule.
    pub fn reset(&mut self, iv: &[u8]) -> Result<(), CipherError> {
        if self.transform.is_none() {
            return Err(CipherError::NotInitialized);
        }
        Self::check_iv(self.descriptor, iv)?;
        self.oiv[..iv.len()].copy_from_slice(iv);
        self.rearm();
        Ok(())
    }

    /// Install a new key (of the current key length) and restart from the original IV.
    pub fn rekey(&mut self, key: &[u8]) -> Result<(), CipherError> {
        if self.state == State::Cleaned {
            return Err(CipherError::NotInitialized);
        }
        if key.len() != self.key_len {
            return Err(CipherError::InvalidKeyLength {
                expected: self.key_len,
                actual: key.len(),
            });
        }
        self.transform = Some(self.descriptor.algorithm.key_schedule(key)?);
        self.rearm();

        debug!(
            target: "cryptoframe::cipher",
            cipher = self.descriptor.name,
            key_len = self.key_len,
            "Cipher context rekeyed"
        );
        Ok(())
    }

    fn rearm(&mut self) {
        let ivl = self.descriptor.iv_len;
        self.iv[..ivl].copy_from_slice(&self.oiv[..ivl]);
        self.buf.zeroize();
        self.final_block.zeroize();
        self.buf_len = 0;
        self.num = 0;
        self.final_used = false;
        self.state = State::Initialized;
    }

    fn live_transform(&self) -> Result<&dyn BlockTransform, CipherError> {
        match (&self.state, self.transform.as_deref()) {
            (State::Initialized, Some(t)) => Ok(t),
            _ => Err(CipherError::NotInitialized),
        }
    }

    /// Exact number of bytes `update_into` will write for `inl` more input bytes.
    pub fn update_len(&self, inl: usize) -> usize {
        let bl = self.descriptor.block_size;
        if bl == 1 {
            return inl;
        }
        if inl == 0 {
            return 0;
        }
        let pending = self.buf_len + inl;
        let processed = pending - pending % bl;
        if self.direction == Direction::Decrypt && self.padding {
            let carried = if self.final_used { bl } else { 0 };
            let held = if pending % bl == 0 && processed > 0 { bl } else { 0 };
            carried + processed - held
        } else {
            processed
        }
    }

    /// Feed `input`, returning whatever output is ready.
    pub fn update(&mut self, input: &[u8]) -> Result<Vec<u8>, CipherError> {
        let mut out = vec![0u8; self.update_len(input.len())];
        let n = self.update_into(input, &mut out)?;
        out.truncate(n);
        Ok(out)
    }

    /// Allocation-free [`update`](Self::update). `out` must hold at least
    /// [`update_len`](Self::update_len) bytes.
    pub fn update_into(&mut self, input: &[u8], out: &mut [u8]) -> Result<usize, CipherError> {
        self.live_transform()?;
        if self.descriptor.flags.length_bits {
            return Err(CipherError::LengthInBits(self.descriptor.name));
        }
        let needed = self.update_len(input.len());
        if out.len() < needed {
            return Err(CipherError::BufferTooSmall {
                needed,
                available: out.len(),
            });
        }

        trace!(
            target: "cryptoframe::cipher",
            cipher = self.descriptor.name,
            input_len = input.len(),
            buffered = self.buf_len,
            "Cipher update"
        );

        if input.is_empty() {
            return Ok(0);
        }

        let bl = self.descriptor.block_size;
        if self.direction == Direction::Encrypt || !self.padding || bl == 1 {
            return self.process(input, out);
        }

        // Decrypting with padding: release the block held back last time,
        // then hold back the newest complete block until finalize.
        let mut offset = 0;
        if self.final_used {
            out[..bl].copy_from_slice(&self.final_block[..bl]);
            offset = bl;
        }
        let mut written = self.process(input, &mut out[offset..])?;
        if self.buf_len == 0 {
            written -= bl;
            self.final_block[..bl].copy_from_slice(&out[offset + written..offset + written + bl]);
            out[offset + written..offset + written + bl].zeroize();
            self.final_used = true;
        } else {
            self.final_used = false;
        }
        Ok(offset + written)
    }

    /// Partial-block buffering shared by both directions.
    fn process(&mut self, mut input: &[u8], out: &mut [u8]) -> Result<usize, CipherError> {
        let bl = self.descriptor.block_size;
        let ivl = self.descriptor.iv_len;
        let transform = match self.transform.as_deref() {
            Some(t) => t,
            None => return Err(CipherError::NotInitialized),
        };

        if self.buf_len == 0 && input.len() % bl == 0 {
            let n = self.engine.cipher(
                transform,
                &mut self.iv[..ivl],
                &mut self.num,
                input,
                out,
            )?;
            return Ok(n);
        }

        let mut written = 0;
        if self.buf_len != 0 {
            if self.buf_len + input.len() < bl {
                self.buf[self.buf_len..self.buf_len + input.len()].copy_from_slice(input);
                self.buf_len += input.len();
                return Ok(0);
            }
            let j = bl - self.buf_len;
            self.buf[self.buf_len..bl].copy_from_slice(&input[..j]);
            written += self.engine.cipher(
                transform,
                &mut self.iv[..ivl],
                &mut self.num,
                &self.buf[..bl],
                &mut out[..bl],
            )?;
            input = &input[j..];
        }

        let rem = input.len() % bl;
        let whole = input.len() - rem;
        if whole > 0 {
            written += self.engine.cipher(
                transform,
                &mut self.iv[..ivl],
                &mut self.num,
                &input[..whole],
                &mut out[written..written + whole],
            )?;
        }
        self.buf[..rem].copy_from_slice(&input[whole..]);
        self.buf_len = rem;
        Ok(written)
    }

    /// CFB1 input measured in bits. Only valid for descriptors declaring
    /// `length_bits`; returns `ceil(nbits / 8)` bytes.
    pub fn update_bits(&mut self, input: &[u8], nbits: usize) -> Result<Vec<u8>, CipherError> {
        self.live_transform()?;
        if !self.descriptor.flags.length_bits {
            return Err(CipherError::LengthInBytes(self.descriptor.name));
        }
        if nbits > input.len().saturating_mul(8) {
            return Err(CipherError::BitLengthOutOfRange {
                nbits,
                available: input.len() * 8,
            });
        }
        let ivl = self.descriptor.iv_len;
        let transform = self.transform.as_deref().ok_or(CipherError::NotInitialized)?;
        let mut out = vec![0u8; (nbits + 7) / 8];
        self.engine
            .cipher_bits(transform, &mut self.iv[..ivl], input, &mut out, nbits)?;

        trace!(
            target: "cryptoframe::cipher",
            cipher = self.descriptor.name,
            nbits,
            "Cipher bit update"
        );
        Ok(out)
    }

    /// Flush buffered data and apply or strip padding.
    ///
    /// A second call without `reset`/`rekey` fails with `NotInitialized`.
    pub fn finalize(&mut self) -> Result<Vec<u8>, CipherError> {
        let mut out = vec![0u8; MAX_BLOCK_LENGTH];
        let n = self.finalize_into(&mut out)?;
        out.truncate(n);
        Ok(out)
    }

    pub fn finalize_into(&mut self, out: &mut [u8]) -> Result<usize, CipherError> {
        self.live_transform()?;
        let bl = self.descriptor.block_size;

        if bl == 1 {
            self.state = State::Finalized;
            return Ok(0);
        }

        if !self.padding {
            if self.buf_len != 0 {
                self.state = State::Finalized;
                return Err(CipherError::DataNotBlockAligned {
                    len: self.buf_len,
                    block_size: bl,
                });
            }
            self.state = State::Finalized;
            return Ok(0);
        }

        match self.direction {
            Direction::Encrypt => self.encrypt_final(out),
            Direction::Decrypt => self.decrypt_final(out),
        }
    }

    fn encrypt_final(&mut self, out: &mut [u8]) -> Result<usize, CipherError> {
        let bl = self.descriptor.block_size;
        if out.len() < bl {
            return Err(CipherError::BufferTooSmall {
                needed: bl,
                available: out.len(),
            });
        }

        let pad = bl - self.buf_len;
        for b in &mut self.buf[self.buf_len..bl] {
            *b = pad as u8;
        }
        let ivl = self.descriptor.iv_len;
        let transform = self.transform.as_deref().ok_or(CipherError::NotInitialized)?;
        let n = self.engine.cipher(
            transform,
            &mut self.iv[..ivl],
            &mut self.num,
            &self.buf[..bl],
            &mut out[..bl],
        )?;
        self.buf.zeroize();
        self.buf_len = 0;
        self.state = State::Finalized;
        Ok(n)
    }

    fn decrypt_final(&mut self, out: &mut [u8]) -> Result<usize, CipherError> {
        let bl = self.descriptor.block_size;
        if self.buf_len != 0 || !self.final_used {
            self.state = State::Finalized;
            return Err(CipherError::WrongFinalBlockLength);
        }

        let last = &self.final_block[..bl];
        let pad = last[bl - 1] as usize;
        // scan the whole trailer without an early exit
        let mut bad = u8::from(pad == 0 || pad > bl);
        for (i, &b) in last.iter().enumerate() {
            let in_trailer = i >= bl.saturating_sub(pad);
            bad |= u8::from(in_trailer && b as usize != pad);
        }
        if bad != 0 {
            self.state = State::Finalized;
            self.final_block.zeroize();
            warn!(
                target: "cryptoframe::cipher",
                cipher = self.descriptor.name,
                "Bad decrypt: padding check failed"
            );
            return Err(CipherError::BadDecrypt);
        }

        let n = bl - pad;
        if out.len() < n {
            return Err(CipherError::BufferTooSmall {
                needed: n,
                available: out.len(),
            });
        }
        out[..n].copy_from_slice(&self.final_block[..n]);
        self.final_block.zeroize();
        self.final_used = false;
        self.state = State::Finalized;
        Ok(n)
    }

    pub fn control(&mut self, ctl: CipherControl<'_>) -> Result<ControlValue, CipherError> {
        if self.state == State::Cleaned {
            return Err(CipherError::NotInitialized);
        }
        match ctl {
            CipherControl::SetIv(iv) => {
                self.reset(iv)?;
                Ok(ControlValue::None)
            }
            CipherControl::GetIv => Ok(ControlValue::Iv(self.iv[..self.descriptor.iv_len].to_vec())),
            CipherControl::SetPadding(on) => {
                // the held block would otherwise never be emitted
                if !on && self.final_used {
                    return Err(CipherError::PaddingLocked);
                }
                self.padding = on;
                Ok(ControlValue::None)
            }
            CipherControl::SetKeyLength(len) => {
                if len == self.key_len {
                    return Ok(ControlValue::None);
                }
                if !self.descriptor.flags.variable_key_len || len == 0 {
                    return Err(CipherError::InvalidKeyLength {
                        expected: self.key_len,
                        actual: len,
                    });
                }
                self.key_len = len;
                Ok(ControlValue::None)
            }
            CipherControl::GetKeyLength => Ok(ControlValue::KeyLength(self.key_len)),
            CipherControl::Custom { code, arg } => {
                let transform = self.transform.as_deref_mut().ok_or(CipherError::NotInitialized)?;
                transform.control(code, arg).map(ControlValue::Int)
            }
        }
    }

    /// Wipe key schedule, IVs and buffers. The context is unusable afterwards.
    pub fn cleanup(&mut self) {
        self.wipe();
        self.state = State::Cleaned;

        debug!(
            target: "cryptoframe::cipher",
            cipher = self.descriptor.name,
            "Cipher context cleaned up"
        );
    }

    fn wipe(&mut self) {
        self.transform = None;
        self.oiv.zeroize();
        self.iv.zeroize();
        self.buf.zeroize();
        self.final_block.zeroize();
        self.buf_len = 0;
        self.num = 0;
        self.final_used = false;
    }
}

impl Clone for CipherContext {
    fn clone(&self) -> Self {
        Self {
            descriptor: self.descriptor,
            direction: self.direction,
            engine: self.engine.clone(),
            transform: self.transform.as_ref().map(|t| t.box_clone()),
            oiv: self.oiv,
            iv: self.iv,
            buf: self.buf,
            buf_len: self.buf_len,
            num: self.num,
            final_used: self.final_used,
            final_block: self.final_block,
            padding: self.padding,
            key_len: self.key_len,
            state: self.state,
        }
    }
}

impl Drop for CipherContext {
    fn drop(&mut self) {
        self.wipe();
    }
}

impl std::fmt::Debug for CipherContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherContext")
            .field("cipher", &self.descriptor.name)
            .field("direction", &self.direction)
            .field("buffered", &self.buf_len)
            .field("padding", &self.padding)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
