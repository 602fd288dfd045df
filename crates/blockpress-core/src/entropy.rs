//! Adaptive binary entropy coding.
//!
//! A carry-aware binary range coder with adaptive per-context probability
//! models codes all block side information and quantized coefficients. The
//! probability state lives in a [`ContextSet`] owned by the coder, mutated
//! by every symbol and never visible outside this module, so the emitted
//! bits are bit-exact for a fixed symbol sequence. The decoder is the exact
//! mirror and is used to verify round-trips.

use crate::predict::{PredictionMode, SEARCH_RANGE};

/// Probability precision: probabilities are P(bit = 0) in units of
/// 1 / PROB_SCALE.
pub const PROB_BITS: u32 = 11;
pub const PROB_SCALE: u16 = 1 << PROB_BITS;

const PROB_INIT: u16 = PROB_SCALE / 2;
const ADAPT_SHIFT: u32 = 5;
const RENORM_LIMIT: u32 = 1 << 24;

/// One adaptive binary probability model.
#[derive(Debug, Clone, Copy)]
pub struct BitModel(u16);

impl Default for BitModel {
    fn default() -> Self {
        Self(PROB_INIT)
    }
}

impl BitModel {
    #[inline]
    fn update(&mut self, bit: bool) {
        if bit {
            self.0 -= self.0 >> ADAPT_SHIFT;
        } else {
            self.0 += (PROB_SCALE - self.0) >> ADAPT_SHIFT;
        }
    }
}

/// The full probability context state for one frame.
///
/// Mutated strictly in partition-traversal order; reset per frame by
/// constructing a fresh coder.
#[derive(Debug, Clone, Default)]
struct ContextSet {
    split: BitModel,
    is_inter: BitModel,
    mode: [BitModel; 2],
    coded: BitModel,
    /// Significance models indexed by coefficient band (DC, early, mid, tail).
    sig: [BitModel; 4],
    /// Magnitude-greater-than-one models: DC vs AC.
    gt1: [BitModel; 2],
}

/// Band index for coefficient significance context selection.
#[inline]
fn coeff_band(i: usize, len: usize) -> usize {
    if i == 0 {
        0
    } else if i < len / 4 {
        1
    } else if i < len / 2 {
        2
    } else {
        3
    }
}

// ---------------------------------------------------------------------------
// Range coder core
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct RangeEncoder {
    low: u64,
    range: u32,
    cache: u8,
    cache_size: u64,
    out: Vec<u8>,
}

impl RangeEncoder {
    fn new() -> Self {
        Self {
            low: 0,
            range: u32::MAX,
            cache: 0,
            cache_size: 1,
            out: Vec::new(),
        }
    }

    fn encode_bit(&mut self, model: &mut BitModel, bit: bool) {
        let bound = (self.range >> PROB_BITS) * model.0 as u32;
        if bit {
            self.low += bound as u64;
            self.range -= bound;
        } else {
            self.range = bound;
        }
        model.update(bit);
        while self.range < RENORM_LIMIT {
            self.shift_low();
            self.range <<= 8;
        }
    }

    fn encode_bypass(&mut self, bit: bool) {
        self.range >>= 1;
        if bit {
            self.low += self.range as u64;
        }
        while self.range < RENORM_LIMIT {
            self.shift_low();
            self.range <<= 8;
        }
    }

    fn shift_low(&mut self) {
        if (self.low as u32) < 0xFF00_0000 || (self.low >> 32) != 0 {
            let carry = (self.low >> 32) as u8;
            let mut byte = self.cache;
            loop {
                self.out.push(byte.wrapping_add(carry));
                byte = 0xFF;
                self.cache_size -= 1;
                if self.cache_size == 0 {
                    break;
                }
            }
            self.cache = (self.low >> 24) as u8;
        }
        self.cache_size += 1;
        self.low = (self.low as u32 as u64) << 8;
    }

    fn finish(mut self) -> Vec<u8> {
        for _ in 0..5 {
            self.shift_low();
        }
        self.out
    }

    /// Bits emitted so far, excluding the unflushed tail. Monotonic and
    /// deterministic, which is all the rate controller needs.
    fn bits_emitted(&self) -> u64 {
        self.out.len() as u64 * 8
    }
}

#[derive(Debug)]
struct RangeDecoder<'a> {
    code: u32,
    range: u32,
    input: &'a [u8],
    pos: usize,
}

impl<'a> RangeDecoder<'a> {
    fn new(input: &'a [u8]) -> Self {
        let mut dec = Self {
            code: 0,
            range: u32::MAX,
            input,
            pos: 0,
        };
        // The first emitted byte is always the zero-initialized cache.
        for _ in 0..5 {
            dec.code = (dec.code << 8) | dec.next_byte() as u32;
        }
        dec
    }

    #[inline]
    fn next_byte(&mut self) -> u8 {
        let b = self.input.get(self.pos).copied().unwrap_or(0);
        self.pos += 1;
        b
    }

    fn decode_bit(&mut self, model: &mut BitModel) -> bool {
        let bound = (self.range >> PROB_BITS) * model.0 as u32;
        let bit = if self.code < bound {
            self.range = bound;
            false
        } else {
            self.code -= bound;
            self.range -= bound;
            true
        };
        model.update(bit);
        while self.range < RENORM_LIMIT {
            self.code = (self.code << 8) | self.next_byte() as u32;
            self.range <<= 8;
        }
        bit
    }

    fn decode_bypass(&mut self) -> bool {
        self.range >>= 1;
        let bit = self.code >= self.range;
        if bit {
            self.code -= self.range;
        }
        while self.range < RENORM_LIMIT {
            self.code = (self.code << 8) | self.next_byte() as u32;
            self.range <<= 8;
        }
        bit
    }
}

// ---------------------------------------------------------------------------
// Symbol layer
// ---------------------------------------------------------------------------

/// Entropy encoder for one frame's symbols.
#[derive(Debug)]
pub struct EntropyEncoder {
    rc: RangeEncoder,
    ctx: ContextSet,
}

impl Default for EntropyEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl EntropyEncoder {
    pub fn new() -> Self {
        Self {
            rc: RangeEncoder::new(),
            ctx: ContextSet::default(),
        }
    }

    /// Partition-tree split flag.
    pub fn encode_split(&mut self, split: bool) {
        self.rc.encode_bit(&mut self.ctx.split, split);
    }

    /// Intra/inter selector, coded only when a reference frame exists.
    pub fn encode_is_inter(&mut self, inter: bool) {
        self.rc.encode_bit(&mut self.ctx.is_inter, inter);
    }

    /// Intra mode index as two context-coded bits.
    pub fn encode_mode(&mut self, mode: PredictionMode) {
        let idx = mode.index();
        self.rc.encode_bit(&mut self.ctx.mode[0], idx & 2 != 0);
        self.rc.encode_bit(&mut self.ctx.mode[1], idx & 1 != 0);
    }

    /// Motion offset, each component as three bypass bits of dx + range.
    pub fn encode_motion(&mut self, dx: i8, dy: i8) {
        for comp in [dx, dy] {
            let v = (comp as i32 + SEARCH_RANGE) as u32;
            debug_assert!(v <= 2 * SEARCH_RANGE as u32);
            for shift in (0..3).rev() {
                self.rc.encode_bypass(v >> shift & 1 != 0);
            }
        }
    }

    /// Quantized coefficient block in scan order.
    pub fn encode_coefficients(&mut self, levels: &[i32]) {
        let any = levels.iter().any(|&l| l != 0);
        self.rc.encode_bit(&mut self.ctx.coded, any);
        if !any {
            return;
        }
        let len = levels.len();
        for (i, &level) in levels.iter().enumerate() {
            let band = coeff_band(i, len);
            let sig = level != 0;
            self.rc.encode_bit(&mut self.ctx.sig[band], sig);
            if !sig {
                continue;
            }
            self.rc.encode_bypass(level < 0);
            let mag = level.unsigned_abs();
            let gt1_ctx = usize::from(i != 0);
            let gt1 = mag > 1;
            self.rc.encode_bit(&mut self.ctx.gt1[gt1_ctx], gt1);
            if gt1 {
                self.encode_exp_golomb(mag - 2);
            }
        }
    }

    /// Order-zero exp-Golomb in bypass bits.
    fn encode_exp_golomb(&mut self, value: u32) {
        let x = value + 1;
        let nbits = 32 - x.leading_zeros();
        for _ in 0..nbits - 1 {
            self.rc.encode_bypass(false);
        }
        for shift in (0..nbits).rev() {
            self.rc.encode_bypass(x >> shift & 1 != 0);
        }
    }

    /// Bits emitted so far (monotonic; excludes the final flush tail).
    pub fn bits_emitted(&self) -> u64 {
        self.rc.bits_emitted()
    }

    /// Flush and take the coded payload.
    pub fn finish(self) -> Vec<u8> {
        self.rc.finish()
    }
}

/// Mirror decoder over a coded payload.
#[derive(Debug)]
pub struct EntropyDecoder<'a> {
    rc: RangeDecoder<'a>,
    ctx: ContextSet,
}

impl<'a> EntropyDecoder<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            rc: RangeDecoder::new(input),
            ctx: ContextSet::default(),
        }
    }

    pub fn decode_split(&mut self) -> bool {
        self.rc.decode_bit(&mut self.ctx.split)
    }

    pub fn decode_is_inter(&mut self) -> bool {
        self.rc.decode_bit(&mut self.ctx.is_inter)
    }

    pub fn decode_mode(&mut self) -> PredictionMode {
        let hi = self.rc.decode_bit(&mut self.ctx.mode[0]) as u8;
        let lo = self.rc.decode_bit(&mut self.ctx.mode[1]) as u8;
        PredictionMode::from_index(hi << 1 | lo)
            .expect("two bits always form a valid mode index")
    }

    pub fn decode_motion(&mut self) -> (i8, i8) {
        let mut comps = [0i8; 2];
        for comp in &mut comps {
            let mut v = 0u32;
            for _ in 0..3 {
                v = (v << 1) | self.rc.decode_bypass() as u32;
            }
            *comp = (v as i32 - SEARCH_RANGE) as i8;
        }
        (comps[0], comps[1])
    }

    pub fn decode_coefficients(&mut self, len: usize) -> Vec<i32> {
        let mut levels = vec![0i32; len];
        if !self.rc.decode_bit(&mut self.ctx.coded) {
            return levels;
        }
        for i in 0..len {
            let band = coeff_band(i, len);
            if !self.rc.decode_bit(&mut self.ctx.sig[band]) {
                continue;
            }
            let negative = self.rc.decode_bypass();
            let gt1_ctx = usize::from(i != 0);
            let mag = if self.rc.decode_bit(&mut self.ctx.gt1[gt1_ctx]) {
                self.decode_exp_golomb() + 2
            } else {
                1
            };
            levels[i] = if negative { -(mag as i32) } else { mag as i32 };
        }
        levels
    }

    fn decode_exp_golomb(&mut self) -> u32 {
        let mut zeros = 0;
        while !self.rc.decode_bypass() {
            zeros += 1;
        }
        let mut x = 1u32;
        for _ in 0..zeros {
            x = (x << 1) | self.rc.decode_bypass() as u32;
        }
        x - 1
    }
}
