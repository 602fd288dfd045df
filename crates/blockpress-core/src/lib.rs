//! Blockpress Core - Block-based image and video encoding library
//!
//! This crate provides the core encoding engine for Blockpress: raw pixel
//! planes go in, a compressed bitstream comes out. A frame is partitioned
//! into coding blocks by a recursive quadtree, each block is predicted
//! (intra, or inter against a supplied reference frame), and the residual
//! is transform-coded, quantized under rate control, and entropy-coded into
//! a length-delimited bitstream.

pub mod bitstream;
pub mod encode;
pub mod entropy;
pub mod frame;
pub mod partition;
pub mod plane;
pub mod predict;
pub mod rate;
pub mod transform;

pub use bitstream::{unpack_sequence, FrameType, SequenceHeader};
pub use encode::{encode_frame, encode_sequence, EncodeError};
pub use frame::Frame;
pub use plane::Plane;

use thiserror::Error;

/// Smallest supported coding block size.
pub const MIN_BLOCK_SIZE: u32 = 4;

/// Largest supported coding block size (superblock size).
pub const MAX_BLOCK_SIZE: u32 = 64;

/// Initialize process-wide lookup tables (transform bases).
///
/// Safe to call more than once; encoding triggers it lazily as well, so an
/// explicit call only front-loads the table construction.
pub fn init() {
    transform::init_tables();
}

/// Configuration errors: rejected before any output is produced.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Chroma sampling wire code outside 0..=3.
    #[error("Invalid chroma sampling code {0}: must be 0..=3")]
    InvalidChromaCode(u8),

    /// Width or height is zero.
    #[error("Invalid frame dimensions {width}x{height}: both must be non-zero")]
    InvalidDimensions { width: u32, height: u32 },

    /// A plane buffer does not match the size its layout demands.
    #[error("{plane} plane size mismatch: expected {expected} samples, got {actual}")]
    PlaneSizeMismatch {
        plane: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A non-monochrome layout is missing one or both chroma planes.
    #[error("Chroma plane missing for a layout that requires chroma")]
    MissingChromaPlane,

    /// A monochrome frame was given chroma planes.
    #[error("Chroma plane supplied for a monochrome layout")]
    UnexpectedChromaPlane,

    /// A frame in a sequence disagrees with the sequence layout.
    #[error("Frame {index} chroma sampling differs from the sequence")]
    ChromaSamplingMismatch { index: usize },

    /// A reference frame's geometry does not match the frame being coded.
    #[error("Reference frame geometry does not match the coded frame")]
    ReferenceMismatch,
}

/// Chroma subsampling layout, fixed for the lifetime of an encoding session.
///
/// The numeric codes are part of the wire format: the sequence header
/// stores them so a decoder can derive plane geometry without side
/// information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum ChromaSampling {
    /// Chroma halved horizontally and vertically (4:2:0).
    #[default]
    Cs420 = 0,
    /// Chroma halved horizontally only (4:2:2).
    Cs422 = 1,
    /// Full-resolution chroma (4:4:4).
    Cs444 = 2,
    /// Luma only, no chroma planes.
    Monochrome = 3,
}

impl ChromaSampling {
    /// The fixed wire code for this layout.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Parse a wire code. Codes outside 0..=3 are a configuration error.
    pub fn from_code(code: u8) -> Result<Self, ConfigError> {
        match code {
            0 => Ok(ChromaSampling::Cs420),
            1 => Ok(ChromaSampling::Cs422),
            2 => Ok(ChromaSampling::Cs444),
            3 => Ok(ChromaSampling::Monochrome),
            _ => Err(ConfigError::InvalidChromaCode(code)),
        }
    }

    /// Whether this layout carries chroma planes.
    pub fn has_chroma(self) -> bool {
        self != ChromaSampling::Monochrome
    }

    /// Chroma plane dimensions for a frame of the given luma dimensions,
    /// or `None` for monochrome. Odd dimensions round up so every luma
    /// sample is covered.
    pub fn chroma_dimensions(self, width: u32, height: u32) -> Option<(u32, u32)> {
        match self {
            ChromaSampling::Cs420 => Some((width.div_ceil(2), height.div_ceil(2))),
            ChromaSampling::Cs422 => Some((width.div_ceil(2), height)),
            ChromaSampling::Cs444 => Some((width, height)),
            ChromaSampling::Monochrome => None,
        }
    }
}

/// Rate-control target for one encoding session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RateControl {
    /// Constant quality (1..=100); the quantizer step is held fixed.
    Quality(u8),
    /// Target size in bits per frame; the step adapts block by block.
    BitBudget(u32),
}

impl Default for RateControl {
    fn default() -> Self {
        RateControl::Quality(75)
    }
}

/// Encoder configuration supplied per invocation.
///
/// The chroma layout travels with the [`Frame`] itself; this carries the
/// knobs that shape the coding of any frame.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EncoderConfig {
    /// Rate-control target.
    pub rate_control: RateControl,
    /// Superblock size (power of two, 4..=64).
    pub max_block_size: u32,
    /// Minimum leaf block size (power of two, 4..=64).
    pub min_block_size: u32,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            rate_control: RateControl::default(),
            max_block_size: MAX_BLOCK_SIZE,
            min_block_size: MIN_BLOCK_SIZE,
        }
    }
}

impl EncoderConfig {
    /// Configuration with a fixed quality target.
    pub fn with_quality(quality: u8) -> Self {
        Self {
            rate_control: RateControl::Quality(quality),
            ..Self::default()
        }
    }

    /// Configuration with a per-frame bit budget.
    pub fn with_bit_budget(bits: u32) -> Self {
        Self {
            rate_control: RateControl::BitBudget(bits),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chroma_code_roundtrip() {
        for code in 0u8..=3 {
            let cs = ChromaSampling::from_code(code).unwrap();
            assert_eq!(cs.code(), code);
        }
    }

    #[test]
    fn test_invalid_chroma_code() {
        assert_eq!(
            ChromaSampling::from_code(99),
            Err(ConfigError::InvalidChromaCode(99))
        );
        assert_eq!(
            ChromaSampling::from_code(4),
            Err(ConfigError::InvalidChromaCode(4))
        );
    }

    #[test]
    fn test_chroma_dimensions() {
        assert_eq!(
            ChromaSampling::Cs420.chroma_dimensions(640, 480),
            Some((320, 240))
        );
        assert_eq!(
            ChromaSampling::Cs422.chroma_dimensions(640, 480),
            Some((320, 480))
        );
        assert_eq!(
            ChromaSampling::Cs444.chroma_dimensions(640, 480),
            Some((640, 480))
        );
        assert_eq!(ChromaSampling::Monochrome.chroma_dimensions(640, 480), None);
    }

    #[test]
    fn test_chroma_dimensions_odd_round_up() {
        assert_eq!(
            ChromaSampling::Cs420.chroma_dimensions(5, 3),
            Some((3, 2))
        );
        assert_eq!(ChromaSampling::Cs422.chroma_dimensions(5, 3), Some((3, 3)));
    }

    #[test]
    fn test_has_chroma() {
        assert!(ChromaSampling::Cs420.has_chroma());
        assert!(!ChromaSampling::Monochrome.has_chroma());
    }

    #[test]
    fn test_default_config() {
        let config = EncoderConfig::default();
        assert_eq!(config.rate_control, RateControl::Quality(75));
        assert_eq!(config.max_block_size, 64);
        assert_eq!(config.min_block_size, 4);
    }

    #[test]
    fn test_config_constructors() {
        assert_eq!(
            EncoderConfig::with_quality(90).rate_control,
            RateControl::Quality(90)
        );
        assert_eq!(
            EncoderConfig::with_bit_budget(50_000).rate_control,
            RateControl::BitBudget(50_000)
        );
    }

    #[test]
    fn test_init_idempotent() {
        init();
        init();
    }
}
