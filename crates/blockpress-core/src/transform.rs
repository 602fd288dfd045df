//! Orthogonal transform and scalar quantization.
//!
//! Residual blocks are decorrelated with a separable DCT-II whose basis
//! matrices are precomputed once per supported block size and held in a
//! process-wide singleton. Quantization is scalar with
//! round-half-away-from-zero, so encoding is reproducible for identical
//! (residual, step) pairs. The inverse paths exist because intra prediction
//! reads reconstructed neighbor samples, not source samples.

use std::sync::OnceLock;

use thiserror::Error;

use crate::{MAX_BLOCK_SIZE, MIN_BLOCK_SIZE};

/// Transform contract violations.
///
/// These indicate a partitioner or caller defect: block sizes are fixed at
/// partition time and must be powers of two within the supported range.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransformError {
    /// Block size is not a power of two within the supported range.
    #[error("Unsupported transform size {size}: must be a power of two in {MIN_BLOCK_SIZE}..={MAX_BLOCK_SIZE}")]
    UnsupportedSize { size: u32 },
}

/// DCT-II basis matrices for every supported block size.
///
/// `basis[i]` holds the N x N orthonormal matrix for N = 2^(i + 2), stored
/// row-major as `basis[k * n + x]` for frequency k and position x.
struct BasisTables {
    basis: Vec<Vec<f32>>,
}

impl BasisTables {
    fn build() -> Self {
        let mut basis = Vec::new();
        let mut size = MIN_BLOCK_SIZE;
        while size <= MAX_BLOCK_SIZE {
            basis.push(Self::build_one(size as usize));
            size *= 2;
        }
        Self { basis }
    }

    fn build_one(n: usize) -> Vec<f32> {
        let mut m = vec![0.0f32; n * n];
        let scale0 = (1.0 / n as f64).sqrt();
        let scale = (2.0 / n as f64).sqrt();
        for k in 0..n {
            let a = if k == 0 { scale0 } else { scale };
            for x in 0..n {
                let angle = std::f64::consts::PI * (2.0 * x as f64 + 1.0) * k as f64
                    / (2.0 * n as f64);
                m[k * n + x] = (a * angle.cos()) as f32;
            }
        }
        m
    }

    fn for_size(&self, size: u32) -> &[f32] {
        let idx = (size.trailing_zeros() - MIN_BLOCK_SIZE.trailing_zeros()) as usize;
        &self.basis[idx]
    }
}

static TABLES: OnceLock<BasisTables> = OnceLock::new();

/// Force initialization of the transform basis tables.
///
/// Idempotent; safe to call more than once. Lazily triggered on first use
/// as well, so this exists to front-load the work at module setup time.
pub fn init_tables() {
    let _ = tables();
}

fn tables() -> &'static BasisTables {
    TABLES.get_or_init(BasisTables::build)
}

fn validate_size(size: u32) -> Result<(), TransformError> {
    if !size.is_power_of_two() || !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&size) {
        return Err(TransformError::UnsupportedSize { size });
    }
    Ok(())
}

/// Forward 2D DCT of a square residual block.
///
/// Input is `size * size` residual samples in row-major order; output is
/// the coefficient block in the same layout, DC first.
pub fn forward(residual: &[i32], size: u32) -> Result<Vec<f32>, TransformError> {
    validate_size(size)?;
    let n = size as usize;
    debug_assert_eq!(residual.len(), n * n);
    let basis = tables().for_size(size);

    // Rows: tmp = X * B^T
    let mut tmp = vec![0.0f32; n * n];
    for row in 0..n {
        for k in 0..n {
            let mut sum = 0.0f32;
            for x in 0..n {
                sum += residual[row * n + x] as f32 * basis[k * n + x];
            }
            tmp[row * n + k] = sum;
        }
    }

    // Columns: out = B * tmp
    let mut out = vec![0.0f32; n * n];
    for k in 0..n {
        for col in 0..n {
            let mut sum = 0.0f32;
            for y in 0..n {
                sum += tmp[y * n + col] * basis[k * n + y];
            }
            out[k * n + col] = sum;
        }
    }
    Ok(out)
}

/// Inverse 2D DCT back to residual samples.
pub fn inverse(coeffs: &[f32], size: u32) -> Result<Vec<i32>, TransformError> {
    validate_size(size)?;
    let n = size as usize;
    debug_assert_eq!(coeffs.len(), n * n);
    let basis = tables().for_size(size);

    // Columns first: tmp = B^T * C
    let mut tmp = vec![0.0f32; n * n];
    for y in 0..n {
        for col in 0..n {
            let mut sum = 0.0f32;
            for k in 0..n {
                sum += basis[k * n + y] * coeffs[k * n + col];
            }
            tmp[y * n + col] = sum;
        }
    }

    // Rows: out = tmp * B
    let mut out = vec![0i32; n * n];
    for row in 0..n {
        for x in 0..n {
            let mut sum = 0.0f32;
            for k in 0..n {
                sum += tmp[row * n + k] * basis[k * n + x];
            }
            out[row * n + x] = round_half_away(sum);
        }
    }
    Ok(out)
}

/// Round half away from zero, the quantizer's fixed rounding rule.
#[inline]
pub fn round_half_away(v: f32) -> i32 {
    if v >= 0.0 {
        (v + 0.5) as i32
    } else {
        -((-v + 0.5) as i32)
    }
}

/// Scalar quantization of a coefficient block by a uniform step.
pub fn quantize(coeffs: &[f32], step: u16) -> Vec<i32> {
    debug_assert!(step >= 1);
    let step = step as f32;
    coeffs.iter().map(|&c| round_half_away(c / step)).collect()
}

/// Map quantized levels back to reconstruction coefficients.
pub fn dequantize(levels: &[i32], step: u16) -> Vec<f32> {
    let step = step as f32;
    levels.iter().map(|&q| q as f32 * step).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_sizes_rejected() {
        assert!(matches!(
            forward(&[0; 9], 3),
            Err(TransformError::UnsupportedSize { size: 3 })
        ));
        assert!(forward(&[0; 4], 2).is_err());
        assert!(forward(&[0; 128 * 128], 128).is_err());
        assert!(inverse(&[0.0; 9], 3).is_err());
    }

    #[test]
    fn test_all_supported_sizes_accepted() {
        for size in [4u32, 8, 16, 32, 64] {
            let n = (size * size) as usize;
            assert!(forward(&vec![1i32; n], size).is_ok(), "size {}", size);
        }
    }

    #[test]
    fn test_zero_residual_gives_zero_coefficients() {
        let coeffs = forward(&[0; 64], 8).unwrap();
        assert!(coeffs.iter().all(|&c| c == 0.0));
    }

    #[test]
    fn test_flat_residual_is_dc_only() {
        let coeffs = forward(&[10; 16], 4).unwrap();
        // DC = 10 * N for an orthonormal 2D DCT of a flat NxN block.
        assert!((coeffs[0] - 40.0).abs() < 1e-3);
        for &c in &coeffs[1..] {
            assert!(c.abs() < 1e-3, "AC coefficient {} not ~0", c);
        }
    }

    #[test]
    fn test_forward_inverse_roundtrip() {
        let residual: Vec<i32> = (0..64).map(|i| ((i * 7) % 50) - 25).collect();
        let coeffs = forward(&residual, 8).unwrap();
        let back = inverse(&coeffs, 8).unwrap();
        assert_eq!(residual, back);
    }

    #[test]
    fn test_round_half_away() {
        assert_eq!(round_half_away(0.5), 1);
        assert_eq!(round_half_away(-0.5), -1);
        assert_eq!(round_half_away(1.49), 1);
        assert_eq!(round_half_away(-1.49), -1);
        assert_eq!(round_half_away(2.5), 3);
        assert_eq!(round_half_away(-2.5), -3);
        assert_eq!(round_half_away(0.0), 0);
    }

    #[test]
    fn test_quantize_dequantize() {
        let coeffs = vec![100.0f32, -100.0, 7.9, -7.9, 0.0];
        let q = quantize(&coeffs, 16);
        assert_eq!(q, vec![6, -6, 0, 0, 0]);
        let d = dequantize(&q, 16);
        assert_eq!(d, vec![96.0, -96.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_quantize_step_one_is_rounding() {
        let coeffs = vec![3.2f32, -3.7];
        assert_eq!(quantize(&coeffs, 1), vec![3, -4]);
    }

    #[test]
    fn test_init_tables_idempotent() {
        init_tables();
        init_tables();
        assert!(forward(&[0; 16], 4).is_ok());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn residual_strategy(size: u32) -> impl Strategy<Value = Vec<i32>> {
        let n = (size * size) as usize;
        prop::collection::vec(-255i32..=255, n..=n)
    }

    proptest! {
        /// Property: forward then inverse reproduces the residual exactly
        /// for 8-bit-range inputs (transform is orthonormal, rounding error
        /// stays below half a unit at these magnitudes).
        #[test]
        fn prop_transform_roundtrip_exact(residual in residual_strategy(8)) {
            let coeffs = forward(&residual, 8).unwrap();
            let back = inverse(&coeffs, 8).unwrap();
            prop_assert_eq!(residual, back);
        }

        /// Property: quantization never increases magnitude beyond
        /// coefficient / step plus one rounding unit.
        #[test]
        fn prop_quantize_bounded(
            coeff in -10000.0f32..10000.0,
            step in 1u16..=128,
        ) {
            let q = quantize(&[coeff], step)[0];
            let bound = (coeff.abs() / step as f32) + 1.0;
            prop_assert!((q.abs() as f32) <= bound);
        }

        /// Property: quantization is deterministic.
        #[test]
        fn prop_quantize_deterministic(
            residual in residual_strategy(4),
            step in 1u16..=64,
        ) {
            let c1 = quantize(&forward(&residual, 4).unwrap(), step);
            let c2 = quantize(&forward(&residual, 4).unwrap(), step);
            prop_assert_eq!(c1, c2);
        }
    }
}
