//! Frame assembly: a luma plane plus optional chroma planes.
//!
//! Plane dimensions are derived deterministically from the frame dimensions
//! and the [`ChromaSampling`] layout, so a decoder can reconstruct the plane
//! geometry from header metadata alone. Monochrome frames carry only luma.

use crate::plane::Plane;
use crate::{ChromaSampling, ConfigError};

/// A frame of raw pixel planes in a fixed chroma-sampling layout.
#[derive(Debug, Clone)]
pub struct Frame {
    width: u32,
    height: u32,
    chroma_sampling: ChromaSampling,
    y: Plane,
    cb: Option<Plane>,
    cr: Option<Plane>,
}

impl Frame {
    /// Build a frame from raw plane buffers with tight strides.
    ///
    /// Chroma buffers must both be present (sized per the sampling layout)
    /// unless the layout is monochrome, in which case both must be absent.
    pub fn new(
        width: u32,
        height: u32,
        chroma_sampling: ChromaSampling,
        luma: Vec<u8>,
        cb: Option<Vec<u8>>,
        cr: Option<Vec<u8>>,
    ) -> Result<Self, ConfigError> {
        if width == 0 || height == 0 {
            return Err(ConfigError::InvalidDimensions { width, height });
        }

        let expected_luma = (width as usize) * (height as usize);
        if luma.len() != expected_luma {
            return Err(ConfigError::PlaneSizeMismatch {
                plane: "Y",
                expected: expected_luma,
                actual: luma.len(),
            });
        }
        let y = Plane::from_raw(luma, width, height, width)
            .map_err(|_| ConfigError::InvalidDimensions { width, height })?;

        let (cb, cr) = match chroma_sampling.chroma_dimensions(width, height) {
            None => {
                if cb.is_some() || cr.is_some() {
                    return Err(ConfigError::UnexpectedChromaPlane);
                }
                (None, None)
            }
            Some((cw, ch)) => {
                let (cb_data, cr_data) = match (cb, cr) {
                    (Some(cb), Some(cr)) => (cb, cr),
                    _ => return Err(ConfigError::MissingChromaPlane),
                };
                let expected = (cw as usize) * (ch as usize);
                if cb_data.len() != expected {
                    return Err(ConfigError::PlaneSizeMismatch {
                        plane: "Cb",
                        expected,
                        actual: cb_data.len(),
                    });
                }
                if cr_data.len() != expected {
                    return Err(ConfigError::PlaneSizeMismatch {
                        plane: "Cr",
                        expected,
                        actual: cr_data.len(),
                    });
                }
                let cb = Plane::from_raw(cb_data, cw, ch, cw)
                    .map_err(|_| ConfigError::InvalidDimensions { width: cw, height: ch })?;
                let cr = Plane::from_raw(cr_data, cw, ch, cw)
                    .map_err(|_| ConfigError::InvalidDimensions { width: cw, height: ch })?;
                (Some(cb), Some(cr))
            }
        };

        Ok(Self {
            width,
            height,
            chroma_sampling,
            y,
            cb,
            cr,
        })
    }

    /// Build a zero-filled frame. Used for reconstruction frames.
    pub fn blank(
        width: u32,
        height: u32,
        chroma_sampling: ChromaSampling,
    ) -> Result<Self, ConfigError> {
        let luma = vec![0u8; (width as usize) * (height as usize)];
        let (cb, cr) = match chroma_sampling.chroma_dimensions(width, height) {
            None => (None, None),
            Some((cw, ch)) => {
                let n = (cw as usize) * (ch as usize);
                (Some(vec![0u8; n]), Some(vec![0u8; n]))
            }
        };
        Self::new(width, height, chroma_sampling, luma, cb, cr)
    }

    /// Frame width in luma samples.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Frame height in luma samples.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The chroma-sampling layout this frame was built with.
    pub fn chroma_sampling(&self) -> ChromaSampling {
        self.chroma_sampling
    }

    /// The luma plane.
    pub fn luma(&self) -> &Plane {
        &self.y
    }

    /// Number of planes (1 for monochrome, 3 otherwise).
    pub fn plane_count(&self) -> usize {
        if self.cb.is_some() {
            3
        } else {
            1
        }
    }

    /// Planes in coding order: Y, then Cb and Cr when present.
    pub fn planes(&self) -> impl Iterator<Item = &Plane> {
        [Some(&self.y), self.cb.as_ref(), self.cr.as_ref()]
            .into_iter()
            .flatten()
    }

    /// Mutable planes in coding order.
    pub fn planes_mut(&mut self) -> impl Iterator<Item = &mut Plane> {
        [Some(&mut self.y), self.cb.as_mut(), self.cr.as_mut()]
            .into_iter()
            .flatten()
    }

    /// Total samples across all planes.
    pub fn total_samples(&self) -> u64 {
        self.planes().map(Plane::sample_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chroma_bufs(w: u32, h: u32, cs: ChromaSampling) -> (Option<Vec<u8>>, Option<Vec<u8>>) {
        match cs.chroma_dimensions(w, h) {
            None => (None, None),
            Some((cw, ch)) => {
                let n = (cw * ch) as usize;
                (Some(vec![0u8; n]), Some(vec![0u8; n]))
            }
        }
    }

    #[test]
    fn test_420_chroma_plane_dimensions() {
        let (cb, cr) = chroma_bufs(16, 8, ChromaSampling::Cs420);
        let frame = Frame::new(16, 8, ChromaSampling::Cs420, vec![0u8; 128], cb, cr).unwrap();
        let planes: Vec<_> = frame.planes().collect();
        assert_eq!(planes.len(), 3);
        assert_eq!((planes[1].width(), planes[1].height()), (8, 4));
        assert_eq!((planes[2].width(), planes[2].height()), (8, 4));
    }

    #[test]
    fn test_422_chroma_plane_dimensions() {
        let (cb, cr) = chroma_bufs(16, 8, ChromaSampling::Cs422);
        let frame = Frame::new(16, 8, ChromaSampling::Cs422, vec![0u8; 128], cb, cr).unwrap();
        let cb = frame.planes().nth(1).unwrap();
        assert_eq!((cb.width(), cb.height()), (8, 8));
    }

    #[test]
    fn test_444_chroma_plane_dimensions() {
        let (cb, cr) = chroma_bufs(16, 8, ChromaSampling::Cs444);
        let frame = Frame::new(16, 8, ChromaSampling::Cs444, vec![0u8; 128], cb, cr).unwrap();
        let cb = frame.planes().nth(1).unwrap();
        assert_eq!((cb.width(), cb.height()), (16, 8));
    }

    #[test]
    fn test_odd_dimensions_round_up() {
        let (cb, cr) = chroma_bufs(15, 9, ChromaSampling::Cs420);
        let frame = Frame::new(15, 9, ChromaSampling::Cs420, vec![0u8; 135], cb, cr).unwrap();
        let cb = frame.planes().nth(1).unwrap();
        assert_eq!((cb.width(), cb.height()), (8, 5));
    }

    #[test]
    fn test_monochrome_has_single_plane() {
        let frame = Frame::new(16, 16, ChromaSampling::Monochrome, vec![0u8; 256], None, None)
            .unwrap();
        assert_eq!(frame.plane_count(), 1);
        assert_eq!(frame.planes().count(), 1);
        assert_eq!(frame.total_samples(), 256);
    }

    #[test]
    fn test_monochrome_rejects_chroma_planes() {
        let result = Frame::new(
            16,
            16,
            ChromaSampling::Monochrome,
            vec![0u8; 256],
            Some(vec![0u8; 64]),
            Some(vec![0u8; 64]),
        );
        assert!(matches!(result, Err(ConfigError::UnexpectedChromaPlane)));
    }

    #[test]
    fn test_missing_chroma_plane_rejected() {
        let result = Frame::new(16, 16, ChromaSampling::Cs420, vec![0u8; 256], None, None);
        assert!(matches!(result, Err(ConfigError::MissingChromaPlane)));
    }

    #[test]
    fn test_luma_size_mismatch_rejected() {
        let result = Frame::new(16, 16, ChromaSampling::Monochrome, vec![0u8; 100], None, None);
        assert!(matches!(
            result,
            Err(ConfigError::PlaneSizeMismatch { plane: "Y", .. })
        ));
    }

    #[test]
    fn test_chroma_size_mismatch_rejected() {
        let result = Frame::new(
            16,
            16,
            ChromaSampling::Cs420,
            vec![0u8; 256],
            Some(vec![0u8; 10]),
            Some(vec![0u8; 64]),
        );
        assert!(matches!(
            result,
            Err(ConfigError::PlaneSizeMismatch { plane: "Cb", .. })
        ));
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let result = Frame::new(0, 16, ChromaSampling::Monochrome, vec![], None, None);
        assert!(matches!(result, Err(ConfigError::InvalidDimensions { .. })));
    }
}
