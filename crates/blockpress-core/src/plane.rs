//! Plane buffer: typed storage for one color plane.
//!
//! A [`Plane`] owns the samples of a single color component (luma or one
//! chroma channel) at its own resolution. All pixel access is bounds-checked
//! against the declared dimensions; a plane never resizes after construction.

use thiserror::Error;

/// Errors for plane construction and pixel access.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlaneError {
    /// Pixel coordinates outside the plane's declared dimensions.
    ///
    /// This indicates a partitioner or caller defect, not a recoverable
    /// runtime condition.
    #[error("Pixel access out of bounds: ({x}, {y}) in {width}x{height} plane")]
    OutOfBounds { x: u32, y: u32, width: u32, height: u32 },

    /// Sample buffer length doesn't match stride * height.
    #[error("Invalid sample data: expected {expected} bytes (stride * height), got {actual}")]
    DataSizeMismatch { expected: usize, actual: usize },

    /// Width or height is zero, or stride is smaller than width.
    #[error("Invalid plane geometry: width {width}, height {height}, stride {stride}")]
    InvalidGeometry { width: u32, height: u32, stride: u32 },
}

/// One color plane: 8-bit samples in row-major order with an explicit stride.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plane {
    width: u32,
    height: u32,
    stride: u32,
    data: Vec<u8>,
}

impl Plane {
    /// Construct a plane from caller-supplied raw samples.
    ///
    /// `data.len()` must equal `stride * height` and `stride >= width`.
    pub fn from_raw(data: Vec<u8>, width: u32, height: u32, stride: u32) -> Result<Self, PlaneError> {
        if width == 0 || height == 0 || stride < width {
            return Err(PlaneError::InvalidGeometry { width, height, stride });
        }
        let expected = (stride as usize) * (height as usize);
        if data.len() != expected {
            return Err(PlaneError::DataSizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            stride,
            data,
        })
    }

    /// Construct a zero-filled plane with tight stride.
    ///
    /// Used for reconstruction planes during encoding.
    pub fn blank(width: u32, height: u32) -> Result<Self, PlaneError> {
        if width == 0 || height == 0 {
            return Err(PlaneError::InvalidGeometry {
                width,
                height,
                stride: width,
            });
        }
        Ok(Self {
            width,
            height,
            stride: width,
            data: vec![0u8; (width as usize) * (height as usize)],
        })
    }

    /// Plane width in samples.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Plane height in samples.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row stride in samples.
    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// Total samples inside the declared dimensions (excludes stride padding).
    pub fn sample_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Raw sample buffer, including any stride padding.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        (y as usize) * (self.stride as usize) + (x as usize)
    }

    /// Bounds-checked pixel read.
    pub fn get(&self, x: u32, y: u32) -> Result<u8, PlaneError> {
        if x >= self.width || y >= self.height {
            return Err(PlaneError::OutOfBounds {
                x,
                y,
                width: self.width,
                height: self.height,
            });
        }
        Ok(self.data[self.index(x, y)])
    }

    /// Bounds-checked pixel write.
    pub fn set(&mut self, x: u32, y: u32, value: u8) -> Result<(), PlaneError> {
        if x >= self.width || y >= self.height {
            return Err(PlaneError::OutOfBounds {
                x,
                y,
                width: self.width,
                height: self.height,
            });
        }
        let idx = self.index(x, y);
        self.data[idx] = value;
        Ok(())
    }

    /// Clamped pixel read: coordinates past the plane edge replicate the
    /// nearest edge sample. Used for block padding and neighbor fetches.
    #[inline]
    pub fn get_clamped(&self, x: u32, y: u32) -> u8 {
        let cx = x.min(self.width - 1);
        let cy = y.min(self.height - 1);
        self.data[self.index(cx, cy)]
    }

    /// Extract a `size`x`size` square region at (x, y) as widened samples.
    ///
    /// Samples past the right/bottom plane edge replicate the edge, so the
    /// result is always `size * size` long regardless of clipping.
    pub fn region_i32(&self, x: u32, y: u32, size: u32) -> Vec<i32> {
        let mut out = Vec::with_capacity((size as usize) * (size as usize));
        for row in 0..size {
            for col in 0..size {
                out.push(self.get_clamped(x + col, y + row) as i32);
            }
        }
        out
    }

    /// Write back a `size`x`size` region at (x, y), clamping sample values
    /// to 0..=255 and skipping positions outside the plane.
    pub fn write_region(&mut self, x: u32, y: u32, size: u32, values: &[i32]) {
        debug_assert_eq!(values.len(), (size as usize) * (size as usize));
        for row in 0..size {
            let py = y + row;
            if py >= self.height {
                break;
            }
            for col in 0..size {
                let px = x + col;
                if px >= self.width {
                    break;
                }
                let v = values[(row * size + col) as usize].clamp(0, 255) as u8;
                let idx = self.index(px, py);
                self.data[idx] = v;
            }
        }
    }
}
