//! Block prediction: intra modes from reconstructed neighbors, plus a small
//! translational inter search when a reference plane is supplied.
//!
//! Every candidate mode is evaluated against the source block with a SAD
//! distortion proxy; ties keep the lowest mode index so identical input
//! always selects identical modes. Neighbor samples come from the
//! reconstruction plane (what a decoder would have), never from the source.

use serde::{Deserialize, Serialize};

use crate::partition::Block;
use crate::plane::Plane;

/// Fallback sample value when no neighbor has been coded yet. Matches the
/// zero-initialized reconstruction plane, so an all-zero frame predicts
/// exactly and carries no residual.
const DC_FALLBACK: i32 = 0;

/// Motion search radius for inter candidates, in samples.
pub const SEARCH_RANGE: i32 = 3;

/// Intra prediction modes, in tie-break order (lowest index wins).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum PredictionMode {
    /// Mean of the available neighbor samples.
    #[default]
    Dc = 0,
    /// Each row replicates its left neighbor.
    Horizontal = 1,
    /// Each column replicates its above neighbor.
    Vertical = 2,
    /// Average of the horizontal and vertical extrapolations.
    Planar = 3,
}

impl PredictionMode {
    /// All modes in evaluation order.
    pub const ALL: [PredictionMode; 4] = [
        PredictionMode::Dc,
        PredictionMode::Horizontal,
        PredictionMode::Vertical,
        PredictionMode::Planar,
    ];

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }
}

/// The chosen prediction for one block: side information for the entropy
/// coder plus the predicted samples for residual computation.
#[derive(Debug, Clone)]
pub struct Prediction {
    /// Intra mode; meaningful only when `motion` is `None`.
    pub mode: PredictionMode,
    /// Motion offset relative to the collocated reference block, when inter
    /// prediction won.
    pub motion: Option<(i8, i8)>,
    /// Predicted samples, `block.size * block.size`, row-major.
    pub pixels: Vec<i32>,
    /// SAD against the source over the clipped block area.
    pub cost: u64,
}

impl Prediction {
    pub fn is_inter(&self) -> bool {
        self.motion.is_some()
    }
}

/// Neighbor sample rows fetched once per block from the reconstruction.
struct Neighbors {
    /// Reconstructed row above the block, length `size`, or `None` at y = 0.
    above: Option<Vec<i32>>,
    /// Reconstructed column left of the block, length `size`, or `None` at x = 0.
    left: Option<Vec<i32>>,
}

impl Neighbors {
    fn fetch(recon: &Plane, block: &Block) -> Self {
        let above = (block.y > 0).then(|| {
            (0..block.size)
                .map(|i| recon.get_clamped(block.x + i, block.y - 1) as i32)
                .collect()
        });
        let left = (block.x > 0).then(|| {
            (0..block.size)
                .map(|i| recon.get_clamped(block.x - 1, block.y + i) as i32)
                .collect()
        });
        Self { above, left }
    }

    fn dc(&self) -> i32 {
        match (&self.above, &self.left) {
            (Some(a), Some(l)) => {
                let sum: i32 = a.iter().chain(l.iter()).sum();
                let n = (a.len() + l.len()) as i32;
                (sum + n / 2) / n
            }
            (Some(a), None) => {
                let sum: i32 = a.iter().sum();
                (sum + a.len() as i32 / 2) / a.len() as i32
            }
            (None, Some(l)) => {
                let sum: i32 = l.iter().sum();
                (sum + l.len() as i32 / 2) / l.len() as i32
            }
            (None, None) => DC_FALLBACK,
        }
    }
}

fn predict_intra(mode: PredictionMode, neighbors: &Neighbors, size: u32) -> Vec<i32> {
    let n = size as usize;
    let mut out = vec![0i32; n * n];
    let dc = neighbors.dc();
    for row in 0..n {
        for col in 0..n {
            let h = neighbors
                .left
                .as_ref()
                .map_or(DC_FALLBACK, |l| l[row]);
            let v = neighbors
                .above
                .as_ref()
                .map_or(DC_FALLBACK, |a| a[col]);
            out[row * n + col] = match mode {
                PredictionMode::Dc => dc,
                PredictionMode::Horizontal => h,
                PredictionMode::Vertical => v,
                PredictionMode::Planar => (h + v + 1) / 2,
            };
        }
    }
    out
}

/// SAD between the source block and a candidate, over the clipped area only.
fn sad(source: &Plane, block: &Block, candidate: &[i32]) -> u64 {
    let n = block.size as usize;
    let mut total = 0u64;
    for row in 0..block.height {
        for col in 0..block.width {
            let s = source.get_clamped(block.x + col, block.y + row) as i32;
            let p = candidate[(row as usize) * n + col as usize];
            total += s.abs_diff(p) as u64;
        }
    }
    total
}

fn predict_inter(reference: &Plane, block: &Block, dx: i32, dy: i32) -> Vec<i32> {
    let n = block.size as usize;
    let mut out = vec![0i32; n * n];
    for row in 0..n {
        for col in 0..n {
            // Clamp the motion-shifted coordinate to the reference extent.
            let rx = (block.x as i64 + col as i64 + dx as i64)
                .clamp(0, reference.width() as i64 - 1) as u32;
            let ry = (block.y as i64 + row as i64 + dy as i64)
                .clamp(0, reference.height() as i64 - 1) as u32;
            out[row * n + col] = reference.get_clamped(rx, ry) as i32;
        }
    }
    out
}

/// Select the best prediction for a block.
///
/// Intra candidates are always evaluated; inter candidates (a full search
/// over ±[`SEARCH_RANGE`] offsets in row-major order) only when a reference
/// plane is supplied. Ties keep the earlier candidate: intra modes in index
/// order, then inter offsets, so intra wins an intra/inter tie.
pub fn select_prediction(
    source: &Plane,
    recon: &Plane,
    reference: Option<&Plane>,
    block: &Block,
) -> Prediction {
    let neighbors = Neighbors::fetch(recon, block);

    let mut best: Option<Prediction> = None;
    for mode in PredictionMode::ALL {
        let pixels = predict_intra(mode, &neighbors, block.size);
        let cost = sad(source, block, &pixels);
        if best.as_ref().is_none_or(|b| cost < b.cost) {
            best = Some(Prediction {
                mode,
                motion: None,
                pixels,
                cost,
            });
        }
    }

    if let Some(reference) = reference {
        for dy in -SEARCH_RANGE..=SEARCH_RANGE {
            for dx in -SEARCH_RANGE..=SEARCH_RANGE {
                let pixels = predict_inter(reference, block, dx, dy);
                let cost = sad(source, block, &pixels);
                if best.as_ref().is_none_or(|b| cost < b.cost) {
                    best = Some(Prediction {
                        mode: PredictionMode::Dc,
                        motion: Some((dx as i8, dy as i8)),
                        pixels,
                        cost,
                    });
                }
            }
        }
    }

    best.expect("at least one candidate mode is always evaluated")
}
