//! Rate controller: per-frame feedback between coded bits and quantizer step.
//!
//! The controller tracks cumulative bits against a budget spread linearly
//! over the frame's samples. After every coded block it nudges the step for
//! the next block up or down within clamped bounds. Budget exhaustion is not
//! an error: the step clamps at the maximum and coding continues.

use crate::RateControl;

/// Smallest permitted quantizer step (finest quantization).
pub const MIN_STEP: u16 = 1;

/// Largest permitted quantizer step (coarsest quantization).
pub const MAX_STEP: u16 = 128;

/// End-of-frame overshoot tolerance for the budget invariant: cumulative
/// bits stay within budget * (1 + RATE_TOLERANCE).
pub const RATE_TOLERANCE: f64 = 0.25;

/// Map a quality setting (1..=100) to an initial quantizer step.
///
/// Quality 100 yields the finest step; quality 1 the coarsest seed. Values
/// outside the range are clamped.
pub fn step_for_quality(quality: u8) -> u16 {
    let q = quality.clamp(1, 100) as u32;
    (((101 - q) * 64 + 99) / 100).max(MIN_STEP as u32) as u16
}

/// Per-frame rate state. Reset by constructing a new controller.
#[derive(Debug)]
pub struct RateController {
    step: u16,
    budget_bits: Option<u64>,
    spent_bits: u64,
    coded_samples: u64,
    total_samples: u64,
}

impl RateController {
    /// Seed a controller for one frame of `total_samples` pixels.
    pub fn new(rate_control: RateControl, total_samples: u64) -> Self {
        let (step, budget_bits) = match rate_control {
            RateControl::Quality(q) => (step_for_quality(q), None),
            // Size-targeted coding starts from a mid-quality step and lets
            // feedback take over.
            RateControl::BitBudget(bits) => (step_for_quality(50), Some(bits as u64)),
        };
        Self {
            step,
            budget_bits,
            spent_bits: 0,
            coded_samples: 0,
            total_samples: total_samples.max(1),
        }
    }

    /// Quantizer step to use for the next block.
    pub fn step(&self) -> u16 {
        self.step
    }

    /// Cumulative bits recorded so far this frame.
    pub fn bits_spent(&self) -> u64 {
        self.spent_bits
    }

    /// Record a coded block and adjust the step for the next one.
    ///
    /// `bits` is the entropy-coded size of the block; `samples` its clipped
    /// area. In quality mode the step never moves; in budget mode it steps
    /// up when spending runs ahead of the proportional budget and down when
    /// it runs behind, clamped to [MIN_STEP, MAX_STEP].
    pub fn record_block(&mut self, bits: u64, samples: u64) {
        self.spent_bits += bits;
        self.coded_samples = (self.coded_samples + samples).min(self.total_samples);

        let Some(budget) = self.budget_bits else {
            return;
        };

        let allowed_so_far = budget * self.coded_samples / self.total_samples;
        if self.spent_bits > allowed_so_far {
            let up = self.step / 8 + 1;
            self.step = (self.step + up).min(MAX_STEP);
        } else if self.spent_bits < allowed_so_far {
            let down = self.step / 8 + 1;
            self.step = self.step.saturating_sub(down).max(MIN_STEP);
        }
        // Exactly on budget: leave the step alone.
    }
}
