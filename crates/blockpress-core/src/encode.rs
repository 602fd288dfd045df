//! Frame encoding pipeline.
//!
//! One frame flows: partition each plane into a quadtree, then per leaf
//! block predict, compute the residual, transform and quantize at the rate
//! controller's current step, entropy-code the side information and levels,
//! and reconstruct the block so later blocks predict from decoded samples.
//! The rate state and entropy context are threaded by exclusive reference
//! through the traversal, so symbol order (and therefore the output) is
//! fully deterministic.

use thiserror::Error;

use crate::bitstream::{self, BitstreamError, EncodedFrame, FrameType};
use crate::entropy::EntropyEncoder;
use crate::frame::Frame;
use crate::partition::{self, PartitionError, PartitionTree};
use crate::plane::{Plane, PlaneError};
use crate::predict;
use crate::rate::RateController;
use crate::transform::{self, TransformError};
use crate::{ConfigError, EncoderConfig};

/// Any failure of one encode invocation. No partial bitstream is ever
/// returned alongside an error.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Plane(#[from] PlaneError),

    #[error(transparent)]
    Partition(#[from] PartitionError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Bitstream(#[from] BitstreamError),
}

/// Encode a single frame into a complete, self-contained bitstream.
///
/// When `reference` is supplied the frame is coded as an inter frame and
/// blocks may predict from the reference; the reference must match the
/// frame's geometry and chroma layout. The caller keeps ownership of all
/// supplied buffers.
pub fn encode_frame(
    frame: &Frame,
    config: &EncoderConfig,
    reference: Option<&Frame>,
) -> Result<Vec<u8>, EncodeError> {
    crate::init();
    if let Some(reference) = reference {
        validate_reference(frame, reference)?;
    }
    let (encoded, _recon) = encode_single(frame, config, reference)?;
    let bytes = bitstream::pack_sequence(
        frame.chroma_sampling(),
        frame.width(),
        frame.height(),
        &[encoded],
    )?;
    Ok(bytes)
}

/// Encode a sequence of frames into one bitstream.
///
/// The first frame is intra-coded; every later frame is inter-coded against
/// the previous frame's reconstruction. All frames must share dimensions
/// and chroma layout.
pub fn encode_sequence(frames: &[Frame], config: &EncoderConfig) -> Result<Vec<u8>, EncodeError> {
    let Some(first) = frames.first() else {
        return Err(BitstreamError::EmptySequence.into());
    };
    crate::init();
    for (index, frame) in frames.iter().enumerate() {
        if frame.chroma_sampling() != first.chroma_sampling() {
            return Err(ConfigError::ChromaSamplingMismatch { index }.into());
        }
    }

    let mut encoded = Vec::with_capacity(frames.len());
    let mut previous: Option<Frame> = None;
    for frame in frames {
        if let Some(prev) = previous.as_ref() {
            validate_reference(frame, prev)?;
        }
        let (frame_bytes, recon) = encode_single(frame, config, previous.as_ref())?;
        encoded.push(frame_bytes);
        previous = Some(recon);
    }
    let bytes = bitstream::pack_sequence(
        first.chroma_sampling(),
        first.width(),
        first.height(),
        &encoded,
    )?;
    Ok(bytes)
}

fn validate_reference(frame: &Frame, reference: &Frame) -> Result<(), ConfigError> {
    if reference.width() != frame.width()
        || reference.height() != frame.height()
        || reference.chroma_sampling() != frame.chroma_sampling()
    {
        return Err(ConfigError::ReferenceMismatch);
    }
    Ok(())
}

/// Encode one frame's payload and produce its reconstruction for use as a
/// later reference.
fn encode_single(
    frame: &Frame,
    config: &EncoderConfig,
    reference: Option<&Frame>,
) -> Result<(EncodedFrame, Frame), EncodeError> {
    let mut rc = RateController::new(config.rate_control, frame.total_samples());
    let base_step = rc.step();
    let mut entropy = EntropyEncoder::new();
    let mut recon = Frame::blank(frame.width(), frame.height(), frame.chroma_sampling())?;

    let sources: Vec<&Plane> = frame.planes().collect();
    let references: Vec<&Plane> = reference.map(|r| r.planes().collect()).unwrap_or_default();

    for (i, recon_plane) in recon.planes_mut().enumerate() {
        let mut coder = PlaneCoder {
            source: sources[i],
            reference: references.get(i).copied(),
            recon: recon_plane,
            entropy: &mut entropy,
            rc: &mut rc,
        };
        coder.code_plane(config)?;
    }

    let encoded = EncodedFrame {
        frame_type: if reference.is_some() {
            FrameType::Inter
        } else {
            FrameType::Intra
        },
        base_step,
        width: frame.width(),
        height: frame.height(),
        payload: entropy.finish(),
    };
    Ok((encoded, recon))
}

/// Coding state for one plane's partition traversal.
struct PlaneCoder<'a> {
    source: &'a Plane,
    reference: Option<&'a Plane>,
    recon: &'a mut Plane,
    entropy: &'a mut EntropyEncoder,
    rc: &'a mut RateController,
}

impl PlaneCoder<'_> {
    fn code_plane(&mut self, config: &EncoderConfig) -> Result<(), EncodeError> {
        let tree = partition::partition_plane(
            self.source,
            config.max_block_size,
            config.min_block_size,
            partition::DEFAULT_SPLIT_THRESHOLD,
        )?;
        for &root in tree.roots() {
            self.code_node(&tree, root)?;
        }
        Ok(())
    }

    fn code_node(&mut self, tree: &PartitionTree, idx: usize) -> Result<(), EncodeError> {
        let node = tree.node(idx);
        if node.block.size > tree.min_block() {
            self.entropy.encode_split(!node.is_leaf());
        }
        match node.children {
            None => self.code_block(node.block),
            Some(children) => {
                for child in children.into_iter().flatten() {
                    self.code_node(tree, child)?;
                }
                Ok(())
            }
        }
    }

    fn code_block(&mut self, block: partition::Block) -> Result<(), EncodeError> {
        let bits_before = self.entropy.bits_emitted();

        let pred = predict::select_prediction(self.source, self.recon, self.reference, &block);
        if self.reference.is_some() {
            self.entropy.encode_is_inter(pred.is_inter());
        }
        match pred.motion {
            Some((dx, dy)) => self.entropy.encode_motion(dx, dy),
            None => self.entropy.encode_mode(pred.mode),
        }

        // Residual over the nominal square; samples outside the clipped
        // area carry no information and are zeroed.
        let n = block.size as usize;
        let mut residual = vec![0i32; n * n];
        for row in 0..block.height {
            for col in 0..block.width {
                let idx = (row as usize) * n + col as usize;
                let src = self.source.get_clamped(block.x + col, block.y + row) as i32;
                residual[idx] = src - pred.pixels[idx];
            }
        }

        let step = self.rc.step();
        let coeffs = transform::forward(&residual, block.size)?;
        let levels = transform::quantize(&coeffs, step);
        self.entropy.encode_coefficients(&levels);

        // Reconstruct so later blocks predict from decoded samples.
        let dequantized = transform::dequantize(&levels, step);
        let decoded_residual = transform::inverse(&dequantized, block.size)?;
        let reconstructed: Vec<i32> = pred
            .pixels
            .iter()
            .zip(decoded_residual)
            .map(|(&p, r)| p + r)
            .collect();
        self.recon.write_region(block.x, block.y, block.size, &reconstructed);

        let bits = self.entropy.bits_emitted() - bits_before;
        self.rc.record_block(bits, block.area());
        Ok(())
    }
}
