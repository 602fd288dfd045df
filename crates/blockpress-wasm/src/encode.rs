//! Frame encoding WASM bindings.
//!
//! This module exposes the blockpress-core encoding pipeline to JavaScript.
//! All buffers crossing the boundary are caller-allocated and copied at the
//! call; the core never retains them beyond one invocation.
//!
//! # Functions
//!
//! - [`encode_frame`] - Encode raw planes with a quality target
//! - [`encode_frame_with_config`] - Encode with a structured configuration object
//!
//! # Example
//!
//! ```typescript
//! import { encode_frame, encode_frame_with_config } from '@blockpress/wasm';
//!
//! // 4:2:0 frame at quality 75
//! const stream = encode_frame(luma, cb, cr, width, height, 0, 75);
//!
//! // Bit-budget target via a config object
//! const stream = encode_frame_with_config(luma, cb, cr, width, height, 3, {
//!   rate_control: { BitBudget: 120000 },
//!   max_block_size: 64,
//!   min_block_size: 4,
//! });
//! ```

use blockpress_core::{ChromaSampling, EncoderConfig, Frame};
use wasm_bindgen::prelude::*;

use crate::types::JsEncodedBitstream;

fn build_frame(
    luma: &[u8],
    cb: Option<Vec<u8>>,
    cr: Option<Vec<u8>>,
    width: u32,
    height: u32,
    chroma_code: u8,
) -> Result<Frame, JsValue> {
    let chroma_sampling =
        ChromaSampling::from_code(chroma_code).map_err(|e| JsValue::from_str(&e.to_string()))?;
    Frame::new(width, height, chroma_sampling, luma.to_vec(), cb, cr)
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Encode one frame of raw planes into a complete bitstream.
///
/// # Arguments
///
/// * `luma` - Y plane samples, `width * height` bytes, row-major
/// * `cb`, `cr` - chroma plane samples sized per the sampling layout, or
///   `undefined` for monochrome
/// * `width`, `height` - frame dimensions in luma samples
/// * `chroma_code` - sampling layout (0=4:2:0, 1=4:2:2, 2=4:4:4, 3=monochrome)
/// * `quality` - quality target (1-100, where 100 is highest quality)
///
/// # Errors
///
/// Returns an error if:
/// - The chroma code is not 0..=3
/// - Width or height is zero
/// - A plane buffer doesn't match the size its layout demands
#[wasm_bindgen]
pub fn encode_frame(
    luma: &[u8],
    cb: Option<Vec<u8>>,
    cr: Option<Vec<u8>>,
    width: u32,
    height: u32,
    chroma_code: u8,
    quality: u8,
) -> Result<JsEncodedBitstream, JsValue> {
    let frame = build_frame(luma, cb, cr, width, height, chroma_code)?;
    let config = EncoderConfig::with_quality(quality);
    blockpress_core::encode_frame(&frame, &config, None)
        .map(JsEncodedBitstream::new)
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Encode one frame with a structured [`EncoderConfig`].
///
/// The `config` object is deserialized from JavaScript; see the module
/// example for its shape. Missing or malformed fields are an error.
#[wasm_bindgen]
pub fn encode_frame_with_config(
    luma: &[u8],
    cb: Option<Vec<u8>>,
    cr: Option<Vec<u8>>,
    width: u32,
    height: u32,
    chroma_code: u8,
    config: JsValue,
) -> Result<JsEncodedBitstream, JsValue> {
    let config: EncoderConfig = serde_wasm_bindgen::from_value(config)
        .map_err(|e| JsValue::from_str(&format!("Invalid encoder config: {e}")))?;
    let frame = build_frame(luma, cb, cr, width, height, chroma_code)?;
    blockpress_core::encode_frame(&frame, &config, None)
        .map(JsEncodedBitstream::new)
        .map_err(|e| JsValue::from_str(&e.to_string()))
}
