//! WASM-compatible wrapper types for encoded bitstreams.
//!
//! This module provides JavaScript-friendly types that wrap the core
//! Blockpress output, handling the conversion between Rust and JavaScript
//! data representations.

use blockpress_core::SequenceHeader;
use wasm_bindgen::prelude::*;

/// An encoded bitstream wrapper for JavaScript.
///
/// # Memory Management
///
/// The coded bytes are stored in WASM memory. When you call `bytes()`, a
/// copy is made to JavaScript memory as a `Uint8Array`. The `free()` method
/// can be called to explicitly release WASM memory, but this is optional as
/// wasm-bindgen's finalizer will handle cleanup automatically.
#[wasm_bindgen]
pub struct JsEncodedBitstream {
    data: Vec<u8>,
}

impl JsEncodedBitstream {
    pub(crate) fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

#[wasm_bindgen]
impl JsEncodedBitstream {
    /// The full bitstream as a `Uint8Array` copy.
    pub fn bytes(&self) -> Vec<u8> {
        self.data.clone()
    }

    /// Size of the bitstream in bytes.
    #[wasm_bindgen(getter)]
    pub fn byte_length(&self) -> usize {
        self.data.len()
    }

    /// Chroma sampling code recorded in the sequence header
    /// (0=4:2:0, 1=4:2:2, 2=4:4:4, 3=monochrome).
    pub fn chroma_code(&self) -> Result<u8, JsValue> {
        self.header().map(|h| h.chroma_sampling.code())
    }

    /// Frame width recorded in the sequence header.
    pub fn width(&self) -> Result<u32, JsValue> {
        self.header().map(|h| h.width)
    }

    /// Frame height recorded in the sequence header.
    pub fn height(&self) -> Result<u32, JsValue> {
        self.header().map(|h| h.height)
    }

    /// Number of frames recorded in the sequence header.
    pub fn frame_count(&self) -> Result<u32, JsValue> {
        self.header().map(|h| h.frame_count)
    }
}

impl JsEncodedBitstream {
    fn header(&self) -> Result<SequenceHeader, JsValue> {
        SequenceHeader::parse(&self.data)
            .map(|(header, _)| header)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }
}
