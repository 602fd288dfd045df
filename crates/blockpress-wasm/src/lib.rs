//! Blockpress WASM - WebAssembly bindings for Blockpress
//!
//! This crate exposes the blockpress-core encoding engine to
//! JavaScript/TypeScript applications through a one-shot encode boundary:
//! raw plane buffers in, a packaged bitstream out.
//!
//! # Module Structure
//!
//! - `encode` - Frame encoding entry points
//! - `types` - WASM-compatible wrapper types for encoded bitstreams
//!
//! # Usage
//!
//! ```typescript
//! import init, { encode_frame } from '@blockpress/wasm';
//!
//! // Initialize WASM module (must call first)
//! await init();
//!
//! // Encode a monochrome frame (chroma code 3)
//! const luma = new Uint8Array(width * height);
//! const stream = encode_frame(luma, undefined, undefined, width, height, 3, 75);
//! console.log(`Encoded ${stream.byte_length} bytes`);
//! ```

use wasm_bindgen::prelude::*;

mod encode;
mod types;

// Re-export public types
pub use encode::{encode_frame, encode_frame_with_config};
pub use types::JsEncodedBitstream;

/// Initialize the WASM module (called automatically on load).
///
/// Forces construction of the core's process-wide lookup tables so the
/// first encode call doesn't pay for them.
#[wasm_bindgen(start)]
pub fn init() {
    blockpress_core::init();
    #[cfg(target_arch = "wasm32")]
    web_sys::console::debug_1(
        &concat!("blockpress wasm ", env!("CARGO_PKG_VERSION"), " ready").into(),
    );
}

/// Get the version of the WASM module
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
