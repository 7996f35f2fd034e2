//! Cropkit WASM - WebAssembly bindings for the crop dialog
//!
//! Exposes `cropkit-core` to JavaScript as a [`JsCropDialog`] object that
//! owns the debounce timer and reports back through callbacks.
//!
//! # Module Structure
//!
//! - `dialog` - The crop dialog object and its timer
//! - `types` - JS-facing wrappers for rasters, artifacts and reports
//! - `blob` - Artifact to browser `Blob` conversion
//! - `logger` - `log` backend writing to the browser console
//!
//! # Usage
//!
//! ```typescript
//! import init, { JsCropDialog } from '@cropkit/wasm';
//!
//! await init();
//!
//! const dialog = new JsCropDialog({ exportFilter: 'lanczos3' }, 4 / 3, false);
//! dialog.set_on_preview((raster) => drawPreview(raster));
//! dialog.set_on_upload(async (blob) => {
//!   dialog.set_loading(true);
//!   await uploadImage(blob);
//!   dialog.set_loading(false);
//! });
//! dialog.load(new Uint8Array(await file.arrayBuffer()));
//! ```

use wasm_bindgen::prelude::*;

mod blob;
mod dialog;
mod logger;
mod types;

pub use blob::artifact_to_blob;
pub use dialog::JsCropDialog;
pub use types::{JsArtifact, JsRaster};

/// Initialize the WASM module (called automatically on load)
#[wasm_bindgen(start)]
pub fn init() {
    logger::install(logger::default_level());
}

/// Change how much of the pipeline's logging reaches the console.
///
/// Accepts `off`, `error`, `warn`, `info`, `debug` or `trace`.
#[wasm_bindgen]
pub fn set_log_level(level: &str) -> Result<(), JsValue> {
    let filter = logger::parse_level(level)
        .ok_or_else(|| JsValue::from_str(&format!("Unknown log level: {}", level)))?;
    log::set_max_level(filter);
    Ok(())
}

/// Get the version of the WASM module
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
