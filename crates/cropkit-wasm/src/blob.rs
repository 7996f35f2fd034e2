//! Handing artifacts to the browser as `Blob`s.

use cropkit_core::OutputArtifact;
use wasm_bindgen::prelude::*;
use web_sys::BlobPropertyBag;

/// Wrap the artifact bytes in a `Blob` typed with the artifact's MIME type.
///
/// # Errors
///
/// Returns the JS exception if the `Blob` constructor throws.
pub fn artifact_to_blob(artifact: &OutputArtifact) -> Result<web_sys::Blob, JsValue> {
    let bytes = js_sys::Uint8Array::from(artifact.bytes());
    let parts = js_sys::Array::new();
    parts.push(&bytes);

    let opts = BlobPropertyBag::new();
    opts.set_type(artifact.mime_type());
    web_sys::Blob::new_with_u8_array_sequence_and_options(&parts, &opts)
}
