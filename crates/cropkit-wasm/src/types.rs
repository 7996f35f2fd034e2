//! WASM-compatible wrapper types.
//!
//! Rust-owned data crosses into JavaScript as copies; the wrappers keep the
//! dimensions alongside so callers can build `ImageData` or `Blob`s directly.

use cropkit_core::{CompressionOutcome, ConfirmReport, OutputArtifact, Raster};
use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::blob::artifact_to_blob;

/// A rendered preview surface.
#[wasm_bindgen]
pub struct JsRaster {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

#[wasm_bindgen]
impl JsRaster {
    #[wasm_bindgen(getter)]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[wasm_bindgen(getter)]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Straight-alpha RGBA bytes, ready for `new ImageData(...)`.
    ///
    /// Note: This copies the pixel data into JavaScript memory.
    pub fn pixels(&self) -> Vec<u8> {
        self.pixels.clone()
    }
}

impl JsRaster {
    pub(crate) fn from_raster(raster: &Raster) -> Self {
        Self {
            width: raster.width(),
            height: raster.height(),
            pixels: raster.as_raw().to_vec(),
        }
    }
}

/// An exported image.
#[wasm_bindgen]
pub struct JsArtifact {
    inner: OutputArtifact,
}

#[wasm_bindgen]
impl JsArtifact {
    #[wasm_bindgen(getter)]
    pub fn width(&self) -> u32 {
        self.inner.width()
    }

    #[wasm_bindgen(getter)]
    pub fn height(&self) -> u32 {
        self.inner.height()
    }

    #[wasm_bindgen(getter)]
    pub fn mime_type(&self) -> String {
        self.inner.mime_type().to_string()
    }

    #[wasm_bindgen(getter)]
    pub fn byte_length(&self) -> usize {
        self.inner.len()
    }

    /// Encoded bytes as `Uint8Array` (copied).
    pub fn bytes(&self) -> Vec<u8> {
        self.inner.bytes().to_vec()
    }

    pub fn to_blob(&self) -> Result<web_sys::Blob, JsValue> {
        artifact_to_blob(&self.inner)
    }
}

impl From<OutputArtifact> for JsArtifact {
    fn from(inner: OutputArtifact) -> Self {
        Self { inner }
    }
}

/// Plain-object form of a [`ConfirmReport`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReportDto {
    pub width: u32,
    pub height: u32,
    pub byte_length: usize,
    pub mime_type: &'static str,
    pub compression: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_byte_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl From<&ConfirmReport> for ReportDto {
    fn from(report: &ConfirmReport) -> Self {
        let (compression, original_byte_length, warning) = match &report.compression {
            CompressionOutcome::Skipped => ("skipped", None, None),
            CompressionOutcome::Applied { original_bytes } => {
                ("applied", Some(*original_bytes), None)
            }
            CompressionOutcome::FellBack { reason } => ("fellBack", None, Some(reason.clone())),
        };
        Self {
            width: report.width,
            height: report.height,
            byte_length: report.bytes,
            mime_type: report.format.mime_type(),
            compression,
            original_byte_length,
            warning,
        }
    }
}
