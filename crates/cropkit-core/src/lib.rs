//! Cropkit Core - image crop, transform and export pipeline
//!
//! Turns a user-selected JPEG/PNG plus an interactively chosen crop region,
//! rotation and zoom into an upload-ready image at full source resolution.
//! The crate is platform independent; `cropkit-wasm` binds it to the browser.
//!
//! The entry point for dialogs is [`CropSession`]. The building blocks are
//! public as well: [`load_image`], [`initial_crop`], [`RenderPlan`] +
//! [`render`], and [`encode_raster`] / [`compress_to_ceiling`].

pub mod config;
pub mod encode;
pub mod error;
pub mod geometry;
pub mod notify;
pub mod ordering;
pub mod render;
pub mod schedule;
pub mod session;
pub mod source;
pub mod storage;

pub use config::{ConfigError, DisplayBox, PipelineConfig};
pub use encode::{
    compress_to_ceiling, encode_raster, CompressError, CompressionConfig, EncodeError,
    OutputArtifact, OutputFormat,
};
pub use error::PipelineError;
pub use geometry::{fit_to_aspect, initial_crop, CropRegion, CropUnit, TransformState};
pub use notify::{Notification, NotificationCenter, Severity};
pub use ordering::{Direction, InformativeText, ItemOrder};
pub use render::{render, CropShape, Filter, Raster, RenderError, RenderPlan, MAX_OUTPUT_PIXELS};
pub use schedule::{RenderScheduler, RenderTicket};
pub use session::{CompressionOutcome, ConfirmReport, CropHandler, CropSession};
pub use source::{load_image, DisplaySize, LoadError, SourceFormat, SourceImage};
pub use storage::{
    BlobStore, Illustrated, ImageEdit, ImageId, ImageKey, ImageRepository, MemoryStore, StoreError,
};
