//! The crop dialog as a JavaScript object.
//!
//! `JsCropDialog` wraps a [`CropSession`] and drives its debounce with a
//! `gloo_timers` timeout. Every update replaces the timeout (dropping a
//! `Timeout` cancels it); when it fires, the due render runs and the preview
//! callback receives the new raster.
//!
//! Callbacks are always invoked after the session borrow is released, so
//! JavaScript may call back into the dialog from inside them.
//!
//! `load` and `confirm` return promises. They yield to the event loop once
//! before decoding or rendering so the page can paint its loading state; the
//! work itself still runs on the calling thread.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use cropkit_core::{
    CropHandler, CropRegion, CropSession, CropShape, DisplaySize, OutputArtifact, PipelineConfig,
    PipelineError,
};
use gloo_timers::callback::Timeout;
use gloo_timers::future::TimeoutFuture;
use js_sys::{Function, Promise};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_time::Instant;

use crate::blob::artifact_to_blob;
use crate::types::{JsArtifact, JsRaster, ReportDto};

#[derive(Default)]
struct Callbacks {
    on_upload: Option<Function>,
    on_cancel: Option<Function>,
    on_preview: Option<Function>,
}

struct Inner {
    session: CropSession,
    callbacks: Callbacks,
    timer: Option<Timeout>,
}

/// Records handler calls so they can be replayed after the borrow ends.
#[derive(Default)]
struct Deferred {
    upload: Option<OutputArtifact>,
    cancelled: bool,
}

impl CropHandler for Deferred {
    fn on_upload(&mut self, artifact: OutputArtifact) {
        self.upload = Some(artifact);
    }

    fn on_cancel(&mut self) {
        self.cancelled = true;
    }
}

fn to_js(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn call(callback: Option<Function>, arg: &JsValue, name: &str) {
    if let Some(callback) = callback {
        if let Err(err) = callback.call1(&JsValue::NULL, arg) {
            log::error!("{} callback threw: {:?}", name, err);
        }
    }
}

/// Interactive crop dialog.
#[wasm_bindgen]
pub struct JsCropDialog {
    inner: Rc<RefCell<Inner>>,
}

#[wasm_bindgen]
impl JsCropDialog {
    /// Create a dialog.
    ///
    /// # Arguments
    ///
    /// * `config` - Partial `PipelineConfig` object (camelCase), or `undefined`
    /// * `aspect` - Locked width/height ratio, or `undefined` for freeform
    /// * `elliptical` - Mask the output to the inscribed ellipse
    #[wasm_bindgen(constructor)]
    pub fn new(
        config: JsValue,
        aspect: Option<f64>,
        elliptical: bool,
    ) -> Result<JsCropDialog, JsValue> {
        let config: PipelineConfig = if config.is_undefined() || config.is_null() {
            PipelineConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)?
        };
        let shape = if elliptical {
            CropShape::Ellipse
        } else {
            CropShape::Rectangle
        };
        let session = CropSession::new(config)
            .map_err(to_js)?
            .with_aspect(aspect)
            .with_shape(shape);
        Ok(JsCropDialog {
            inner: Rc::new(RefCell::new(Inner {
                session,
                callbacks: Callbacks::default(),
                timer: None,
            })),
        })
    }

    /// Called with a `Blob` when the user confirms.
    pub fn set_on_upload(&self, callback: Function) {
        self.inner.borrow_mut().callbacks.on_upload = Some(callback);
    }

    /// Called without arguments when the user cancels.
    pub fn set_on_cancel(&self, callback: Function) {
        self.inner.borrow_mut().callbacks.on_cancel = Some(callback);
    }

    /// Called with a `JsRaster` after each debounced render.
    pub fn set_on_preview(&self, callback: Function) {
        self.inner.borrow_mut().callbacks.on_preview = Some(callback);
    }

    /// Decode a selected file and reset the crop.
    ///
    /// Pass the size of the host's `<img>` when it is known; otherwise the
    /// image is fitted into the configured display box. Resolves to the
    /// displayed size (`{ width, height }`).
    pub fn load(
        &self,
        bytes: Vec<u8>,
        displayed_width: Option<f64>,
        displayed_height: Option<f64>,
    ) -> Promise {
        let inner = Rc::clone(&self.inner);
        let displayed = displayed_width
            .zip(displayed_height)
            .map(|(width, height)| DisplaySize::new(width, height));
        future_to_promise(async move {
            TimeoutFuture::new(0).await;
            let result = load_into(&inner, &bytes, displayed);
            arm(&inner);
            let displayed = result.map_err(to_js)?;
            Ok::<JsValue, JsValue>(serde_wasm_bindgen::to_value(&displayed)?)
        })
    }

    /// The host's `<img>` was resized. Restarts the crop in the new layout
    /// and returns the new region.
    pub fn set_displayed_size(&self, width: f64, height: f64) -> Result<JsValue, JsValue> {
        let region = self
            .inner
            .borrow_mut()
            .session
            .set_displayed_size(DisplaySize::new(width, height), Instant::now())
            .map_err(to_js)?;
        arm(&self.inner);
        Ok(serde_wasm_bindgen::to_value(&region)?)
    }

    /// Current region (`{ unit, x, y, width, height }`) or `undefined`.
    pub fn region(&self) -> Result<JsValue, JsValue> {
        let region = self.inner.borrow().session.region();
        Ok(serde_wasm_bindgen::to_value(&region)?)
    }

    /// Current `{ rotationDegrees, scale }`.
    pub fn transform(&self) -> Result<JsValue, JsValue> {
        let transform = self.inner.borrow().session.transform();
        Ok(serde_wasm_bindgen::to_value(&transform)?)
    }

    /// In-progress drag; blocks confirm until the drag completes.
    pub fn drag_crop(&self, region: JsValue) -> Result<JsValue, JsValue> {
        let region: CropRegion = serde_wasm_bindgen::from_value(region)?;
        let stored = self
            .inner
            .borrow_mut()
            .session
            .drag_crop(region)
            .map_err(to_js)?;
        arm(&self.inner);
        Ok(serde_wasm_bindgen::to_value(&stored)?)
    }

    /// Completed drag. Returns the region as stored (clamped / aspect-fitted).
    pub fn update_crop(&self, region: JsValue) -> Result<JsValue, JsValue> {
        let region: CropRegion = serde_wasm_bindgen::from_value(region)?;
        let stored = self
            .inner
            .borrow_mut()
            .session
            .update_crop(region, Instant::now())
            .map_err(to_js)?;
        arm(&self.inner);
        Ok(serde_wasm_bindgen::to_value(&stored)?)
    }

    /// Rotation slider position (0-100 maps to 0-180°).
    pub fn update_rotation(&self, slider: f64) -> Result<f64, JsValue> {
        let transform = self
            .inner
            .borrow_mut()
            .session
            .update_rotation_slider(slider, Instant::now())
            .map_err(to_js)?;
        arm(&self.inner);
        Ok(transform.rotation_degrees)
    }

    /// Zoom slider position (0-100 maps to 1x-2x).
    pub fn update_scale(&self, slider: f64) -> Result<f64, JsValue> {
        let transform = self
            .inner
            .borrow_mut()
            .session
            .update_scale_slider(slider, Instant::now())
            .map_err(to_js)?;
        arm(&self.inner);
        Ok(transform.scale)
    }

    /// Usually `window.devicePixelRatio`.
    pub fn set_pixel_density(&self, density: f64) -> Result<(), JsValue> {
        self.inner
            .borrow_mut()
            .session
            .set_pixel_density(density, Instant::now())
            .map_err(to_js)?;
        arm(&self.inner);
        Ok(())
    }

    /// Set while the host's upload is in flight; disables confirm.
    pub fn set_loading(&self, loading: bool) {
        self.inner.borrow_mut().session.set_loading(loading);
    }

    pub fn can_confirm(&self) -> bool {
        self.inner.borrow().session.can_confirm()
    }

    /// Latest preview raster, if one was rendered.
    pub fn preview(&self) -> Option<JsRaster> {
        self.inner.borrow().session.raster().map(JsRaster::from_raster)
    }

    /// Export without uploading. Renders synchronously if the preview is stale.
    pub fn export(&self) -> Result<JsArtifact, JsValue> {
        let artifact = self.inner.borrow_mut().session.export().map_err(to_js)?;
        Ok(artifact.into())
    }

    /// Export and hand the blob to the upload callback. Resolves to a report
    /// object.
    pub fn confirm(&self) -> Promise {
        let inner = Rc::clone(&self.inner);
        future_to_promise(async move {
            TimeoutFuture::new(0).await;
            let mut deferred = Deferred::default();
            let (report, callback) = {
                let mut state = inner.borrow_mut();
                let report = state.session.confirm(&mut deferred).map_err(to_js)?;
                (report, state.callbacks.on_upload.clone())
            };
            if let Some(artifact) = deferred.upload {
                let blob = artifact_to_blob(&artifact)?;
                call(callback, &blob.into(), "upload");
            }
            Ok::<JsValue, JsValue>(serde_wasm_bindgen::to_value(&ReportDto::from(&report))?)
        })
    }

    /// Discard all state and notify the cancel callback.
    pub fn cancel(&self) {
        let mut deferred = Deferred::default();
        let callback = {
            let mut inner = self.inner.borrow_mut();
            inner.session.cancel(&mut deferred);
            inner.timer = None;
            inner.callbacks.on_cancel.clone()
        };
        if deferred.cancelled {
            if let Some(callback) = callback {
                if let Err(err) = callback.call0(&JsValue::NULL) {
                    log::error!("cancel callback threw: {:?}", err);
                }
            }
        }
    }
}

fn load_into(
    inner: &Rc<RefCell<Inner>>,
    bytes: &[u8],
    displayed: Option<DisplaySize>,
) -> Result<DisplaySize, PipelineError> {
    let mut state = inner.borrow_mut();
    let now = Instant::now();
    let fitted = state.session.load(bytes, now)?.displayed();
    match displayed {
        Some(displayed) => {
            state.session.set_displayed_size(displayed, now)?;
            Ok(displayed)
        }
        None => Ok(fitted),
    }
}

/// (Re)schedule the timer for the session's pending render, if any.
fn arm(inner: &Rc<RefCell<Inner>>) {
    let delay = inner.borrow().session.next_render_in(Instant::now());
    let timeout = delay.map(|delay| {
        let millis = u32::try_from(delay.as_millis()).unwrap_or(u32::MAX);
        let weak: Weak<RefCell<Inner>> = Rc::downgrade(inner);
        Timeout::new(millis, move || {
            if let Some(inner) = weak.upgrade() {
                fire(&inner);
            }
        })
    });
    inner.borrow_mut().timer = timeout;
}

fn fire(inner: &Rc<RefCell<Inner>>) {
    let (preview, callback) = {
        let mut state = inner.borrow_mut();
        let polled = state
            .session
            .poll_render(Instant::now())
            .map(|raster| raster.map(JsRaster::from_raster));
        match polled {
            Ok(preview) => (preview, state.callbacks.on_preview.clone()),
            Err(err) => {
                log::warn!("preview render failed: {}", err);
                (None, None)
            }
        }
    };
    if let Some(preview) = preview {
        call(callback, &preview.into(), "preview");
    }
    // Timers can fire slightly early; re-arm if the render is still pending.
    arm(inner);
}

#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use std::io::Cursor;
    use wasm_bindgen_futures::JsFuture;
    use wasm_bindgen_test::*;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[wasm_bindgen_test]
    async fn test_dialog_export_after_load() {
        let dialog = JsCropDialog::new(JsValue::UNDEFINED, None, false).unwrap();
        JsFuture::from(dialog.load(png(40, 30), None, None)).await.unwrap();
        assert!(dialog.can_confirm());
        let artifact = dialog.export().unwrap();
        assert_eq!((artifact.width(), artifact.height()), (28, 21));
        assert_eq!(artifact.mime_type(), "image/png");
    }

    #[wasm_bindgen_test]
    async fn test_dialog_uses_host_displayed_size() {
        let dialog = JsCropDialog::new(JsValue::UNDEFINED, None, false).unwrap();
        let displayed = JsFuture::from(dialog.load(png(1000, 500), Some(400.0), Some(200.0)))
            .await
            .unwrap();
        let displayed: DisplaySize = serde_wasm_bindgen::from_value(displayed).unwrap();
        assert_eq!(displayed, DisplaySize::new(400.0, 200.0));

        let full = CropRegion::pixels(0.0, 0.0, 400.0, 200.0);
        dialog
            .update_crop(serde_wasm_bindgen::to_value(&full).unwrap())
            .unwrap();
        let artifact = dialog.export().unwrap();
        assert_eq!((artifact.width(), artifact.height()), (1000, 500));

        dialog.set_displayed_size(500.0, 250.0).unwrap();
        assert!(dialog.set_displayed_size(0.0, 250.0).is_err());
    }

    #[wasm_bindgen_test]
    async fn test_dialog_cancel_blocks_confirm() {
        let dialog = JsCropDialog::new(JsValue::UNDEFINED, Some(1.0), true).unwrap();
        JsFuture::from(dialog.load(png(20, 20), None, None)).await.unwrap();
        dialog.cancel();
        assert!(!dialog.can_confirm());
        assert!(JsFuture::from(dialog.confirm()).await.is_err());
    }
}
