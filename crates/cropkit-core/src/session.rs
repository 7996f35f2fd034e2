//! The crop dialog state machine.
//!
//! A [`CropSession`] owns one source image and everything derived from it:
//! the crop region, rotation/zoom, the debounced render and the latest raster.
//! Hosts drive it with user events and the current time:
//!
//! ```text
//! load ─► update_crop / update_rotation / update_scale ─► poll_render ─► confirm
//!   ▲                                                                 │
//!   └──────────────── new file resets region and raster ◄─────────────┘
//! ```
//!
//! Rendering never happens inside an update call. Updates only reschedule;
//! [`CropSession::poll_render`] executes the surviving render once its
//! debounce elapsed. Export flushes a pending render synchronously.

use web_time::{Duration, Instant};

use crate::config::{ConfigError, PipelineConfig};
use crate::encode::{compress_to_ceiling, encode_raster, OutputArtifact, OutputFormat};
use crate::error::PipelineError;
use crate::geometry::{fit_to_aspect, initial_crop, CropRegion, TransformState};
use crate::notify::{Notification, NotificationCenter};
use crate::render::{
    check_output_size, output_size, render, CropShape, Filter, Raster, RenderPlan,
};
use crate::schedule::RenderScheduler;
use crate::source::{load_image, DisplaySize, SourceImage};

/// Receives the outcome of a crop dialog.
pub trait CropHandler {
    /// Called once per successful confirm with the artifact to store.
    fn on_upload(&mut self, artifact: OutputArtifact);

    /// Called when the user abandons the dialog.
    fn on_cancel(&mut self);
}

/// What happened to the optional recompression step during confirm.
#[derive(Debug, Clone, PartialEq)]
pub enum CompressionOutcome {
    /// No compression configured.
    Skipped,
    /// The uploaded artifact is the recompressed one.
    Applied { original_bytes: usize },
    /// Compression failed; the uncompressed artifact was uploaded instead.
    FellBack { reason: String },
}

/// Summary of a confirmed export.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmReport {
    pub width: u32,
    pub height: u32,
    pub bytes: usize,
    pub format: OutputFormat,
    pub compression: CompressionOutcome,
}

#[derive(Debug, Clone)]
struct Frame {
    raster: Raster,
    generation: u64,
}

#[derive(Debug)]
pub struct CropSession {
    config: PipelineConfig,
    aspect: Option<f64>,
    shape: CropShape,
    source: Option<SourceImage>,
    region: Option<CropRegion>,
    completed: bool,
    transform: TransformState,
    pixel_density: f64,
    scheduler: RenderScheduler,
    frame: Option<Frame>,
    loading: bool,
    closed: bool,
    renders_executed: u64,
    notifications: Option<NotificationCenter>,
}

impl CropSession {
    /// Create an empty session.
    ///
    /// # Errors
    ///
    /// Returns the first problem found by [`PipelineConfig::validate`].
    pub fn new(config: PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            pixel_density: config.pixel_density,
            scheduler: RenderScheduler::new(config.debounce()),
            config,
            aspect: None,
            shape: CropShape::Rectangle,
            source: None,
            region: None,
            completed: false,
            transform: TransformState::default(),
            frame: None,
            loading: false,
            closed: false,
            renders_executed: 0,
            notifications: None,
        })
    }

    /// Lock completed regions to `aspect` (width / height). `None` is freeform.
    pub fn with_aspect(mut self, aspect: Option<f64>) -> Self {
        self.aspect = aspect.filter(|a| a.is_finite() && *a > 0.0);
        self
    }

    pub fn with_shape(mut self, shape: CropShape) -> Self {
        self.shape = shape;
        self
    }

    /// Report decode failures and compression fallbacks to `center`.
    pub fn with_notifications(mut self, center: NotificationCenter) -> Self {
        self.notifications = Some(center);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn aspect(&self) -> Option<f64> {
        self.aspect
    }

    pub fn shape(&self) -> CropShape {
        self.shape
    }

    pub fn source(&self) -> Option<&SourceImage> {
        self.source.as_ref()
    }

    /// The region as last set, including an in-progress drag.
    pub fn region(&self) -> Option<CropRegion> {
        self.region
    }

    /// The region eligible for rendering and export.
    pub fn completed_region(&self) -> Option<CropRegion> {
        self.region.filter(|_| self.completed)
    }

    pub fn transform(&self) -> TransformState {
        self.transform
    }

    pub fn pixel_density(&self) -> f64 {
        self.pixel_density
    }

    /// Latest rendered surface, if any.
    pub fn raster(&self) -> Option<&Raster> {
        self.frame.as_ref().map(|f| &f.raster)
    }

    /// Scheduler generation the current raster was rendered for.
    pub fn raster_generation(&self) -> Option<u64> {
        self.frame.as_ref().map(|f| f.generation)
    }

    /// Number of renders actually executed since creation.
    pub fn renders_executed(&self) -> u64 {
        self.renders_executed
    }

    pub fn has_pending_render(&self) -> bool {
        self.scheduler.has_pending()
    }

    /// Time until the pending render may run.
    pub fn next_render_in(&self, now: Instant) -> Option<Duration> {
        self.scheduler.time_until_due(now)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Set by the host while its upload is in flight.
    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    /// Whether the confirm action should be enabled.
    pub fn can_confirm(&self) -> bool {
        if self.closed || self.loading {
            return false;
        }
        match (&self.source, self.completed_region()) {
            (Some(source), Some(region)) => {
                let region = region.clamp_to(source.displayed());
                let (w, h) = output_size(source, &region, self.pixel_density);
                check_output_size(w, h).is_ok()
            }
            _ => false,
        }
    }

    /// Decode `bytes` and start a fresh crop on them.
    ///
    /// Reopens a cancelled session. On failure every previous source, region
    /// and raster is discarded.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::DecodeFailed` if the file is not a usable
    /// JPEG or PNG.
    pub fn load(&mut self, bytes: &[u8], now: Instant) -> Result<&SourceImage, PipelineError> {
        let display = self.config.display_box;
        match load_image(bytes, display.width, display.height) {
            Ok(source) => Ok(self.set_source(source, now)),
            Err(err) => {
                self.discard();
                self.closed = false;
                log::warn!("failed to load source image: {}", err);
                if let Some(center) = &self.notifications {
                    center.publish(Notification::error(format!("Could not open image: {}", err)));
                }
                Err(err.into())
            }
        }
    }

    /// Replace the source with an already-decoded image.
    ///
    /// The previous region, transform and raster are dropped and the crop is
    /// re-initialized for the new image.
    pub fn set_source(&mut self, source: SourceImage, now: Instant) -> &SourceImage {
        self.discard();
        self.closed = false;
        self.reset_region(source.displayed(), now);
        self.source.insert(source)
    }

    /// Tell the session the size the host actually lays the image out at.
    ///
    /// Regions are interpreted against this size, so the crop restarts from
    /// the centered default in the new layout. The transform is kept. Setting
    /// the current size again changes nothing.
    ///
    /// # Errors
    ///
    /// `Closed` after cancel, `RenderNotReady` without a source and
    /// `InvalidDisplaySize` for zero, negative or non-finite sizes.
    pub fn set_displayed_size(
        &mut self,
        displayed: DisplaySize,
        now: Instant,
    ) -> Result<CropRegion, PipelineError> {
        self.ensure_open()?;
        let source = self.source.as_mut().ok_or(PipelineError::RenderNotReady)?;
        if source.displayed() == displayed {
            return self.region.ok_or(PipelineError::RenderNotReady);
        }
        source
            .set_displayed_size(displayed)
            .map_err(|_| PipelineError::InvalidDisplaySize {
                width: displayed.width,
                height: displayed.height,
            })?;
        log::debug!("displayed size changed to {:.1}x{:.1}", displayed.width, displayed.height);
        Ok(self.reset_region(displayed, now))
    }

    /// Reset the region to the centered default for the current source.
    ///
    /// # Errors
    ///
    /// `Closed` after cancel, `RenderNotReady` without a source.
    pub fn initialize_crop(&mut self, now: Instant) -> Result<CropRegion, PipelineError> {
        self.ensure_open()?;
        let displayed = self
            .source
            .as_ref()
            .map(SourceImage::displayed)
            .ok_or(PipelineError::RenderNotReady)?;
        Ok(self.reset_region(displayed, now))
    }

    fn reset_region(&mut self, displayed: DisplaySize, now: Instant) -> CropRegion {
        let aspect = self.aspect.unwrap_or(self.config.default_aspect);
        let region = initial_crop(displayed, self.config.initial_crop_percent, aspect);
        log::debug!("initial crop {:?}", region);
        self.region = Some(region);
        self.completed = true;
        self.scheduler.request(now);
        region
    }

    /// Record an in-progress selection.
    ///
    /// The region is shown but not rendered, and export is blocked until the
    /// drag completes through [`update_crop`](Self::update_crop).
    ///
    /// # Errors
    ///
    /// `Closed` after cancel, `RenderNotReady` without a source.
    pub fn drag_crop(&mut self, region: CropRegion) -> Result<CropRegion, PipelineError> {
        self.ensure_open()?;
        let source = self.source.as_ref().ok_or(PipelineError::RenderNotReady)?;
        let region = region.clamp_to(source.displayed());
        self.region = Some(region);
        self.completed = false;
        self.scheduler.cancel();
        Ok(region)
    }

    /// Record a completed selection and schedule a render.
    ///
    /// The region is clamped to the image and, when an aspect is locked,
    /// re-fitted to it. A region too small to yield an output pixel is stored
    /// but does not count as completed.
    ///
    /// # Errors
    ///
    /// `Closed` after cancel, `RenderNotReady` without a source.
    pub fn update_crop(
        &mut self,
        region: CropRegion,
        now: Instant,
    ) -> Result<CropRegion, PipelineError> {
        self.ensure_open()?;
        let source = self.source.as_ref().ok_or(PipelineError::RenderNotReady)?;
        let bounds = source.displayed();
        let region = match self.aspect {
            Some(aspect) => fit_to_aspect(&region, aspect, bounds),
            None => region.clamp_to(bounds),
        };
        let (w, h) = output_size(source, &region, self.pixel_density);
        self.region = Some(region);
        self.completed = w > 0 && h > 0;
        if self.completed {
            self.scheduler.request(now);
        } else {
            log::debug!("crop {:?} has no output pixels; not completed", region);
            self.scheduler.cancel();
        }
        Ok(region)
    }

    /// Set the rotation in degrees (clamped to 0-180).
    ///
    /// # Errors
    ///
    /// `Closed` after cancel.
    pub fn update_rotation(
        &mut self,
        degrees: f64,
        now: Instant,
    ) -> Result<TransformState, PipelineError> {
        self.ensure_open()?;
        self.transform = TransformState::new(degrees, self.transform.scale);
        self.request_render(now);
        Ok(self.transform)
    }

    /// Set the rotation from a 0-100 slider position.
    ///
    /// # Errors
    ///
    /// `Closed` after cancel.
    pub fn update_rotation_slider(
        &mut self,
        value: f64,
        now: Instant,
    ) -> Result<TransformState, PipelineError> {
        self.ensure_open()?;
        self.transform = self.transform.with_rotation_slider(value);
        self.request_render(now);
        Ok(self.transform)
    }

    /// Set the zoom factor (clamped to 1-2).
    ///
    /// # Errors
    ///
    /// `Closed` after cancel.
    pub fn update_scale(
        &mut self,
        factor: f64,
        now: Instant,
    ) -> Result<TransformState, PipelineError> {
        self.ensure_open()?;
        self.transform = TransformState::new(self.transform.rotation_degrees, factor);
        self.request_render(now);
        Ok(self.transform)
    }

    /// Set the zoom from a 0-100 slider position.
    ///
    /// # Errors
    ///
    /// `Closed` after cancel.
    pub fn update_scale_slider(
        &mut self,
        value: f64,
        now: Instant,
    ) -> Result<TransformState, PipelineError> {
        self.ensure_open()?;
        self.transform = self.transform.with_scale_slider(value);
        self.request_render(now);
        Ok(self.transform)
    }

    /// Change the device pixel density, e.g. when the window moves screens.
    ///
    /// # Errors
    ///
    /// `ConfigError::InvalidPixelDensity` for non-positive or non-finite values.
    pub fn set_pixel_density(&mut self, density: f64, now: Instant) -> Result<(), ConfigError> {
        if !(density.is_finite() && density > 0.0) {
            return Err(ConfigError::InvalidPixelDensity(density));
        }
        if (density - self.pixel_density).abs() > f64::EPSILON {
            self.pixel_density = density;
            self.request_render(now);
        }
        Ok(())
    }

    /// Execute the pending render if its debounce has elapsed.
    ///
    /// Returns the new raster when a render ran.
    ///
    /// # Errors
    ///
    /// `RenderNotReady` when the due render cannot produce a surface.
    pub fn poll_render(&mut self, now: Instant) -> Result<Option<&Raster>, PipelineError> {
        let Some(ticket) = self.scheduler.poll(now) else {
            return Ok(None);
        };
        if !self.scheduler.is_current(&ticket) {
            log::debug!("dropping stale render ticket {}", ticket.generation());
            return Ok(None);
        }
        self.execute(ticket.generation(), self.config.preview_filter)?;
        Ok(self.raster())
    }

    /// Serialize the current crop.
    ///
    /// A pending render is flushed first, and a raster produced by the
    /// preview filter is redone with the export filter, so the artifact
    /// always matches the latest state.
    ///
    /// # Errors
    ///
    /// `Closed` after cancel, `RenderNotReady` without a completed crop,
    /// `EncodingFailed` when the encoder produces no data.
    pub fn export(&mut self) -> Result<OutputArtifact, PipelineError> {
        self.ensure_open()?;
        self.prepare_export_raster()?;
        let raster = self.raster().ok_or(PipelineError::RenderNotReady)?;
        let artifact = encode_raster(raster, self.config.output)?;
        log::debug!(
            "exported {}x{} {} ({} bytes)",
            artifact.width(),
            artifact.height(),
            artifact.mime_type(),
            artifact.len()
        );
        Ok(artifact)
    }

    /// Export, optionally recompress, and hand the artifact to `handler`.
    ///
    /// The upload callback runs exactly once on success and never on error.
    /// Compression failure is not an error: the uncompressed artifact is
    /// uploaded and the fallback is reported.
    ///
    /// # Errors
    ///
    /// `UploadInFlight` while the loading flag is set, otherwise as
    /// [`export`](Self::export).
    pub fn confirm<H: CropHandler + ?Sized>(
        &mut self,
        handler: &mut H,
    ) -> Result<ConfirmReport, PipelineError> {
        self.ensure_open()?;
        if self.loading {
            return Err(PipelineError::UploadInFlight);
        }
        let artifact = self.export()?;

        let (artifact, compression) = match (&self.config.compression, self.raster()) {
            (Some(settings), Some(raster)) => match compress_to_ceiling(raster, settings) {
                Ok(compressed) => {
                    let original_bytes = artifact.len();
                    (compressed, CompressionOutcome::Applied { original_bytes })
                }
                Err(err) => {
                    log::warn!("compression failed, uploading uncompressed crop: {}", err);
                    if let Some(center) = &self.notifications {
                        center.publish(Notification::warning(
                            "Image could not be compressed; uploading the original crop",
                        ));
                    }
                    let reason = PipelineError::from(err).to_string();
                    (artifact, CompressionOutcome::FellBack { reason })
                }
            },
            _ => (artifact, CompressionOutcome::Skipped),
        };

        let report = ConfirmReport {
            width: artifact.width(),
            height: artifact.height(),
            bytes: artifact.len(),
            format: artifact.format(),
            compression,
        };
        handler.on_upload(artifact);
        Ok(report)
    }

    /// Abandon the dialog.
    ///
    /// Discards all state and invokes the cancel callback. Cancelling an
    /// already closed session does nothing.
    pub fn cancel<H: CropHandler + ?Sized>(&mut self, handler: &mut H) {
        if self.closed {
            return;
        }
        self.discard();
        self.closed = true;
        log::debug!("crop session cancelled");
        handler.on_cancel();
    }

    fn ensure_open(&self) -> Result<(), PipelineError> {
        if self.closed {
            Err(PipelineError::Closed)
        } else {
            Ok(())
        }
    }

    fn discard(&mut self) {
        self.source = None;
        self.region = None;
        self.completed = false;
        self.transform = TransformState::default();
        self.frame = None;
        self.scheduler.cancel();
    }

    fn request_render(&mut self, now: Instant) {
        if self.source.is_some() && self.completed {
            self.scheduler.request(now);
        }
    }

    fn prepare_export_raster(&mut self) -> Result<(), PipelineError> {
        if self.source.is_none() || !self.completed {
            return Err(PipelineError::RenderNotReady);
        }
        let flushed = self.scheduler.flush();
        let generation = self.scheduler.generation();
        let export_filter = self.config.export_filter;
        let up_to_date = self
            .frame
            .as_ref()
            .is_some_and(|f| f.generation == generation && f.raster.filter() == export_filter);
        if flushed.is_some() || !up_to_date {
            self.execute(generation, export_filter)?;
        }
        Ok(())
    }

    fn execute(&mut self, generation: u64, filter: Filter) -> Result<(), PipelineError> {
        let source = self.source.as_ref().ok_or(PipelineError::RenderNotReady)?;
        let region = self.completed_region().ok_or(PipelineError::RenderNotReady)?;
        if self.frame.as_ref().is_some_and(|f| f.generation > generation) {
            log::debug!("render {} is older than the current raster", generation);
            return Ok(());
        }
        let plan = RenderPlan::new(source, &region, &self.transform, self.pixel_density)?;
        let raster = render(source, &plan, filter, self.shape);
        self.renders_executed += 1;
        log::debug!(
            "render {} executed: {}x{} {:?}",
            generation,
            raster.width(),
            raster.height(),
            filter
        );
        self.frame = Some(Frame { raster, generation });
        Ok(())
    }
}
