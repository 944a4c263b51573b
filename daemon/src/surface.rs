//! Video surface host adapter
//!
//! [`VideoSurfaceView`] is what a host runtime talks to: it receives surface
//! lifecycle callbacks, forwards them to its [`PlaybackController`], and
//! answers measurement passes using the controller's video resolution and the
//! configured scale mode.

use common::{MeasureSpec, ResolvedSize, ScaleMode, layout};
use std::sync::{Arc, Mutex, PoisonError};

use crate::playback::{EngineFactory, PlaybackController, VideoSource};

/// Drawing target provided by the host windowing system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceTarget {
    pub name: String,
    /// Native window to render into, or None to let the engine pick
    pub window_handle: Option<u64>,
}

impl SurfaceTarget {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            window_handle: None,
        }
    }

    pub fn with_window_handle(mut self, handle: u64) -> Self {
        self.window_handle = Some(handle);
        self
    }
}

/// Surface lifecycle notifications
pub trait SurfaceCallback {
    fn surface_created(&self, target: &SurfaceTarget);

    fn surface_changed(&self, target: &SurfaceTarget, format: i32, width: u32, height: u32);

    fn surface_destroyed(&self, target: &SurfaceTarget);
}

/// Layout host able to schedule a new measurement pass
pub trait LayoutHost: Send + Sync {
    fn request_layout(&self);
}

/// A looping video bound to one surface
pub struct VideoSurfaceView<F: EngineFactory> {
    controller: Arc<PlaybackController<F>>,
    scale_mode: Option<ScaleMode>,
    surface: Mutex<Option<SurfaceTarget>>,
}

impl<F: EngineFactory> VideoSurfaceView<F> {
    /// Create a view playing `source`.
    ///
    /// With no scale mode the view measures to the constraint defaults and
    /// ignores the video's aspect ratio.
    pub fn new(
        factory: F,
        source: VideoSource,
        scale_mode: Option<ScaleMode>,
        layout_host: Arc<dyn LayoutHost>,
    ) -> Self {
        Self {
            controller: PlaybackController::new(factory, source, layout_host),
            scale_mode,
            surface: Mutex::new(None),
        }
    }

    pub fn controller(&self) -> &Arc<PlaybackController<F>> {
        &self.controller
    }

    pub fn scale_mode(&self) -> Option<ScaleMode> {
        self.scale_mode
    }

    /// Surface currently bound, if any
    pub fn current_surface(&self) -> Option<SurfaceTarget> {
        self.surface
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Measurement pass: resolve the rendered size for these constraints
    pub fn measure(&self, width_spec: MeasureSpec, height_spec: MeasureSpec) -> ResolvedSize {
        let video = self.controller.video_dimensions();
        let size = match self.scale_mode {
            Some(mode) => layout::resolve(video, width_spec, height_spec, mode),
            None => layout::resolve_unscaled(video, width_spec, height_spec),
        };
        log::trace!(
            "measure video={} width={} height={} -> {}",
            video,
            width_spec,
            height_spec,
            size
        );
        size
    }
}

impl<F: EngineFactory> SurfaceCallback for VideoSurfaceView<F> {
    fn surface_created(&self, target: &SurfaceTarget) {
        log::info!("Surface created: {}", target.name);
        // Only a surface the engine was bound to becomes current
        if self.controller.on_surface_available(target) {
            *self.surface.lock().unwrap_or_else(PoisonError::into_inner) = Some(target.clone());
        }
    }

    fn surface_changed(&self, target: &SurfaceTarget, format: i32, width: u32, height: u32) {
        log::debug!(
            "Surface {} changed: format={} {}x{}",
            target.name,
            format,
            width,
            height
        );
    }

    fn surface_destroyed(&self, target: &SurfaceTarget) {
        log::info!("Surface destroyed: {}", target.name);
        self.controller.on_surface_gone();
        *self.surface.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
