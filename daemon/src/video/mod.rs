//! GStreamer-backed playback engine
//!
//! - `pipeline`: GStreamer initialisation, playbin setup and bus helpers
//! - `engine`: the [`PlaybackEngine`](crate::playback::PlaybackEngine)
//!   implementation and its factory
//!
//! # Architecture
//!
//! Each engine wraps one `playbin`:
//! 1. `bind_output` routes the video overlay to the surface's window handle
//! 2. `prepare_async` pauses the pipeline and starts a bus watcher thread
//! 3. The watcher reports the negotiated video size on the first `AsyncDone`
//! 4. End of stream flush-seeks back to the start while looping
//! 5. Errors on the bus are mapped to engine error codes and reported once

#[cfg(feature = "video")]
mod engine;
#[cfg(feature = "video")]
mod pipeline;

#[cfg(feature = "video")]
pub use engine::{GstEngine, GstEngineFactory};

#[cfg(not(feature = "video"))]
pub use engine_stub::{GstEngine, GstEngineFactory};

#[cfg(not(feature = "video"))]
mod engine_stub {
    use crate::playback::{
        EngineCallbacks, EngineFactory, PlaybackEngine, PlaybackError, VideoSource,
    };
    use crate::surface::SurfaceTarget;

    /// Stub factory when video feature is disabled
    #[derive(Default)]
    pub struct GstEngineFactory;

    impl GstEngineFactory {
        pub fn new() -> Self {
            Self
        }
    }

    impl EngineFactory for GstEngineFactory {
        type Engine = GstEngine;

        fn create(&self) -> Result<GstEngine, PlaybackError> {
            Err(PlaybackError::Preparation(
                "Video support not compiled in".to_string(),
            ))
        }
    }

    /// Never constructed without the video feature
    pub enum GstEngine {}

    impl PlaybackEngine for GstEngine {
        fn bind_output(&mut self, _target: &SurfaceTarget) -> Result<(), PlaybackError> {
            match *self {}
        }

        fn set_source(&mut self, _source: &VideoSource) -> Result<(), PlaybackError> {
            match *self {}
        }

        fn set_looping(&mut self, _looping: bool) {
            match *self {}
        }

        fn prepare_async(&mut self, _callbacks: EngineCallbacks) -> Result<(), PlaybackError> {
            match *self {}
        }

        fn start(&mut self) -> Result<(), PlaybackError> {
            match *self {}
        }

        fn stop(&mut self) {
            match *self {}
        }

        fn release(&mut self) {
            match *self {}
        }
    }
}
