//! PlaybackEngine implementation on top of a GStreamer playbin

use gstreamer as gst;
use gstreamer::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::pipeline::{self, BusWatcher};
use crate::playback::{EngineCallbacks, EngineFactory, PlaybackEngine, PlaybackError, VideoSource};
use crate::surface::SurfaceTarget;

/// Creates one playbin-backed engine per playback session
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
        pipeline::initialize_gstreamer()?;
        let playbin = pipeline::build_playbin()?;
        log::debug!("Created playbin engine");

        Ok(GstEngine {
            playbin,
            looping: Arc::new(AtomicBool::new(false)),
            watcher: None,
            released: false,
        })
    }
}

/// Playback engine driving a GStreamer `playbin`
pub struct GstEngine {
    playbin: gst::Element,

    /// Shared with the bus watcher, which performs the loop seek
    looping: Arc<AtomicBool>,

    /// Bus watcher of the current preparation cycle
    watcher: Option<BusWatcher>,

    released: bool,
}

impl PlaybackEngine for GstEngine {
    fn bind_output(&mut self, target: &SurfaceTarget) -> Result<(), PlaybackError> {
        match target.window_handle {
            Some(handle) => pipeline::bind_window_handle(&self.playbin, handle),
            None => {
                log::debug!(
                    "Surface {} has no window handle, video sink opens its own",
                    target.name
                );
                Ok(())
            }
        }
    }

    fn set_source(&mut self, source: &VideoSource) -> Result<(), PlaybackError> {
        let path = source.path();
        if !path.is_file() {
            return Err(PlaybackError::source_load(source, "file not found"));
        }

        let path = path
            .canonicalize()
            .map_err(|e| PlaybackError::source_load(source, e.to_string()))?;
        let uri = gst::glib::filename_to_uri(&path, None)
            .map_err(|e| PlaybackError::source_load(source, e.to_string()))?;

        log::debug!("Playbin source: {}", uri);
        self.playbin.set_property("uri", uri.as_str());
        Ok(())
    }

    fn set_looping(&mut self, looping: bool) {
        self.looping.store(looping, Ordering::Relaxed);
    }

    fn prepare_async(&mut self, callbacks: EngineCallbacks) -> Result<(), PlaybackError> {
        if let Some(mut watcher) = self.watcher.take() {
            watcher.shutdown();
        }

        self.watcher = Some(BusWatcher::spawn(
            self.playbin.clone(),
            Arc::clone(&self.looping),
            callbacks,
        )?);

        self.playbin
            .set_state(gst::State::Paused)
            .map_err(|e| PlaybackError::Preparation(format!("Failed to pause pipeline: {e}")))?;
        Ok(())
    }

    fn start(&mut self) -> Result<(), PlaybackError> {
        log::info!("Starting video playback");
        self.playbin
            .set_state(gst::State::Playing)
            .map_err(|e| PlaybackError::Start(format!("Failed to set pipeline to Playing: {e}")))?;
        Ok(())
    }

    fn stop(&mut self) {
        if let Err(e) = self.playbin.set_state(gst::State::Ready) {
            log::warn!("Failed to stop pipeline: {}", e);
        }
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        log::debug!("Releasing playbin engine");
        if let Some(mut watcher) = self.watcher.take() {
            watcher.shutdown();
        }

        if let Err(e) = self.playbin.set_state(gst::State::Null) {
            log::warn!("Failed to set pipeline state to Null: {}", e);
        }

        // Drain pending messages from bus
        if let Some(bus) = self.playbin.bus() {
            let mut drained = 0;
            while bus.pop().is_some() {
                drained += 1;
            }
            if drained > 0 {
                log::debug!("Drained {} pending messages from bus", drained);
            }
        }
    }
}

impl Drop for GstEngine {
    fn drop(&mut self) {
        self.release();
    }
}
