//! GStreamer pipeline setup and bus handling
//!
//! Helpers around a single `playbin` element: creation, overlay binding,
//! caps inspection, error-code mapping and the bus watcher thread that turns
//! bus messages into engine callbacks.

use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_video as gst_video;
use gstreamer_video::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;

use crate::playback::{EngineCallbacks, ErrorCode, PlaybackError};

/// How long the watcher blocks on the bus before rechecking its stop flag
const BUS_POLL_MS: u64 = 100;

/// Initialize GStreamer (idempotent, safe to call multiple times)
pub fn initialize_gstreamer() -> Result<(), PlaybackError> {
    static GSTREAMER_INIT: OnceLock<Result<(), String>> = OnceLock::new();

    GSTREAMER_INIT
        .get_or_init(|| {
            gst::init().map_err(|e| e.to_string())?;
            log::info!("GStreamer initialized");
            Ok(())
        })
        .clone()
        .map_err(|e| PlaybackError::Preparation(format!("Failed to initialize GStreamer: {e}")))
}

/// Create the playbin element an engine drives
pub fn build_playbin() -> Result<gst::Element, PlaybackError> {
    gst::ElementFactory::make("playbin")
        .name("loopview-playbin")
        .build()
        .map_err(|e| PlaybackError::Preparation(format!("Failed to create playbin: {e}")))
}

/// Route the video overlay of `playbin` into a native window.
///
/// The sink asks for its window handle with a synchronous bus message while
/// the pipeline prerolls, so this has to be installed before preparing.
pub fn bind_window_handle(playbin: &gst::Element, handle: u64) -> Result<(), PlaybackError> {
    let bus = playbin
        .bus()
        .ok_or_else(|| PlaybackError::Preparation("playbin has no bus".to_string()))?;
    let handle = usize::try_from(handle).map_err(|_| {
        PlaybackError::Preparation(format!("Window handle {handle:#x} does not fit a pointer"))
    })?;

    bus.set_sync_handler(move |_, msg| {
        if gst_video::is_video_overlay_prepare_window_handle_message(msg)
            && let Some(overlay) = msg
                .src()
                .and_then(|src| src.dynamic_cast_ref::<gst_video::VideoOverlay>())
        {
            log::debug!("Binding video overlay to window {:#x}", handle);
            // SAFETY: the handle names a window owned by the host, which keeps
            // it alive for as long as the surface is available.
            unsafe { overlay.set_window_handle(handle) };
        }
        gst::BusSyncReply::Pass
    });

    Ok(())
}

/// Read the negotiated size of the first video stream
pub fn video_dimensions(playbin: &gst::Element) -> Option<(u32, u32)> {
    let pad = playbin.emit_by_name::<Option<gst::Pad>>("get-video-pad", &[&0i32])?;
    let caps = pad.current_caps()?;
    let info = gst_video::VideoInfo::from_caps(&caps).ok()?;
    Some((info.width(), info.height()))
}

/// Map a GStreamer error onto an engine error code
pub fn error_code(error: &gst::glib::Error) -> ErrorCode {
    let what = if let Some(kind) = error.kind::<gst::ResourceError>() {
        match kind {
            gst::ResourceError::NotFound
            | gst::ResourceError::OpenRead
            | gst::ResourceError::Read
            | gst::ResourceError::Seek => ErrorCode::IO,
            _ => ErrorCode::UNKNOWN,
        }
    } else if let Some(kind) = error.kind::<gst::StreamError>() {
        match kind {
            gst::StreamError::CodecNotFound
            | gst::StreamError::TypeNotFound
            | gst::StreamError::WrongType
            | gst::StreamError::NotImplemented => ErrorCode::UNSUPPORTED,
            gst::StreamError::Decode | gst::StreamError::Demux | gst::StreamError::Format => {
                ErrorCode::MALFORMED
            }
            _ => ErrorCode::UNKNOWN,
        }
    } else if error.kind::<gst::CoreError>().is_some() {
        ErrorCode::SERVER_DIED
    } else {
        ErrorCode::UNKNOWN
    };

    ErrorCode::new(what, 0)
}

/// Background thread reporting bus messages for one preparation cycle
pub struct BusWatcher {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl BusWatcher {
    pub fn spawn(
        playbin: gst::Element,
        looping: Arc<AtomicBool>,
        callbacks: EngineCallbacks,
    ) -> Result<Self, PlaybackError> {
        let bus = playbin
            .bus()
            .ok_or_else(|| PlaybackError::Preparation("playbin has no bus".to_string()))?;
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let handle = std::thread::Builder::new()
            .name(format!("loopview-bus-{}", callbacks.generation()))
            .spawn(move || watch_bus(&playbin, &bus, &stop_flag, &looping, &callbacks))
            .map_err(|e| PlaybackError::Preparation(format!("Failed to spawn bus watcher: {e}")))?;

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Ask the watcher to exit.
    ///
    /// The thread is detached, not joined: it may be blocked delivering a
    /// callback to the controller that is releasing this engine.
    pub fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take()
            && handle.is_finished()
        {
            let _ = handle.join();
        }
    }
}

impl Drop for BusWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn watch_bus(
    playbin: &gst::Element,
    bus: &gst::Bus,
    stop: &AtomicBool,
    looping: &AtomicBool,
    callbacks: &EngineCallbacks,
) {
    let mut prepared = false;

    while !stop.load(Ordering::Acquire) {
        let Some(msg) = bus.timed_pop(gst::ClockTime::from_mseconds(BUS_POLL_MS)) else {
            continue;
        };

        match msg.view() {
            // Flushing seeks post AsyncDone too; only the first one counts.
            gst::MessageView::AsyncDone(_) if !prepared => {
                prepared = true;
                let (width, height) = video_dimensions(playbin).unwrap_or_else(|| {
                    log::warn!("Prepared stream has no video caps, size unknown");
                    (0, 0)
                });
                log::debug!("Pipeline prerolled at {}x{}", width, height);
                callbacks.prepared(width, height);
            }

            gst::MessageView::Eos(_) => {
                if looping.load(Ordering::Relaxed) {
                    log::debug!("Video reached EOS, looping...");
                    if let Err(e) = playbin.seek_simple(
                        gst::SeekFlags::FLUSH | gst::SeekFlags::KEY_UNIT,
                        gst::ClockTime::ZERO,
                    ) {
                        log::warn!("Failed to loop video: {}", e);
                    }
                } else {
                    log::info!("Video playback finished");
                }
            }

            gst::MessageView::Error(err) => {
                let code = error_code(&err.error());
                log::error!(
                    "GStreamer error: {} (debug: {:?})",
                    err.error(),
                    err.debug()
                );
                callbacks.error(code.what, code.extra);
                break;
            }

            _ => {
                // Drain other messages to prevent memory leak
            }
        }
    }

    log::debug!("Bus watcher for cycle {} exiting", callbacks.generation());
}
