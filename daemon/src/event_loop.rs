//! Surface event loop
//!
//! Every surface lifecycle change reaches the [`VideoSurfaceView`] through a
//! single task, so lifecycle events are delivered one at a time and in order.
//! The IPC server, the signal handler and the playback controller (through
//! [`ChannelLayoutHost`]) only ever send [`SurfaceEvent`]s.

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

use crate::DaemonState;
use crate::log_and_continue;
use crate::playback::EngineFactory;
use crate::surface::{LayoutHost, SurfaceCallback, SurfaceTarget, VideoSurfaceView};

/// Events dispatched to the surface view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// A surface became available for rendering
    Available(SurfaceTarget),
    /// The current surface changed format or size
    Changed { format: i32, width: u32, height: u32 },
    /// The current surface is gone
    Gone,
    /// Run a measurement pass with the configured constraints
    Relayout,
    /// Release the playback session, keeping the surface
    Release,
    /// Tear down the session and stop the loop
    Shutdown,
}

/// Layout host that queues a [`SurfaceEvent::Relayout`]
pub struct ChannelLayoutHost {
    events: mpsc::UnboundedSender<SurfaceEvent>,
}

impl ChannelLayoutHost {
    pub fn new(events: mpsc::UnboundedSender<SurfaceEvent>) -> Self {
        Self { events }
    }
}

impl LayoutHost for ChannelLayoutHost {
    fn request_layout(&self) {
        log_and_continue!(self.events.send(SurfaceEvent::Relayout), "queue relayout");
    }
}

/// Run the event loop until a shutdown event arrives or every sender is gone
pub async fn run<F: EngineFactory>(
    view: Arc<VideoSurfaceView<F>>,
    state: Arc<Mutex<DaemonState>>,
    mut events: mpsc::UnboundedReceiver<SurfaceEvent>,
) -> Result<()> {
    log::info!("Surface event loop started");

    while let Some(event) = events.recv().await {
        log::debug!("Surface event: {:?}", event);

        match event {
            SurfaceEvent::Available(target) => view.surface_created(&target),

            SurfaceEvent::Changed {
                format,
                width,
                height,
            } => {
                let target = current_target(&view, &state).await;
                view.surface_changed(&target, format, width, height);
            }

            SurfaceEvent::Gone => {
                let target = current_target(&view, &state).await;
                view.surface_destroyed(&target);
            }

            SurfaceEvent::Relayout => {
                let mut state = state.lock().await;
                let (width, height) = (state.config.width_spec(), state.config.height_spec());
                let size = view.measure(width, height);
                log::info!(
                    "Layout pass: video {} in {} x {} -> {}",
                    view.controller().video_dimensions(),
                    width,
                    height,
                    size
                );
                state.last_measured = Some(size);
            }

            SurfaceEvent::Release => view.controller().release_session(),

            SurfaceEvent::Shutdown => {
                match view.current_surface() {
                    Some(target) => view.surface_destroyed(&target),
                    None => view.controller().release_session(),
                }
                break;
            }
        }
    }

    log::info!("Surface event loop stopped");
    Ok(())
}

/// Surface the next lifecycle event applies to
async fn current_target<F: EngineFactory>(
    view: &VideoSurfaceView<F>,
    state: &Mutex<DaemonState>,
) -> SurfaceTarget {
    match view.current_surface() {
        Some(target) => target,
        None => state.lock().await.config.surface_target(),
    }
}
