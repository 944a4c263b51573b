// Without the video feature no engine can be built, leaving the callback path unreachable
#![cfg_attr(not(feature = "video"), allow(dead_code))]

mod config;
mod event_loop;
mod ipc_server;
mod macros;
mod playback;
mod surface;
mod video;

use anyhow::Result;
use common::ResolvedSize;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

use event_loop::{ChannelLayoutHost, SurfaceEvent};
use surface::VideoSurfaceView;
use video::GstEngineFactory;

#[tokio::main]
async fn main() -> Result<()> {
    // Logging is not up yet, so config errors are reported after init
    let loaded = config::Config::load();
    let log_level = loaded
        .as_ref()
        .map(|cfg| cfg.general.log_level.clone())
        .unwrap_or_else(|_| "info".to_string());
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    log::info!("Starting loopview daemon v{}", env!("CARGO_PKG_VERSION"));

    let config = match loaded {
        Ok(cfg) => {
            log::info!("Configuration:");
            log::info!("  - Source: {}", cfg.video_source());
            log::info!(
                "  - Scale: {}",
                cfg.scale_mode().map_or("none".to_string(), |m| m.to_string())
            );
            log::info!(
                "  - Surface: {} (window handle: {:?}, auto start: {})",
                cfg.surface.name,
                cfg.surface.window_handle,
                cfg.surface.auto_start
            );
            log::info!(
                "  - Constraints: {} x {}",
                cfg.width_spec(),
                cfg.height_spec()
            );
            cfg
        }
        Err(e) => {
            log::warn!("Failed to load config: {:#}. Using defaults.", e);
            if let Ok(path) = config::Config::default_config_path() {
                log::info!("To create a config file:");
                log::info!("  cp config.toml.example {}", path.display());
            }
            config::Config::default()
        }
    };

    let (events_tx, events_rx) = mpsc::unbounded_channel();

    let view = Arc::new(VideoSurfaceView::new(
        GstEngineFactory::new(),
        config.video_source(),
        config.scale_mode(),
        Arc::new(ChannelLayoutHost::new(events_tx.clone())),
    ));

    if config.surface.auto_start {
        log_and_continue!(
            events_tx.send(SurfaceEvent::Available(config.surface_target())),
            "announce configured surface"
        );
    }

    let state = Arc::new(Mutex::new(DaemonState::new(config)));

    // Start IPC server
    let ipc_ctx = ipc_server::IpcContext {
        state: Arc::clone(&state),
        view: Arc::clone(&view),
        events: events_tx.clone(),
    };
    let ipc_handle = tokio::spawn(async move {
        if let Err(e) = ipc_server::start(ipc_ctx).await {
            log::error!("IPC server error: {}", e);
        }
    });

    // Start surface event loop
    let loop_state = Arc::clone(&state);
    let mut loop_handle = tokio::spawn(async move {
        if let Err(e) = event_loop::run(view, loop_state, events_rx).await {
            log::error!("Surface event loop error: {}", e);
        }
    });

    // Set up signal handlers
    let signal_state = Arc::clone(&state);
    let signal_tx = events_tx.clone();
    tokio::spawn(async move {
        use tokio::signal::unix::{SignalKind, signal};

        let (mut sigterm, mut sigint) = match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(term), Ok(int)) => (term, int),
            (Err(e), _) | (_, Err(e)) => {
                log::error!("Failed to set up signal handlers: {}", e);
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                log::info!("Received SIGTERM, shutting down...");
            }
            _ = sigint.recv() => {
                log::info!("Received SIGINT, shutting down...");
            }
        }

        signal_state.lock().await.should_exit = true;
        log_and_continue!(signal_tx.send(SurfaceEvent::Shutdown), "request shutdown");
    });

    // The event loop owns the playback session, so it must finish first
    tokio::select! {
        _ = &mut loop_handle => {
            log::info!("Surface event loop finished");
        }
        _ = ipc_handle => {
            log::info!("IPC server stopped, releasing playback");
            log_and_continue!(events_tx.send(SurfaceEvent::Shutdown), "request shutdown");
            if let Err(e) = loop_handle.await {
                log::error!("Surface event loop panicked: {}", e);
            }
        }
    }

    state.lock().await.should_exit = true;
    log::info!("Daemon shutting down");
    Ok(())
}

/// Shared daemon state
pub struct DaemonState {
    pub should_exit: bool,
    pub start_time: std::time::Instant,
    pub config: config::Config,
    /// Result of the most recent measurement pass
    pub last_measured: Option<ResolvedSize>,
}

impl DaemonState {
    fn new(config: config::Config) -> Self {
        Self {
            should_exit: false,
            start_time: std::time::Instant::now(),
            config,
            last_measured: None,
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
