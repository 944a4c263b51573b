use anyhow::Result;
use common::{Command, LoopviewError, Response, SessionStatus};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{Mutex, mpsc};

use crate::DaemonState;
use crate::event_loop::SurfaceEvent;
use crate::playback::EngineFactory;
use crate::surface::VideoSurfaceView;

/// Everything a client connection needs to answer commands
pub struct IpcContext<F: EngineFactory> {
    pub state: Arc<Mutex<DaemonState>>,
    pub view: Arc<VideoSurfaceView<F>>,
    pub events: mpsc::UnboundedSender<SurfaceEvent>,
}

impl<F: EngineFactory> Clone for IpcContext<F> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            view: Arc::clone(&self.view),
            events: self.events.clone(),
        }
    }
}

pub async fn start<F: EngineFactory>(ctx: IpcContext<F>) -> Result<()> {
    let socket_path = common::get_socket_path();

    // Remove old socket if it exists
    if socket_path.exists() {
        std::fs::remove_file(&socket_path)?;
    }

    let listener = UnixListener::bind(&socket_path)?;
    log::info!("IPC server listening on: {}", socket_path.display());

    loop {
        if ctx.state.lock().await.should_exit {
            break;
        }

        // Accept with a timeout so the exit flag is rechecked
        let accept_result =
            tokio::time::timeout(std::time::Duration::from_millis(100), listener.accept()).await;

        match accept_result {
            Ok(Ok((stream, _addr))) => {
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_client(stream, ctx).await {
                        log::error!("Error handling client: {}", e);
                    }
                });
            }
            Ok(Err(e)) => {
                log::error!("Error accepting connection: {}", e);
            }
            Err(_) => continue,
        }
    }

    let _ = std::fs::remove_file(&socket_path);
    log::info!("IPC server stopped");
    Ok(())
}

async fn handle_client<F: EngineFactory>(stream: UnixStream, ctx: IpcContext<F>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    while reader.read_line(&mut line).await? > 0 {
        let response = match serde_json::from_str::<Command>(&line) {
            Ok(command) => handle_command(command, &ctx).await,
            Err(e) => {
                log::warn!("Invalid command: {}", e);
                Response::Error(LoopviewError::Ipc(format!("Invalid command: {}", e)))
            }
        };

        let response_json = serde_json::to_string(&response)?;
        writer.write_all(response_json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;

        line.clear();
    }

    Ok(())
}

async fn handle_command<F: EngineFactory>(command: Command, ctx: &IpcContext<F>) -> Response {
    log::debug!("Handling command: {:?}", command);

    match command {
        Command::Ping => Response::Pong,

        Command::Status => {
            let snapshot = ctx.view.controller().snapshot();
            let state = ctx.state.lock().await;
            Response::Status(SessionStatus {
                version: env!("CARGO_PKG_VERSION").to_string(),
                uptime_secs: state.uptime_secs(),
                surface: ctx.view.current_surface().map(|target| target.name),
                source: ctx.view.controller().source().to_string(),
                scale_mode: ctx.view.scale_mode(),
                state: snapshot.state,
                has_engine: snapshot.has_engine,
                cycle: snapshot.generation,
                video: snapshot.video,
                last_measured: state.last_measured,
                last_error: snapshot.last_error,
            })
        }

        Command::SurfaceAvailable {
            name,
            window_handle,
        } => {
            let mut target = ctx.state.lock().await.config.surface_target();
            if let Some(name) = name {
                target.name = name;
            }
            if let Some(handle) = window_handle {
                target = target.with_window_handle(handle);
            }
            log::info!("Surface available via IPC: {}", target.name);
            send_event(ctx, SurfaceEvent::Available(target))
        }

        Command::SurfaceChanged {
            format,
            width,
            height,
        } => send_event(
            ctx,
            SurfaceEvent::Changed {
                format,
                width,
                height,
            },
        ),

        Command::SurfaceGone => send_event(ctx, SurfaceEvent::Gone),

        Command::Measure { width, height } => {
            let size = ctx.view.measure(width, height);
            ctx.state.lock().await.last_measured = Some(size);
            Response::Measured(size)
        }

        Command::Release => send_event(ctx, SurfaceEvent::Release),

        Command::Kill => {
            log::info!("Received kill command");
            ctx.state.lock().await.should_exit = true;
            send_event(ctx, SurfaceEvent::Shutdown)
        }
    }
}

fn send_event<F: EngineFactory>(ctx: &IpcContext<F>, event: SurfaceEvent) -> Response {
    match ctx.events.send(event) {
        Ok(()) => Response::Ok,
        Err(e) => Response::Error(LoopviewError::Ipc(format!(
            "Failed to send event to surface loop: {}",
            e
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::event_loop::ChannelLayoutHost;
    use crate::playback::testing::{FakeFactory, source};
    use crate::surface::SurfaceTarget;
    use common::{MeasureSpec, ResolvedSize, ScaleMode, SessionState};

    fn context(config: Config) -> (IpcContext<FakeFactory>, mpsc::UnboundedReceiver<SurfaceEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (factory, _log) = FakeFactory::new();
        let view = VideoSurfaceView::new(
            factory,
            source(),
            Some(ScaleMode::Center),
            Arc::new(ChannelLayoutHost::new(tx.clone())),
        );
        let ctx = IpcContext {
            state: Arc::new(Mutex::new(DaemonState::new(config))),
            view: Arc::new(view),
            events: tx,
        };
        (ctx, rx)
    }

    #[tokio::test]
    async fn test_ping() {
        let (ctx, _rx) = context(Config::default());
        assert!(matches!(
            handle_command(Command::Ping, &ctx).await,
            Response::Pong
        ));
    }

    #[tokio::test]
    async fn test_status_before_any_surface() {
        let (ctx, _rx) = context(Config::default());
        let Response::Status(status) = handle_command(Command::Status, &ctx).await else {
            panic!("expected a status response");
        };

        assert_eq!(status.state, SessionState::Idle);
        assert!(!status.has_engine);
        assert_eq!(status.cycle, 0);
        assert!(status.video.is_unknown());
        assert_eq!(status.surface, None);
        assert_eq!(status.source, "/videos/loop.mp4");
        assert_eq!(status.scale_mode, Some(ScaleMode::Center));
        assert_eq!(status.last_measured, None);
    }

    #[tokio::test]
    async fn test_surface_available_fills_in_config() {
        let mut config = Config::default();
        config.surface.name = "lobby".to_string();
        config.surface.window_handle = Some(7);
        let (ctx, mut rx) = context(config);

        let cmd = Command::SurfaceAvailable {
            name: None,
            window_handle: None,
        };
        assert!(matches!(handle_command(cmd, &ctx).await, Response::Ok));
        assert_eq!(
            rx.recv().await,
            Some(SurfaceEvent::Available(
                SurfaceTarget::new("lobby").with_window_handle(7)
            ))
        );

        let cmd = Command::SurfaceAvailable {
            name: Some("side".to_string()),
            window_handle: Some(9),
        };
        handle_command(cmd, &ctx).await;
        assert_eq!(
            rx.recv().await,
            Some(SurfaceEvent::Available(
                SurfaceTarget::new("side").with_window_handle(9)
            ))
        );
    }

    #[tokio::test]
    async fn test_measure_records_last_size() {
        let (ctx, _rx) = context(Config::default());
        let cmd = Command::Measure {
            width: MeasureSpec::exact(320),
            height: MeasureSpec::at_most(200),
        };

        let Response::Measured(size) = handle_command(cmd, &ctx).await else {
            panic!("expected a measured response");
        };
        assert_eq!(size, ResolvedSize::new(320, 200));
        assert_eq!(ctx.state.lock().await.last_measured, Some(size));
    }

    #[tokio::test]
    async fn test_kill_requests_shutdown() {
        let (ctx, mut rx) = context(Config::default());
        assert!(matches!(
            handle_command(Command::Kill, &ctx).await,
            Response::Ok
        ));
        assert!(ctx.state.lock().await.should_exit);
        assert_eq!(rx.recv().await, Some(SurfaceEvent::Shutdown));
    }

    #[tokio::test]
    async fn test_event_after_loop_stopped_is_an_error() {
        let (ctx, rx) = context(Config::default());
        drop(rx);
        assert!(matches!(
            handle_command(Command::SurfaceGone, &ctx).await,
            Response::Error(LoopviewError::Ipc(_))
        ));
    }
}
