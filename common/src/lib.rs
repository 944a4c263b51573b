//! Common types and utilities for Loopview.
//!
//! This crate defines the layout resolver shared by the daemon (`loopview`)
//! and client (`lvctl`), together with the IPC protocol used between them.
//!
//! # IPC Protocol
//!
//! Communication happens over a Unix domain socket using JSON-serialized
//! messages, one per line. The client sends [`Command`] variants and
//! receives [`Response`] variants.
//!
//! # Examples
//!
//! ```no_run
//! use common::{Command, MeasureSpec};
//!
//! // Ask the daemon for a measurement pass
//! let cmd = Command::Measure {
//!     width: MeasureSpec::exact(1920),
//!     height: MeasureSpec::at_most(1080),
//! };
//!
//! // Serialize for sending over IPC
//! let json = serde_json::to_string(&cmd).unwrap();
//! ```

pub mod layout;

pub use layout::{MeasureMode, MeasureSpec, ResolvedSize, ScaleMode, VideoDimensions};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors reported by the daemon to its clients.
///
/// Serializable for transmission over IPC.
#[derive(Error, Debug, Serialize, Deserialize)]
pub enum LoopviewError {
    #[error("IPC error: {0}")]
    Ipc(String),
}

/// Commands sent from client to daemon via IPC.
///
/// The surface commands let any host runtime drive the daemon's surface
/// lifecycle from outside the process.
#[derive(Debug, Serialize, Deserialize)]
pub enum Command {
    /// Ping the daemon
    Ping,
    /// Query the playback session
    Status,
    /// A drawing surface became available
    SurfaceAvailable {
        /// Surface name, or None for the configured surface
        name: Option<String>,
        /// Native window handle to render into, if any
        window_handle: Option<u64>,
    },
    /// The drawing surface changed format or size
    SurfaceChanged { format: i32, width: u32, height: u32 },
    /// The drawing surface is gone
    SurfaceGone,
    /// Run a measurement pass against the given constraints
    Measure {
        width: MeasureSpec,
        height: MeasureSpec,
    },
    /// Release the playback session without touching the surface
    Release,
    /// Kill the daemon
    Kill,
}

/// Response from daemon to client
#[derive(Debug, Serialize, Deserialize)]
pub enum Response {
    Ok,
    Pong,
    Error(LoopviewError),
    Status(SessionStatus),
    Measured(ResolvedSize),
}

/// Lifecycle state of a playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// No engine has been created yet
    Idle,
    /// Waiting for the engine to finish preparing
    Preparing,
    /// Prepared and playing in a loop
    PreparedPlaying,
    /// Stopped after an engine error
    Failed,
    /// Engine released
    Released,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Preparing => "preparing",
            Self::PreparedPlaying => "playing",
            Self::Failed => "failed",
            Self::Released => "released",
        };
        f.write_str(name)
    }
}

/// Playback session snapshot reported by the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatus {
    pub version: String,
    pub uptime_secs: u64,
    pub surface: Option<String>,
    pub source: String,
    pub scale_mode: Option<ScaleMode>,
    pub state: SessionState,
    pub has_engine: bool,
    /// Number of preparation cycles started so far
    pub cycle: u64,
    pub video: VideoDimensions,
    pub last_measured: Option<ResolvedSize>,
    pub last_error: Option<String>,
}

/// IPC socket path helper
pub fn get_socket_path() -> std::path::PathBuf {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR")
        .unwrap_or_else(|_| format!("/run/user/{}", unsafe { libc::getuid() }));

    std::path::PathBuf::from(runtime_dir).join("loopview.sock")
}
