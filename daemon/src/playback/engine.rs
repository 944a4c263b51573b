//! Playback engine abstraction
//!
//! The controller never talks to a concrete decoder. It drives anything that
//! implements [`PlaybackEngine`], created on demand by an [`EngineFactory`].
//! Engines report back through [`EngineCallbacks`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Weak;
use thiserror::Error;

use crate::surface::SurfaceTarget;

/// Video resource to play
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoSource {
    path: PathBuf,
}

impl VideoSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for VideoSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// Error code pair reported by an engine.
///
/// `what` identifies the failure class, `extra` carries engine-specific
/// detail. Neither is required to be one of the known values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorCode {
    pub what: i32,
    pub extra: i32,
}

impl ErrorCode {
    pub const UNKNOWN: i32 = 1;
    pub const SERVER_DIED: i32 = 100;
    pub const TIMED_OUT: i32 = -110;
    pub const IO: i32 = -1004;
    pub const MALFORMED: i32 = -1007;
    pub const UNSUPPORTED: i32 = -1010;

    pub fn new(what: i32, extra: i32) -> Self {
        Self { what, extra }
    }

    pub fn description(&self) -> &'static str {
        match self.what {
            Self::UNKNOWN => "unknown",
            Self::SERVER_DIED => "server-died",
            Self::TIMED_OUT => "timed-out",
            Self::IO => "io",
            Self::MALFORMED => "malformed",
            Self::UNSUPPORTED => "unsupported",
            _ => "unrecognised",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "what={} ({}), extra={}",
            self.what,
            self.description(),
            self.extra
        )
    }
}

/// Failures while bringing up or running a playback session
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("Failed to load video source {}: {reason}", path.display())]
    SourceLoad { path: PathBuf, reason: String },

    #[error("Failed to prepare playback: {0}")]
    Preparation(String),

    #[error("Failed to start playback: {0}")]
    Start(String),

    #[error("Engine error: {0}")]
    Engine(ErrorCode),
}

impl PlaybackError {
    pub fn source_load(source: &VideoSource, reason: impl Into<String>) -> Self {
        Self::SourceLoad {
            path: source.path().to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// One video decode/playback instance.
///
/// Engines must not invoke their callbacks from inside `prepare_async`; the
/// controller holds its session lock for the duration of that call.
pub trait PlaybackEngine: Send {
    /// Direct decoded output at `target`
    fn bind_output(&mut self, target: &SurfaceTarget) -> Result<(), PlaybackError>;

    fn set_source(&mut self, source: &VideoSource) -> Result<(), PlaybackError>;

    fn set_looping(&mut self, looping: bool);

    /// Begin preparing in the background.
    ///
    /// Completion is reported through `callbacks.prepared`, failure through
    /// `callbacks.error`.
    fn prepare_async(&mut self, callbacks: EngineCallbacks) -> Result<(), PlaybackError>;

    fn start(&mut self) -> Result<(), PlaybackError>;

    fn stop(&mut self);

    /// Free all engine resources. The engine is not used afterwards.
    fn release(&mut self);
}

/// Creates engines on demand
pub trait EngineFactory: Send + Sync + 'static {
    type Engine: PlaybackEngine + 'static;

    fn create(&self) -> Result<Self::Engine, PlaybackError>;
}

/// Receiver of engine notifications, tagged with the preparation cycle they
/// belong to
pub trait EngineListener: Send + Sync {
    fn on_prepared(&self, generation: u64, width: u32, height: u32);

    /// Returns whether the error was handled
    fn on_playback_error(&self, generation: u64, code: ErrorCode) -> bool;
}

/// Handle an engine uses to report back to its controller.
///
/// Holds the controller weakly, so an engine outliving its controller just
/// reports into the void.
#[derive(Clone)]
pub struct EngineCallbacks {
    listener: Weak<dyn EngineListener>,
    generation: u64,
}

impl EngineCallbacks {
    pub fn new(listener: Weak<dyn EngineListener>, generation: u64) -> Self {
        Self {
            listener,
            generation,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn prepared(&self, width: u32, height: u32) {
        match self.listener.upgrade() {
            Some(listener) => listener.on_prepared(self.generation, width, height),
            None => log::debug!("Engine prepared after its controller was dropped"),
        }
    }

    /// Report an error. Always handled once it reaches a controller.
    pub fn error(&self, what: i32, extra: i32) -> bool {
        let code = ErrorCode::new(what, extra);
        match self.listener.upgrade() {
            Some(listener) => listener.on_playback_error(self.generation, code),
            None => {
                log::debug!("Engine error after its controller was dropped: {}", code);
                true
            }
        }
    }
}

impl fmt::Debug for EngineCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineCallbacks")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}
