//! Playback session management
//!
//! - `engine`: the engine abstraction and its callback plumbing
//! - `controller`: keeps one engine in step with the surface lifecycle

mod controller;
mod engine;

#[cfg(test)]
pub(crate) mod testing;

pub use controller::{PlaybackController, SessionSnapshot};
pub use engine::{
    EngineCallbacks, EngineFactory, EngineListener, ErrorCode, PlaybackEngine, PlaybackError,
    VideoSource,
};
