//! PlaybackController keeping a single engine in step with its surface
//!
//! Surface events start and release the engine; engine events record the
//! video resolution and start playback. Every mutation of the engine handle
//! happens under the session lock, so a release can never interleave with a
//! create on the same handle. No operation here fails towards its caller:
//! errors are logged and leave the session stopped.

use common::{SessionState, VideoDimensions};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use super::engine::{
    EngineCallbacks, EngineFactory, EngineListener, ErrorCode, PlaybackEngine, PlaybackError,
    VideoSource,
};
use crate::surface::{LayoutHost, SurfaceTarget};

/// Engine handle plus the lifecycle bookkeeping around it
struct Session<E> {
    engine: Option<E>,
    state: SessionState,
    /// Bumped on every preparation so late callbacks can be told apart
    generation: u64,
    last_error: Option<String>,
}

/// Point-in-time view of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub has_engine: bool,
    pub generation: u64,
    pub video: VideoDimensions,
    pub last_error: Option<String>,
}

/// Owns the engine handle for one video surface
pub struct PlaybackController<F: EngineFactory> {
    factory: F,
    source: VideoSource,
    layout_host: Arc<dyn LayoutHost>,
    session: Mutex<Session<F::Engine>>,
    /// Kept apart from the session so measurement never waits on the engine
    video: Mutex<VideoDimensions>,
    self_ref: Weak<Self>,
}

impl<F: EngineFactory> PlaybackController<F> {
    pub fn new(factory: F, source: VideoSource, layout_host: Arc<dyn LayoutHost>) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            factory,
            source,
            layout_host,
            session: Mutex::new(Session {
                engine: None,
                state: SessionState::Idle,
                generation: 0,
                last_error: None,
            }),
            video: Mutex::new(VideoDimensions::UNKNOWN),
            self_ref: self_ref.clone(),
        })
    }

    pub fn source(&self) -> &VideoSource {
        &self.source
    }

    /// Native resolution reported by the last successful preparation.
    ///
    /// `(0, 0)` until the first one completes.
    pub fn video_dimensions(&self) -> VideoDimensions {
        *self.video.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    pub fn state(&self) -> SessionState {
        self.lock_session().state
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let session = self.lock_session();
        SessionSnapshot {
            state: session.state,
            has_engine: session.engine.is_some(),
            generation: session.generation,
            video: self.video_dimensions(),
            last_error: session.last_error.clone(),
        }
    }

    /// Bind playback to a newly available surface and start preparing.
    ///
    /// A session that is already preparing or playing is left alone and
    /// `false` is returned. A failed session has its engine replaced.
    pub fn on_surface_available(&self, target: &SurfaceTarget) -> bool {
        let mut session = self.lock_session();

        let state = session.state;
        match state {
            SessionState::Preparing | SessionState::PreparedPlaying
                if session.engine.is_some() =>
            {
                log::debug!(
                    "Surface {} available while session is {}, ignoring",
                    target.name,
                    state
                );
                return false;
            }
            SessionState::Failed => {
                log::info!("Replacing failed engine for surface {}", target.name);
                Self::release_engine(&mut session);
            }
            _ => {}
        }

        if session.engine.is_none() {
            match self.factory.create() {
                Ok(engine) => {
                    log::debug!("Created playback engine");
                    session.engine = Some(engine);
                }
                Err(e) => {
                    Self::fail(&mut session, &e);
                    return true;
                }
            }
        }

        session.generation += 1;
        session.state = SessionState::Preparing;
        session.last_error = None;
        let callbacks = EngineCallbacks::new(self.listener(), session.generation);

        log::info!(
            "Preparing {} on surface {} (cycle {})",
            self.source,
            target.name,
            session.generation
        );

        let result = match session.engine.as_mut() {
            Some(engine) => Self::configure(engine, target, &self.source, callbacks),
            None => return true,
        };

        if let Err(e) = result {
            Self::fail(&mut session, &e);
        }
        true
    }

    /// The surface is gone: stop and release playback
    pub fn on_surface_gone(&self) {
        self.release_session();
    }

    /// Stop and release the engine, if there is one.
    ///
    /// Safe to call any number of times.
    pub fn release_session(&self) {
        let mut session = self.lock_session();
        if session.engine.is_none() {
            log::debug!("No playback engine to release ({})", session.state);
        } else {
            Self::release_engine(&mut session);
            log::info!("Playback session released");
        }
        session.state = SessionState::Released;
    }

    fn configure(
        engine: &mut F::Engine,
        target: &SurfaceTarget,
        source: &VideoSource,
        callbacks: EngineCallbacks,
    ) -> Result<(), PlaybackError> {
        engine.bind_output(target)?;
        engine.set_source(source)?;
        engine.set_looping(true);
        engine.prepare_async(callbacks)
    }

    fn release_engine(session: &mut Session<F::Engine>) {
        if let Some(mut engine) = session.engine.take() {
            engine.stop();
            engine.release();
        }
    }

    /// Log `error` and leave the session stopped, engine kept until release
    fn fail(session: &mut Session<F::Engine>, error: &PlaybackError) {
        log::error!("Video playback stopped: {}", error);
        if let Some(engine) = session.engine.as_mut() {
            engine.stop();
        }
        session.state = SessionState::Failed;
        session.last_error = Some(error.to_string());
    }

    fn listener(&self) -> Weak<dyn EngineListener> {
        self.self_ref.clone()
    }

    fn lock_session(&self) -> MutexGuard<'_, Session<F::Engine>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a callback from `generation` still belongs to a live cycle
    fn is_current(session: &Session<F::Engine>, generation: u64) -> bool {
        generation == session.generation && session.engine.is_some()
    }
}

impl<F: EngineFactory> EngineListener for PlaybackController<F> {
    fn on_prepared(&self, generation: u64, width: u32, height: u32) {
        {
            let mut session = self.lock_session();
            if !Self::is_current(&session, generation) || session.state != SessionState::Preparing
            {
                log::debug!(
                    "Ignoring prepared notification for cycle {} (current {}, {})",
                    generation,
                    session.generation,
                    session.state
                );
                return;
            }

            let video = VideoDimensions::new(width, height);
            *self.video.lock().unwrap_or_else(PoisonError::into_inner) = video;
            log::info!("Video prepared at {}, starting playback", video);

            let started = match session.engine.as_mut() {
                Some(engine) => engine.start(),
                None => return,
            };
            match started {
                Ok(()) => session.state = SessionState::PreparedPlaying,
                Err(e) => Self::fail(&mut session, &e),
            }
        }

        // Outside the lock: the host may measure straight away.
        self.layout_host.request_layout();
    }

    fn on_playback_error(&self, generation: u64, code: ErrorCode) -> bool {
        let mut session = self.lock_session();
        let active = matches!(
            session.state,
            SessionState::Preparing | SessionState::PreparedPlaying
        );

        if generation != session.generation {
            log::warn!(
                "Playback error from stale cycle {} (current {}): {}",
                generation,
                session.generation,
                code
            );
        } else if active && session.engine.is_some() {
            Self::fail(&mut session, &PlaybackError::Engine(code));
        } else {
            log::debug!(
                "Playback error while session is {}, already stopped: {}",
                session.state,
                code
            );
        }

        true
    }
}
