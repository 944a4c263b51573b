//! In-memory engine used by the unit tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::engine::{EngineCallbacks, EngineFactory, PlaybackEngine, PlaybackError, VideoSource};
use crate::surface::{LayoutHost, SurfaceTarget};

/// Shared record of everything the fake engines saw
#[derive(Default)]
pub struct EngineLog {
    pub calls: Mutex<Vec<String>>,
    pub callbacks: Mutex<Option<EngineCallbacks>>,
    pub created: AtomicUsize,
    pub released: AtomicUsize,
    pub fail_create: AtomicBool,
    pub fail_source: AtomicBool,
    pub fail_start: AtomicBool,
}

impl EngineLog {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn live(&self) -> usize {
        self.created.load(Ordering::SeqCst) - self.released.load(Ordering::SeqCst)
    }

    /// Callbacks handed to the most recent `prepare_async`
    pub fn last_callbacks(&self) -> EngineCallbacks {
        self.callbacks
            .lock()
            .unwrap()
            .clone()
            .expect("no engine was prepared")
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

pub struct FakeFactory {
    pub log: Arc<EngineLog>,
}

impl FakeFactory {
    pub fn new() -> (Self, Arc<EngineLog>) {
        let log = Arc::new(EngineLog::default());
        (
            Self {
                log: Arc::clone(&log),
            },
            log,
        )
    }
}

impl EngineFactory for FakeFactory {
    type Engine = FakeEngine;

    fn create(&self) -> Result<FakeEngine, PlaybackError> {
        if self.log.fail_create.load(Ordering::SeqCst) {
            return Err(PlaybackError::Preparation("no decoder".to_string()));
        }
        let id = self.log.created.fetch_add(1, Ordering::SeqCst) + 1;
        self.log.record(format!("create #{id}"));
        Ok(FakeEngine {
            id,
            log: Arc::clone(&self.log),
            released: false,
        })
    }
}

pub struct FakeEngine {
    id: usize,
    log: Arc<EngineLog>,
    released: bool,
}

impl PlaybackEngine for FakeEngine {
    fn bind_output(&mut self, target: &SurfaceTarget) -> Result<(), PlaybackError> {
        self.log.record(format!("bind #{} {}", self.id, target.name));
        Ok(())
    }

    fn set_source(&mut self, source: &VideoSource) -> Result<(), PlaybackError> {
        if self.log.fail_source.load(Ordering::SeqCst) {
            return Err(PlaybackError::source_load(source, "missing"));
        }
        self.log.record(format!("source #{} {}", self.id, source));
        Ok(())
    }

    fn set_looping(&mut self, looping: bool) {
        self.log.record(format!("looping #{} {}", self.id, looping));
    }

    fn prepare_async(&mut self, callbacks: EngineCallbacks) -> Result<(), PlaybackError> {
        self.log.record(format!("prepare #{}", self.id));
        *self.log.callbacks.lock().unwrap() = Some(callbacks);
        Ok(())
    }

    fn start(&mut self) -> Result<(), PlaybackError> {
        if self.log.fail_start.load(Ordering::SeqCst) {
            return Err(PlaybackError::Start("refused".to_string()));
        }
        self.log.record(format!("start #{}", self.id));
        Ok(())
    }

    fn stop(&mut self) {
        self.log.record(format!("stop #{}", self.id));
    }

    fn release(&mut self) {
        assert!(!self.released, "engine #{} released twice", self.id);
        self.released = true;
        self.log.released.fetch_add(1, Ordering::SeqCst);
        self.log.record(format!("release #{}", self.id));
    }
}

/// Layout host that counts relayout requests
#[derive(Default)]
pub struct CountingHost {
    pub requests: AtomicUsize,
}

impl CountingHost {
    pub fn count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl LayoutHost for CountingHost {
    fn request_layout(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn source() -> VideoSource {
    VideoSource::new("/videos/loop.mp4")
}

pub fn target(name: &str) -> SurfaceTarget {
    SurfaceTarget::new(name)
}
