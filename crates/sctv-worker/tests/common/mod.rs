//! Scripted collaborators for worker and orchestrator tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sctv_media::{Detector, Frame, FrameSource, FrameSourceFactory, MediaError, MediaResult};
use sctv_models::{BoundingBox, DetectionEvent, RawDetection, StreamDescriptor};
use sctv_registry::{RegistryError, RegistryResult, StreamRegistry};
use sctv_worker::{EventDispatcher, EventSink, SinkError, WorkerConfig, WorkerContext};

pub const FRAME_SIZE: u32 = 64;

/// What the next `open` call produces.
#[derive(Debug, Clone, Copy)]
pub enum SourceScript {
    /// Yield this many frames, then report end of data
    Frames(usize),
    /// Fail to open
    FailOpen,
    /// Yield frames forever
    Endless,
}

/// Hands out sources following a script; once the script runs out every
/// source stalls on its first read.
#[derive(Default)]
pub struct ScriptedSources {
    scripts: Mutex<VecDeque<SourceScript>>,
    pub opens: AtomicUsize,
    pub closes: Arc<AtomicUsize>,
    /// Sources never finish closing
    hang_on_close: bool,
}

impl ScriptedSources {
    pub fn new(scripts: impl IntoIterator<Item = SourceScript>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into_iter().collect()),
            ..Default::default()
        })
    }

    pub fn hanging_on_close(scripts: impl IntoIterator<Item = SourceScript>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into_iter().collect()),
            hang_on_close: true,
            ..Default::default()
        })
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FrameSourceFactory for ScriptedSources {
    async fn open(&self, stream: &StreamDescriptor) -> MediaResult<Box<dyn FrameSource>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.lock().unwrap().pop_front();

        let remaining = match script {
            Some(SourceScript::Frames(n)) => Some(n),
            Some(SourceScript::Endless) => Some(usize::MAX),
            Some(SourceScript::FailOpen) => {
                return Err(MediaError::open_failed(stream.locator.to_string(), "scripted"))
            }
            None => None,
        };

        Ok(Box::new(ScriptedSource {
            remaining,
            closes: Arc::clone(&self.closes),
            hang_on_close: self.hang_on_close,
        }))
    }
}

struct ScriptedSource {
    /// `None` stalls forever
    remaining: Option<usize>,
    closes: Arc<AtomicUsize>,
    hang_on_close: bool,
}

#[async_trait]
impl FrameSource for ScriptedSource {
    async fn read(&mut self) -> MediaResult<Option<Frame>> {
        match self.remaining.as_mut() {
            None => std::future::pending().await,
            Some(0) => Ok(None),
            Some(n) => {
                *n -= 1;
                Ok(Some(Frame::blank(FRAME_SIZE, FRAME_SIZE)))
            }
        }
    }

    async fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.hang_on_close {
            std::future::pending::<()>().await;
        }
    }
}

/// Detector returning a fixed number of people, counting its calls.
#[derive(Default)]
pub struct CountingDetector {
    pub calls: AtomicUsize,
    pub persons: AtomicUsize,
    pub fail: AtomicBool,
}

impl CountingDetector {
    pub fn seeing(persons: usize) -> Arc<Self> {
        let detector = Self::default();
        detector.persons.store(persons, Ordering::SeqCst);
        Arc::new(detector)
    }

    pub fn failing() -> Arc<Self> {
        let detector = Self::default();
        detector.fail.store(true, Ordering::SeqCst);
        Arc::new(detector)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Detector for CountingDetector {
    async fn detect(&self, _frame: &Frame) -> MediaResult<Vec<RawDetection>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(MediaError::detection_failed("scripted failure"));
        }
        let persons = self.persons.load(Ordering::SeqCst);
        Ok((0..persons)
            .map(|i| {
                let offset = 4.0 + i as f64 * 8.0;
                RawDetection::from_bbox(
                    BoundingBox::new(offset, offset, offset + 40.0, offset + 40.0),
                    0.9,
                    Utc::now(),
                )
            })
            .collect())
    }
}

/// Registry whose answer tests can change between reconciles.
pub struct FakeRegistry {
    answer: Mutex<RegistryResult<Vec<StreamDescriptor>>>,
    pub fetches: AtomicUsize,
}

impl FakeRegistry {
    pub fn listing(streams: Vec<StreamDescriptor>) -> Arc<Self> {
        Arc::new(Self {
            answer: Mutex::new(Ok(streams)),
            fetches: AtomicUsize::new(0),
        })
    }

    pub fn set_streams(&self, streams: Vec<StreamDescriptor>) {
        *self.answer.lock().unwrap() = Ok(streams);
    }

    pub fn set_failing(&self, status: u16) {
        *self.answer.lock().unwrap() = Err(RegistryError::BadStatus(status));
    }
}

#[async_trait]
impl StreamRegistry for FakeRegistry {
    async fn active_streams(&self) -> RegistryResult<Vec<StreamDescriptor>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match &*self.answer.lock().unwrap() {
            Ok(streams) => Ok(streams.clone()),
            Err(RegistryError::BadStatus(status)) => Err(RegistryError::BadStatus(*status)),
            Err(e) => Err(RegistryError::InvalidUrl(e.to_string())),
        }
    }
}

/// Sink that keeps every delivered event.
#[derive(Default)]
pub struct CollectingSink {
    pub events: Mutex<Vec<DetectionEvent>>,
}

impl CollectingSink {
    pub fn events(&self) -> Vec<DetectionEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventSink for CollectingSink {
    async fn deliver(&self, event: &DetectionEvent) -> Result<(), SinkError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Config with test-friendly timings.
pub fn test_config() -> WorkerConfig {
    WorkerConfig {
        send_frame: false,
        read_failure_backoff: Duration::from_millis(100),
        worker_stop_timeout: Duration::from_secs(1),
        frame_width: FRAME_SIZE,
        frame_height: FRAME_SIZE,
        ..Default::default()
    }
}

pub fn context(
    config: WorkerConfig,
    sources: Arc<ScriptedSources>,
    detector: Arc<CountingDetector>,
    sink: Arc<CollectingSink>,
) -> WorkerContext {
    let (events, _task) = EventDispatcher::spawn(sink, 64);
    WorkerContext::new(config, sources, detector, events)
}

pub fn stream(id: &str) -> StreamDescriptor {
    StreamDescriptor::new(id, format!("Camera {}", id), format!("rtsp://{}/live", id))
}

/// Let spawned tasks run (time is paused in these tests).
pub async fn settle(duration: Duration) {
    tokio::time::sleep(duration).await;
}
