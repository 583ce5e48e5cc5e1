//! Per-stream worker.
//!
//! A worker runs one stream end to end: it opens the frame source, pumps
//! frames at a capped rate, runs the detector on every Nth frame, feeds the
//! count to its smoother and dispatches an event when the smoother
//! approves. Read and open failures move it to `Reconnecting`, where it
//! backs off and reopens the source without resetting the frame counter or
//! the smoother.
//!
//! Every wait (open, read, detect, backoff, pacing) races the worker's
//! shutdown signal, so cancellation is observed promptly. Once cancelled,
//! no further detector or sink calls are made.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, warn, Instrument};

use sctv_media::{annotate_frame, encode_jpeg_base64, Detector, Frame, FrameSource, FrameSourceFactory};
use sctv_models::{DetectionEvent, DetectionSample, RawDetection, StreamDescriptor, StreamId};

use crate::config::WorkerConfig;
use crate::failure_tracker::FailureTracker;
use crate::logging::StreamLogger;
use crate::metrics;
use crate::shutdown::{ShutdownSignal, ShutdownTrigger};
use crate::sink::EventDispatcher;
use crate::smoother::DetectionSmoother;

/// Frames between two throughput log lines.
const FPS_LOG_EVERY: u64 = 30;

/// Consecutive source failures logged before suppression.
const MAX_LOGGED_SOURCE_FAILURES: u32 = 5;

/// Worker lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Starting,
    Running,
    Reconnecting,
    Stopped,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Starting => "starting",
            WorkerState::Running => "running",
            WorkerState::Reconnecting => "reconnecting",
            WorkerState::Stopped => "stopped",
        }
    }

    /// Whether the worker still holds or is acquiring its source.
    pub fn is_active(&self) -> bool {
        matches!(self, WorkerState::Running | WorkerState::Reconnecting)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Collaborators shared by all workers.
#[derive(Clone)]
pub struct WorkerContext {
    pub config: Arc<WorkerConfig>,
    pub sources: Arc<dyn FrameSourceFactory>,
    pub detector: Arc<dyn Detector>,
    pub events: EventDispatcher,
}

impl WorkerContext {
    pub fn new(
        config: WorkerConfig,
        sources: Arc<dyn FrameSourceFactory>,
        detector: Arc<dyn Detector>,
        events: EventDispatcher,
    ) -> Self {
        Self {
            config: Arc::new(config),
            sources,
            detector,
            events,
        }
    }
}

/// Runs one stream until cancelled.
pub struct StreamWorker {
    stream: StreamDescriptor,
    ctx: WorkerContext,
    smoother: DetectionSmoother,
    shutdown: ShutdownSignal,
    state: watch::Sender<WorkerState>,
    logger: StreamLogger,
    frame_count: u64,
    source_failures: FailureTracker,
    fps_window_start: Instant,
}

impl StreamWorker {
    pub fn new(
        stream: StreamDescriptor,
        ctx: WorkerContext,
        shutdown: ShutdownSignal,
        state: watch::Sender<WorkerState>,
    ) -> Self {
        let smoother = DetectionSmoother::new(ctx.config.smoother_config());
        let logger = StreamLogger::new(&stream);

        Self {
            stream,
            ctx,
            smoother,
            shutdown,
            state,
            logger,
            frame_count: 0,
            source_failures: FailureTracker::new(MAX_LOGGED_SOURCE_FAILURES),
            fps_window_start: Instant::now(),
        }
    }

    /// Run until the shutdown signal fires.
    pub async fn run(mut self) {
        self.logger
            .log_start(&format!("source {}", self.stream.locator));

        let frame_interval = self.ctx.config.target_frame_interval();
        let every_n = self.ctx.config.process_every_n_frames.max(1);
        let mut source: Option<Box<dyn FrameSource>> = None;

        while !self.shutdown.is_triggered() {
            if source.is_none() {
                match self.open_source().await {
                    Some(opened) => source = Some(opened),
                    None => {
                        if !self.backoff().await {
                            break;
                        }
                        continue;
                    }
                }
            }
            let Some(active) = source.as_mut() else {
                continue;
            };

            let started = Instant::now();
            let read = tokio::select! {
                biased;
                _ = self.shutdown.triggered() => break,
                read = active.read() => read,
            };

            let failure = match read {
                Ok(Some(frame)) => {
                    self.frame_count += 1;
                    metrics::record_frame_read(self.stream.id.as_str());
                    self.log_throughput();

                    if self.frame_count % every_n == 0 && !self.analyze(&frame).await {
                        break;
                    }
                    if !self.pace(frame_interval, started.elapsed()).await {
                        break;
                    }
                    continue;
                }
                Ok(None) => "source returned no data".to_string(),
                Err(e) => e.to_string(),
            };

            // Frame counter and smoother survive the reopen
            self.handle_read_failure(&failure);
            let resumed = self.backoff().await;
            if let Some(mut failed) = source.take() {
                failed.close().await;
            }
            if !resumed {
                break;
            }
        }

        if let Some(mut active) = source.take() {
            active.close().await;
        }
        self.set_state(WorkerState::Stopped);
        self.logger
            .log_stopped(&format!("after {} frames", self.frame_count));
    }

    /// Open the source, racing shutdown. `None` on failure or cancellation.
    async fn open_source(&mut self) -> Option<Box<dyn FrameSource>> {
        let opened = tokio::select! {
            biased;
            _ = self.shutdown.triggered() => return None,
            opened = self.ctx.sources.open(&self.stream) => opened,
        };

        match opened {
            Ok(source) => {
                self.source_failures.record_success("Frame source");
                self.set_state(WorkerState::Running);
                Some(source)
            }
            Err(e) => {
                self.set_state(WorkerState::Reconnecting);
                metrics::record_reconnect(self.stream.id.as_str());
                if self.source_failures.record_failure() {
                    self.logger
                        .log_warning(&format!("failed to open source: {}", e));
                }
                None
            }
        }
    }

    fn handle_read_failure(&mut self, reason: &str) {
        self.set_state(WorkerState::Reconnecting);
        metrics::record_reconnect(self.stream.id.as_str());
        if self.source_failures.record_failure() {
            self.logger.log_warning(&format!(
                "frame read failed at frame {}: {}, reconnecting",
                self.frame_count, reason
            ));
        }
    }

    /// Wait before reopening. Returns `false` if cancelled.
    async fn backoff(&mut self) -> bool {
        let delay = self.ctx.config.read_failure_backoff;
        self.shutdown.sleep(delay).await
    }

    /// Cap the pump rate. Returns `false` if cancelled.
    async fn pace(&mut self, frame_interval: Duration, elapsed: Duration) -> bool {
        match frame_interval.checked_sub(elapsed) {
            Some(remaining) if !remaining.is_zero() => self.shutdown.sleep(remaining).await,
            _ => {
                // Over budget; still give other streams a turn
                tokio::task::yield_now().await;
                !self.shutdown.is_triggered()
            }
        }
    }

    /// Detect, smooth and possibly emit. Returns `false` if cancelled.
    async fn analyze(&mut self, frame: &Frame) -> bool {
        let started = Instant::now();
        let detected = tokio::select! {
            biased;
            _ = self.shutdown.triggered() => return false,
            detected = self.ctx.detector.detect(frame) => detected,
        };

        let detections = match detected {
            Ok(detections) => {
                metrics::record_detection(self.stream.id.as_str(), started.elapsed().as_secs_f64());
                detections
            }
            Err(e) => {
                metrics::record_detection_failure(self.stream.id.as_str());
                self.logger.log_warning(&format!(
                    "detection failed at frame {}: {}",
                    self.frame_count, e
                ));
                Vec::new()
            }
        };

        let sample = DetectionSample::new(self.stream.id.clone(), detections.len(), Utc::now());
        debug!(
            frame = self.frame_count,
            detections = sample.count,
            "Analyzed frame"
        );

        if !self.smoother.evaluate_sample(&sample, Instant::now()) {
            return true;
        }
        if self.shutdown.is_triggered() {
            return false;
        }

        let event = self.build_event(frame, detections, &sample);
        metrics::record_event_emitted(self.stream.id.as_str());
        self.ctx.events.dispatch(event);
        true
    }

    fn build_event(
        &self,
        frame: &Frame,
        detections: Vec<RawDetection>,
        sample: &DetectionSample,
    ) -> DetectionEvent {
        let payload = if self.ctx.config.send_frame && !detections.is_empty() {
            match annotate_frame(frame, &detections)
                .and_then(|image| encode_jpeg_base64(&image, self.ctx.config.jpeg_quality))
            {
                Ok(encoded) => Some(encoded),
                Err(e) => {
                    self.logger
                        .log_warning(&format!("failed to encode event frame: {}", e));
                    None
                }
            }
        } else {
            None
        };

        let event = DetectionEvent::new(
            self.stream.id.clone(),
            self.stream.name.clone(),
            detections,
            sample.timestamp,
        );
        match payload {
            Some(encoded) => event.with_frame(encoded),
            None => event,
        }
    }

    fn log_throughput(&mut self) {
        if self.frame_count % FPS_LOG_EVERY != 0 {
            return;
        }
        let now = Instant::now();
        let elapsed = now.duration_since(self.fps_window_start).as_secs_f64();
        if elapsed > 0.0 {
            debug!(
                frame = self.frame_count,
                "Effective FPS: {:.1}",
                FPS_LOG_EVERY as f64 / elapsed
            );
        }
        self.fps_window_start = now;
    }

    fn set_state(&self, next: WorkerState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            self.logger.log_state(&format!("{} -> {}", previous, next));
        }
    }
}

/// Orchestrator-side handle to a spawned worker.
pub struct WorkerHandle {
    stream: StreamDescriptor,
    trigger: ShutdownTrigger,
    state: watch::Receiver<WorkerState>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    /// Spawn a worker for `stream` on the current runtime.
    pub fn spawn(stream: StreamDescriptor, ctx: WorkerContext) -> Self {
        let (trigger, signal) = ShutdownTrigger::new();
        let (state_tx, state_rx) = watch::channel(WorkerState::Starting);

        let worker = StreamWorker::new(stream.clone(), ctx, signal, state_tx);
        let span = worker.logger.create_span();
        let task = tokio::spawn(worker.run().instrument(span));

        Self {
            stream,
            trigger,
            state: state_rx,
            task,
        }
    }

    pub fn id(&self) -> &StreamId {
        &self.stream.id
    }

    pub fn stream(&self) -> &StreamDescriptor {
        &self.stream
    }

    /// Last published state. A finished task always reads as `Stopped`.
    pub fn state(&self) -> WorkerState {
        if self.task.is_finished() {
            WorkerState::Stopped
        } else {
            *self.state.borrow()
        }
    }

    /// Receiver for state changes.
    pub fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.state.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal the worker to stop without waiting.
    pub fn cancel(&self) {
        self.trigger.trigger();
    }

    /// Cancel and wait up to `timeout` for the worker to exit.
    ///
    /// Returns `false` if it did not exit in time; the task is then aborted.
    pub async fn stop(mut self, timeout: Duration) -> bool {
        self.cancel();

        match tokio::time::timeout(timeout, &mut self.task).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                error!("Worker for stream {} ended abnormally: {}", self.stream.id, e);
                true
            }
            Err(_) => {
                warn!(
                    "Worker for stream {} did not stop within {:?}, aborting",
                    self.stream.id, timeout
                );
                self.task.abort();
                false
            }
        }
    }
}

impl fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("stream", &self.stream.id)
            .field("state", &self.state())
            .finish()
    }
}
