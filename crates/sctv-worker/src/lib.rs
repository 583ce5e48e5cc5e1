//! Stream orchestration and detection debouncing.
//!
//! This crate provides:
//! - Per-stream detection smoothing (consistency + cooldown)
//! - Stream workers with reconnect-on-failure and prompt cancellation
//! - Registry-driven reconciliation of running workers
//! - Non-blocking event delivery to pluggable sinks
//! - Graceful shutdown

pub mod config;
pub mod error;
pub mod failure_tracker;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod shutdown;
pub mod sink;
pub mod smoother;
pub mod stream_worker;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use logging::StreamLogger;
pub use orchestrator::{ReconcilePlan, ReconcileReport, StreamOrchestrator};
pub use shutdown::{ShutdownSignal, ShutdownTrigger};
pub use sink::{EventDispatcher, EventSink, FanoutSink, LogSink, SinkError, WebhookSink};
pub use smoother::{DetectionSmoother, SmootherConfig, SmootherState};
pub use stream_worker::{StreamWorker, WorkerContext, WorkerHandle, WorkerState};
