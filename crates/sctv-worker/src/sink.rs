//! Event delivery.
//!
//! Workers never wait on a sink. Approved events go through an
//! [`EventDispatcher`], a bounded queue drained by a single background task
//! that hands each event to the configured [`EventSink`]. When the queue is
//! full the event is dropped and counted.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use sctv_models::DetectionEvent;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::metrics;

/// Sink delivery errors.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Sink rejected event with status {0}")]
    Rejected(u16),

    #[error("Sink error: {0}")]
    Other(String),
}

/// Receiver of approved detection events.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn deliver(&self, event: &DetectionEvent) -> Result<(), SinkError>;
}

#[async_trait]
impl<S: EventSink + ?Sized> EventSink for Arc<S> {
    async fn deliver(&self, event: &DetectionEvent) -> Result<(), SinkError> {
        (**self).deliver(event).await
    }
}

/// Writes a human-readable summary of each event to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl EventSink for LogSink {
    async fn deliver(&self, event: &DetectionEvent) -> Result<(), SinkError> {
        info!(
            event_id = %event.event_id,
            "DETECTION EVENT - Camera: {} ({}), Persons: {}, Time: {}",
            event.stream_name,
            event.stream_id,
            event.detection_count,
            event.timestamp.to_rfc3339()
        );
        for (i, detection) in event.detections.iter().enumerate() {
            let b = &detection.bbox;
            info!(
                "  Person {}: Confidence={:.2}, BBox=[{:.0}, {:.0}, {:.0}, {:.0}]",
                i + 1,
                detection.confidence,
                b.x1,
                b.y1,
                b.x2,
                b.y2
            );
        }
        Ok(())
    }
}

/// POSTs each event as JSON to an HTTP endpoint.
pub struct WebhookSink {
    http: Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, SinkError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

#[async_trait]
impl EventSink for WebhookSink {
    async fn deliver(&self, event: &DetectionEvent) -> Result<(), SinkError> {
        let response = self.http.post(&self.url).json(event).send().await?;
        if !response.status().is_success() {
            return Err(SinkError::Rejected(response.status().as_u16()));
        }
        debug!("Delivered event {} to webhook", event.event_id);
        Ok(())
    }
}

/// Delivers to every inner sink; a failing sink does not stop the others.
pub struct FanoutSink {
    sinks: Vec<Box<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Box<dyn EventSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl EventSink for FanoutSink {
    /// Returns the first error encountered, after trying all sinks.
    async fn deliver(&self, event: &DetectionEvent) -> Result<(), SinkError> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.deliver(event).await {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Non-blocking handle workers use to emit events.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    tx: mpsc::Sender<DetectionEvent>,
}

impl EventDispatcher {
    /// Start the delivery task.
    ///
    /// The task ends once every dispatcher clone is dropped and the queue
    /// has drained.
    pub fn spawn<S>(sink: S, capacity: usize) -> (Self, JoinHandle<()>)
    where
        S: EventSink + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<DetectionEvent>(capacity.max(1));

        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Err(e) = sink.deliver(&event).await {
                    metrics::record_sink_failure();
                    warn!(
                        "Failed to deliver event {} for stream {}: {}",
                        event.event_id, event.stream_id, e
                    );
                }
            }
            debug!("Event dispatcher drained");
        });

        (Self { tx }, handle)
    }

    /// Queue an event without waiting.
    ///
    /// Returns `false` if the event was dropped.
    pub fn dispatch(&self, event: DetectionEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(event)) => {
                metrics::record_event_dropped();
                warn!(
                    "Event queue full, dropping event {} for stream {}",
                    event.event_id, event.stream_id
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                metrics::record_event_dropped();
                warn!(
                    "Event dispatcher closed, dropping event {} for stream {}",
                    event.event_id, event.stream_id
                );
                false
            }
        }
    }
}
