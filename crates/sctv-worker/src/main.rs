//! Stream detection worker binary.

use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sctv_media::FfmpegSourceFactory;
use sctv_ml_client::HttpDetector;
use sctv_registry::RegistryClient;
use sctv_worker::{
    metrics, EventDispatcher, EventSink, FanoutSink, LogSink, StreamOrchestrator, WebhookSink,
    WorkerConfig, WorkerContext, WorkerResult,
};

/// Upper bound on draining queued events at exit.
const EVENT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    let _ = rustls::crypto::ring::default_provider().install_default();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = WorkerConfig::from_env();
    init_tracing(&config);

    info!("Starting sctv-worker");
    info!("Worker config: {:?}", config);

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    if let Some(addr) = config.metrics_addr {
        match metrics::init_metrics(addr) {
            Ok(()) => info!("Prometheus metrics listening on {}", addr),
            Err(e) => warn!("Metrics disabled: {}", e),
        }
    }

    let components = match Components::build(&config) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to initialise worker: {}", e);
            std::process::exit(1);
        }
    };

    let (events, dispatcher_task) =
        EventDispatcher::spawn(components.sink, config.event_queue_capacity);

    let ctx = WorkerContext::new(config, components.sources, components.detector, events);
    let orchestrator = Arc::new(StreamOrchestrator::new(components.registry, ctx));

    let runner = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.run().await })
    };

    wait_for_signal().await;
    info!("Received shutdown signal");

    orchestrator.shutdown().await;
    runner.await.ok();

    // Dropping the last dispatcher closes the queue
    drop(orchestrator);
    if tokio::time::timeout(EVENT_DRAIN_TIMEOUT, dispatcher_task)
        .await
        .is_err()
    {
        warn!("Timed out draining pending events");
    }

    info!("Worker stopped");
}

/// External collaborators built from configuration.
struct Components {
    sources: Arc<FfmpegSourceFactory>,
    detector: Arc<HttpDetector>,
    registry: Arc<RegistryClient>,
    sink: FanoutSink,
}

impl Components {
    fn build(config: &WorkerConfig) -> WorkerResult<Self> {
        let sources = Arc::new(FfmpegSourceFactory::new(config.source_config())?);
        let detector = Arc::new(HttpDetector::new(config.ml_client_config())?);
        let registry = Arc::new(RegistryClient::new(config.registry_config())?);

        let mut sinks: Vec<Box<dyn EventSink>> = vec![Box::new(LogSink)];
        if let Some(url) = &config.event_webhook_url {
            sinks.push(Box::new(WebhookSink::new(
                url.clone(),
                config.event_webhook_timeout,
            )?));
            info!("Forwarding events to {}", url);
        }

        Ok(Self {
            sources,
            detector,
            registry,
            sink: FanoutSink::new(sinks),
        })
    }
}

fn init_tracing(config: &WorkerConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level))
        .add_directive("hyper=warn".parse().unwrap())
        .add_directive("reqwest=warn".parse().unwrap());

    let file_layer = config.log_file.as_deref().and_then(|path| {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(build_file_layer(file)),
            Err(e) => {
                eprintln!("Cannot open log file {}: {}", path, e);
                None
            }
        }
    });

    if config.log_json {
        tracing_subscriber::registry()
            .with(file_layer)
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(file_layer)
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

fn build_file_layer<S>(file: std::fs::File) -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(Mutex::new(file))
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok();
    }
}
