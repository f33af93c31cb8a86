//! OpenTelemetry and structured logging bootstrap
//!
//! Everything in sauce logs through `tracing`. Applications that want the
//! output exported call [`init_observability`] once at startup. It installs
//! OTLP (gRPC) span and metric exporters pointed at the configured collector,
//! plus a JSON `tracing-subscriber` layer filtered by `RUST_LOG`.
//!
//! ```rust,no_run
//! use sauce_core::ObservabilityConfig;
//!
//! #[tokio::main]
//! async fn main() -> sauce_core::Result<()> {
//!     let config = ObservabilityConfig::new("ride-dashboard")
//!         .with_endpoint("http://collector.local:4317")
//!         .with_log_level("sauce_client=debug,info");
//!
//!     sauce_core::init_observability(config)?;
//!
//!     // ... subscribe, call ...
//!
//!     sauce_core::shutdown_observability();
//!     Ok(())
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: default collector endpoint
//! - `RUST_LOG`: log filter directives

use crate::error::{Error, Result};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::{MetricExporter, SpanExporter, WithExportConfig};
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::trace::{SdkTracerProvider, Tracer};
use opentelemetry_sdk::Resource;
use std::sync::Mutex;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_ENDPOINT: &str = "http://localhost:4317";

/// Observability configuration
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Service name attached to all telemetry
    pub service_name: String,
    /// gRPC endpoint of the OpenTelemetry collector
    pub otlp_endpoint: String,
    /// Export spans and metrics; when false only local logs are written
    pub export: bool,
    /// How often metrics are pushed to the collector
    pub metrics_interval: Duration,
    /// Per-request timeout of both exporters
    pub export_timeout: Duration,
    /// `EnvFilter` directives used when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "sauce".to_string(),
            otlp_endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string()),
            export: true,
            metrics_interval: Duration::from_secs(30),
            export_timeout: Duration::from_secs(10),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        }
    }
}

impl ObservabilityConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// Set the OTLP collector endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = endpoint.into();
        self
    }

    /// Set the log filter
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn with_metrics_interval(mut self, interval: Duration) -> Self {
        self.metrics_interval = interval;
        self
    }

    /// Write logs locally without contacting a collector
    pub fn logs_only(mut self) -> Self {
        self.export = false;
        self
    }

    fn resource(&self) -> Resource {
        Resource::builder()
            .with_service_name(self.service_name.clone())
            .with_attribute(KeyValue::new(
                opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
                env!("CARGO_PKG_VERSION"),
            ))
            .build()
    }
}

/// Providers installed by `init_observability`, kept for shutdown
struct Installed {
    tracer: Option<SdkTracerProvider>,
    meter: Option<SdkMeterProvider>,
}

static INSTALLED: Mutex<Installed> = Mutex::new(Installed {
    tracer: None,
    meter: None,
});

/// Install exporters and logging according to `config`
///
/// Call once per process. The global subscriber can only be installed
/// once, so a second call fails with `Error::Internal`.
pub fn init_observability(config: ObservabilityConfig) -> Result<()> {
    let (tracer, meter) = if config.export {
        let tracer_provider = SdkTracerProvider::builder()
            .with_batch_exporter(span_exporter(&config)?)
            .with_resource(config.resource())
            .build();
        let reader = PeriodicReader::builder(metric_exporter(&config)?)
            .with_interval(config.metrics_interval)
            .build();
        let meter_provider = SdkMeterProvider::builder()
            .with_reader(reader)
            .with_resource(config.resource())
            .build();
        (Some(tracer_provider), Some(meter_provider))
    } else {
        (None, None)
    };

    let otel_tracer = tracer
        .as_ref()
        .map(|provider| provider.tracer(config.service_name.clone()));
    install_subscriber(&config, otel_tracer)?;

    if let Some(ref provider) = tracer {
        global::set_tracer_provider(provider.clone());
    }
    if let Some(ref provider) = meter {
        global::set_meter_provider(provider.clone());
    }

    let mut installed = INSTALLED.lock().unwrap_or_else(|p| p.into_inner());
    installed.tracer = tracer;
    installed.meter = meter;

    tracing::info!(
        service_name = %config.service_name,
        otlp_endpoint = %config.otlp_endpoint,
        export = config.export,
        "Observability initialized"
    );
    Ok(())
}

fn span_exporter(config: &ObservabilityConfig) -> Result<SpanExporter> {
    SpanExporter::builder()
        .with_tonic()
        .with_endpoint(config.otlp_endpoint.clone())
        .with_timeout(config.export_timeout)
        .build()
        .map_err(|e| Error::Internal(format!("Span exporter for {}: {}", config.otlp_endpoint, e)))
}

fn metric_exporter(config: &ObservabilityConfig) -> Result<MetricExporter> {
    MetricExporter::builder()
        .with_tonic()
        .with_endpoint(config.otlp_endpoint.clone())
        .with_timeout(config.export_timeout)
        .build()
        .map_err(|e| {
            Error::Internal(format!("Metric exporter for {}: {}", config.otlp_endpoint, e))
        })
}

fn install_subscriber(config: &ObservabilityConfig, tracer: Option<Tracer>) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| Error::Internal(format!("Invalid log filter: {}", e)))?;

    let telemetry = tracer.map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer));
    let json = tracing_subscriber::fmt::layer()
        .json()
        .with_target(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(telemetry)
        .with(json)
        .try_init()
        .map_err(|e| Error::Internal(format!("Subscriber already installed: {}", e)))
}

/// Flush and shut down the exporters installed by [`init_observability`]
///
/// Safe to call more than once, or without a prior init.
pub fn shutdown_observability() {
    let (tracer, meter) = {
        let mut installed = INSTALLED.lock().unwrap_or_else(|p| p.into_inner());
        (installed.tracer.take(), installed.meter.take())
    };

    if let Some(provider) = tracer {
        if let Err(e) = provider.shutdown() {
            tracing::warn!(error = %e, "Tracer provider shutdown failed");
        }
    }
    if let Some(provider) = meter {
        if let Err(e) = provider.shutdown() {
            tracing::warn!(error = %e, "Meter provider shutdown failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ObservabilityConfig::default();
        assert_eq!(config.service_name, "sauce");
        assert!(config.export);
        assert_eq!(config.metrics_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_custom_config() {
        let config = ObservabilityConfig::new("ride-dashboard")
            .with_endpoint("http://custom:4317")
            .with_log_level("debug")
            .with_metrics_interval(Duration::from_secs(5));

        assert_eq!(config.service_name, "ride-dashboard");
        assert_eq!(config.otlp_endpoint, "http://custom:4317");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.metrics_interval, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_exporters_use_configured_endpoint() {
        let good = ObservabilityConfig::new("sauce-test").with_endpoint("http://127.0.0.1:4999");
        assert!(span_exporter(&good).is_ok());
        assert!(metric_exporter(&good).is_ok());

        // An endpoint that is not a URI only fails if it reaches the builder
        let bad = ObservabilityConfig::new("sauce-test").with_endpoint("not a uri");
        let error = span_exporter(&bad).unwrap_err();
        assert!(error.to_string().contains("not a uri"));
        assert!(metric_exporter(&bad).is_err());
    }

    #[test]
    fn test_logs_only_installs_subscriber() {
        let config = ObservabilityConfig::new("sauce-logs").logs_only();

        // No collector is contacted; a second init is rejected
        assert!(init_observability(config.clone()).is_ok());
        assert!(matches!(init_observability(config), Err(Error::Internal(_))));

        shutdown_observability();
    }

    #[test]
    fn test_shutdown_idempotent() {
        shutdown_observability();
        shutdown_observability();
    }
}
