//! Client builder
//!
//! The `ClientBuilder` collects everything a `SauceClient` needs before any
//! connection is made:
//! - the service base address (and from it the event-stream endpoint)
//! - event-stream settings: transport name, idle timeout, reconnection
//! - the HTTP client used for RPC calls
//! - observability (OpenTelemetry + structured logs)
//!
//! # Examples
//!
//! ```rust,no_run
//! use sauce_client::{ClientBuilder, ExponentialBackoff};
//! use std::time::Duration;
//!
//! # fn example() -> sauce_core::Result<()> {
//! // Defaults: 10 s fixed reconnect delay, 5 min idle timeout
//! let client = ClientBuilder::new("http://192.168.1.100:1080").build()?;
//!
//! // Backoff instead of a fixed delay, with telemetry
//! let client2 = ClientBuilder::from_env()
//!     .name("dashboard")
//!     .idle_timeout(Some(Duration::from_secs(60)))
//!     .with_reconnect(|| Box::new(ExponentialBackoff::default()))
//!     .with_default_observability()
//!     .service_name("ride-dashboard")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use crate::http::{HttpTransport, ReqwestTransport};
use crate::reconnect::{ExponentialBackoff, FixedDelay, NoReconnect, ReconnectionStrategy};
use crate::rpc::RpcCaller;
use crate::transport::Connector;
use crate::ws_transport::{StrategyFactory, WsConnector, DEFAULT_IDLE_TIMEOUT, DEFAULT_NAME};
use crate::SauceClient;
use sauce_core::{wire, CorrelationIds, Error, ObservabilityConfig, Result};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Environment variable holding the service base address
pub const BASE_URL_ENV: &str = "SAUCE_BASE_URL";

/// Base address used when `SAUCE_BASE_URL` is unset
pub const DEFAULT_BASE_URL: &str = "http://localhost:1080";

/// Builder for configuring and creating a [`SauceClient`]
pub struct ClientBuilder {
    base_url: String,
    name: String,
    idle_timeout: Option<Duration>,
    reconnect: StrategyFactory,
    http_client: Option<reqwest::Client>,
    connector: Option<Arc<dyn Connector>>,
    http_transport: Option<Arc<dyn HttpTransport>>,
    ids: Option<Arc<CorrelationIds>>,
    observability_config: Option<ObservabilityConfig>,
    service_name: Option<String>,
}

impl ClientBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            name: DEFAULT_NAME.to_string(),
            idle_timeout: Some(DEFAULT_IDLE_TIMEOUT),
            reconnect: Arc::new(|| -> Box<dyn ReconnectionStrategy> {
                Box::new(FixedDelay::default())
            }),
            http_client: None,
            connector: None,
            http_transport: None,
            ids: None,
            observability_config: None,
            service_name: None,
        }
    }

    /// Read the base address from `SAUCE_BASE_URL`
    pub fn from_env() -> Self {
        let base_url =
            std::env::var(BASE_URL_ENV).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::new(base_url)
    }

    /// Transport name used in log fields
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Reconnect when nothing arrives for this long; `None` disables it
    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Reconnect with strategies built by `factory`, one per transport
    pub fn with_reconnect<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn ReconnectionStrategy> + Send + Sync + 'static,
    {
        self.reconnect = Arc::new(factory);
        self
    }

    /// Reconnect with the default exponential backoff
    pub fn with_default_reconnect(self) -> Self {
        self.with_reconnect(|| Box::new(ExponentialBackoff::default()))
    }

    /// Give up as soon as a connection drops
    pub fn without_reconnect(self) -> Self {
        self.with_reconnect(|| Box::new(NoReconnect))
    }

    /// Use this reqwest client for RPC calls
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Open event-stream transports through `connector`
    ///
    /// Overrides `name`, `idle_timeout` and the reconnect settings.
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Issue RPC calls through `transport`; overrides `with_http_client`
    pub fn with_http_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.http_transport = Some(transport);
        self
    }

    /// Draw correlation ids from `ids` (shared with other clients)
    pub fn with_correlation_ids(mut self, ids: Arc<CorrelationIds>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Enable OpenTelemetry observability with custom configuration
    pub fn with_observability(mut self, config: ObservabilityConfig) -> Self {
        self.observability_config = Some(config);
        self
    }

    /// Enable OpenTelemetry observability with default configuration
    pub fn with_default_observability(mut self) -> Self {
        self.observability_config = Some(ObservabilityConfig::default());
        self
    }

    /// Set service name for observability (used if observability is enabled)
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// Validate the configuration and create the client
    ///
    /// Nothing connects here; transports start when a session opens.
    pub fn build(self) -> Result<SauceClient> {
        let base_url =
            Url::parse(&self.base_url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let events_endpoint = events_endpoint(&base_url)?;

        let metrics = if let Some(mut config) = self.observability_config {
            if let Some(name) = self.service_name {
                config.service_name = name;
            }

            sauce_core::init_observability(config.clone())?;

            Some(Arc::new(crate::ClientMetrics::new(&config.service_name)))
        } else {
            None
        };

        let connector: Arc<dyn Connector> = match self.connector {
            Some(connector) => connector,
            None => Arc::new(
                WsConnector::new()
                    .with_name(self.name)
                    .with_idle_timeout(self.idle_timeout)
                    .with_strategy(self.reconnect),
            ),
        };

        let http: Arc<dyn HttpTransport> = match (self.http_transport, self.http_client) {
            (Some(transport), _) => transport,
            (None, Some(client)) => {
                Arc::new(ReqwestTransport::with_client(client, base_url.clone()))
            }
            (None, None) => Arc::new(ReqwestTransport::new(base_url.clone())?),
        };

        tracing::info!(
            base_url = %base_url,
            events_endpoint = %events_endpoint,
            "Client configured"
        );

        Ok(SauceClient {
            base_url,
            events_endpoint,
            ids: self.ids.unwrap_or_else(|| Arc::new(CorrelationIds::new())),
            connector,
            rpc: RpcCaller::new(http).with_metrics(metrics.clone()),
            metrics,
        })
    }
}

/// `http://host:port/..` → `ws://host:port/api/ws/events` (`https` → `wss`)
pub fn events_endpoint(base_url: &Url) -> Result<Url> {
    let scheme = match base_url.scheme() {
        "http" => "ws",
        "https" => "wss",
        other => {
            return Err(Error::InvalidUrl(format!(
                "Unsupported scheme '{}', expected http or https",
                other
            )))
        }
    };

    let mut endpoint = base_url.clone();
    endpoint
        .set_scheme(scheme)
        .map_err(|_| Error::InvalidUrl(format!("Cannot use scheme '{}'", scheme)))?;
    endpoint.set_path(wire::EVENTS_PATH);
    endpoint.set_query(None);
    endpoint.set_fragment(None);
    Ok(endpoint)
}
