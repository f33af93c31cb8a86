//! RPC calls over HTTP
//!
//! A call is one GET to `/api/rpc/v2/{method}/{arg}/...` where each argument
//! segment is base64 of its JSON. The reply `{"success":..,"value":..}`
//! resolves to:
//!
//! | reply                              | result                  |
//! |------------------------------------|-------------------------|
//! | `success: true`, value present     | `Ok(Some(value))`       |
//! | `success: false` or null value     | `Ok(None)`              |
//! | body is not a valid reply          | `Err(Error::Decode(_))` |
//! | network error, non-2xx status      | `Ok(None)`              |
//!
//! Malformed replies are the only failure a caller sees; connectivity
//! problems are logged and treated as "no value".

use crate::http::HttpTransport;
use crate::metrics::{ClientMetrics, CHANNEL_RPC};
use sauce_core::{codec, diagnose, wire, Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Issues RPC calls through an [`HttpTransport`]
#[derive(Clone)]
pub struct RpcCaller {
    http: Arc<dyn HttpTransport>,
    metrics: Option<Arc<ClientMetrics>>,
}

impl RpcCaller {
    pub fn new(http: Arc<dyn HttpTransport>) -> Self {
        Self {
            http,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Option<Arc<ClientMetrics>>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Call `method` with `args` in order
    ///
    /// Argument serialization failures are returned as
    /// `Error::Serialization` before anything is sent.
    #[tracing::instrument(skip(self, args), fields(method = %method))]
    pub async fn call<T, A>(&self, method: &str, args: &[A]) -> Result<Option<T>>
    where
        T: DeserializeOwned,
        A: Serialize,
    {
        let start = Instant::now();
        let path = wire::build_call_url(method, args)?;

        let text = match self.http.get_text(&path).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "Call failed, no value");
                self.record(method, "transport_error", start);
                return Ok(None);
            }
        };

        match codec::decode_call_reply::<T>(&text) {
            Ok(value) => {
                tracing::info!(raw = %text, delivered = value.is_some(), "Call");
                let status = if value.is_some() { "delivered" } else { "empty" };
                self.record(method, status, start);
                Ok(value)
            }
            Err(Error::Decode(error)) => {
                diagnose(&error, &text, method).emit();
                if let Some(ref m) = self.metrics {
                    m.record_decode_error(CHANNEL_RPC);
                }
                self.record(method, "malformed", start);
                Err(Error::Decode(error))
            }
            Err(other) => Err(other),
        }
    }

    fn record(&self, method: &str, status: &'static str, start: Instant) {
        if let Some(ref m) = self.metrics {
            m.record_call(method, status, start.elapsed().as_secs_f64());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde::Deserialize;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    /// Replies with a canned body and remembers the requested paths
    struct CannedHttp {
        reply: Result<String>,
        paths: Mutex<Vec<String>>,
    }

    impl CannedHttp {
        fn new(reply: Result<String>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                paths: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl HttpTransport for CannedHttp {
        async fn get_text(&self, path: &str) -> Result<String> {
            self.paths.lock().unwrap().push(path.to_string());
            self.reply.clone()
        }
    }

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct Athlete {
        #[serde(deserialize_with = "sauce_core::lenient::number_or_string")]
        athlete_id: i64,
        name: String,
    }

    #[tokio::test]
    async fn test_call_returns_value() {
        let http = CannedHttp::new(Ok(
            r#"{"success":true,"value":{"athleteId":"1234","name":"Ada"}}"#.to_string(),
        ));
        let rpc = RpcCaller::new(http.clone());

        let athlete: Option<Athlete> = rpc.call("getAthlete", &[json!(1234)]).await.unwrap();

        assert_eq!(
            athlete,
            Some(Athlete {
                athlete_id: 1234,
                name: "Ada".to_string()
            })
        );
        assert_eq!(
            http.paths.lock().unwrap().as_slice(),
            ["/api/rpc/v2/getAthlete/MTIzNA=="]
        );
    }

    #[tokio::test]
    async fn test_unsuccessful_reply_is_no_value() {
        let http = CannedHttp::new(Ok(r#"{"success":false,"value":null}"#.to_string()));
        let rpc = RpcCaller::new(http);

        let value: Option<Value> = rpc.call::<Value, Value>("getVersion", &[]).await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_malformed_reply_is_error() {
        let http = CannedHttp::new(Ok(r#"{"success":true,"value":"#.to_string()));
        let rpc = RpcCaller::new(http);

        let result = rpc.call::<Value, Value>("getVersion", &[]).await;
        assert!(matches!(result, Err(Error::Decode(_))));
    }

    #[tokio::test]
    async fn test_wrong_value_shape_is_error() {
        let http = CannedHttp::new(Ok(r#"{"success":true,"value":{"name":7}}"#.to_string()));
        let rpc = RpcCaller::new(http);

        let result = rpc.call::<Athlete, Value>("getAthlete", &[json!(1)]).await;
        match result {
            Err(Error::Decode(error)) => assert!(error.position.is_some()),
            other => panic!("expected decode error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_transport_failure_is_no_value() {
        let http = CannedHttp::new(Err(Error::Http("connection refused".to_string())));
        let rpc = RpcCaller::new(http);

        let value = rpc
            .call::<Value, &str>("getVersion", &["x"])
            .await
            .unwrap();
        assert!(value.is_none());
    }
}
