//! Client facade
//!
//! `SauceClient` ties the pieces together for one service instance: the
//! correlation ids every frame draws from, the connector that opens one
//! event-stream transport per session, and the RPC caller.
//!
//! # Cloning
//!
//! `SauceClient` is cheaply cloneable using `Arc` internally. Clones share
//! the correlation ids, so ids stay unique across all of them.
//!
//! ```rust,no_run
//! use sauce_client::SauceClient;
//! use serde_json::Value;
//!
//! # async fn example() -> sauce_core::Result<()> {
//! let client = SauceClient::builder("http://localhost:1080").build()?;
//!
//! let session = client
//!     .subscribe_to(client.nearby()?, |riders: Value| {
//!         println!("{} riders nearby", riders.as_array().map_or(0, |r| r.len()));
//!     })
//!     .await?;
//!
//! let version: Option<String> = client.call("getVersion", &[] as &[Value]).await?;
//!
//! client.unsubscribe_from(&session)?;
//! session.stop().await;
//! # Ok(())
//! # }
//! ```

use crate::catalog;
use crate::metrics::ClientMetrics;
use crate::rpc::RpcCaller;
use crate::session::Session;
use crate::transport::Connector;
use crate::ClientBuilder;
use sauce_core::{CorrelationIds, Result, Subscription};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use url::Url;

/// Client for one Sauce service
#[derive(Clone)]
pub struct SauceClient {
    pub(crate) base_url: Url,
    pub(crate) events_endpoint: Url,
    pub(crate) ids: Arc<CorrelationIds>,
    pub(crate) connector: Arc<dyn Connector>,
    pub(crate) rpc: RpcCaller,
    pub(crate) metrics: Option<Arc<ClientMetrics>>,
}

impl SauceClient {
    /// Start configuring a client for `base_url` (`http` or `https`)
    pub fn builder(base_url: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(base_url)
    }

    /// HTTP base address
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Event-stream endpoint derived from the base address
    pub fn events_endpoint(&self) -> &Url {
        &self.events_endpoint
    }

    pub fn correlation_ids(&self) -> &Arc<CorrelationIds> {
        &self.ids
    }

    /// Open a session for `subscription` on a new transport
    ///
    /// `handler` runs on the transport's task for each delivered event, one
    /// at a time; frames arriving while it runs are dropped.
    #[tracing::instrument(skip(self, subscription, handler), fields(topic = %subscription.topic()))]
    pub async fn subscribe_to<T, F>(&self, subscription: Subscription, handler: F) -> Result<Session>
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        let transport = self.connector.connect(&self.events_endpoint);
        Session::open(
            transport,
            subscription,
            handler,
            self.ids.clone(),
            self.metrics.clone(),
        )
        .await
    }

    /// Send the unsubscribe frame for `session`
    pub fn unsubscribe_from(&self, session: &Session) -> Result<()> {
        session.close()
    }

    /// Issue an RPC call; see [`RpcCaller::call`]
    pub async fn call<T, A>(&self, method: &str, args: &[A]) -> Result<Option<T>>
    where
        T: DeserializeOwned,
        A: Serialize,
    {
        self.rpc.call(method, args).await
    }

    pub fn watching(&self, persistent: bool) -> Result<Subscription> {
        catalog::watching(&self.ids, persistent)
    }

    pub fn groups(&self) -> Result<Subscription> {
        catalog::groups(&self.ids)
    }

    pub fn nearby(&self) -> Result<Subscription> {
        catalog::nearby(&self.ids)
    }

    pub fn chat(&self) -> Result<Subscription> {
        catalog::chat(&self.ids)
    }

    pub fn rideon(&self) -> Result<Subscription> {
        catalog::rideon(&self.ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_shortcuts_share_ids() {
        let client = SauceClient::builder("http://localhost:1080")
            .with_correlation_ids(Arc::new(CorrelationIds::starting_at(500)))
            .build()
            .unwrap();

        let groups = client.groups().unwrap();
        let chat = client.chat().unwrap();

        assert_eq!(groups.uid(), 501);
        assert_eq!(groups.sub_id(), 502);
        assert_eq!(chat.uid(), 503);
        assert!(chat.is_persistent());
        assert_eq!(client.correlation_ids().last_id(), 504);
    }

    #[test]
    fn test_clones_share_ids() {
        let client = SauceClient::builder("http://localhost:1080").build().unwrap();
        let clone = client.clone();

        let a = client.nearby().unwrap();
        let b = clone.nearby().unwrap();
        assert_ne!(a.uid(), b.uid());
    }

    #[test]
    fn test_endpoints() {
        let client = SauceClient::builder("https://sauce.example:8443").build().unwrap();

        assert_eq!(client.base_url().as_str(), "https://sauce.example:8443/");
        assert_eq!(
            client.events_endpoint().as_str(),
            "wss://sauce.example:8443/api/ws/events"
        );
    }
}
