//! Sauce - event stream and RPC client for the Sauce service
//!
//! This is the convenience crate that re-exports the Sauce sub-crates.
//! Use it when you want a single dependency for the whole client.
//!
//! # Architecture
//!
//! - **sauce-core**: wire frames, decoding, diagnostics, errors, observability
//! - **sauce-client**: event-stream sessions, RPC calls, reconnection
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use sauce::SauceClient;
//! use serde_json::Value;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = SauceClient::builder("http://localhost:1080").build()?;
//!
//!     let session = client
//!         .subscribe_to(client.nearby()?, |riders: Value| {
//!             println!("{} riders nearby", riders.as_array().map_or(0, Vec::len));
//!         })
//!         .await?;
//!
//!     let version: Option<String> = client.call::<_, Value>("getVersion", &[]).await?;
//!     println!("Service version: {:?}", version);
//!
//!     tokio::signal::ctrl_c().await?;
//!     session.stop().await;
//!     Ok(())
//! }
//! ```

pub use sauce_client as client;
pub use sauce_core as core;

pub use sauce_client::{ClientBuilder, SauceClient, Session};
pub use sauce_core::{Error, Result, Subscription};
