//! Common test utilities for sauce-client integration tests
//!
//! Provides a mock event-stream server (tokio-tungstenite) and a mock RPC
//! server (warp) so sessions and calls can be tested end to end.

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use warp::Filter;

/// What the server should do on every open connection
#[derive(Debug, Clone)]
enum ServerAction {
    Frame(String),
    Close,
}

/// Mock event-stream server
///
/// Records every text frame clients send and pushes scripted frames to all
/// open connections. Accepts any path.
pub struct MockWsServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    message_rx: mpsc::Receiver<String>,
    action_tx: broadcast::Sender<ServerAction>,
    connections: Arc<AtomicUsize>,
}

impl MockWsServer {
    pub async fn new() -> Self {
        Self::new_at("127.0.0.1:0".parse().unwrap()).await
    }

    /// Server listening on `addr`, e.g. a port a client is already retrying
    pub async fn new_at(addr: SocketAddr) -> Self {
        let listener = TcpListener::bind(addr).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let (msg_tx, msg_rx) = mpsc::channel::<String>(100);
        let (action_tx, _) = broadcast::channel::<ServerAction>(100);
        let connections = Arc::new(AtomicUsize::new(0));

        let actions = action_tx.clone();
        let accepted = connections.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    accept_result = listener.accept() => {
                        let Ok((stream, _)) = accept_result else { continue };
                        let msg_tx = msg_tx.clone();
                        let mut action_rx = actions.subscribe();
                        accepted.fetch_add(1, Ordering::SeqCst);

                        tokio::spawn(async move {
                            let Ok(ws_stream) = accept_async(stream).await else { return };
                            let (mut write, mut read) = ws_stream.split();

                            loop {
                                tokio::select! {
                                    incoming = read.next() => match incoming {
                                        Some(Ok(Message::Text(text))) => {
                                            let _ = msg_tx.send(text).await;
                                        }
                                        Some(Ok(_)) => {}
                                        Some(Err(_)) | None => break,
                                    },
                                    action = action_rx.recv() => match action {
                                        Ok(ServerAction::Frame(text)) => {
                                            let _ = write.send(Message::Text(text)).await;
                                        }
                                        Ok(ServerAction::Close) | Err(_) => {
                                            let _ = write.send(Message::Close(None)).await;
                                            break;
                                        }
                                    },
                                }
                            }
                        });
                    }
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            message_rx: msg_rx,
            action_tx,
            connections,
        }
    }

    /// HTTP base address whose derived event endpoint points here
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Number of connections accepted so far
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Send `frame` to every open connection
    pub fn push(&self, frame: impl Into<String>) {
        let _ = self.action_tx.send(ServerAction::Frame(frame.into()));
    }

    /// Send a close frame on every open connection
    pub fn close_connections(&self) {
        let _ = self.action_tx.send(ServerAction::Close);
    }

    /// Next frame received from any client, or `None` after 5 seconds
    pub async fn wait_for_message(&mut self) -> Option<String> {
        tokio::time::timeout(Duration::from_secs(5), self.message_rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// Next frame parsed as JSON
    pub async fn wait_for_json(&mut self) -> Option<Value> {
        let text = self.wait_for_message().await?;
        serde_json::from_str(&text).ok()
    }

    /// True if nothing arrives within `window`
    pub async fn stays_quiet(&mut self, window: Duration) -> bool {
        tokio::time::timeout(window, self.message_rx.recv())
            .await
            .is_err()
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

/// Mock RPC server answering every GET through `reply(path)`
pub struct MockHttpServer {
    addr: SocketAddr,
    paths: Arc<Mutex<Vec<String>>>,
}

impl MockHttpServer {
    pub async fn new<F>(reply: F) -> Self
    where
        F: Fn(&str) -> (u16, String) + Clone + Send + Sync + 'static,
    {
        let paths = Arc::new(Mutex::new(Vec::new()));
        let recorded = paths.clone();

        let route = warp::get()
            .and(warp::path::full())
            .map(move |path: warp::path::FullPath| {
                recorded.lock().unwrap().push(path.as_str().to_string());
                let (status, body) = reply(path.as_str());
                let status = warp::http::StatusCode::from_u16(status).unwrap();
                warp::reply::with_status(body, status)
            });

        let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);

        Self { addr, paths }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Paths requested so far, in order
    pub fn paths(&self) -> Vec<String> {
        self.paths.lock().unwrap().clone()
    }
}

/// An event frame carrying `data`
pub fn event_frame(uid: i64, data: Value) -> String {
    serde_json::json!({
        "type": "event",
        "success": true,
        "uid": uid,
        "data": data
    })
    .to_string()
}

/// A reply to a request made over the event stream
pub fn response_frame(uid: i64) -> String {
    serde_json::json!({
        "type": "response",
        "success": true,
        "uid": uid,
        "data": { "subscribed": true }
    })
    .to_string()
}

/// A free local port with nothing listening on it
pub fn refused_base_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_server_creation() {
        let server = MockWsServer::new().await;
        assert!(server.base_url().starts_with("http://127.0.0.1:"));
        assert_eq!(server.connection_count(), 0);
        server.shutdown().await;
    }

    #[test]
    fn test_frame_helpers() {
        let event: Value = serde_json::from_str(&event_frame(3, serde_json::json!([1]))).unwrap();
        assert_eq!(event["type"], "event");
        assert_eq!(event["data"][0], 1);

        let response: Value = serde_json::from_str(&response_frame(4)).unwrap();
        assert_eq!(response["type"], "response");
    }
}
