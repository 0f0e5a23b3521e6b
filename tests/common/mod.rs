//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::Instant;

use pando_provider::config::DaemonConfig;
use pando_provider::lifecycle::{CloseError, Closeable, ResourceKind, Terminator};
use pando_provider::net::identity;

/// Start a mock HTTP backend on an ephemeral port.
///
/// `f` produces the (status, body) for each request. Returns the bound address.
pub async fn start_programmable_backend<F>(f: F) -> SocketAddr
where
    F: Fn() -> (u16, String) + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut buf = [0u8; 4096];
                        let _ = socket.read(&mut buf).await;

                        let (status, body) = f();
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Start a mock backend that always returns the same JSON document.
pub async fn start_json_backend(body: &'static str) -> (SocketAddr, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let addr = start_programmable_backend(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        (200, body.to_string())
    })
    .await;
    (addr, hits)
}

/// A config rooted at `root` that binds an ephemeral local port.
///
/// `data_url` defaults to an address nothing listens on.
pub fn test_config(data_url: Option<&str>) -> DaemonConfig {
    let mut config = DaemonConfig::default();
    config.identity = identity::generate();
    config.provider_server.listen_multiaddr = "/ip4/127.0.0.1/tcp/0".to_string();
    config.monitor.data_url = data_url
        .unwrap_or("http://127.0.0.1:1/miner-locations.json")
        .to_string();
    config.monitor.interval_secs = 3600;
    config.monitor.request_timeout_secs = 2;
    config
}

pub fn make_file(path: &Path) {
    std::fs::write(path, b"not a directory").unwrap();
}

/// How a [`FakeResource`] behaves when closed.
#[derive(Debug, Clone)]
pub enum CloseBehavior {
    Succeed,
    Fail(&'static str),
    Delay(Duration),
    Hang,
}

/// Order in which fake resources were asked to close.
pub type CloseLog = Arc<Mutex<Vec<ResourceKind>>>;

/// A closeable stand-in that records its calls.
pub struct FakeResource {
    kind: ResourceKind,
    behavior: CloseBehavior,
    calls: Arc<AtomicUsize>,
    log: CloseLog,
}

impl FakeResource {
    pub fn new(kind: ResourceKind, behavior: CloseBehavior, log: &CloseLog) -> (Box<dyn Closeable>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let resource = Self {
            kind,
            behavior,
            calls: calls.clone(),
            log: log.clone(),
        };
        (Box::new(resource), calls)
    }
}

#[async_trait]
impl Closeable for FakeResource {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    async fn close(&mut self) -> Result<(), CloseError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.log.lock().unwrap().push(self.kind);
        match &self.behavior {
            CloseBehavior::Succeed => Ok(()),
            CloseBehavior::Fail(message) => Err((*message).into()),
            CloseBehavior::Delay(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(())
            }
            CloseBehavior::Hang => {
                std::future::pending::<()>().await;
                Ok(())
            }
        }
    }
}

/// A watchdog side effect that records instead of exiting.
#[derive(Default)]
pub struct RecordingTerminator {
    fired: AtomicUsize,
    fired_at: Mutex<Option<Instant>>,
}

impl RecordingTerminator {
    pub fn count(&self) -> usize {
        self.fired.load(Ordering::SeqCst)
    }

    pub fn fired_at(&self) -> Option<Instant> {
        *self.fired_at.lock().unwrap()
    }
}

impl Terminator for RecordingTerminator {
    fn terminate(&self, _budget: Duration) {
        self.fired.fetch_add(1, Ordering::SeqCst);
        *self.fired_at.lock().unwrap() = Some(Instant::now());
    }
}
