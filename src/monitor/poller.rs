//! Remote data monitor.

use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use url::Url;

use crate::config::MonitorConfig;
use crate::lifecycle::shutdown::{Shutdown, ShutdownListener};
use crate::observability::metrics;
use crate::provider::{Task, TaskQueue};
use crate::store::{Cid, Datastore, LinkError, LinkSystem, StoreError};

/// Datastore key holding the content id of the last fetched document.
pub const LAST_FETCH_KEY: &str = "/monitor/last";

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("invalid data url '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported data url scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("polling interval must be greater than zero")]
    ZeroInterval,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("remote document is not JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("provider task queue is closed")]
    QueueClosed,

    #[error("monitor loop terminated abnormally: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Polling behaviour.
#[derive(Debug, Clone, Copy)]
pub struct MonitorSettings {
    pub interval: Duration,
    pub request_timeout: Duration,
}

impl From<&MonitorConfig> for MonitorSettings {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.interval_secs),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }
}

/// Result of one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Unchanged,
    /// New document; carries the link to the stored snapshot.
    Changed(Cid),
}

struct Poller {
    url: Url,
    client: reqwest::Client,
    links: LinkSystem,
    queue: TaskQueue,
    datastore: Datastore,
}

impl Poller {
    /// Download the document. Safe to cancel.
    async fn fetch(&self) -> Result<Vec<u8>, MonitorError> {
        let body = self
            .client
            .get(self.url.clone())
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(body.to_vec())
    }

    /// Queue a changed document and record its fingerprint.
    ///
    /// Must run to completion once started, otherwise the same document is
    /// queued again after a restart.
    async fn ingest(&self, body: &[u8]) -> Result<FetchOutcome, MonitorError> {
        let fingerprint = Cid::of(body);
        let last = self.datastore.get(LAST_FETCH_KEY)?;
        if last.as_deref() == Some(fingerprint.as_str().as_bytes()) {
            return Ok(FetchOutcome::Unchanged);
        }

        let payload: serde_json::Value = serde_json::from_slice(body)?;
        let snapshot = self.links.store(&payload)?;
        self.queue
            .push(Task::new(self.url.as_str(), payload))
            .await
            .map_err(|_| MonitorError::QueueClosed)?;
        self.datastore
            .put(LAST_FETCH_KEY, fingerprint.to_string().into_bytes())?;
        self.datastore.flush().await?;

        Ok(FetchOutcome::Changed(snapshot))
    }
}

/// Periodically fetches the remote document and feeds changes to the provider.
pub struct Monitor {
    url: Url,
    shutdown: Shutdown,
    task: Option<JoinHandle<()>>,
}

impl Monitor {
    /// Validate the data URL and start polling.
    pub fn new(
        links: LinkSystem,
        url: &str,
        queue: TaskQueue,
        datastore: Datastore,
        settings: MonitorSettings,
    ) -> Result<Self, MonitorError> {
        let url = Url::parse(url).map_err(|source| MonitorError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(MonitorError::UnsupportedScheme(url.scheme().to_string()));
        }
        if settings.interval.is_zero() {
            return Err(MonitorError::ZeroInterval);
        }

        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .user_agent(concat!("pando-provider/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let poller = Poller {
            url: url.clone(),
            client,
            links,
            queue,
            datastore,
        };
        let shutdown = Shutdown::new();
        let task = tokio::spawn(run(poller, settings.interval, shutdown.subscribe()));

        tracing::info!(
            url = %url,
            interval_secs = settings.interval.as_secs(),
            "Monitor started"
        );

        Ok(Self {
            url,
            shutdown,
            task: Some(task),
        })
    }

    /// Stop polling. An in-flight fetch is cancelled; an in-flight ingest
    /// finishes first. Closing twice is a no-op.
    pub async fn close(&mut self) -> Result<(), MonitorError> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        self.shutdown.trigger();
        task.await?;
        tracing::info!(url = %self.url, "Monitor closed");
        Ok(())
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run(poller: Poller, interval: Duration, mut shutdown: ShutdownListener) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            _ = ticker.tick() => {}
        }

        let fetched = tokio::select! {
            _ = shutdown.recv() => break,
            fetched = poller.fetch() => fetched,
        };
        let result = match fetched {
            Ok(body) => poller.ingest(&body).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(FetchOutcome::Changed(snapshot)) => {
                metrics::record_monitor_fetch("changed");
                tracing::info!(url = %poller.url, snapshot = %snapshot, "Remote data changed, task queued");
            }
            Ok(FetchOutcome::Unchanged) => {
                metrics::record_monitor_fetch("unchanged");
                tracing::debug!(url = %poller.url, "Remote data unchanged");
            }
            Err(MonitorError::QueueClosed) => {
                tracing::warn!("Provider queue closed, monitor stopping");
                break;
            }
            Err(e) => {
                metrics::record_monitor_fetch("error");
                tracing::error!(url = %poller.url, error = %e, "Error polling remote data");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Blockstore;

    fn settings() -> MonitorSettings {
        MonitorSettings {
            interval: Duration::from_secs(3600),
            request_timeout: Duration::from_secs(1),
        }
    }

    fn deps(dir: &std::path::Path) -> (LinkSystem, TaskQueue, Datastore) {
        let datastore = Datastore::open(dir).unwrap();
        let links = LinkSystem::new(Blockstore::new(datastore.clone()));
        let (queue, _rx) = TaskQueue::channel(1);
        (links, queue, datastore)
    }

    #[tokio::test]
    async fn test_rejects_invalid_urls() {
        let dir = tempfile::tempdir().unwrap();

        let (links, queue, datastore) = deps(dir.path());
        let err = Monitor::new(links, "not a url", queue, datastore, settings()).err().unwrap();
        assert!(matches!(err, MonitorError::InvalidUrl { .. }));

        let (links, queue, datastore) = deps(dir.path());
        let err = Monitor::new(links, "ftp://example.com/data.json", queue, datastore, settings())
            .err()
            .unwrap();
        assert!(matches!(err, MonitorError::UnsupportedScheme(s) if s == "ftp"));
    }

    #[tokio::test]
    async fn test_rejects_zero_interval() {
        let dir = tempfile::tempdir().unwrap();
        let (links, queue, datastore) = deps(dir.path());
        let mut settings = settings();
        settings.interval = Duration::ZERO;
        let err = Monitor::new(links, "http://127.0.0.1:1/data.json", queue, datastore, settings)
            .err()
            .unwrap();
        assert!(matches!(err, MonitorError::ZeroInterval));
    }

    async fn serve_json(body: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    let _ = socket.read(&mut buf).await;
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        format!("http://{addr}/data.json")
    }

    #[tokio::test]
    async fn test_close_lets_a_started_ingest_finish() {
        let dir = tempfile::tempdir().unwrap();
        let datastore = Datastore::open(dir.path()).unwrap();
        let links = LinkSystem::new(Blockstore::new(datastore.clone()));
        let (queue, mut rx) = TaskQueue::channel(1);
        queue.push(Task::new("filler", serde_json::Value::Null)).await.unwrap();

        let body = r#"{"miners":[]}"#;
        let url = serve_json(body).await;
        let mut monitor = Monitor::new(links, &url, queue, datastore.clone(), settings()).unwrap();

        // The snapshot is linked just before the push that blocks on the full queue.
        let payload: serde_json::Value = serde_json::from_str(body).unwrap();
        let snapshot = Cid::of(&serde_json::to_vec(&payload).unwrap());
        let blocks = Blockstore::new(datastore.clone());
        tokio::time::timeout(Duration::from_secs(5), async {
            while !blocks.has(&snapshot).unwrap() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        let closing = tokio::spawn(async move { monitor.close().await });
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!closing.is_finished());
        assert_eq!(datastore.get(LAST_FETCH_KEY).unwrap(), None);

        assert_eq!(rx.recv().await.unwrap().source, "filler");
        tokio::time::timeout(Duration::from_secs(5), closing)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        assert_eq!(rx.recv().await.unwrap().source, url);
        assert_eq!(
            datastore.get(LAST_FETCH_KEY).unwrap(),
            Some(Cid::of(body.as_bytes()).to_string().into_bytes())
        );
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let (links, queue, datastore) = deps(dir.path());
        let mut monitor =
            Monitor::new(links, "http://127.0.0.1:1/data.json", queue, datastore, settings()).unwrap();

        monitor.close().await.unwrap();
        monitor.close().await.unwrap();
    }
}
