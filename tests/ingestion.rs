//! Monitor → provider → endpoint flow against a mock data source.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pando_provider::config::loader;
use pando_provider::lifecycle::Daemon;
use pando_provider::net::HeadResponse;
use pando_provider::provider::{Advertisement, HEAD_KEY};
use pando_provider::store::{Blockstore, Cid, Datastore, LinkSystem};
use pando_provider::DaemonConfig;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tokio::net::TcpStream;

mod common;
use common::{start_json_backend, start_programmable_backend, test_config, RecordingTerminator};

const MINERS: &str = r#"{"miners":{"f01234":{"region":"EU"}}}"#;

async fn fetch_head(addr: SocketAddr) -> HeadResponse {
    let stream = TcpStream::connect(addr).await.unwrap();
    let mut line = String::new();
    BufReader::new(stream).read_line(&mut line).await.unwrap();
    serde_json::from_str(&line).unwrap()
}

/// Poll the endpoint until it announces a head other than `previous`.
async fn wait_for_head(addr: SocketAddr, previous: Option<&Cid>) -> HeadResponse {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let response = fetch_head(addr).await;
            if let Some(announcement) = &response.announcement {
                if Some(&announcement.head) != previous {
                    return response;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("no announcement within timeout")
}

async fn start(config: &DaemonConfig, root: &Path) -> Daemon {
    Daemon::start_with(config, root, Arc::new(RecordingTerminator::default()))
        .await
        .unwrap()
}

fn reopen_links(config: &DaemonConfig, root: &Path) -> (Datastore, LinkSystem) {
    let datastore = Datastore::open(&loader::path(root, &config.datastore.dir)).unwrap();
    let links = LinkSystem::new(Blockstore::new(datastore.clone()));
    (datastore, links)
}

#[tokio::test]
async fn test_remote_document_becomes_signed_advertisement() {
    let (backend, _hits) = start_json_backend(MINERS).await;
    let url = format!("http://{backend}/miner-locations.json");
    let root = tempfile::tempdir().unwrap();
    let config = test_config(Some(&url));

    let mut daemon = start(&config, root.path()).await;
    let listen = daemon.listen_addr().socket_addr();

    let response = wait_for_head(listen, None).await;
    assert_eq!(response.peer_id, daemon.peer_id());
    let announcement = response.announcement.unwrap();
    assert!(announcement.verify());
    assert_eq!(announcement.topic, config.pando.topic);

    assert!(daemon.shutdown().await.is_ok());

    let (datastore, links) = reopen_links(&config, root.path());
    let head = datastore.get(HEAD_KEY).unwrap().unwrap();
    assert_eq!(String::from_utf8(head).unwrap(), announcement.head.to_string());

    let advertisement: Advertisement = links.load(&announcement.head).unwrap();
    assert_eq!(advertisement.provider, daemon.peer_id());
    assert_eq!(advertisement.previous, None);
    assert_eq!(advertisement.source, url);
    assert_eq!(
        advertisement.payload,
        serde_json::from_str::<serde_json::Value>(MINERS).unwrap()
    );
}

#[tokio::test]
async fn test_published_head_survives_exit_without_shutdown() {
    let (backend, _hits) = start_json_backend(MINERS).await;
    let url = format!("http://{backend}/miner-locations.json");
    let root = tempfile::tempdir().unwrap();
    let config = test_config(Some(&url));

    let daemon = start(&config, root.path()).await;
    let head = wait_for_head(daemon.listen_addr().socket_addr(), None)
        .await
        .announcement
        .unwrap()
        .head;

    // Same as a forced process exit: no close, no flush on the way out.
    std::mem::forget(daemon);

    let (datastore, links) = reopen_links(&config, root.path());
    let persisted = datastore.get(HEAD_KEY).unwrap().unwrap();
    assert_eq!(String::from_utf8(persisted).unwrap(), head.to_string());
    let advertisement: Advertisement = links.load(&head).unwrap();
    assert_eq!(advertisement.source, url);
}

#[tokio::test]
async fn test_restart_restores_head_and_skips_unchanged_data() {
    let (backend, hits) = start_json_backend(MINERS).await;
    let url = format!("http://{backend}/miner-locations.json");
    let root = tempfile::tempdir().unwrap();
    let config = test_config(Some(&url));

    let mut first = start(&config, root.path()).await;
    let head = wait_for_head(first.listen_addr().socket_addr(), None)
        .await
        .announcement
        .unwrap()
        .head;
    assert!(first.shutdown().await.is_ok());
    drop(first);

    let mut second = start(&config, root.path()).await;
    let restored = fetch_head(second.listen_addr().socket_addr()).await;
    assert_eq!(restored.announcement.map(|a| a.head), Some(head.clone()));

    tokio::time::timeout(Duration::from_secs(10), async {
        while hits.load(Ordering::SeqCst) < 2 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("monitor should poll again after restart");
    // Give the unchanged poll time to finish.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let still = fetch_head(second.listen_addr().socket_addr()).await;
    assert_eq!(still.announcement.map(|a| a.head), Some(head));
    assert!(second.shutdown().await.is_ok());
}

#[tokio::test]
async fn test_changed_documents_extend_the_chain() {
    let version = Arc::new(AtomicUsize::new(0));
    let counter = version.clone();
    let backend = start_programmable_backend(move || {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        (200, format!(r#"{{"version":{n}}}"#))
    })
    .await;
    let url = format!("http://{backend}/miner-locations.json");
    let root = tempfile::tempdir().unwrap();
    let mut config = test_config(Some(&url));
    config.monitor.interval_secs = 1;

    let mut daemon = start(&config, root.path()).await;
    let listen = daemon.listen_addr().socket_addr();

    let first = wait_for_head(listen, None).await.announcement.unwrap();
    let second = wait_for_head(listen, Some(&first.head)).await.announcement.unwrap();
    assert!(second.seq > first.seq);
    assert!(daemon.shutdown().await.is_ok());

    let (_, links) = reopen_links(&config, root.path());
    let latest: Advertisement = links.load(&second.head).unwrap();
    assert_eq!(latest.previous, Some(first.head));
}

#[tokio::test]
async fn test_failing_data_source_keeps_daemon_running() {
    let backend = start_programmable_backend(|| (503, "unavailable".to_string())).await;
    let url = format!("http://{backend}/miner-locations.json");
    let root = tempfile::tempdir().unwrap();
    let config = test_config(Some(&url));

    let mut daemon = start(&config, root.path()).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let response = fetch_head(daemon.listen_addr().socket_addr()).await;
    assert!(response.announcement.is_none());
    assert!(daemon.shutdown().await.is_ok());
}
