//! Two-node flows over loopback: bootstrap dialing, network fetch, and
//! durability of fetched content after the provider goes away.

use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::net::Ipv6Addr;
use std::net::SocketAddr;
use std::path::Path;

use alder_node::FileNode;
use alder_node::Node;
use alder_node::RelayChoice;
use alder_node::RepoConfig;
use alder_node::ensure_repository;
use tokio_util::sync::CancellationToken;

async fn start_offline_node(root: &Path) -> Node {
    let config = RepoConfig {
        relay: RelayChoice::Disabled,
        ..RepoConfig::default()
    };
    let repo = ensure_repository(root, config).expect("ensure repository");
    Node::start(repo).await.expect("start node")
}

/// Bootstrap address strings for a locally running node, with unspecified
/// bind addresses rewritten to loopback so they are dialable.
fn peer_strings(node: &Node) -> Vec<String> {
    let id = node.endpoint_id();
    node.bound_sockets()
        .into_iter()
        .map(|sock| {
            let ip = match sock.ip() {
                IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
                IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
                ip => ip,
            };
            format!("{id}@{}", SocketAddr::new(ip, sock.port()))
        })
        .collect()
}

#[tokio::test]
async fn fetch_from_peer_then_read_locally() {
    let dir = tempfile::TempDir::new().unwrap();
    let provider = start_offline_node(&dir.path().join("provider")).await;
    let consumer = start_offline_node(&dir.path().join("consumer")).await;
    let cancel = CancellationToken::new();

    let tree = FileNode::File(b"distributed payload".to_vec());
    let added = provider.add(&tree).await.unwrap();
    let cid = added.cid().to_string();

    consumer.connect_peers(&cancel, &peer_strings(&provider)).await.unwrap();

    let fetched = consumer.fetch(&cancel, &cid).await.unwrap();
    assert_eq!(fetched.cid().to_string(), cid);

    // The provider goes away; the fetched content must now be served from
    // the consumer's own store.
    provider.shutdown().await;

    let read_back = consumer.get(&cancel, &cid).await.unwrap();
    assert_eq!(read_back, tree);

    consumer.shutdown().await;
}

#[tokio::test]
async fn unreachable_peer_does_not_fail_bootstrap() {
    let dir = tempfile::TempDir::new().unwrap();
    let provider = start_offline_node(&dir.path().join("provider")).await;
    let consumer = start_offline_node(&dir.path().join("consumer")).await;
    let cancel = CancellationToken::new();

    let tree = FileNode::File(b"still reachable".to_vec());
    let cid = provider.add(&tree).await.unwrap().cid().to_string();

    // One reachable peer plus one identity nobody answers for.
    let mut addrs = peer_strings(&provider);
    addrs.push(iroh::SecretKey::from([42u8; 32]).public().to_string());

    consumer.connect_peers(&cancel, &addrs).await.unwrap();

    let read_back = consumer.get(&cancel, &cid).await.unwrap();
    assert_eq!(read_back, tree);

    provider.shutdown().await;
    consumer.shutdown().await;
}

#[tokio::test]
async fn duplicate_peer_entries_connect_once() {
    let dir = tempfile::TempDir::new().unwrap();
    let provider = start_offline_node(&dir.path().join("provider")).await;
    let consumer = start_offline_node(&dir.path().join("consumer")).await;
    let cancel = CancellationToken::new();

    let cid = provider
        .add(&FileNode::File(b"merged addresses".to_vec()))
        .await
        .unwrap()
        .cid()
        .to_string();

    // The same identity appears twice: once with a bogus transport address
    // and once with the real ones. The merged dial has all of them
    // available, so the connection still succeeds.
    let mut addrs = vec![format!("{}@127.0.0.1:1", provider.endpoint_id())];
    addrs.extend(peer_strings(&provider));

    consumer.connect_peers(&cancel, &addrs).await.unwrap();

    assert!(consumer.get(&cancel, &cid).await.is_ok());

    provider.shutdown().await;
    consumer.shutdown().await;
}

#[tokio::test]
async fn malformed_address_aborts_before_dialing() {
    let dir = tempfile::TempDir::new().unwrap();
    let node = start_offline_node(&dir.path().join("repo")).await;
    let cancel = CancellationToken::new();

    let addrs = vec!["garbage-address".to_string()];
    let err = node.connect_peers(&cancel, &addrs).await.unwrap_err();

    assert!(matches!(err, alder_node::ConnectError::AddressParse { .. }));

    node.shutdown().await;
}
