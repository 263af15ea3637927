//! Offline store behavior: determinism, round-trips, and the
//! fetch-from-local-store path with an empty bootstrap list.

use std::collections::BTreeMap;
use std::path::Path;

use alder_node::ContentError;
use alder_node::FileNode;
use alder_node::Node;
use alder_node::RelayChoice;
use alder_node::RepoConfig;
use alder_node::ensure_repository;
use alder_node::save;
use tokio_util::sync::CancellationToken;

async fn start_offline_node(root: &Path) -> Node {
    let config = RepoConfig {
        relay: RelayChoice::Disabled,
        ..RepoConfig::default()
    };
    let repo = ensure_repository(root, config).expect("ensure repository");
    Node::start(repo).await.expect("start node")
}

fn sample_tree() -> FileNode {
    let mut root = BTreeMap::new();
    root.insert("greeting.txt".to_string(), FileNode::File(b"hello world".to_vec()));
    FileNode::Directory(root)
}

#[tokio::test]
async fn content_addressing_is_deterministic() {
    let dir = tempfile::TempDir::new().unwrap();
    let node = start_offline_node(&dir.path().join("repo")).await;

    let tree = sample_tree();
    let first = node.add(&tree).await.unwrap();
    let second = node.add(&tree).await.unwrap();
    // A separately constructed but byte-identical tree.
    let third = node.add(&sample_tree()).await.unwrap();

    assert_eq!(first.cid(), second.cid());
    assert_eq!(first.cid(), third.cid());

    node.shutdown().await;
}

#[tokio::test]
async fn add_then_get_roundtrips() {
    let dir = tempfile::TempDir::new().unwrap();
    let node = start_offline_node(&dir.path().join("repo")).await;
    let cancel = CancellationToken::new();

    let tree = sample_tree();
    let resolved = node.add(&tree).await.unwrap();
    let read_back = node.get(&cancel, &resolved.cid().to_string()).await.unwrap();

    assert_eq!(read_back, tree);

    node.shutdown().await;
}

#[tokio::test]
async fn identity_is_stable_across_restarts() {
    let dir = tempfile::TempDir::new().unwrap();
    let root = dir.path().join("repo");

    let node = start_offline_node(&root).await;
    let first_id = node.endpoint_id();
    node.shutdown().await;

    let node = start_offline_node(&root).await;
    assert_eq!(node.endpoint_id(), first_id);
    node.shutdown().await;
}

#[tokio::test]
async fn fetch_with_empty_bootstrap_serves_local_content() {
    let dir = tempfile::TempDir::new().unwrap();
    let node = start_offline_node(&dir.path().join("repo")).await;
    let cancel = CancellationToken::new();

    let payload = b"fixture payload".to_vec();
    let added = node.add(&FileNode::File(payload.clone())).await.unwrap();
    let cid = added.cid().to_string();

    // Empty bootstrap list is valid: nothing is dialed.
    node.connect_peers(&cancel, &[]).await.unwrap();

    let fetched = node.fetch(&cancel, &cid).await.unwrap();
    assert_eq!(fetched.cid().to_string(), cid);

    // Materialize to disk under <dest><cid>.
    let out = tempfile::TempDir::new().unwrap();
    let dest = format!("{}/", out.path().display());
    let tree = node.get(&cancel, &cid).await.unwrap();
    let path = save(&dest, &tree, &cid).await.unwrap();

    assert_eq!(path, out.path().join(&cid));
    assert_eq!(std::fs::read(&path).unwrap(), payload);

    node.shutdown().await;
}

#[tokio::test]
async fn malformed_cid_is_a_resolution_error() {
    let dir = tempfile::TempDir::new().unwrap();
    let node = start_offline_node(&dir.path().join("repo")).await;
    let cancel = CancellationToken::new();

    let err = node.get(&cancel, "not-a-valid-cid").await.unwrap_err();
    assert!(matches!(err, ContentError::Resolution { .. }));

    let err = node.fetch(&cancel, "not-a-valid-cid").await.unwrap_err();
    assert!(matches!(err, ContentError::Resolution { .. }));

    node.shutdown().await;
}

#[tokio::test]
async fn absent_content_without_peers_is_a_resolution_error() {
    let dir = tempfile::TempDir::new().unwrap();
    let node = start_offline_node(&dir.path().join("repo")).await;
    let cancel = CancellationToken::new();

    // Valid identifier, but nothing in the store and nobody to ask.
    let absent = "ab".repeat(32);
    let err = node.get(&cancel, &absent).await.unwrap_err();
    assert!(matches!(err, ContentError::Resolution { .. }));

    node.shutdown().await;
}

#[tokio::test]
async fn cancelled_token_aborts_peer_connection() {
    let dir = tempfile::TempDir::new().unwrap();
    let node = start_offline_node(&dir.path().join("repo")).await;

    let cancel = CancellationToken::new();
    cancel.cancel();

    let unreachable = iroh::SecretKey::from([9u8; 32]).public().to_string();
    let err = node.connect_peers(&cancel, &[unreachable]).await.unwrap_err();
    assert!(matches!(err, alder_node::ConnectError::Cancelled));

    node.shutdown().await;
}
