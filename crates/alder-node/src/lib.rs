//! Embedded node for a peer-to-peer content-addressed storage network.
//!
//! The crate lets a host process participate in the network without running
//! a separate daemon: it initializes an on-disk repository (identity,
//! configuration, blob store), binds a lightweight routing-client node,
//! dials bootstrap peers, and resolves content identifiers into
//! file/directory trees that can be written back to local disk.
//!
//! # Architecture
//!
//! ```text
//! ensure_repository (identity + config + blobs/)
//!        |
//!        v
//! Node::start (endpoint + blob store + protocol router)
//!        |
//!        +--> connect_peers: concurrent dial-out to bootstrap peers
//!        |
//!        +--> fetch / get: CID -> FileNode (local store first, then peers)
//!               |
//!               v
//!        persist::save: FileNode -> files on disk
//! ```
//!
//! The routing layer, block exchange, and hashing are provided by
//! [`iroh`] and [`iroh_blobs`]; this crate only orchestrates them.
//!
//! # Example
//!
//! ```ignore
//! use alder_node::{ensure_repository, Node, RepoConfig, save};
//! use tokio_util::sync::CancellationToken;
//!
//! let repo = ensure_repository("/tmp/store-a".as_ref(), RepoConfig::default())?;
//! let node = Node::start(repo).await?;
//!
//! let cancel = CancellationToken::new();
//! node.connect_peers(&cancel, &bootstrap_addrs).await?;
//!
//! let resolved = node.fetch(&cancel, &cid).await?;
//! let tree = node.get(&cancel, &resolved.cid().to_string()).await?;
//! let path = save("/tmp/out/", &tree, &resolved.cid().to_string()).await?;
//! ```

pub mod content;
pub mod files;
pub mod node;
pub mod peers;
pub mod persist;
pub mod repo;
pub mod resolve;
pub mod setup;

pub use content::ContentId;
pub use content::ResolvedPath;
pub use files::FileNode;
pub use files::TreeReadError;
pub use node::Node;
pub use node::NodeError;
pub use peers::ConnectError;
pub use persist::WriteError;
pub use persist::save;
pub use repo::ExperimentalFlags;
pub use repo::RelayChoice;
pub use repo::RepoConfig;
pub use repo::RepoError;
pub use repo::Repository;
pub use repo::ensure_repository;
pub use resolve::ContentError;
