//! Node bootstrap and lifecycle.
//!
//! A [`Node`] binds the repository identity to a live endpoint, loads the
//! blob store, and spawns the protocol router. It runs as a lightweight
//! routing client: it queries the network to resolve content but never
//! advertises itself as a routing provider. The node is ephemeral and
//! consumer-oriented; one is constructed per process and torn down with
//! [`Node::shutdown`].

use std::collections::BTreeSet;
use std::fmt;
use std::net::SocketAddr;

use iroh::Endpoint;
use iroh::EndpointAddr;
use iroh::EndpointId;
use iroh::RelayMode;
use iroh::protocol::Router;
use iroh_blobs::BlobsProtocol;
use iroh_blobs::store::fs::FsStore;
use snafu::Snafu;
use tokio::sync::Mutex;
use tracing::info;
use tracing::warn;

use crate::repo::RelayChoice;
use crate::repo::Repository;
use crate::setup;

/// Errors from node construction.
///
/// Every construction failure is terminal for the current process; there is
/// no partial or degraded node state.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum NodeError {
    /// Endpoint binding, store loading, or router setup failed.
    #[snafu(display("failed to construct node: {message}"))]
    Construction {
        /// Human-readable description of the failing stage.
        message: String,
    },
}

/// A running node bound to exactly one [`Repository`].
///
/// Exposes the capability surface used by the rest of the crate: peer
/// connection ([`Node::connect_peers`]) and content resolution
/// ([`Node::add`], [`Node::get`], [`Node::fetch`]).
pub struct Node {
    repo: Repository,
    endpoint: Endpoint,
    store: FsStore,
    /// Keeps the protocol accept loop alive; dropping it would stop
    /// serving blocks to peers.
    router: Router,
    /// Identities of successfully dialed peers, used as download
    /// candidates during resolution.
    providers: Mutex<BTreeSet<EndpointId>>,
}

impl Node {
    /// Construct and start the node for an opened repository.
    ///
    /// Performs process-wide setup first (exactly once per process), then
    /// binds the endpoint with the repository identity, loads the blob
    /// store, and registers the blobs protocol so the node can serve
    /// blocks it holds.
    pub async fn start(repo: Repository) -> Result<Self, NodeError> {
        setup::init_process();

        let mut builder = Endpoint::builder().secret_key(repo.secret_key().clone());

        match repo.config().relay {
            RelayChoice::Default => {
                // Routing-client mode: resolve other peers through the
                // public infrastructure, publish nothing about ourselves.
                builder = builder
                    .relay_mode(RelayMode::Default)
                    .discovery(iroh::discovery::dns::DnsDiscovery::n0_dns());
            }
            RelayChoice::Disabled => {
                builder = builder.relay_mode(RelayMode::Disabled);
            }
        }

        let endpoint = builder
            .bind()
            .await
            .map_err(|e| NodeError::Construction { message: format!("failed to bind endpoint: {e}") })?;

        let store = FsStore::load(repo.blobs_dir())
            .await
            .map_err(|e| NodeError::Construction { message: format!("failed to load blob store: {e}") })?;

        let blobs = BlobsProtocol::new(&store, None);
        let router = Router::builder(endpoint.clone()).accept(iroh_blobs::ALPN, blobs).spawn();

        info!(
            endpoint_id = %endpoint.id(),
            repo = %repo.root().display(),
            relay = ?repo.config().relay,
            "node started"
        );

        Ok(Self {
            repo,
            endpoint,
            store,
            router,
            providers: Mutex::new(BTreeSet::new()),
        })
    }

    /// The repository this node is bound to.
    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    /// The node's public identity.
    pub fn endpoint_id(&self) -> EndpointId {
        self.endpoint.id()
    }

    /// The node's full address (identity plus known transport addresses).
    pub fn endpoint_addr(&self) -> EndpointAddr {
        self.endpoint.addr()
    }

    /// Local socket addresses the endpoint is bound to.
    pub fn bound_sockets(&self) -> Vec<SocketAddr> {
        self.endpoint.bound_sockets()
    }

    pub(crate) fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub(crate) fn store(&self) -> &FsStore {
        &self.store
    }

    /// Record a successfully dialed peer as a download candidate.
    pub(crate) async fn add_provider(&self, id: EndpointId) {
        self.providers.lock().await.insert(id);
    }

    /// Snapshot of the current download candidates.
    pub(crate) async fn providers(&self) -> Vec<EndpointId> {
        self.providers.lock().await.iter().copied().collect()
    }

    /// Gracefully tear down the node: router, blob store, endpoint, in
    /// that order. Teardown is best-effort; failures are logged.
    pub async fn shutdown(self) {
        if let Err(e) = self.router.shutdown().await {
            warn!(error = %e, "failed to shut down protocol router");
        }
        if let Err(e) = self.store.shutdown().await {
            warn!(error = %e, "failed to shut down blob store");
        }
        self.endpoint.close().await;
        info!("node shut down");
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("endpoint_id", &self.endpoint.id())
            .field("repo", &self.repo.root())
            .finish()
    }
}
