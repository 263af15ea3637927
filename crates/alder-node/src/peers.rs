//! Bootstrap peer dialing.
//!
//! Peer addresses arrive as strings carrying both the peer identity and an
//! optional transport address (`<endpoint-id>` or
//! `<endpoint-id>@<socket-addr>`). All strings naming the same identity are
//! merged into a single dial target before any connection is attempted, so
//! no identity is dialed twice. Dials run concurrently, one task per
//! distinct peer, and individual failures are logged and skipped; the call
//! succeeds as long as its input parsed.

use std::collections::BTreeMap;

use iroh::EndpointAddr;
use iroh::EndpointId;
use iroh::TransportAddr;
use snafu::Snafu;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::node::Node;

/// Errors from bootstrap peer connection.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConnectError {
    /// A caller-supplied address string is malformed. The whole call is
    /// aborted before any dial: a bad entry signals a configuration bug,
    /// not a transient network condition.
    #[snafu(display("invalid peer address {addr:?}: {message}"))]
    AddressParse {
        /// The rejected address string.
        addr: String,
        /// What failed to parse.
        message: String,
    },

    /// The cancellation token fired while dials were in flight.
    #[snafu(display("peer connection cancelled"))]
    Cancelled,
}

/// Parse and merge address strings into one dial target per identity.
///
/// Multiple strings for the same identity collapse into a single
/// [`EndpointAddr`] carrying the union of their transport addresses.
fn merge_peer_addrs(addrs: &[String]) -> Result<Vec<EndpointAddr>, ConnectError> {
    let mut merged: BTreeMap<EndpointId, EndpointAddr> = BTreeMap::new();

    for raw in addrs {
        let (id_part, sock_part) = match raw.split_once('@') {
            Some((id, sock)) => (id, Some(sock)),
            None => (raw.as_str(), None),
        };

        let id: EndpointId = id_part.parse().map_err(|e| ConnectError::AddressParse {
            addr: raw.clone(),
            message: format!("bad endpoint id: {e}"),
        })?;

        let entry = merged.entry(id).or_insert_with(|| EndpointAddr::new(id));

        if let Some(sock) = sock_part {
            let sock = sock.parse().map_err(|e| ConnectError::AddressParse {
                addr: raw.clone(),
                message: format!("bad socket address: {e}"),
            })?;
            entry.addrs.insert(TransportAddr::Ip(sock));
        }
    }

    Ok(merged.into_values().collect())
}

impl Node {
    /// Dial the given bootstrap peers concurrently.
    ///
    /// Best-effort: per-peer dial failures are logged and skipped, and the
    /// call still succeeds. The call returns only after every dial attempt
    /// has finished; no background dial outlives it. Successfully dialed
    /// peers become download candidates for content resolution.
    ///
    /// # Errors
    ///
    /// [`ConnectError::AddressParse`] if any input string is malformed (no
    /// dial is attempted); [`ConnectError::Cancelled`] if `cancel` fires
    /// before the dials complete.
    pub async fn connect_peers(
        &self,
        cancel: &CancellationToken,
        addrs: &[String],
    ) -> Result<(), ConnectError> {
        let peers = merge_peer_addrs(addrs)?;
        if peers.is_empty() {
            debug!("no bootstrap peers configured");
            return Ok(());
        }

        let mut dials = JoinSet::new();
        for peer in peers {
            let endpoint = self.endpoint().clone();
            let cancel = cancel.clone();
            dials.spawn(async move {
                let id = peer.id;
                let result = tokio::select! {
                    _ = cancel.cancelled() => Err("cancelled".to_string()),
                    res = endpoint.connect(peer, iroh_blobs::ALPN) => {
                        res.map(|_connection| ()).map_err(|e| e.to_string())
                    }
                };
                (id, result)
            });
        }

        // Join barrier: every spawned dial finishes before we return.
        while let Some(joined) = dials.join_next().await {
            match joined {
                Ok((id, Ok(()))) => {
                    info!(peer = %id.fmt_short(), "connected to bootstrap peer");
                    self.add_provider(id).await;
                }
                Ok((id, Err(e))) => {
                    warn!(peer = %id.fmt_short(), error = %e, "failed to connect to bootstrap peer");
                }
                Err(e) => {
                    warn!(error = %e, "bootstrap dial task failed");
                }
            }
        }

        if cancel.is_cancelled() {
            return Err(ConnectError::Cancelled);
        }
        Ok(())
    }
}
