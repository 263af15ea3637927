//! Content resolution against the local store and the network.
//!
//! Three operations compose the fetch pipeline:
//!
//! - [`Node::add`] imports a tree into the local store and pins it there.
//! - [`Node::resolve_from_network`] turns a content identifier into a tree,
//!   reading the local store first and downloading from connected peers
//!   when needed, without persisting anything new.
//! - [`Node::fetch`] composes the two, so content pulled from the network
//!   is durably retained locally under its re-derived identifier.
//!
//! [`Node::get`] is the read-back counterpart of `add`: local store first,
//! network fallback, no re-import.
//!
//! No operation retries internally; a failed request is terminal and must
//! be reissued by the caller.

use bytes::Bytes;
use iroh_blobs::HashAndFormat;
use snafu::Snafu;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;

use crate::content::ContentId;
use crate::content::ResolvedPath;
use crate::files::FileNode;
use crate::node::Node;

/// Errors from content store and resolution operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ContentError {
    /// Importing content into the local store failed.
    #[snafu(display("store write failed: {message}"))]
    StoreWrite {
        /// Human-readable description of the store failure.
        message: String,
    },

    /// The identifier could not be resolved to content: malformed
    /// identifier, content unavailable locally and from every reachable
    /// peer, or an undecodable encoding.
    #[snafu(display("failed to resolve {cid:?}: {message}"))]
    Resolution {
        /// The identifier as supplied by the caller.
        cid: String,
        /// What went wrong.
        message: String,
    },

    /// The cancellation token fired while resolution was in flight.
    #[snafu(display("resolution cancelled"))]
    Cancelled,
}

impl Node {
    /// Import a file tree into the local content store.
    ///
    /// Deterministic: re-adding a byte-identical tree yields the same
    /// [`ContentId`] however many times it is called.
    ///
    /// # Errors
    ///
    /// [`ContentError::StoreWrite`] on any underlying store failure.
    pub async fn add(&self, tree: &FileNode) -> Result<ResolvedPath, ContentError> {
        let encoded = tree
            .encode()
            .map_err(|e| ContentError::StoreWrite { message: format!("failed to encode tree: {e}") })?;
        let size = encoded.len() as u64;

        let tag = self
            .store()
            .blobs()
            .add_bytes(Bytes::from(encoded))
            .with_tag()
            .await
            .map_err(|e| ContentError::StoreWrite { message: e.to_string() })?;

        let cid = ContentId::from(tag.hash);
        debug!(cid = %cid, size, "added content to local store");

        Ok(ResolvedPath::new(cid, size))
    }

    /// Resolve a content identifier to a file tree.
    ///
    /// The local store is consulted first; content not held locally is
    /// downloaded from the peers recorded by
    /// [`Node::connect_peers`](crate::Node::connect_peers). The returned
    /// tree is not re-imported; use [`Node::fetch`] for durable retention.
    ///
    /// # Errors
    ///
    /// [`ContentError::Resolution`] for a malformed identifier, content
    /// unavailable from the store and every reachable peer, or a corrupt
    /// encoding; [`ContentError::Cancelled`] if `cancel` fires mid-flight.
    pub async fn resolve_from_network(
        &self,
        cancel: &CancellationToken,
        cid: &str,
    ) -> Result<FileNode, ContentError> {
        let (_, tree) = self.load_tree(cancel, cid).await?;
        Ok(tree)
    }

    /// Read a content identifier back as a file tree without re-importing
    /// it: local store first, falling back to the network.
    pub async fn get(&self, cancel: &CancellationToken, cid: &str) -> Result<FileNode, ContentError> {
        let (_, tree) = self.load_tree(cancel, cid).await?;
        Ok(tree)
    }

    /// Fetch content from the network and durably retain it locally.
    ///
    /// Composes [`Node::resolve_from_network`] with [`Node::add`]: getting
    /// alone does not guarantee persistence, only adding does. The
    /// identifier is re-derived from the imported bytes; a mismatch with
    /// the requested identifier is treated as corruption.
    pub async fn fetch(&self, cancel: &CancellationToken, cid: &str) -> Result<ResolvedPath, ContentError> {
        let (requested, tree) = self.load_tree(cancel, cid).await?;

        let resolved = self.add(&tree).await?;
        if *resolved.cid() != requested {
            return Err(ContentError::Resolution {
                cid: cid.to_string(),
                message: format!("re-derived identifier {} does not match", resolved.cid()),
            });
        }

        info!(cid = %resolved.cid(), size = resolved.size(), "fetched content into local store");
        Ok(resolved)
    }

    /// Load the canonical encoding for `cid` (local store first, then the
    /// network) and decode it.
    async fn load_tree(
        &self,
        cancel: &CancellationToken,
        cid: &str,
    ) -> Result<(ContentId, FileNode), ContentError> {
        let parsed: ContentId = cid.parse().map_err(|e| ContentError::Resolution {
            cid: cid.to_string(),
            message: format!("{e}"),
        })?;
        let hash = parsed.hash();

        let bytes = match self.local_bytes(cid, hash).await? {
            Some(bytes) => bytes,
            None => {
                self.download(cancel, cid, hash).await?;
                self.local_bytes(cid, hash).await?.ok_or_else(|| ContentError::Resolution {
                    cid: cid.to_string(),
                    message: "content missing from store after download".to_string(),
                })?
            }
        };

        let tree = FileNode::decode(&bytes).map_err(|e| ContentError::Resolution {
            cid: cid.to_string(),
            message: format!("invalid content encoding: {e}"),
        })?;

        Ok((parsed, tree))
    }

    /// Read a blob from the local store, mapping "not found" to `None`.
    async fn local_bytes(&self, cid: &str, hash: iroh_blobs::Hash) -> Result<Option<Bytes>, ContentError> {
        match self.store().blobs().get_bytes(hash).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) => {
                let text = e.to_string();
                if text.contains("not found") || text.contains("NotFound") {
                    Ok(None)
                } else {
                    Err(ContentError::Resolution { cid: cid.to_string(), message: text })
                }
            }
        }
    }

    /// Download a blob from the recorded providers into the local store.
    async fn download(
        &self,
        cancel: &CancellationToken,
        cid: &str,
        hash: iroh_blobs::Hash,
    ) -> Result<(), ContentError> {
        let providers = self.providers().await;
        if providers.is_empty() {
            return Err(ContentError::Resolution {
                cid: cid.to_string(),
                message: "not in local store and no connected peers to fetch from".to_string(),
            });
        }

        debug!(cid = %cid, providers = providers.len(), "downloading content from peers");

        let downloader = self.store().downloader(self.endpoint());
        let progress = downloader.download(HashAndFormat::raw(hash), providers);
        let download = async move { progress.await };

        tokio::select! {
            _ = cancel.cancelled() => Err(ContentError::Cancelled),
            res = download => res.map(|_| ()).map_err(|e| ContentError::Resolution {
                cid: cid.to_string(),
                message: format!("download failed: {e}"),
            }),
        }
    }
}
