//! In-memory file trees and their canonical store encoding.
//!
//! A [`FileNode`] is either a single file's bytes or an ordered directory
//! of named children. It is the unit exchanged between the local
//! filesystem, the content store, and the persistence writer, and is
//! exclusively owned by whichever stage currently holds it.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use snafu::ResultExt;
use snafu::Snafu;

/// Errors from importing a local filesystem tree.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum TreeReadError {
    /// Filesystem read failed.
    #[snafu(display("failed to read {}: {source}", path.display()))]
    Io {
        /// Path that could not be read.
        path: PathBuf,
        /// Underlying filesystem error.
        source: io::Error,
    },

    /// The entry is neither a regular file nor a directory.
    #[snafu(display("unsupported entry at {}", path.display()))]
    Unsupported {
        /// Path of the unsupported entry.
        path: PathBuf,
    },

    /// A directory entry name is not valid UTF-8.
    #[snafu(display("non-UTF-8 entry name under {}", path.display()))]
    NonUtf8Name {
        /// Directory containing the offending entry.
        path: PathBuf,
    },
}

/// A file or directory tree held in memory.
///
/// Directories are ordered maps, so two trees with the same contents have
/// the same structure regardless of construction order. The canonical
/// encoding used by the content store follows from that: byte-identical
/// trees encode to identical bytes and therefore identical content
/// identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileNode {
    /// A single file's byte content.
    File(Vec<u8>),
    /// A directory: ordered mapping of entry name to child node.
    Directory(BTreeMap<String, FileNode>),
}

impl FileNode {
    /// Whether this node is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, FileNode::Directory(_))
    }

    /// Canonical encoding written to the content store.
    pub(crate) fn encode(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_stdvec(self)
    }

    /// Decode a tree from its canonical encoding.
    pub(crate) fn decode(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }

    /// Read a file or directory tree from the local filesystem.
    ///
    /// Symlinks and other special entries are rejected with
    /// [`TreeReadError::Unsupported`]; entry names must be valid UTF-8.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, TreeReadError> {
        let path = path.as_ref();
        let meta = tokio::fs::symlink_metadata(path).await.context(IoSnafu { path })?;

        if meta.is_file() {
            let bytes = tokio::fs::read(path).await.context(IoSnafu { path })?;
            Ok(FileNode::File(bytes))
        } else if meta.is_dir() {
            let mut children = BTreeMap::new();
            let mut entries = tokio::fs::read_dir(path).await.context(IoSnafu { path })?;
            while let Some(entry) = entries.next_entry().await.context(IoSnafu { path })? {
                let name = entry
                    .file_name()
                    .into_string()
                    .map_err(|_| TreeReadError::NonUtf8Name { path: path.to_path_buf() })?;
                let child = Box::pin(Self::from_path(entry.path())).await?;
                children.insert(name, child);
            }
            Ok(FileNode::Directory(children))
        } else {
            Err(TreeReadError::Unsupported { path: path.to_path_buf() })
        }
    }
}
