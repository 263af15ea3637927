//! Writing resolved file trees to local disk.

use std::io;
use std::path::Path;
use std::path::PathBuf;

use snafu::ResultExt;
use snafu::Snafu;
use tracing::info;

use crate::files::FileNode;

/// Errors from writing a file tree to disk.
///
/// Partial output is not rolled back on failure; callers that need
/// all-or-nothing semantics should stage into a temporary location and
/// rename.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum WriteError {
    /// A file or directory could not be written.
    #[snafu(display("failed to write {}: {source}", path.display()))]
    Io {
        /// Path that could not be written.
        path: PathBuf,
        /// Underlying filesystem error.
        source: io::Error,
    },

    /// An existing entry of a different kind occupies the target path.
    /// Never silently overwritten.
    #[snafu(display("existing entry at {} conflicts with the tree being written", path.display()))]
    Conflict {
        /// Path of the conflicting entry.
        path: PathBuf,
    },
}

/// Write a file tree to `dest_dir` under `name`.
///
/// The target is the plain concatenation `dest_dir + name`; callers supply
/// a destination ending in a path separator. Directory nodes are written
/// recursively, preserving structure. Returns the written path.
pub async fn save(dest_dir: &str, tree: &FileNode, name: &str) -> Result<PathBuf, WriteError> {
    let path = PathBuf::from(format!("{dest_dir}{name}"));
    write_node(&path, tree).await?;

    info!(path = %path.display(), "saved content to disk");
    Ok(path)
}

/// Recursively write one node at `path`.
async fn write_node(path: &Path, node: &FileNode) -> Result<(), WriteError> {
    let existing = tokio::fs::symlink_metadata(path).await.ok();

    match node {
        FileNode::File(bytes) => {
            if existing.is_some_and(|m| !m.is_file()) {
                return Err(WriteError::Conflict { path: path.to_path_buf() });
            }
            tokio::fs::write(path, bytes).await.context(IoSnafu { path })?;
        }
        FileNode::Directory(children) => {
            match existing {
                Some(m) if !m.is_dir() => {
                    return Err(WriteError::Conflict { path: path.to_path_buf() });
                }
                Some(_) => {}
                None => tokio::fs::create_dir(path).await.context(IoSnafu { path })?,
            }
            for (name, child) in children {
                Box::pin(write_node(&path.join(name), child)).await?;
            }
        }
    }

    Ok(())
}
