//! Content identifiers and store paths.

use std::fmt;
use std::str::FromStr;

use iroh_blobs::Hash;
use snafu::Snafu;

/// A malformed textual content identifier.
#[derive(Debug, Snafu)]
#[snafu(display("invalid content identifier {input:?}: expected 64 hex characters"))]
pub struct ParseContentIdError {
    /// The rejected input.
    pub input: String,
}

/// Content identifier: the BLAKE3 hash of an item's canonical encoding.
///
/// Identical content always produces the same identifier; identifiers are
/// compared only by exact equality. The textual form is 64 lowercase hex
/// characters and round-trips through [`fmt::Display`] and [`FromStr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentId(Hash);

impl ContentId {
    /// The underlying store hash.
    pub fn hash(&self) -> Hash {
        self.0
    }
}

impl From<Hash> for ContentId {
    fn from(hash: Hash) -> Self {
        Self(hash)
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_hex())
    }
}

impl FromStr for ContentId {
    type Err = ParseContentIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 64 {
            return Err(ParseContentIdError { input: s.to_string() });
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| ParseContentIdError { input: s.to_string() })?;
        Ok(Self(Hash::from(bytes)))
    }
}

/// A content identifier paired with the metadata needed to read it back
/// from the store.
///
/// Produced by store-mutating operations ([`crate::Node::add`],
/// [`crate::Node::fetch`]); the identifier it carries is accepted unchanged
/// by [`crate::Node::get`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPath {
    cid: ContentId,
    size: u64,
}

impl ResolvedPath {
    pub(crate) fn new(cid: ContentId, size: u64) -> Self {
        Self { cid, size }
    }

    /// The content identifier.
    pub fn cid(&self) -> &ContentId {
        &self.cid
    }

    /// Size in bytes of the stored canonical encoding.
    pub fn size(&self) -> u64 {
        self.size
    }
}

impl fmt::Display for ResolvedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cid)
    }
}
