//! On-disk repository management.
//!
//! A repository is a directory holding the node identity, the configuration
//! record, and the blob store. Creation is idempotent: the first call at a
//! location initializes it, every later call opens it unchanged. An
//! existing identity or config is never overwritten — a repository's
//! identity must be stable for the node's lifetime.

use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use iroh::EndpointId;
use iroh::SecretKey;
use serde::Deserialize;
use serde::Serialize;
use snafu::Snafu;
use tracing::debug;
use tracing::info;

/// File holding the hex-encoded node secret key.
const IDENTITY_FILE: &str = "identity";

/// File holding the JSON configuration record.
const CONFIG_FILE: &str = "config.json";

/// Directory holding the content-addressed blob store.
const BLOBS_DIR: &str = "blobs";

/// Default identity key size in bits, recorded in the configuration.
pub const DEFAULT_KEY_SIZE: u32 = 2048;

/// Errors from repository initialization and opening.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RepoError {
    /// Creating the repository directory failed for a reason other than
    /// "already exists".
    #[snafu(display("failed to initialize repository at {}: {source}", path.display()))]
    Init {
        /// Repository root that could not be created.
        path: PathBuf,
        /// Underlying filesystem error.
        source: io::Error,
    },

    /// An existing repository location is corrupt or unreadable.
    #[snafu(display("failed to open repository at {}: {message}", path.display()))]
    Open {
        /// Repository root that could not be opened.
        path: PathBuf,
        /// Human-readable description of what was unreadable.
        message: String,
    },
}

/// Relay server usage for the node bound to this repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayChoice {
    /// Use the public relay infrastructure and query the routing layer.
    #[default]
    Default,
    /// No relays, direct transport addresses only.
    Disabled,
}

/// Independent experimental feature toggles, all off by default.
///
/// Each toggle is recorded in the configuration and has no effect on the
/// others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentalFlags {
    pub filestore: bool,
    pub url_store: bool,
    pub directory_sharding: bool,
    pub stream_mounting: bool,
    pub http_proxy: bool,
    pub strategic_providing: bool,
}

impl ExperimentalFlags {
    /// All toggles enabled, for callers that opt into everything at once.
    pub fn all() -> Self {
        Self {
            filestore: true,
            url_store: true,
            directory_sharding: true,
            stream_mounting: true,
            http_proxy: true,
            strategic_providing: true,
        }
    }
}

/// Configuration record written to `config.json` at first initialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoConfig {
    /// Identity key size in bits. Recorded configuration; the substrate
    /// identity itself is a fixed-size Ed25519 key.
    pub key_size: u32,
    /// Relay usage for the node bound to this repository.
    pub relay: RelayChoice,
    /// Experimental feature toggles.
    pub experimental: ExperimentalFlags,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            key_size: DEFAULT_KEY_SIZE,
            relay: RelayChoice::default(),
            experimental: ExperimentalFlags::default(),
        }
    }
}

/// Handle to an opened on-disk repository.
///
/// Holds the root path, the configuration as read from disk, and the node
/// identity. Never destroys its location; cleanup is an external concern.
#[derive(Debug, Clone)]
pub struct Repository {
    root: PathBuf,
    config: RepoConfig,
    secret_key: SecretKey,
}

impl Repository {
    /// Repository root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Configuration record as stored on disk.
    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    /// The node secret key backing this repository's identity.
    pub fn secret_key(&self) -> &SecretKey {
        &self.secret_key
    }

    /// Public identity derived from the secret key.
    pub fn endpoint_id(&self) -> EndpointId {
        self.secret_key.public()
    }

    /// Location of the blob store inside the repository.
    pub fn blobs_dir(&self) -> PathBuf {
        self.root.join(BLOBS_DIR)
    }
}

/// Create the repository at `root` if it does not exist, otherwise open it.
///
/// On first creation the directory is created with broad permissions, a
/// fresh identity is generated and persisted, and `config` is written as
/// the configuration record. On every later call `config` is ignored and
/// the stored identity and configuration are returned unchanged.
///
/// # Errors
///
/// [`RepoError::Init`] when the directory cannot be created for a reason
/// other than already existing; [`RepoError::Open`] when an existing
/// location is corrupt or unreadable.
pub fn ensure_repository(root: &Path, config: RepoConfig) -> Result<Repository, RepoError> {
    match fs::create_dir(root) {
        Ok(()) => init_repository(root, config),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => open_repository(root),
        Err(source) => Err(RepoError::Init { path: root.to_path_buf(), source }),
    }
}

/// Initialize a freshly created repository directory.
fn init_repository(root: &Path, config: RepoConfig) -> Result<Repository, RepoError> {
    // Content inside the repository is world-accessible; only the identity
    // file below is restricted.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(root, fs::Permissions::from_mode(0o777))
            .map_err(|source| RepoError::Init { path: root.to_path_buf(), source })?;
    }

    let secret_key = SecretKey::generate(&mut rand::rng());
    save_secret_key(&secret_key, &root.join(IDENTITY_FILE))
        .map_err(|source| RepoError::Init { path: root.to_path_buf(), source })?;

    let config_json = serde_json::to_string_pretty(&config).map_err(|e| RepoError::Init {
        path: root.to_path_buf(),
        source: io::Error::new(io::ErrorKind::InvalidData, e),
    })?;
    fs::write(root.join(CONFIG_FILE), config_json)
        .map_err(|source| RepoError::Init { path: root.to_path_buf(), source })?;

    fs::create_dir_all(root.join(BLOBS_DIR))
        .map_err(|source| RepoError::Init { path: root.to_path_buf(), source })?;

    info!(
        path = %root.display(),
        endpoint_id = %secret_key.public(),
        key_size = config.key_size,
        "initialized new repository"
    );

    Ok(Repository { root: root.to_path_buf(), config, secret_key })
}

/// Open an existing repository directory as-is.
fn open_repository(root: &Path) -> Result<Repository, RepoError> {
    let open_err = |message: String| RepoError::Open { path: root.to_path_buf(), message };

    let secret_key = load_secret_key(&root.join(IDENTITY_FILE)).map_err(open_err)?;

    let config_json = fs::read_to_string(root.join(CONFIG_FILE))
        .map_err(|e| open_err(format!("failed to read {CONFIG_FILE}: {e}")))?;
    let config: RepoConfig = serde_json::from_str(&config_json)
        .map_err(|e| open_err(format!("failed to parse {CONFIG_FILE}: {e}")))?;

    debug!(path = %root.display(), endpoint_id = %secret_key.public(), "opened existing repository");

    Ok(Repository { root: root.to_path_buf(), config, secret_key })
}

/// Load a secret key from a hex-encoded file.
///
/// File format: 64 hex characters (32 bytes) with optional trailing newline.
fn load_secret_key(path: &Path) -> Result<SecretKey, String> {
    let contents = fs::read_to_string(path)
        .map_err(|e| format!("failed to read identity file {}: {e}", path.display()))?;

    let hex_str = contents.trim();
    if hex_str.len() != 64 {
        return Err(format!("invalid identity file: expected 64 hex characters, got {}", hex_str.len()));
    }

    let mut bytes = [0u8; 32];
    hex::decode_to_slice(hex_str, &mut bytes)
        .map_err(|e| format!("failed to decode identity hex: {e}"))?;

    Ok(SecretKey::from(bytes))
}

/// Save a secret key to a hex-encoded file with restrictive permissions.
fn save_secret_key(key: &SecretKey, path: &Path) -> Result<(), io::Error> {
    let contents = format!("{}\n", hex::encode(key.to_bytes()));

    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)?;
        file.write_all(contents.as_bytes())?;
    }

    #[cfg(not(unix))]
    {
        fs::write(path, contents)?;
    }

    Ok(())
}
