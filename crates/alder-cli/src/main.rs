//! Thin demo entry point for the embedded node.
//!
//! Owns the glue the library deliberately does not: flag parsing, the
//! temporary output directory, Ctrl-C wiring, and timing. The sequence is
//! the library's intended composition: ensure repository, start node,
//! connect bootstrap peers, fetch, read back, save to disk.

use std::path::PathBuf;
use std::time::Instant;

use alder_node::ExperimentalFlags;
use alder_node::Node;
use alder_node::RepoConfig;
use alder_node::ensure_repository;
use alder_node::save;
use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "alder", about = "Fetch content-addressed data into a local store and onto disk")]
struct Args {
    /// Content identifier to fetch.
    cid: String,

    /// Repository location, created on first use.
    #[arg(long, default_value = "/tmp/alder-repo")]
    repo: PathBuf,

    /// Output directory; a fresh temporary directory is used when omitted.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Bootstrap peer address, repeatable.
    /// Format: `<endpoint-id>` or `<endpoint-id>@<socket-addr>`.
    #[arg(long = "bootstrap")]
    bootstrap: Vec<String>,

    /// Enable all experimental repository features (first init only).
    #[arg(long)]
    experimental: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let started = Instant::now();

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, cancelling");
            ctrl_c.cancel();
        }
    });

    let config = RepoConfig {
        experimental: if args.experimental {
            ExperimentalFlags::all()
        } else {
            ExperimentalFlags::default()
        },
        ..RepoConfig::default()
    };

    let repo = ensure_repository(&args.repo, config).context("failed to prepare repository")?;
    let node = Node::start(repo).await.context("failed to start node")?;
    info!(endpoint_id = %node.endpoint_id(), "embedded node running");

    node.connect_peers(&cancel, &args.bootstrap)
        .await
        .context("failed to connect to bootstrap peers")?;

    let fetched = node.fetch(&cancel, &args.cid).await.context("failed to fetch content")?;
    let cid = fetched.cid().to_string();
    let tree = node.get(&cancel, &cid).await.context("failed to read content back")?;

    let dest = match &args.out {
        Some(dir) => {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("failed to create output directory {}", dir.display()))?;
            format!("{}/", dir.display())
        }
        None => {
            let dir = tempfile::TempDir::new().context("failed to create temporary output directory")?;
            // The output must outlive the process.
            format!("{}/", dir.keep().display())
        }
    };

    let path = save(&dest, &tree, &cid).await.context("failed to save content to disk")?;
    info!(cid = %cid, path = %path.display(), elapsed = ?started.elapsed(), "content saved");

    node.shutdown().await;
    Ok(())
}
