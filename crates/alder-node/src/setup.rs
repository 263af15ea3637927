//! Process-wide one-time initialization.
//!
//! The QUIC transport underneath the endpoint resolves its TLS cryptography
//! through the process-wide rustls provider. When more than one provider is
//! linked into the binary, the process must pick one exactly once before
//! any endpoint is built. [`init_process`] performs that registration,
//! guarded so repeated calls are no-ops rather than duplicate
//! registrations.

use std::sync::Once;

static INIT: Once = Once::new();

/// Install the process-wide default crypto provider.
///
/// Invoked by [`crate::Node::start`] before the first endpoint is bound.
/// Safe to call any number of times from any thread; only the first call
/// performs the registration.
pub fn init_process() {
    INIT.call_once(|| {
        // A concurrent install by the embedding application is fine; the
        // provider just has to be set before the first endpoint binds.
        let _ = rustls::crypto::ring::default_provider().install_default();
        tracing::debug!("installed process default crypto provider");
    });
}
