//! Tracing setup for hosts embedding a flow session.

use tracing_subscriber::EnvFilter;

/// Install a JSON `tracing` subscriber filtered by `RUST_LOG`, defaulting to
/// `swipeflow=info`. Returns `false` if a global subscriber already exists.
pub fn init_tracing() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "swipeflow=info".into()),
        )
        .json()
        .try_init()
        .is_ok()
}
