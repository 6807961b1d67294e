//! Logging setup.
//!
//! `RUST_LOG` overrides the default filter, e.g.
//! `RUST_LOG=lucky_numbers=debug` to see every accepted guess.

use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,tokio_tungstenite=warn,tungstenite=warn";

/// Install the global tracing subscriber.
///
/// Returns an error if a subscriber is already installed.
pub fn init() -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
}
