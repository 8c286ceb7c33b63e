//! Tracing setup for programs that drive achievements.
//!
//! The engine itself only emits `tracing` events through the dispatch owned by
//! each [`Session`](crate::session::Session). This module builds the stderr
//! subscriber, either as a dispatch to hand to one session or installed
//! globally.

use tracing::{Dispatch, Subscriber};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Reads `RUST_LOG` env var. Defaults to `info` if unset, which shows attempts,
/// symptoms, causes and consistency warnings.
/// Output: stderr, compact format.
fn subscriber() -> impl Subscriber + Send + Sync {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
}

/// Build a dispatch for [`Session::with_dispatch`](crate::session::Session::with_dispatch).
pub fn dispatch() -> Dispatch {
    Dispatch::new(subscriber())
}

/// Install the subscriber as the global default.
///
/// # Example
/// ```bash
/// RUST_LOG=unravel=debug ./setup-toolchain
/// ```
pub fn init() {
    subscriber().init();
}
