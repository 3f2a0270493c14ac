//! Subscriber setup for watching resolution decisions in tests.
//!
//! The engine emits `debug!` events for setup registration, matches, chaos
//! decisions and ref/out hand-offs, and `trace!` events for every stub it
//! evaluates. Nothing is printed until a subscriber is installed.

use tracing_subscriber::EnvFilter;

/// Default directive when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "doble=debug";

/// Install a test-friendly subscriber filtered by `RUST_LOG`
///
/// Falls back to [`DEFAULT_FILTER`]. Returns `false` when a global subscriber
/// was already installed, so calling it from every test is harmless.
pub fn init_tracing() -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    init_with_filter(filter)
}

/// Install a test-friendly subscriber with an explicit directive
///
/// Invalid directives fall back to [`DEFAULT_FILTER`].
pub fn init_tracing_with(directive: &str) -> bool {
    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    init_with_filter(filter)
}

fn init_with_filter(filter: EnvFilter) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .with_target(true)
        .try_init()
        .is_ok()
}
