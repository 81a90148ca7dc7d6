//! Shared plumbing for the `tablecopy` and `fill-table` binaries.

pub mod aws;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initializes structured logging. Log levels are configurable through the
/// `RUST_LOG` environment variable; `default_directive` applies otherwise.
pub fn init_tracing(default_directive: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
