//! Logging setup.
//!
//! Events go to **stderr**; stdout belongs to the host. Filtering follows
//! `RUST_LOG` and falls back to a default level:
//!
//! ```bash
//! # lifecycle and REST call traces of this provider only
//! RUST_LOG=hemmer_provider_taikun=debug ./provider
//! ```
//!
//! Attribute bags are logged through [`AttributeBag::redacted`], so secrets
//! never reach a subscriber.
//!
//! [`AttributeBag::redacted`]: crate::attributes::AttributeBag::redacted

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Level used when `RUST_LOG` is unset.
pub const DEFAULT_LEVEL: &str = "info";

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn install(default_level: &str) -> Result<(), tracing_subscriber::util::TryInitError> {
    tracing_subscriber::registry()
        .with(filter(default_level))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false),
        )
        .try_init()
}

/// Install the stderr subscriber at `info` unless `RUST_LOG` says otherwise.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default(DEFAULT_LEVEL);
}

/// Like [`init_logging`] with another fallback level.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    if let Err(err) = install(default_level) {
        panic!("failed to install the log subscriber: {}", err);
    }
}

/// Install the subscriber unless one is already set.
///
/// Returns `false` when another subscriber won; handy in tests that share a
/// process.
pub fn try_init_logging() -> bool {
    install(DEFAULT_LEVEL).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_filter_parsing() {
        assert!(EnvFilter::try_new(DEFAULT_LEVEL).is_ok());
        assert!(EnvFilter::try_new("hemmer_provider_taikun=debug").is_ok());
        assert!(EnvFilter::try_new("warn,hemmer_provider_taikun::lifecycle=trace").is_ok());
    }

    #[test]
    fn test_second_install_is_refused() {
        try_init_logging();
        assert!(!try_init_logging());
    }
}
