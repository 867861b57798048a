//! Observability for reststores
//!
//! Logging goes through `tracing`. The command line installs one global
//! `fmt` subscriber at startup; library code only emits events.
//!
//! # Usage
//!
//! ```ignore
//! use reststores::observability::init_tracing;
//!
//! // RUST_LOG wins over the configured filter
//! init_tracing("info,tower_http=debug");
//! ```

use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Default filter when neither `RUST_LOG` nor the configuration sets one
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Build the filter: `RUST_LOG` if set and valid, else `fallback`
pub fn env_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Install the global subscriber.
///
/// Returns `false` when a subscriber was already installed (tests, or a
/// second call).
pub fn init_tracing(fallback: &str) -> bool {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter(fallback))
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_fallback_uses_default() {
        let filter = env_filter("info,[[[");
        // A usable filter is always returned
        assert!(!filter.to_string().is_empty());
    }

    #[test]
    fn test_second_init_is_rejected() {
        let _ = init_tracing("warn");
        assert!(!init_tracing("warn"));
    }
}
