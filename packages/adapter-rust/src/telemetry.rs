//! Tracing subscriber bootstrap for binaries and tests embedding the adapter.

use anyhow::Context;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Installs a global subscriber: an [`EnvFilter`] (`RUST_LOG` wins over
/// `default_filter`) and a fmt layer, JSON-formatted when `json` is set.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(default_filter: &str, json: bool) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let registry = tracing_subscriber::registry().with(env_filter);

    if json {
        registry
            .with(fmt::layer().json().with_target(true))
            .try_init()
            .context("installing JSON tracing subscriber")
    } else {
        registry
            .with(fmt::layer().with_target(true))
            .try_init()
            .context("installing tracing subscriber")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_install_reports_an_error() {
        // the first call may lose to another test's subscriber; the second never wins
        let _ = init_tracing("debug", false);
        assert!(init_tracing("debug", true).is_err());
    }
}
