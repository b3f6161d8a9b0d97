//! Process-level initialization for applications embedding the engine.

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, LOG_ENV_VAR};
use crate::error::Result;
use crate::registry::RuleRegistry;

/// Initialize tracing with the INTERPOSE_LOG environment variable.
///
/// Defaults to "info" level if INTERPOSE_LOG is not set.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV_VAR)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build a registry from `config` and load every submitted declaring unit.
pub fn bootstrap_registry(config: &Config) -> Result<RuleRegistry> {
    let registry = RuleRegistry::with_settings(config.registry.clone());
    let rules = registry.load_registered()?;
    info!(
        rules,
        include_patterns = ?config.registry.include_patterns,
        "Rule registry ready"
    );
    Ok(registry)
}
