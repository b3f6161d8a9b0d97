//! Programmatic proxy construction.

use std::sync::Arc;

use tracing::info;

use super::{ProxyConfig, ProxyHandle, Strategy};
use crate::advice::Advice;
use crate::config::ProxySettings;
use crate::error::{AopError, Result};
use crate::pointcut::Pointcut;
use crate::rule::Rule;
use crate::target::{SingletonTargetSource, Target, TargetSource};

/// Builds a [`ProxyHandle`] from a target and a list of rules.
///
/// Rules run in the order they are added. Rules obtained from a
/// [`ChainResolver`](crate::resolver::ChainResolver) are already ordered.
pub struct ProxyFactory {
    source: Arc<dyn TargetSource>,
    rules: Vec<Arc<Rule>>,
    settings: ProxySettings,
    error: Option<AopError>,
}

impl ProxyFactory {
    /// Proxy a single shared target.
    pub fn new(target: Arc<dyn Target>) -> Self {
        Self::with_source(Arc::new(SingletonTargetSource::new(target)))
    }

    /// Proxy whatever `source` supplies on each call.
    pub fn with_source(source: Arc<dyn TargetSource>) -> Self {
        Self {
            source,
            rules: Vec::new(),
            settings: ProxySettings::default(),
            error: None,
        }
    }

    pub fn rule(mut self, rule: Arc<Rule>) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(mut self, rules: impl IntoIterator<Item = Arc<Rule>>) -> Self {
        self.rules.extend(rules);
        self
    }

    /// Add a behavior that applies to every method.
    pub fn advice(mut self, advice: Advice) -> Self {
        let name = format!("{}#{}", advice.kind(), self.rules.len());
        match Rule::builder(name, advice).pointcut(Pointcut::always()).build() {
            Ok(rule) => self.rules.push(Arc::new(rule)),
            Err(e) => {
                self.error.get_or_insert(e);
            }
        }
        self
    }

    pub fn settings(mut self, settings: ProxySettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn proxy_target_class(mut self, enabled: bool) -> Self {
        self.settings.proxy_target_class = enabled;
        self
    }

    pub fn expose_proxy(mut self, enabled: bool) -> Self {
        self.settings.expose_proxy = enabled;
        self
    }

    pub fn frozen(mut self, enabled: bool) -> Self {
        self.settings.frozen = enabled;
        self
    }

    pub fn opaque(mut self, enabled: bool) -> Self {
        self.settings.opaque = enabled;
        self
    }

    /// Build the proxy. Fails with the first error met while adding
    /// behaviors, or when the class cannot be proxied with the requested
    /// strategy, or when introductions are invalid.
    pub fn build(self) -> Result<ProxyHandle> {
        if let Some(e) = self.error {
            return Err(e);
        }

        let class = self.source.target_class().clone();
        let strategy = Strategy::select(&class, &self.settings)?;
        let rules = self.rules.len();
        let config = ProxyConfig::new(self.source, self.settings, self.rules)?;
        let proxy = ProxyHandle::new(config, strategy);

        info!(
            proxy.id = %proxy.id(),
            class = %class.name(),
            strategy = %strategy,
            rules,
            "Created proxy"
        );
        Ok(proxy)
    }
}
