//! Engine configuration

use fabric_state::{Normalizer, DEFAULT_BOOKKEEPING_ATTRIBUTES};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Reconciliation engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Compute changes but never submit them
    pub dry_run: bool,
    /// Bound on each network round trip, in seconds
    pub request_timeout_secs: u64,
    /// Attributes discarded when normalizing controller state
    pub bookkeeping_attributes: Vec<String>,
    /// Ask the controller for configurable properties only on instance reads
    pub config_only_reads: bool,
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With dry-run mode
    #[inline]
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// With per-request timeout
    #[inline]
    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// With additional bookkeeping attributes
    #[must_use]
    pub fn with_bookkeeping<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for attribute in attributes {
            let attribute = attribute.into();
            if !self.bookkeeping_attributes.contains(&attribute) {
                self.bookkeeping_attributes.push(attribute);
            }
        }
        self
    }

    /// With config-only instance reads
    #[inline]
    #[must_use]
    pub fn with_config_only_reads(mut self, enabled: bool) -> Self {
        self.config_only_reads = enabled;
        self
    }

    /// Per-request timeout
    #[inline]
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Normalizer for fetched state
    #[must_use]
    pub fn normalizer(&self) -> Normalizer {
        Normalizer::new(self.bookkeeping_attributes.iter().cloned())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            request_timeout_secs: 30,
            bookkeeping_attributes: DEFAULT_BOOKKEEPING_ATTRIBUTES
                .iter()
                .map(ToString::to_string)
                .collect(),
            config_only_reads: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = EngineConfig::new();
        assert!(!config.dry_run);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert!(config.normalizer().is_ignored("modTs"));
    }

    #[test]
    fn builder_methods() {
        let config = EngineConfig::new()
            .with_dry_run(true)
            .with_timeout_secs(5)
            .with_bookkeeping(["rn", "modTs"]);
        assert!(config.dry_run);
        assert_eq!(config.request_timeout_secs, 5);
        assert_eq!(
            config.bookkeeping_attributes.iter().filter(|a| *a == "modTs").count(),
            1
        );
        assert!(config.normalizer().is_ignored("rn"));
    }

    #[test]
    fn partial_yaml_uses_defaults() {
        let config: EngineConfig = serde_yaml::from_str("dry_run: true\n").unwrap();
        assert!(config.dry_run);
        assert!(config.config_only_reads);
        assert_eq!(config.request_timeout_secs, 30);
    }
}
