mod defaults;
mod types;

pub use types::*;

use crate::error::ConfigError;
use defaults::*;
use std::path::Path;

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            report_dir: default_report_dir(),
            enrichment_deadline_ms: default_enrichment_deadline_ms(),
            timeout_sec: default_timeout_sec(),
            hooks: HooksConfig::default(),
            generator: GeneratorConfig::default(),
            enrichment: EnrichmentConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl Config {
    /// Load config from a YAML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Validate the config
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hooks.cap == 0 {
            return Err(ConfigError::Invalid("hooks.cap must be at least 1".into()));
        }

        if self.hooks.max_per_competitor == 0 {
            return Err(ConfigError::Invalid(
                "hooks.max_per_competitor must be at least 1".into(),
            ));
        }

        if self.enrichment_deadline_ms == 0 {
            return Err(ConfigError::Invalid(
                "enrichment_deadline_ms must be positive".into(),
            ));
        }

        if self.generator.model.is_empty() {
            return Err(ConfigError::Invalid("generator.model must be set".into()));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be at least 1".into(),
            ));
        }

        Ok(())
    }
}
