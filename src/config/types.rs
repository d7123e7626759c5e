use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::defaults::*;

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,

    /// Single shared deadline bounding how long synthesis waits for each
    /// independent enrichment job.
    #[serde(default = "default_enrichment_deadline_ms")]
    pub enrichment_deadline_ms: u64,

    /// Hard timeout for any single provider subprocess invocation.
    #[serde(default = "default_timeout_sec")]
    pub timeout_sec: u64,

    #[serde(default)]
    pub hooks: HooksConfig,

    #[serde(default)]
    pub generator: GeneratorConfig,

    #[serde(default)]
    pub enrichment: EnrichmentConfig,

    #[serde(default)]
    pub retry: RetryConfig,
}

/// Hook curation knobs feeding the diversity validator.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct HooksConfig {
    /// Aggregate cap on the curated hook list.
    #[serde(default = "default_hook_cap")]
    pub cap: usize,

    /// Hard per-competitor ceiling, independent of ad volume.
    #[serde(default = "default_max_per_competitor")]
    pub max_per_competitor: usize,

    /// Bounded slack added on top of a competitor's proportionate share.
    #[serde(default = "default_quota_slack")]
    pub quota_slack: usize,
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self {
            cap: default_hook_cap(),
            max_per_competitor: default_max_per_competitor(),
            quota_slack: default_quota_slack(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct GeneratorConfig {
    #[serde(default = "default_generator_binary")]
    pub binary: PathBuf,

    #[serde(default = "default_generator_model")]
    pub model: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            binary: default_generator_binary(),
            model: default_generator_model(),
        }
    }
}

/// Commands backing the independent enrichment jobs. A missing command
/// means that job type is not configured and never spawns.
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct EnrichmentConfig {
    #[serde(default)]
    pub competitor_cmd: Option<PathBuf>,

    #[serde(default)]
    pub keyword_cmd: Option<PathBuf>,

    #[serde(default)]
    pub seo_cmd: Option<PathBuf>,

    #[serde(default)]
    pub hook_cmd: Option<PathBuf>,

    #[serde(default)]
    pub segment_cmd: Option<PathBuf>,

    /// Environment variable holding the keyword-intelligence API key.
    #[serde(default = "default_keyword_key_env")]
    pub keyword_api_key_env: String,

    /// Environment variable holding the SEO-audit API key.
    #[serde(default = "default_seo_key_env")]
    pub seo_api_key_env: String,
}

impl EnrichmentConfig {
    /// Keyword intelligence needs both a configured command and credentials.
    pub fn keyword_credentials_present(&self) -> bool {
        self.keyword_cmd.is_some() && std::env::var(&self.keyword_api_key_env).is_ok()
    }

    pub fn seo_credentials_present(&self) -> bool {
        self.seo_cmd.is_some() && std::env::var(&self.seo_api_key_env).is_ok()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}
