use std::path::PathBuf;

pub fn default_version() -> u32 {
    1
}

pub fn default_report_dir() -> PathBuf {
    PathBuf::from("reports")
}

pub fn default_enrichment_deadline_ms() -> u64 {
    60_000
}

pub fn default_timeout_sec() -> u64 {
    300
}

pub fn default_hook_cap() -> usize {
    10
}

pub fn default_max_per_competitor() -> usize {
    3
}

pub fn default_quota_slack() -> usize {
    1
}

pub fn default_generator_binary() -> PathBuf {
    PathBuf::from("claude")
}

pub fn default_generator_model() -> String {
    "sonnet".to_string()
}

pub fn default_keyword_key_env() -> String {
    "STRATGEN_KEYWORD_API_KEY".to_string()
}

pub fn default_seo_key_env() -> String {
    "STRATGEN_SEO_API_KEY".to_string()
}

pub fn default_max_attempts() -> u32 {
    3
}

pub fn default_backoff_base_ms() -> u64 {
    500
}
