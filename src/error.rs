use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::model::PhaseKind;

#[allow(dead_code)]
#[derive(Error, Debug)]
pub enum StratgenError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Request error: {0}")]
    Request(#[from] RequestError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Output error: {0}")]
    Output(#[from] OutputError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Rejections of the inbound business-context payload. Always maps to a 400.
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("Missing required field '{0}'")]
    MissingField(&'static str),

    #[error("Invalid field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },
}

impl RequestError {
    pub fn code(&self) -> &'static str {
        "invalid_input"
    }

    pub fn http_status(&self) -> u16 {
        400
    }
}

/// Failures of a generation phase. Any of these aborts the whole pipeline;
/// no partial report is returned for a phase failure.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Phase {phase} timed out after {after:?}")]
    Timeout { phase: PhaseKind, after: Duration },

    #[error("Phase {phase} was rate limited upstream: {message}")]
    RateLimited { phase: PhaseKind, message: String },

    #[error("Phase {phase} rejected: upstream circuit breaker is open")]
    CircuitOpen { phase: PhaseKind },

    #[error("Phase {phase} output failed validation: {reason}")]
    ValidationFailed { phase: PhaseKind, reason: String },

    #[error("Phase {phase} output was not valid structured data: {reason}")]
    Parse { phase: PhaseKind, reason: String },

    #[error("Phase {phase} upstream call failed: {message}")]
    Api { phase: PhaseKind, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GenerationError {
    /// Stable error code carried on the terminal `error` client event.
    pub fn code(&self) -> &'static str {
        match self {
            GenerationError::Timeout { .. } => "timeout",
            GenerationError::RateLimited { .. } => "rate_limited",
            GenerationError::CircuitOpen { .. } => "circuit_open",
            GenerationError::ValidationFailed { .. } => "validation_failed",
            GenerationError::Parse { .. } => "parse_error",
            GenerationError::Api { .. } => "api_error",
            GenerationError::Internal(_) => "internal_error",
        }
    }

    #[allow(dead_code)]
    pub fn http_status(&self) -> u16 {
        match self {
            GenerationError::Timeout { .. } => 504,
            GenerationError::RateLimited { .. } => 429,
            GenerationError::CircuitOpen { .. } => 503,
            GenerationError::ValidationFailed { .. } => 502,
            GenerationError::Parse { .. } => 502,
            GenerationError::Api { .. } => 502,
            GenerationError::Internal(_) => 500,
        }
    }
}

/// Subprocess provider failures. Enrichment callers swallow these into a
/// soft `None`; the generator maps them into `GenerationError`.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Execution timed out after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Process failed with exit code {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },

    #[error("Failed to parse provider output: {0}")]
    Parse(String),
}

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to create output directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Failed to write report: {0}")]
    WriteReport(std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
