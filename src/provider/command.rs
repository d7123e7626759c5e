//! Subprocess-backed enrichment providers.
//!
//! Each configured job command speaks JSON on stdin/stdout and may write
//! human-readable progress lines to stderr; those lines are forwarded to
//! the job's message channel. Any failure is logged and swallowed into a
//! soft `None` by the trait wrappers.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::time::timeout as tokio_timeout;
use tracing::{debug, warn};

use crate::config::Config;
use crate::enrich::{
    CompetitorEnricher, EnrichmentProviders, HookExtractor, KeywordProvider, MessageFn,
    SegmentJudge, SeoAuditor,
};
use crate::error::ProviderError;
use crate::model::{
    AdCreative, CompetitorRecord, EnrichmentResult, HookCandidate, HookExtractionResult,
    KeywordIntelligenceResult, SegmentValidationResult, SeoAuditResult,
};

pub struct CommandJobRunner {
    program: PathBuf,
    timeout: Duration,
}

impl CommandJobRunner {
    pub fn new(program: PathBuf, timeout: Duration) -> Self {
        Self { program, timeout }
    }

    /// One JSON-in/JSON-out subprocess round trip, streaming stderr lines
    /// into the job's message channel as they arrive.
    pub async fn run<I, O>(&self, input: &I, on_message: &MessageFn) -> Result<O, ProviderError>
    where
        I: Serialize + ?Sized,
        O: DeserializeOwned,
    {
        let payload =
            serde_json::to_vec(input).map_err(|e| ProviderError::Parse(e.to_string()))?;

        let mut cmd = Command::new(&self.program);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(ProviderError::Io)?;

        if let Some(mut stdin) = child.stdin.take() {
            // A command that exits before reading its input still gets to
            // report its own status; a failed write is not fatal here.
            if let Err(e) = stdin.write_all(&payload).await {
                debug!("Failed to write job input: {}", e);
            }
        }

        let stderr = child.stderr.take();
        let captured = Mutex::new(Vec::new());
        let forward_stderr = async {
            if let Some(stderr) = stderr {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let line = line.trim().to_string();
                    if line.is_empty() {
                        continue;
                    }
                    if let Ok(mut captured) = captured.lock() {
                        captured.push(line.clone());
                    }
                    on_message(line);
                }
            }
        };

        let run = async {
            let (output, ()) = tokio::join!(child.wait_with_output(), forward_stderr);
            output
        };
        let output = tokio_timeout(self.timeout, run)
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout))?
            .map_err(ProviderError::Io)?;

        if !output.status.success() {
            let stderr = captured
                .lock()
                .map(|lines| lines.join("\n"))
                .unwrap_or_default();
            return Err(ProviderError::NonZeroExit {
                code: output.status.code().unwrap_or(-1),
                stderr,
            });
        }

        serde_json::from_slice(&output.stdout).map_err(|e| ProviderError::Parse(e.to_string()))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EnrichInput<'a> {
    competitors: &'a [CompetitorRecord],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DomainInput<'a> {
    domain: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExtractInput<'a> {
    ads: &'a [AdCreative],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SegmentInput<'a> {
    hooks: &'a [HookCandidate],
    segment: &'a str,
}

struct CommandEnricher(CommandJobRunner);

#[async_trait]
impl CompetitorEnricher for CommandEnricher {
    async fn run(
        &self,
        competitors: Vec<CompetitorRecord>,
        on_message: MessageFn,
    ) -> Option<EnrichmentResult> {
        let input = EnrichInput {
            competitors: &competitors,
        };
        match self.0.run(&input, &on_message).await {
            Ok(result) => Some(result),
            Err(e) => {
                warn!("Competitor enrichment command failed: {}", e);
                None
            }
        }
    }
}

struct CommandKeywords(CommandJobRunner);

#[async_trait]
impl KeywordProvider for CommandKeywords {
    async fn run(
        &self,
        domain: &str,
        on_message: MessageFn,
    ) -> Option<KeywordIntelligenceResult> {
        match self.0.run(&DomainInput { domain }, &on_message).await {
            Ok(result) => Some(result),
            Err(e) => {
                warn!("Keyword intelligence command failed: {}", e);
                None
            }
        }
    }
}

struct CommandSeo(CommandJobRunner);

#[async_trait]
impl SeoAuditor for CommandSeo {
    async fn run(&self, domain: &str, on_message: MessageFn) -> Option<SeoAuditResult> {
        match self.0.run(&DomainInput { domain }, &on_message).await {
            Ok(result) => Some(result),
            Err(e) => {
                warn!("SEO audit command failed: {}", e);
                None
            }
        }
    }
}

struct CommandExtractor(CommandJobRunner);

#[async_trait]
impl HookExtractor for CommandExtractor {
    async fn run(
        &self,
        ads: Vec<AdCreative>,
        on_message: MessageFn,
    ) -> Option<HookExtractionResult> {
        match self.0.run(&ExtractInput { ads: &ads }, &on_message).await {
            Ok(result) => Some(result),
            Err(e) => {
                warn!("Hook extraction command failed: {}", e);
                None
            }
        }
    }
}

struct CommandJudge(CommandJobRunner);

#[async_trait]
impl SegmentJudge for CommandJudge {
    async fn run(
        &self,
        hooks: Vec<HookCandidate>,
        segment: &str,
        on_message: MessageFn,
    ) -> Option<SegmentValidationResult> {
        let input = SegmentInput {
            hooks: &hooks,
            segment,
        };
        match self.0.run(&input, &on_message).await {
            Ok(result) => Some(result),
            Err(e) => {
                warn!("Segment validation command failed: {}", e);
                None
            }
        }
    }
}

/// Build the provider set from configured job commands. Unconfigured slots
/// stay empty and their jobs never spawn.
pub fn providers_from_config(config: &Config) -> EnrichmentProviders {
    let timeout = Duration::from_secs(config.timeout_sec);
    let runner = |program: &PathBuf| CommandJobRunner::new(program.clone(), timeout);

    EnrichmentProviders {
        competitors: config
            .enrichment
            .competitor_cmd
            .as_ref()
            .map(|p| std::sync::Arc::new(CommandEnricher(runner(p))) as _),
        keywords: config
            .enrichment
            .keyword_cmd
            .as_ref()
            .map(|p| std::sync::Arc::new(CommandKeywords(runner(p))) as _),
        seo: config
            .enrichment
            .seo_cmd
            .as_ref()
            .map(|p| std::sync::Arc::new(CommandSeo(runner(p))) as _),
        hooks: config
            .enrichment
            .hook_cmd
            .as_ref()
            .map(|p| std::sync::Arc::new(CommandExtractor(runner(p))) as _),
        segment: config
            .enrichment
            .segment_cmd
            .as_ref()
            .map(|p| std::sync::Arc::new(CommandJudge(runner(p))) as _),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn silent() -> MessageFn {
        Arc::new(|_| {})
    }

    #[tokio::test]
    async fn test_runner_round_trips_json_through_cat() {
        let runner = CommandJobRunner::new(PathBuf::from("cat"), Duration::from_secs(5));
        let input = json!({"domain": "example.com"});
        let output: Value = runner.run(&input, &silent()).await.unwrap();
        assert_eq!(output, input);
    }

    #[tokio::test]
    async fn test_missing_program_soft_fails_in_wrapper() {
        let enricher = CommandEnricher(CommandJobRunner::new(
            PathBuf::from("/nonexistent/enricher"),
            Duration::from_secs(5),
        ));
        let result = enricher.run(vec![], silent()).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_failing_program_is_an_error() {
        let runner = CommandJobRunner::new(PathBuf::from("false"), Duration::from_secs(5));
        let result: Result<Value, _> = runner.run(&json!({}), &silent()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_non_json_output_is_parse_error() {
        // `echo` ignores stdin and prints a bare string.
        let runner = CommandJobRunner::new(PathBuf::from("echo"), Duration::from_secs(5));
        let result: Result<Value, _> = runner.run(&json!({}), &silent()).await;
        match result {
            Err(ProviderError::Parse(_)) => {}
            other => panic!("expected parse error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_unconfigured_commands_yield_empty_provider_set() {
        let config = Config::default();
        let providers = providers_from_config(&config);
        assert!(providers.competitors.is_none());
        assert!(providers.keywords.is_none());
        assert!(providers.seo.is_none());
        assert!(providers.hooks.is_none());
        assert!(providers.segment.is_none());
    }
}
