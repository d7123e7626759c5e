//! The model CLI generator: each generation phase is one subprocess call
//! to the configured model binary, retried with backoff and parsed into
//! the phase's typed output.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout as tokio_timeout;
use tracing::debug;

use super::json::{extract_json, unwrap_envelope};
use crate::config::{Config, RetryConfig};
use crate::error::{GenerationError, ProviderError};
use crate::model::{
    DeepAnalysisOutput, DiscoveryOutput, GenerationContext, PhaseKind, PhaseResult, ProgressFn,
    SynthesisOutput,
};
use crate::pipeline::{Generator, SynthesisInputs};
use crate::retry::retry_with_backoff;

const DISCOVERY_INSTRUCTIONS: &str = r#"You are a market strategist. Produce a JSON object with these fields:
- industryOverview: a grounded overview of the industry and current market dynamics
- icp: a sharp ideal-customer-profile narrative
- offer: an analysis of the business's offer and how it lands with the ICP
- competitors: an array of {id, name, tier, reviews, pricing, ads} records; id is a kebab-case slug, tier is "full" or "summary" per the provided tiers, leave reviews/pricing null and ads empty

Respond with JSON only."#;

const DEEP_ANALYSIS_INSTRUCTIONS: &str = r#"You are a competitive analyst. Given the discovery output below, produce a JSON object:
- competitorAnalysis: an in-depth narrative covering each competitor's positioning, strengths and weaknesses
- marketGaps: an array of underserved needs no competitor covers well

Respond with JSON only."#;

const SYNTHESIS_INSTRUCTIONS: &str = r#"You are a strategy synthesizer. Using all the material below, produce a JSON object:
- crossAnalysis: a synthesis connecting the market, the ICP, the offer and the competitive field
- positioning: a recommended positioning statement
- generatedHooks: an array of {text, provenance, competitorId} marketing hooks with provenance "generated" and competitorId null

Respond with JSON only."#;

pub struct ModelCliGenerator {
    binary: PathBuf,
    model: String,
    timeout: Duration,
    retry: RetryConfig,
}

impl ModelCliGenerator {
    pub fn new(config: &Config) -> Self {
        Self {
            binary: config.generator.binary.clone(),
            model: config.generator.model.clone(),
            timeout: Duration::from_secs(config.timeout_sec),
            retry: config.retry.clone(),
        }
    }

    async fn invoke(&self, prompt: &str) -> Result<String, ProviderError> {
        // Bare command names go through PATH lookup.
        let binary_str = self.binary.to_string_lossy();
        let mut cmd = if binary_str.contains('/') || binary_str.contains('\\') {
            Command::new(&self.binary)
        } else {
            Command::new(binary_str.as_ref())
        };

        cmd.arg("-p")
            .arg(prompt)
            .arg("--model")
            .arg(&self.model)
            .arg("--output-format")
            .arg("json");

        let output = tokio_timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout))?
            .map_err(ProviderError::Io)?;

        if !output.status.success() {
            return Err(ProviderError::NonZeroExit {
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn run_phase<T: DeserializeOwned>(
        &self,
        phase: PhaseKind,
        prompt: String,
    ) -> Result<PhaseResult<T>, GenerationError> {
        debug!("Invoking {} for phase {} ({} byte prompt)", self.model, phase, prompt.len());
        let started = std::time::Instant::now();

        let raw = retry_with_backoff(&self.retry, || self.invoke(&prompt))
            .await
            .map_err(|e| map_provider_error(phase, e))?;

        let (output, cost) = parse_phase(phase, &raw)?;
        Ok(PhaseResult {
            output,
            cost,
            elapsed: started.elapsed(),
        })
    }
}

/// Decode one phase's raw CLI output into its typed result plus cost.
fn parse_phase<T: DeserializeOwned>(
    phase: PhaseKind,
    raw: &str,
) -> Result<(T, f64), GenerationError> {
    let (content, cost) = unwrap_envelope(raw);
    let json = extract_json(&content).ok_or_else(|| GenerationError::Parse {
        phase,
        reason: "no JSON object in model output".to_string(),
    })?;
    let output = serde_json::from_str(&json).map_err(|e| GenerationError::Parse {
        phase,
        reason: e.to_string(),
    })?;
    Ok((output, cost.unwrap_or(0.0)))
}

fn map_provider_error(phase: PhaseKind, error: ProviderError) -> GenerationError {
    match error {
        ProviderError::Timeout(after) => GenerationError::Timeout { phase, after },
        ProviderError::NonZeroExit { code, stderr } => {
            let lowered = stderr.to_lowercase();
            if lowered.contains("rate limit") || lowered.contains("429") {
                GenerationError::RateLimited {
                    phase,
                    message: stderr,
                }
            } else if lowered.contains("overloaded") || lowered.contains("circuit") {
                GenerationError::CircuitOpen { phase }
            } else {
                GenerationError::Api {
                    phase,
                    message: format!("exit code {}: {}", code, stderr),
                }
            }
        }
        ProviderError::Io(e) => GenerationError::Api {
            phase,
            message: e.to_string(),
        },
        ProviderError::Parse(reason) => GenerationError::Parse { phase, reason },
    }
}

fn non_empty(
    phase: PhaseKind,
    field: &str,
    value: &str,
) -> Result<(), GenerationError> {
    if value.trim().is_empty() {
        return Err(GenerationError::ValidationFailed {
            phase,
            reason: format!("field '{}' is empty", field),
        });
    }
    Ok(())
}

fn business_profile(context: &GenerationContext) -> String {
    format!(
        "## Business Profile\n{}\nWebsite domain: {}\nTarget segment: {}\nCompetitors (full tier): {}\nCompetitors (summary tier): {}",
        context.profile_digest,
        context.client_domain.as_deref().unwrap_or("unknown"),
        context.target_segment.as_deref().unwrap_or("unspecified"),
        context.full_tier_names.join(", "),
        context.summary_tier_names.join(", "),
    )
}

#[async_trait]
impl Generator for ModelCliGenerator {
    async fn discovery(
        &self,
        context: &GenerationContext,
        _progress: &ProgressFn,
    ) -> Result<PhaseResult<DiscoveryOutput>, GenerationError> {
        let phase = PhaseKind::Discovery;
        let prompt = format!("{}\n\n{}", DISCOVERY_INSTRUCTIONS, business_profile(context));

        let result: PhaseResult<DiscoveryOutput> = self.run_phase(phase, prompt).await?;
        non_empty(phase, "industryOverview", &result.output.industry_overview)?;
        non_empty(phase, "icp", &result.output.icp)?;
        non_empty(phase, "offer", &result.output.offer)?;
        Ok(result)
    }

    async fn deep_analysis(
        &self,
        context: &GenerationContext,
        discovery: &DiscoveryOutput,
        _progress: &ProgressFn,
    ) -> Result<PhaseResult<DeepAnalysisOutput>, GenerationError> {
        let phase = PhaseKind::DeepAnalysis;
        let discovery_json =
            serde_json::to_string_pretty(discovery).map_err(|e| GenerationError::Internal(e.to_string()))?;
        let prompt = format!(
            "{}\n\n{}\n\n## Discovery Output\n```json\n{}\n```",
            DEEP_ANALYSIS_INSTRUCTIONS,
            business_profile(context),
            discovery_json,
        );

        let result: PhaseResult<DeepAnalysisOutput> = self.run_phase(phase, prompt).await?;
        non_empty(phase, "competitorAnalysis", &result.output.competitor_analysis)?;
        Ok(result)
    }

    async fn synthesis(
        &self,
        context: &GenerationContext,
        inputs: SynthesisInputs<'_>,
        _progress: &ProgressFn,
    ) -> Result<PhaseResult<SynthesisOutput>, GenerationError> {
        let phase = PhaseKind::Synthesis;
        let mut prompt = format!(
            "{}\n\n{}\n\n## Discovery Output\n```json\n{}\n```\n\n## Deep Analysis\n```json\n{}\n```",
            SYNTHESIS_INSTRUCTIONS,
            business_profile(context),
            serde_json::to_string_pretty(inputs.discovery)
                .map_err(|e| GenerationError::Internal(e.to_string()))?,
            serde_json::to_string_pretty(inputs.deep)
                .map_err(|e| GenerationError::Internal(e.to_string()))?,
        );

        // Whatever enrichment data made the deadline gets appended; the
        // prompt simply has fewer sections otherwise.
        if let Some(enriched) = inputs.enriched {
            if let Ok(json) = serde_json::to_string_pretty(enriched) {
                prompt.push_str(&format!("\n\n## Enriched Competitor Data\n```json\n{}\n```", json));
            }
        }
        if let Some(keywords) = inputs.keywords {
            if let Ok(json) = serde_json::to_string_pretty(keywords) {
                prompt.push_str(&format!("\n\n## Keyword Intelligence\n```json\n{}\n```", json));
            }
        }
        if let Some(seo) = inputs.seo {
            if let Ok(json) = serde_json::to_string_pretty(seo) {
                prompt.push_str(&format!("\n\n## SEO Audit\n```json\n{}\n```", json));
            }
        }

        let result: PhaseResult<SynthesisOutput> = self.run_phase(phase, prompt).await?;
        non_empty(phase, "crossAnalysis", &result.output.cross_analysis)?;
        Ok(result)
    }
}
