//! Request-scoped data model shared across the orchestration layer.
//!
//! Everything here lives for exactly one report request: built when the
//! request is accepted, dropped when the response is sent.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub type CompetitorId = String;

/// Inbound request payload: the structured business context.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessContext {
    pub business_name: String,

    pub industry: String,

    pub description: String,

    #[serde(default)]
    pub website: Option<String>,

    #[serde(default)]
    pub target_segment: Option<String>,

    #[serde(default)]
    pub competitors: Vec<CompetitorSeed>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetitorSeed {
    pub name: String,

    #[serde(default)]
    pub website: Option<String>,

    #[serde(default)]
    pub depth: AnalysisDepth,
}

/// Analysis depth requested for a competitor. Bounds enrichment cost:
/// full-tier competitors get the complete data collection pass, summary-tier
/// a lighter one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisDepth {
    #[default]
    Full,
    Summary,
}

/// Immutable per-request input to the pipeline.
#[derive(Debug, Clone)]
pub struct GenerationContext {
    pub request_id: Uuid,
    pub profile_digest: String,
    pub client_domain: Option<String>,
    pub target_segment: Option<String>,
    pub full_tier_names: Vec<String>,
    pub summary_tier_names: Vec<String>,
}

/// One sequential stage of LLM-backed generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseKind {
    Discovery,
    DeepAnalysis,
    Synthesis,
}

impl PhaseKind {
    /// Internal job identifier used in progress events.
    pub fn job_id(&self) -> &'static str {
        match self {
            PhaseKind::Discovery => "discovery",
            PhaseKind::DeepAnalysis => "deep-analysis",
            PhaseKind::Synthesis => "synthesis",
        }
    }
}

impl std::fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.job_id())
    }
}

/// Typed output of one generation phase plus its cost and elapsed time.
#[derive(Debug, Clone)]
pub struct PhaseResult<T> {
    pub output: T,
    pub cost: f64,
    pub elapsed: Duration,
}

/// Output of the discovery phase: industry/ICP/offer narrative plus the
/// initial competitor list, already tier-tagged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryOutput {
    pub industry_overview: String,
    pub icp: String,
    pub offer: String,

    #[serde(default)]
    pub competitors: Vec<CompetitorRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeepAnalysisOutput {
    pub competitor_analysis: String,

    #[serde(default)]
    pub market_gaps: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisOutput {
    pub cross_analysis: String,
    pub positioning: String,

    /// Source-neutral hooks; the fallback pool for diversity remediation.
    #[serde(default)]
    pub generated_hooks: Vec<HookCandidate>,
}

/// Raw competitor/domain payload surfaced to the caller right after the
/// discovery phase so enrichment can be spawned out-of-band.
#[derive(Debug, Clone)]
pub struct DiscoveryPayload {
    pub competitors: Vec<CompetitorRecord>,
    pub client_domain: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Full,
    Summary,
}

impl From<AnalysisDepth> for Tier {
    fn from(depth: AnalysisDepth) -> Self {
        match depth {
            AnalysisDepth::Full => Tier::Full,
            AnalysisDepth::Summary => Tier::Summary,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdCreative {
    pub hook_text: String,
    pub competitor_id: CompetitorId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetitorRecord {
    pub id: CompetitorId,
    pub name: String,
    pub tier: Tier,

    #[serde(default)]
    pub reviews: Option<String>,

    #[serde(default)]
    pub pricing: Option<String>,

    #[serde(default)]
    pub ads: Vec<AdCreative>,
}

/// Result of the competitor-enrichment job. Absence of the whole result is
/// a valid terminal state, not an error; `complete == false` marks a
/// partial success.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentResult {
    pub competitors: Vec<CompetitorRecord>,
    pub cost: f64,
    pub complete: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordEntry {
    pub term: String,

    #[serde(default)]
    pub volume: Option<u64>,

    #[serde(default)]
    pub difficulty: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordIntelligenceResult {
    pub keywords: Vec<KeywordEntry>,
    pub cost: f64,
    pub complete: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeoAuditResult {
    pub summary: String,

    #[serde(default)]
    pub issues: Vec<String>,
    pub cost: f64,
    pub complete: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookExtractionResult {
    pub hooks: Vec<HookCandidate>,
    pub cost: f64,
    pub complete: bool,
}

/// Segment-relevance verdicts: hook texts judged off-segment for the
/// target customer profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentValidationResult {
    pub off_segment: Vec<String>,
    pub cost: f64,
    pub complete: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookProvenance {
    /// Verbatim from a competitor's ad creative.
    Extracted,
    /// Rewritten from ad material, still citing a source competitor.
    Inspired,
    /// Produced by the synthesis phase; carries no source competitor.
    Generated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookCandidate {
    pub text: String,
    pub provenance: HookProvenance,

    #[serde(default)]
    pub competitor_id: Option<CompetitorId>,
}

impl HookCandidate {
    pub fn generated(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            provenance: HookProvenance::Generated,
            competitor_id: None,
        }
    }
}

/// Per-competitor caps plus the aggregate cap on the final hook count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookQuota {
    pub per_competitor: HashMap<CompetitorId, usize>,
    pub cap: usize,
    /// Applied to competitors absent from the distribution tally.
    pub default_per_competitor: usize,
}

impl HookQuota {
    pub fn for_competitor(&self, id: &str) -> usize {
        self.per_competitor
            .get(id)
            .copied()
            .unwrap_or(self.default_per_competitor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub competitor_id: CompetitorId,
    pub excess: usize,
}

/// Independent, best-effort asynchronous jobs. Identifies entries in the
/// cost ledger and the internal progress event vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    CompetitorEnrichment,
    KeywordIntelligence,
    SeoAudit,
    HookExtraction,
    SegmentValidation,
}

impl JobKind {
    pub fn job_id(&self) -> &'static str {
        match self {
            JobKind::CompetitorEnrichment => "competitor-enrichment",
            JobKind::KeywordIntelligence => "keyword-intelligence",
            JobKind::SeoAudit => "seo-audit",
            JobKind::HookExtraction => "hook-extraction",
            JobKind::SegmentValidation => "segment-validation",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.job_id())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Starting,
    Complete,
}

/// Internal phase/job progress event. Side channel for UI messaging only;
/// never influences control flow or ordering.
#[derive(Debug, Clone)]
pub struct InternalProgressEvent {
    pub job: String,
    pub status: JobStatus,
    pub message: String,
    pub elapsed_ms: u64,
    pub cost: f64,
    pub payload: Option<serde_json::Value>,
}

impl InternalProgressEvent {
    pub fn starting(job: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            job: job.into(),
            status: JobStatus::Starting,
            message: message.into(),
            elapsed_ms: 0,
            cost: 0.0,
            payload: None,
        }
    }

    pub fn complete(
        job: impl Into<String>,
        message: impl Into<String>,
        elapsed_ms: u64,
        cost: f64,
    ) -> Self {
        Self {
            job: job.into(),
            status: JobStatus::Complete,
            message: message.into(),
            elapsed_ms,
            cost,
            payload: None,
        }
    }
}

/// Side-channel progress callback threaded through phases and jobs.
pub type ProgressFn = Arc<dyn Fn(InternalProgressEvent) + Send + Sync>;

/// Whether an enrichment's data made it into synthesis inline, arrived
/// during reconciliation, or never arrived at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataTiming {
    Inline,
    Late,
    /// Still in flight when the controller returned; resolved to `Late` or
    /// `Unavailable` by the reconciler.
    Pending,
    Unavailable,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentAvailability {
    pub enriched_competitors: DataTiming,
    pub keyword_intelligence: DataTiming,
    pub seo_audit: DataTiming,
}

impl Default for EnrichmentAvailability {
    fn default() -> Self {
        Self {
            enriched_competitors: DataTiming::Unavailable,
            keyword_intelligence: DataTiming::Unavailable,
            seo_audit: DataTiming::Unavailable,
        }
    }
}

/// The assembled multi-section report returned in the `done` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyReport {
    pub industry_overview: String,
    pub icp_analysis: String,
    pub offer_analysis: String,
    pub competitor_analysis: String,
    pub cross_analysis: String,
    pub competitors: Vec<CompetitorRecord>,

    #[serde(default)]
    pub keyword_intelligence: Option<KeywordIntelligenceResult>,

    #[serde(default)]
    pub seo_audit: Option<SeoAuditResult>,

    pub hooks: Vec<HookCandidate>,
    pub enrichments: EnrichmentAvailability,
}
