use async_trait::async_trait;

use crate::error::GenerationError;
use crate::model::{
    DeepAnalysisOutput, DiscoveryOutput, EnrichmentResult, GenerationContext,
    KeywordIntelligenceResult, PhaseResult, ProgressFn, SeoAuditResult, SynthesisOutput,
};

/// Everything synthesis gets to look at: the two prior phases plus
/// whichever enrichments made the shared deadline.
pub struct SynthesisInputs<'a> {
    pub discovery: &'a DiscoveryOutput,
    pub deep: &'a DeepAnalysisOutput,
    pub enriched: Option<&'a EnrichmentResult>,
    pub keywords: Option<&'a KeywordIntelligenceResult>,
    pub seo: Option<&'a SeoAuditResult>,
}

/// The LLM-backed phase executor. Prompt construction and model invocation
/// live behind this seam; the controller only sequences and accounts.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn discovery(
        &self,
        context: &GenerationContext,
        progress: &ProgressFn,
    ) -> Result<PhaseResult<DiscoveryOutput>, GenerationError>;

    async fn deep_analysis(
        &self,
        context: &GenerationContext,
        discovery: &DiscoveryOutput,
        progress: &ProgressFn,
    ) -> Result<PhaseResult<DeepAnalysisOutput>, GenerationError>;

    async fn synthesis(
        &self,
        context: &GenerationContext,
        inputs: SynthesisInputs<'_>,
        progress: &ProgressFn,
    ) -> Result<PhaseResult<SynthesisOutput>, GenerationError>;
}
