use async_trait::async_trait;
use std::sync::Arc;

use crate::model::{
    AdCreative, CompetitorRecord, EnrichmentResult, HookCandidate, HookExtractionResult,
    KeywordIntelligenceResult, SegmentValidationResult, SeoAuditResult,
};

/// UI-only message side channel handed to providers. Never influences
/// control flow or ordering.
pub type MessageFn = Arc<dyn Fn(String) + Send + Sync>;

/// Collects competitor reviews, pricing and ad creatives. Full-tier
/// competitors get the complete pass, summary-tier a lighter one.
#[async_trait]
pub trait CompetitorEnricher: Send + Sync {
    async fn run(
        &self,
        competitors: Vec<CompetitorRecord>,
        on_message: MessageFn,
    ) -> Option<EnrichmentResult>;
}

#[async_trait]
pub trait KeywordProvider: Send + Sync {
    async fn run(&self, domain: &str, on_message: MessageFn)
        -> Option<KeywordIntelligenceResult>;
}

#[async_trait]
pub trait SeoAuditor: Send + Sync {
    async fn run(&self, domain: &str, on_message: MessageFn) -> Option<SeoAuditResult>;
}

/// Pulls creative hooks out of collected ad material.
#[async_trait]
pub trait HookExtractor: Send + Sync {
    async fn run(&self, ads: Vec<AdCreative>, on_message: MessageFn)
        -> Option<HookExtractionResult>;
}

/// Judges extracted hooks against the target customer segment. A quality
/// refinement, not a correctness requirement: failures are swallowed.
#[async_trait]
pub trait SegmentJudge: Send + Sync {
    async fn run(
        &self,
        hooks: Vec<HookCandidate>,
        segment: &str,
        on_message: MessageFn,
    ) -> Option<SegmentValidationResult>;
}

/// The injectable provider set. An unset slot means that job type is not
/// configured for this deployment and never spawns.
#[derive(Default, Clone)]
pub struct EnrichmentProviders {
    pub competitors: Option<Arc<dyn CompetitorEnricher>>,
    pub keywords: Option<Arc<dyn KeywordProvider>>,
    pub seo: Option<Arc<dyn SeoAuditor>>,
    pub hooks: Option<Arc<dyn HookExtractor>>,
    pub segment: Option<Arc<dyn SegmentJudge>>,
}
