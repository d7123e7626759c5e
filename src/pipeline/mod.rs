//! Strict three-phase sequencing with deadline-bounded data injection.
//!
//! The controller owns phase order and cost accounting. It never holds a
//! reference to enrichment jobs: discovery's raw payload goes out through
//! a callback, and synthesis-time data comes back in through injected
//! providers raced against one shared deadline.

mod generator;

pub use generator::{Generator, SynthesisInputs};

use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{timeout_at, Instant};
use tracing::{info, warn};

use crate::error::GenerationError;
use crate::model::{
    DataTiming, DeepAnalysisOutput, DiscoveryOutput, DiscoveryPayload, EnrichmentAvailability,
    EnrichmentResult, GenerationContext, InternalProgressEvent, JobKind,
    KeywordIntelligenceResult, PhaseKind, PhaseResult, ProgressFn, SeoAuditResult,
    SynthesisOutput,
};
use crate::reconcile::{consume_job, CostLedger};

pub type DataFuture<T> = BoxFuture<'static, Option<T>>;

/// An injected, asynchronous source of enrichment data. Calling it never
/// starts work; it only waits on whatever job the caller wired up.
pub type DataProvider<T> = Box<dyn Fn() -> DataFuture<T> + Send + Sync>;

pub struct DataProviders {
    pub enriched_competitors: DataProvider<EnrichmentResult>,
    pub keyword_intelligence: DataProvider<KeywordIntelligenceResult>,
    pub seo_audit: DataProvider<SeoAuditResult>,
}

impl DataProviders {
    /// Providers that always report "unavailable". Useful when enrichment
    /// is entirely unconfigured.
    pub fn unavailable() -> Self {
        Self {
            enriched_competitors: Box::new(|| Box::pin(async { None })),
            keyword_intelligence: Box::new(|| Box::pin(async { None })),
            seo_audit: Box::new(|| Box::pin(async { None })),
        }
    }
}

/// Per-run wiring handed to the controller by the caller.
pub struct PipelineHooks {
    pub progress: ProgressFn,

    /// Fired once with the raw competitor/domain payload after discovery,
    /// so the caller can spawn enrichment out-of-band.
    pub on_discovery: Box<dyn FnOnce(DiscoveryPayload) + Send>,

    pub providers: DataProviders,
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub discovery: PhaseResult<DiscoveryOutput>,
    pub deep: PhaseResult<DeepAnalysisOutput>,
    pub synthesis: PhaseResult<SynthesisOutput>,
    pub enriched: Option<EnrichmentResult>,
    pub keywords: Option<KeywordIntelligenceResult>,
    pub seo: Option<SeoAuditResult>,
    pub availability: EnrichmentAvailability,
}

pub struct PipelineController {
    generator: Arc<dyn Generator>,
    enrichment_deadline: Duration,
    ledger: Arc<CostLedger>,
}

impl PipelineController {
    pub fn new(
        generator: Arc<dyn Generator>,
        enrichment_deadline: Duration,
        ledger: Arc<CostLedger>,
    ) -> Self {
        Self {
            generator,
            enrichment_deadline,
            ledger,
        }
    }

    /// Run the three generation phases strictly in order.
    ///
    /// Any phase failure aborts the whole pipeline; no partial output is
    /// ever returned for a phase failure. Missing enrichment data is not a
    /// failure: synthesis proceeds with the available subset and the
    /// output is annotated accordingly.
    pub async fn run(
        &self,
        context: &GenerationContext,
        hooks: PipelineHooks,
    ) -> Result<PipelineOutput, GenerationError> {
        let progress = hooks.progress.clone();
        let run_started = Instant::now();

        self.phase_starting(&progress, PhaseKind::Discovery, "Mapping industry, ICP and offer");
        let discovery = self.generator.discovery(context, &progress).await?;
        self.phase_complete(&progress, PhaseKind::Discovery, &run_started, discovery.cost);

        // Hand the raw payload out so enrichment can start now. The
        // controller keeps no reference to whatever gets spawned.
        (hooks.on_discovery)(DiscoveryPayload {
            competitors: discovery.output.competitors.clone(),
            client_domain: context.client_domain.clone(),
        });

        self.phase_starting(&progress, PhaseKind::DeepAnalysis, "Analyzing competitors in depth");
        let deep = self
            .generator
            .deep_analysis(context, &discovery.output, &progress)
            .await?;
        self.phase_complete(&progress, PhaseKind::DeepAnalysis, &run_started, deep.cost);

        // One deadline governs all three providers. Missing it never
        // cancels a job; it only decides whether synthesis sees the data
        // inline or the reconciler collects it later.
        let deadline = Instant::now() + self.enrichment_deadline;
        let elapsed_ms = || run_started.elapsed().as_millis() as u64;

        let (enriched_raced, keywords_raced, seo_raced) = tokio::join!(
            timeout_at(deadline, (hooks.providers.enriched_competitors)()),
            timeout_at(deadline, (hooks.providers.keyword_intelligence)()),
            timeout_at(deadline, (hooks.providers.seo_audit)()),
        );

        let (enriched, enriched_timing) = self.settle(
            enriched_raced.ok(),
            JobKind::CompetitorEnrichment,
            |r: &EnrichmentResult| r.cost,
            &progress,
            elapsed_ms(),
        );
        let (keywords, keywords_timing) = self.settle(
            keywords_raced.ok(),
            JobKind::KeywordIntelligence,
            |r: &KeywordIntelligenceResult| r.cost,
            &progress,
            elapsed_ms(),
        );
        let (seo, seo_timing) = self.settle(
            seo_raced.ok(),
            JobKind::SeoAudit,
            |r: &SeoAuditResult| r.cost,
            &progress,
            elapsed_ms(),
        );

        let availability = EnrichmentAvailability {
            enriched_competitors: enriched_timing,
            keyword_intelligence: keywords_timing,
            seo_audit: seo_timing,
        };

        info!(
            "Synthesis inputs: enrichment {:?}, keywords {:?}, seo {:?}",
            enriched_timing, keywords_timing, seo_timing
        );

        self.phase_starting(&progress, PhaseKind::Synthesis, "Synthesizing cross-analysis");
        let synthesis = self
            .generator
            .synthesis(
                context,
                SynthesisInputs {
                    discovery: &discovery.output,
                    deep: &deep.output,
                    enriched: enriched.as_ref(),
                    keywords: keywords.as_ref(),
                    seo: seo.as_ref(),
                },
                &progress,
            )
            .await?;
        self.phase_complete(&progress, PhaseKind::Synthesis, &run_started, synthesis.cost);

        Ok(PipelineOutput {
            discovery,
            deep,
            synthesis,
            enriched,
            keywords,
            seo,
            availability,
        })
    }

    /// Fold one raced provider outcome into data + timing annotation.
    /// Inline data is consumed here, exactly once across race and
    /// reconciliation.
    fn settle<T>(
        &self,
        raced: Option<Option<T>>,
        kind: JobKind,
        cost: impl Fn(&T) -> f64,
        progress: &ProgressFn,
        elapsed_ms: u64,
    ) -> (Option<T>, DataTiming) {
        match raced {
            Some(Some(value)) => {
                consume_job(
                    &self.ledger,
                    progress,
                    kind,
                    cost(&value),
                    elapsed_ms,
                    "Enrichment data ready for synthesis",
                );
                (Some(value), DataTiming::Inline)
            }
            Some(None) => (None, DataTiming::Unavailable),
            None => {
                warn!("Job {} missed the synthesis deadline; will reconcile later", kind);
                (None, DataTiming::Pending)
            }
        }
    }

    fn phase_starting(&self, progress: &ProgressFn, phase: PhaseKind, message: &str) {
        progress(InternalProgressEvent::starting(phase.job_id(), message));
    }

    fn phase_complete(
        &self,
        progress: &ProgressFn,
        phase: PhaseKind,
        run_started: &Instant,
        cost: f64,
    ) {
        self.ledger.add_phase(cost);
        progress(InternalProgressEvent::complete(
            phase.job_id(),
            format!("Phase {} complete", phase),
            run_started.elapsed().as_millis() as u64,
            cost,
        ));
    }
}
