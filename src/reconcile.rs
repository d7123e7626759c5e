//! Post-pipeline reconciliation: collect whatever the synthesis deadline
//! left behind, merge it exactly once, and finalize cost accounting.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::enrich::JobHandles;
use crate::model::{
    DataTiming, HookExtractionResult, InternalProgressEvent, JobKind, ProgressFn,
    SegmentValidationResult,
};
use crate::pipeline::PipelineOutput;

/// Exactly-once cost accounting for one request.
///
/// Phase costs add unconditionally (phases run strictly in sequence); job
/// costs key on [`JobKind`] so a result read both inline during the race
/// and again during reconciliation counts once. The first successful
/// `record_job` doubles as the job's consumed flag.
pub struct CostLedger {
    phase_cost: Mutex<f64>,
    jobs: Mutex<HashMap<JobKind, f64>>,
}

impl CostLedger {
    pub fn new() -> Self {
        Self {
            phase_cost: Mutex::new(0.0),
            jobs: Mutex::new(HashMap::new()),
        }
    }

    pub fn add_phase(&self, cost: f64) {
        if let Ok(mut total) = self.phase_cost.lock() {
            *total += cost;
        }
    }

    /// Returns true the first time a job's cost is recorded.
    pub fn record_job(&self, kind: JobKind, cost: f64) -> bool {
        match self.jobs.lock() {
            Ok(mut jobs) => {
                if jobs.contains_key(&kind) {
                    false
                } else {
                    jobs.insert(kind, cost);
                    true
                }
            }
            Err(_) => false,
        }
    }

    pub fn job_consumed(&self, kind: JobKind) -> bool {
        self.jobs
            .lock()
            .map(|jobs| jobs.contains_key(&kind))
            .unwrap_or(false)
    }

    pub fn total(&self) -> f64 {
        let phases = self.phase_cost.lock().map(|v| *v).unwrap_or(0.0);
        let jobs: f64 = self
            .jobs
            .lock()
            .map(|jobs| jobs.values().sum())
            .unwrap_or(0.0);
        phases + jobs
    }
}

impl Default for CostLedger {
    fn default() -> Self {
        Self::new()
    }
}

/// Mark a job's result as read. On the first read, records its cost and
/// emits the internal completion event; later reads are no-ops, which is
/// what keeps section-complete from firing twice for one job.
pub fn consume_job(
    ledger: &CostLedger,
    progress: &ProgressFn,
    kind: JobKind,
    cost: f64,
    elapsed_ms: u64,
    message: &str,
) {
    if ledger.record_job(kind, cost) {
        progress(InternalProgressEvent::complete(
            kind.job_id(),
            message,
            elapsed_ms,
            cost,
        ));
    } else {
        debug!("Job {} already consumed; skipping duplicate read", kind);
    }
}

/// Results that only exist after reconciliation: the chained hook
/// extraction and segment validation jobs are never raced by the
/// controller, so they always arrive here.
#[derive(Debug, Default)]
pub struct LateExtras {
    pub hooks: Option<HookExtractionResult>,
    pub segment: Option<SegmentValidationResult>,
}

pub struct ResultReconciler {
    ledger: Arc<CostLedger>,
    progress: ProgressFn,
}

impl ResultReconciler {
    pub fn new(ledger: Arc<CostLedger>, progress: ProgressFn) -> Self {
        Self { ledger, progress }
    }

    /// Await every still-pending job once more and fold late data into the
    /// pipeline output. Settled jobs return their cached value immediately,
    /// so nothing re-runs.
    pub async fn reconcile(&self, jobs: &JobHandles, output: &mut PipelineOutput) -> LateExtras {
        if output.enriched.is_none() {
            if let Some(job) = &jobs.competitors {
                match job.wait().await {
                    Some(result) => {
                        info!("Competitor enrichment arrived after the synthesis deadline");
                        self.consume(JobKind::CompetitorEnrichment, result.cost);
                        output.availability.enriched_competitors = DataTiming::Late;
                        output.enriched = Some(result);
                    }
                    None => output.availability.enriched_competitors = DataTiming::Unavailable,
                }
            }
        }

        if output.keywords.is_none() {
            if let Some(job) = &jobs.keywords {
                match job.wait().await {
                    Some(result) => {
                        info!("Keyword intelligence arrived after the synthesis deadline");
                        self.consume(JobKind::KeywordIntelligence, result.cost);
                        output.availability.keyword_intelligence = DataTiming::Late;
                        output.keywords = Some(result);
                    }
                    None => output.availability.keyword_intelligence = DataTiming::Unavailable,
                }
            }
        }

        if output.seo.is_none() {
            if let Some(job) = &jobs.seo {
                match job.wait().await {
                    Some(result) => {
                        info!("SEO audit arrived after the synthesis deadline");
                        self.consume(JobKind::SeoAudit, result.cost);
                        output.availability.seo_audit = DataTiming::Late;
                        output.seo = Some(result);
                    }
                    None => output.availability.seo_audit = DataTiming::Unavailable,
                }
            }
        }

        let mut extras = LateExtras::default();

        if let Some(job) = &jobs.hooks {
            if let Some(result) = job.wait().await {
                self.consume(JobKind::HookExtraction, result.cost);
                extras.hooks = Some(result);
            }
        }

        if let Some(job) = &jobs.segment {
            if let Some(result) = job.wait().await {
                self.consume(JobKind::SegmentValidation, result.cost);
                extras.segment = Some(result);
            }
        }

        extras
    }

    fn consume(&self, kind: JobKind, cost: f64) {
        consume_job(&self.ledger, &self.progress, kind, cost, 0, "Reconciled late result");
    }
}
