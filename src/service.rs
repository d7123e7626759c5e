//! Request orchestration: validate the inbound business context, run the
//! pipeline with enrichment wired in, reconcile late data, curate hooks
//! and emit the terminal client event.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, Instrument};
use uuid::Uuid;

use crate::config::Config;
use crate::diversity::{self, QuotaPolicy};
use crate::enrich::{EnrichmentCoordinator, EnrichmentProviders, JobCredentials};
use crate::error::{RequestError, StratgenError};
use crate::model::{
    AnalysisDepth, BusinessContext, GenerationContext, ProgressFn, StrategyReport,
};
use crate::pipeline::{DataProviders, Generator, PipelineController, PipelineHooks};
use crate::progress::{EventSink, ProgressTranslator};
use crate::race::CancelToken;
use crate::reconcile::{CostLedger, ResultReconciler};

pub struct ReportService {
    config: Config,
    generator: Arc<dyn Generator>,
    providers: EnrichmentProviders,
}

impl ReportService {
    pub fn new(
        config: Config,
        generator: Arc<dyn Generator>,
        providers: EnrichmentProviders,
    ) -> Self {
        Self {
            config,
            generator,
            providers,
        }
    }

    /// Reject malformed requests before any model call is made.
    pub fn validate(request: &BusinessContext) -> Result<GenerationContext, RequestError> {
        if request.business_name.trim().is_empty() {
            return Err(RequestError::MissingField("businessName"));
        }
        if request.industry.trim().is_empty() {
            return Err(RequestError::MissingField("industry"));
        }
        if request.description.trim().is_empty() {
            return Err(RequestError::MissingField("description"));
        }
        for seed in &request.competitors {
            if seed.name.trim().is_empty() {
                return Err(RequestError::InvalidField {
                    field: "competitors",
                    reason: "competitor entries need a non-empty name".to_string(),
                });
            }
        }

        let client_domain = match &request.website {
            Some(website) => parse_domain(website)?,
            None => None,
        };

        let mut full_tier_names = Vec::new();
        let mut summary_tier_names = Vec::new();
        for seed in &request.competitors {
            match seed.depth {
                AnalysisDepth::Full => full_tier_names.push(seed.name.trim().to_string()),
                AnalysisDepth::Summary => summary_tier_names.push(seed.name.trim().to_string()),
            }
        }

        Ok(GenerationContext {
            request_id: Uuid::new_v4(),
            profile_digest: format!(
                "{} / {}",
                request.business_name.trim(),
                request.industry.trim()
            ),
            client_domain,
            target_segment: request
                .target_segment
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            full_tier_names,
            summary_tier_names,
        })
    }

    /// Run one full report generation, streaming progress into `sink`.
    ///
    /// Exactly one terminal event goes out: `done` with the report on
    /// success, `error` otherwise. The report is also returned so callers
    /// can persist it.
    pub async fn generate(
        &self,
        request: BusinessContext,
        sink: Arc<dyn EventSink>,
    ) -> Result<StrategyReport, StratgenError> {
        let ledger = Arc::new(CostLedger::new());
        let translator = Arc::new(ProgressTranslator::new(sink, ledger.clone()));

        let context = match Self::validate(&request) {
            Ok(context) => context,
            Err(err) => {
                translator.emit_error(err.to_string(), Some(err.code()));
                return Err(err.into());
            }
        };

        let span = tracing::info_span!("request", id = %context.request_id);
        self.run_validated(context, translator, ledger)
            .instrument(span)
            .await
    }

    async fn run_validated(
        &self,
        context: GenerationContext,
        translator: Arc<ProgressTranslator>,
        ledger: Arc<CostLedger>,
    ) -> Result<StrategyReport, StratgenError> {
        info!("Generating report for {}", context.profile_digest);

        let progress: ProgressFn = {
            let translator = translator.clone();
            Arc::new(move |event| translator.handle(event))
        };

        let cancel = CancelToken::new();
        let credentials = JobCredentials {
            keyword: self.config.enrichment.keyword_credentials_present(),
            seo: self.config.enrichment.seo_credentials_present(),
        };
        let coordinator = Arc::new(EnrichmentCoordinator::new(
            self.providers.clone(),
            progress.clone(),
            cancel.clone(),
            context.target_segment.clone(),
            credentials,
        ));

        let controller = PipelineController::new(
            self.generator.clone(),
            Duration::from_millis(self.config.enrichment_deadline_ms),
            ledger.clone(),
        );

        let on_discovery = {
            let coordinator = coordinator.clone();
            Box::new(move |payload| coordinator.start(payload))
        };
        let hooks = PipelineHooks {
            progress: progress.clone(),
            on_discovery,
            providers: data_providers(&coordinator),
        };

        let mut output = match controller.run(&context, hooks).await {
            Ok(output) => output,
            Err(err) => {
                error!("Pipeline failed: {}", err);
                // Enrichment jobs that have not reached their provider yet
                // have nothing left to feed; let them wind down.
                cancel.cancel();
                translator.emit_error(err.to_string(), Some(err.code()));
                return Err(err.into());
            }
        };

        let reconciler = ResultReconciler::new(ledger.clone(), progress.clone());
        let extras = reconciler.reconcile(&coordinator.jobs(), &mut output).await;

        // Enriched records supersede the discovery-time competitor list.
        let competitors = output
            .enriched
            .as_ref()
            .map(|e| e.competitors.clone())
            .unwrap_or_else(|| output.discovery.output.competitors.clone());

        let extracted = extras.hooks.map(|h| h.hooks).unwrap_or_default();
        let generated = output.synthesis.output.generated_hooks.clone();
        let curated = diversity::curate(
            extracted,
            generated,
            extras.segment.as_ref(),
            &competitors,
            &QuotaPolicy::from(&self.config.hooks),
        );

        let report = StrategyReport {
            industry_overview: output.discovery.output.industry_overview,
            icp_analysis: output.discovery.output.icp,
            offer_analysis: output.discovery.output.offer,
            competitor_analysis: output.deep.output.competitor_analysis,
            cross_analysis: output.synthesis.output.cross_analysis,
            competitors,
            keyword_intelligence: output.keywords,
            seo_audit: output.seo,
            hooks: curated,
            enrichments: output.availability,
        };

        info!(
            "Report complete: {} hooks, total cost ${:.2}",
            report.hooks.len(),
            ledger.total()
        );
        translator.emit_done(report.clone());
        Ok(report)
    }
}

/// Build controller-facing data providers over the coordinator's job
/// handles. The lookup happens at call time because the jobs only exist
/// once discovery has surfaced its payload.
fn data_providers(coordinator: &Arc<EnrichmentCoordinator>) -> DataProviders {
    let for_competitors = coordinator.clone();
    let for_keywords = coordinator.clone();
    let for_seo = coordinator.clone();
    DataProviders {
        enriched_competitors: Box::new(move || {
            let job = for_competitors.competitor_job();
            Box::pin(async move {
                match job {
                    Some(job) => job.wait().await,
                    None => None,
                }
            })
        }),
        keyword_intelligence: Box::new(move || {
            let job = for_keywords.keyword_job();
            Box::pin(async move {
                match job {
                    Some(job) => job.wait().await,
                    None => None,
                }
            })
        }),
        seo_audit: Box::new(move || {
            let job = for_seo.seo_job();
            Box::pin(async move {
                match job {
                    Some(job) => job.wait().await,
                    None => None,
                }
            })
        }),
    }
}

fn parse_domain(website: &str) -> Result<Option<String>, RequestError> {
    let trimmed = website.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    let host = without_scheme.split('/').next().unwrap_or("");
    let host = host.strip_prefix("www.").unwrap_or(host);
    if host.is_empty() || !host.contains('.') || host.contains(char::is_whitespace) {
        return Err(RequestError::InvalidField {
            field: "website",
            reason: format!("'{}' does not contain a usable domain", website),
        });
    }
    Ok(Some(host.to_lowercase()))
}
