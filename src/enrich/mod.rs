//! Coordination of the independent, best-effort enrichment jobs.
//!
//! Competitor enrichment starts as soon as discovery yields the tiered
//! competitor list. Keyword intelligence and the SEO audit are gated on
//! preconditions and run in parallel with it, not chained to it. Hook
//! extraction chains strictly off competitor enrichment's settlement, and
//! segment validation off hook extraction's. None of these jobs can fail
//! the request; a failed job settles as a soft `None`.

mod providers;

pub use providers::{
    CompetitorEnricher, EnrichmentProviders, HookExtractor, KeywordProvider, MessageFn,
    SegmentJudge, SeoAuditor,
};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::model::{
    AdCreative, DiscoveryPayload, EnrichmentResult, HookExtractionResult, InternalProgressEvent,
    JobKind, KeywordIntelligenceResult, ProgressFn, SegmentValidationResult, SeoAuditResult,
};
use crate::race::{CancelToken, SharedJob};

/// Snapshot of the request's job handles. Cloning is cheap; every clone
/// observes the same single settlement.
#[derive(Default, Clone)]
pub struct JobHandles {
    pub competitors: Option<SharedJob<EnrichmentResult>>,
    pub keywords: Option<SharedJob<KeywordIntelligenceResult>>,
    pub seo: Option<SharedJob<SeoAuditResult>>,
    pub hooks: Option<SharedJob<HookExtractionResult>>,
    pub segment: Option<SharedJob<SegmentValidationResult>>,
}

/// Preconditions for the domain-gated jobs, resolved once per request.
#[derive(Debug, Clone, Copy, Default)]
pub struct JobCredentials {
    pub keyword: bool,
    pub seo: bool,
}

pub struct EnrichmentCoordinator {
    providers: EnrichmentProviders,
    progress: ProgressFn,
    cancel: CancelToken,
    target_segment: Option<String>,
    credentials: JobCredentials,
    handles: Mutex<JobHandles>,
    started: AtomicBool,
    hooks_chained: AtomicBool,
}

impl EnrichmentCoordinator {
    pub fn new(
        providers: EnrichmentProviders,
        progress: ProgressFn,
        cancel: CancelToken,
        target_segment: Option<String>,
        credentials: JobCredentials,
    ) -> Self {
        Self {
            providers,
            progress,
            cancel,
            target_segment: target_segment.filter(|s| !s.trim().is_empty()),
            credentials,
            handles: Mutex::new(JobHandles::default()),
            started: AtomicBool::new(false),
            hooks_chained: AtomicBool::new(false),
        }
    }

    /// Spawn the independent jobs for this request. Safe to call more than
    /// once; only the first call starts anything.
    pub fn start(&self, payload: DiscoveryPayload) {
        if self.started.swap(true, Ordering::SeqCst) {
            warn!("Enrichment already started for this request; ignoring");
            return;
        }

        let mut handles = self.lock_handles();

        if let Some(provider) = self.providers.competitors.clone() {
            let competitors = payload.competitors.clone();
            info!("Starting competitor enrichment for {} competitors", competitors.len());
            self.emit_starting(JobKind::CompetitorEnrichment, "Collecting competitor data");

            let on_message = self.message_channel(JobKind::CompetitorEnrichment);
            let cancel = self.cancel.clone();
            handles.competitors = Some(SharedJob::spawn(async move {
                if cancel.is_cancelled() {
                    return None;
                }
                provider.run(competitors, on_message).await
            }));
        }

        match payload.client_domain.as_deref().filter(|d| !d.is_empty()) {
            Some(domain) => {
                if self.credentials.keyword {
                    if let Some(provider) = self.providers.keywords.clone() {
                        info!("Starting keyword intelligence for {}", domain);
                        self.emit_starting(
                            JobKind::KeywordIntelligence,
                            "Analyzing search landscape",
                        );

                        let domain = domain.to_string();
                        let on_message = self.message_channel(JobKind::KeywordIntelligence);
                        let cancel = self.cancel.clone();
                        handles.keywords = Some(SharedJob::spawn(async move {
                            if cancel.is_cancelled() {
                                return None;
                            }
                            provider.run(&domain, on_message).await
                        }));
                    }
                } else {
                    debug!("Keyword intelligence skipped: credentials missing");
                }

                if self.credentials.seo {
                    if let Some(provider) = self.providers.seo.clone() {
                        info!("Starting SEO audit for {}", domain);
                        self.emit_starting(JobKind::SeoAudit, "Auditing site health");

                        let domain = domain.to_string();
                        let on_message = self.message_channel(JobKind::SeoAudit);
                        let cancel = self.cancel.clone();
                        handles.seo = Some(SharedJob::spawn(async move {
                            if cancel.is_cancelled() {
                                return None;
                            }
                            provider.run(&domain, on_message).await
                        }));
                    }
                } else {
                    debug!("SEO audit skipped: credentials missing");
                }
            }
            None => debug!("No resolvable client domain; keyword and SEO jobs never spawn"),
        }

        drop(handles);
        self.chain_hook_extraction();
    }

    /// Chain hook extraction off competitor enrichment's settlement.
    ///
    /// This is a `then`, not a deadline-gated wait: extraction begins the
    /// moment ad data exists, even when enrichment itself missed the
    /// synthesis deadline. The guard keeps a second observer of
    /// enrichment's completion from triggering it twice.
    pub fn chain_hook_extraction(&self) {
        if self
            .hooks_chained
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Hook extraction already chained; ignoring duplicate trigger");
            return;
        }

        let mut handles = self.lock_handles();
        let (Some(enrichment), Some(provider)) =
            (handles.competitors.clone(), self.providers.hooks.clone())
        else {
            return;
        };

        let progress = self.progress.clone();
        let on_message = self.message_channel(JobKind::HookExtraction);
        let cancel = self.cancel.clone();
        let hooks_job = SharedJob::spawn(async move {
            let enriched = enrichment.wait().await?;
            let ads: Vec<AdCreative> = enriched
                .competitors
                .iter()
                .flat_map(|c| c.ads.iter().cloned())
                .collect();
            if ads.is_empty() {
                debug!("No ad creatives collected; skipping hook extraction");
                return None;
            }
            if cancel.is_cancelled() {
                return None;
            }
            progress(InternalProgressEvent::starting(
                JobKind::HookExtraction.job_id(),
                "Extracting creative hooks from competitor ads",
            ));
            provider.run(ads, on_message).await
        });
        handles.hooks = Some(hooks_job.clone());

        // Segment validation chains off hook extraction, and only when a
        // target segment was described.
        if let (Some(judge), Some(segment)) =
            (self.providers.segment.clone(), self.target_segment.clone())
        {
            let progress = self.progress.clone();
            let on_message = self.message_channel(JobKind::SegmentValidation);
            let cancel = self.cancel.clone();
            handles.segment = Some(SharedJob::spawn(async move {
                let extracted = hooks_job.wait().await?;
                if extracted.hooks.is_empty() {
                    return None;
                }
                if cancel.is_cancelled() {
                    return None;
                }
                progress(InternalProgressEvent::starting(
                    JobKind::SegmentValidation.job_id(),
                    "Checking hooks against the target segment",
                ));
                judge.run(extracted.hooks, &segment, on_message).await
            }));
        }
    }

    /// Clone of the current job handles, for racing and reconciliation.
    pub fn jobs(&self) -> JobHandles {
        self.lock_handles().clone()
    }

    pub fn competitor_job(&self) -> Option<SharedJob<EnrichmentResult>> {
        self.lock_handles().competitors.clone()
    }

    pub fn keyword_job(&self) -> Option<SharedJob<KeywordIntelligenceResult>> {
        self.lock_handles().keywords.clone()
    }

    pub fn seo_job(&self) -> Option<SharedJob<SeoAuditResult>> {
        self.lock_handles().seo.clone()
    }

    fn lock_handles(&self) -> std::sync::MutexGuard<'_, JobHandles> {
        match self.handles.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn emit_starting(&self, kind: JobKind, message: &str) {
        (self.progress)(InternalProgressEvent::starting(kind.job_id(), message));
    }

    /// Wrap the request progress callback into the provider-facing
    /// message channel for one job.
    fn message_channel(&self, kind: JobKind) -> MessageFn {
        let progress = self.progress.clone();
        Arc::new(move |message: String| {
            progress(InternalProgressEvent::starting(kind.job_id(), message));
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;
    use tokio::time::{sleep, Instant};

    fn competitor(id: &str, tier: Tier, ads: Vec<&str>) -> CompetitorRecord {
        CompetitorRecord {
            id: id.to_string(),
            name: id.to_uppercase(),
            tier,
            reviews: None,
            pricing: None,
            ads: ads
                .into_iter()
                .map(|text| AdCreative {
                    hook_text: text.to_string(),
                    competitor_id: id.to_string(),
                })
                .collect(),
        }
    }

    struct SlowEnricher {
        delay: Duration,
        result: Option<EnrichmentResult>,
    }

    #[async_trait]
    impl CompetitorEnricher for SlowEnricher {
        async fn run(
            &self,
            _competitors: Vec<CompetitorRecord>,
            _on_message: MessageFn,
        ) -> Option<EnrichmentResult> {
            sleep(self.delay).await;
            self.result.clone()
        }
    }

    struct RecordingExtractor {
        started_at: Arc<StdMutex<Option<Instant>>>,
    }

    #[async_trait]
    impl HookExtractor for RecordingExtractor {
        async fn run(
            &self,
            ads: Vec<AdCreative>,
            _on_message: MessageFn,
        ) -> Option<HookExtractionResult> {
            *self.started_at.lock().unwrap() = Some(Instant::now());
            sleep(Duration::from_secs(4)).await;
            Some(HookExtractionResult {
                hooks: ads
                    .iter()
                    .map(|ad| HookCandidate {
                        text: ad.hook_text.clone(),
                        provenance: HookProvenance::Extracted,
                        competitor_id: Some(ad.competitor_id.clone()),
                    })
                    .collect(),
                cost: 0.1,
                complete: true,
            })
        }
    }

    struct StubKeywords;

    #[async_trait]
    impl KeywordProvider for StubKeywords {
        async fn run(
            &self,
            _domain: &str,
            _on_message: MessageFn,
        ) -> Option<KeywordIntelligenceResult> {
            Some(KeywordIntelligenceResult {
                keywords: vec![],
                cost: 0.05,
                complete: true,
            })
        }
    }

    struct StubSeo;

    #[async_trait]
    impl SeoAuditor for StubSeo {
        async fn run(&self, _domain: &str, _on_message: MessageFn) -> Option<SeoAuditResult> {
            Some(SeoAuditResult {
                summary: "ok".into(),
                issues: vec![],
                cost: 0.05,
                complete: true,
            })
        }
    }

    fn noop_progress() -> ProgressFn {
        Arc::new(|_| {})
    }

    fn recording_progress() -> (ProgressFn, Arc<StdMutex<Vec<InternalProgressEvent>>>) {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = seen.clone();
        let progress: ProgressFn = Arc::new(move |ev| sink.lock().unwrap().push(ev));
        (progress, seen)
    }

    fn payload(with_domain: bool) -> DiscoveryPayload {
        DiscoveryPayload {
            competitors: vec![
                competitor("a", Tier::Full, vec!["Save hours weekly"]),
                competitor("b", Tier::Full, vec![]),
                competitor("c", Tier::Summary, vec![]),
            ],
            client_domain: with_domain.then(|| "example.com".to_string()),
        }
    }

    fn enrichment_result() -> EnrichmentResult {
        EnrichmentResult {
            competitors: vec![
                competitor(
                    "a",
                    Tier::Full,
                    vec![
                        "Save hours weekly",
                        "Cut your costs in half",
                        "Teams love us",
                        "Onboard in a day",
                        "The last tool you need",
                    ],
                ),
                competitor("b", Tier::Full, vec!["One dashboard for everything"]),
            ],
            cost: 0.5,
            complete: true,
        }
    }

    fn coordinator(
        providers: EnrichmentProviders,
        progress: ProgressFn,
        segment: Option<&str>,
        credentials: JobCredentials,
    ) -> Arc<EnrichmentCoordinator> {
        Arc::new(EnrichmentCoordinator::new(
            providers,
            progress,
            CancelToken::new(),
            segment.map(str::to_string),
            credentials,
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent() {
        let providers = EnrichmentProviders {
            competitors: Some(Arc::new(SlowEnricher {
                delay: Duration::from_secs(1),
                result: Some(enrichment_result()),
            })),
            ..EnrichmentProviders::default()
        };
        let coord = coordinator(providers, noop_progress(), None, JobCredentials::default());

        coord.start(payload(false));
        let first = coord.competitor_job().unwrap();
        coord.start(payload(false));

        // Second start must not replace the job.
        let second = coord.competitor_job().unwrap();
        assert_eq!(first.wait().await.is_some(), second.wait().await.is_some());
        assert!(first.is_settled() && second.is_settled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_domain_suppresses_gated_jobs() {
        let providers = EnrichmentProviders {
            competitors: Some(Arc::new(SlowEnricher {
                delay: Duration::from_millis(1),
                result: Some(enrichment_result()),
            })),
            keywords: Some(Arc::new(StubKeywords)),
            seo: Some(Arc::new(StubSeo)),
            ..EnrichmentProviders::default()
        };
        let (progress, seen) = recording_progress();
        let coord = coordinator(
            providers,
            progress,
            None,
            JobCredentials { keyword: true, seo: true },
        );

        coord.start(payload(false));
        let jobs = coord.jobs();
        assert!(jobs.keywords.is_none());
        assert!(jobs.seo.is_none());

        // No keyword-intelligence events of any kind were emitted.
        let events = seen.lock().unwrap();
        assert!(events.iter().all(|e| e.job != "keyword-intelligence"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_credentials_suppress_gated_jobs() {
        let providers = EnrichmentProviders {
            keywords: Some(Arc::new(StubKeywords)),
            seo: Some(Arc::new(StubSeo)),
            ..EnrichmentProviders::default()
        };
        let coord = coordinator(
            providers,
            noop_progress(),
            None,
            JobCredentials { keyword: false, seo: false },
        );

        coord.start(payload(true));
        let jobs = coord.jobs();
        assert!(jobs.keywords.is_none());
        assert!(jobs.seo.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hook_extraction_chains_off_enrichment_settlement() {
        let started_at = Arc::new(StdMutex::new(None));
        let providers = EnrichmentProviders {
            competitors: Some(Arc::new(SlowEnricher {
                delay: Duration::from_secs(10),
                result: Some(enrichment_result()),
            })),
            hooks: Some(Arc::new(RecordingExtractor {
                started_at: started_at.clone(),
            })),
            ..EnrichmentProviders::default()
        };
        let coord = coordinator(providers, noop_progress(), None, JobCredentials::default());

        let t0 = Instant::now();
        coord.start(payload(false));
        let hooks = coord.jobs().hooks.expect("hook job chained");
        let result = hooks.wait().await.expect("extraction succeeded");

        // Extraction began when enrichment settled (t=10s), not at any
        // synthesis deadline, and resolved 4s later.
        let began = started_at.lock().unwrap().expect("extractor ran");
        assert_eq!(began.duration_since(t0), Duration::from_secs(10));
        assert_eq!(t0.elapsed(), Duration::from_secs(14));
        assert_eq!(result.hooks.len(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hook_chain_guard_fires_once() {
        let started_at = Arc::new(StdMutex::new(None));
        let providers = EnrichmentProviders {
            competitors: Some(Arc::new(SlowEnricher {
                delay: Duration::from_millis(5),
                result: Some(enrichment_result()),
            })),
            hooks: Some(Arc::new(RecordingExtractor {
                started_at: started_at.clone(),
            })),
            ..EnrichmentProviders::default()
        };
        let coord = coordinator(providers, noop_progress(), None, JobCredentials::default());

        coord.start(payload(false));
        let first = coord.jobs().hooks.unwrap();
        // A second observer reacting to enrichment completion.
        coord.chain_hook_extraction();
        let second = coord.jobs().hooks.unwrap();

        first.wait().await;
        assert!(second.is_settled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_enrichment_soft_fails_the_chain() {
        let providers = EnrichmentProviders {
            competitors: Some(Arc::new(SlowEnricher {
                delay: Duration::from_millis(5),
                result: None,
            })),
            hooks: Some(Arc::new(RecordingExtractor {
                started_at: Arc::new(StdMutex::new(None)),
            })),
            ..EnrichmentProviders::default()
        };
        let coord = coordinator(providers, noop_progress(), None, JobCredentials::default());

        coord.start(payload(false));
        let hooks = coord.jobs().hooks.unwrap();
        assert!(hooks.wait().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_segment_validation_requires_segment_description() {
        struct StubJudge;

        #[async_trait]
        impl SegmentJudge for StubJudge {
            async fn run(
                &self,
                _hooks: Vec<HookCandidate>,
                _segment: &str,
                _on_message: MessageFn,
            ) -> Option<SegmentValidationResult> {
                Some(SegmentValidationResult {
                    off_segment: vec![],
                    cost: 0.01,
                    complete: true,
                })
            }
        }

        let base = || EnrichmentProviders {
            competitors: Some(Arc::new(SlowEnricher {
                delay: Duration::from_millis(1),
                result: Some(enrichment_result()),
            })),
            hooks: Some(Arc::new(RecordingExtractor {
                started_at: Arc::new(StdMutex::new(None)),
            })),
            segment: Some(Arc::new(StubJudge)),
            ..EnrichmentProviders::default()
        };

        let without = coordinator(base(), noop_progress(), None, JobCredentials::default());
        without.start(payload(false));
        assert!(without.jobs().segment.is_none());

        let with = coordinator(
            base(),
            noop_progress(),
            Some("B2B SaaS operations leads"),
            JobCredentials::default(),
        );
        with.start(payload(false));
        let segment_job = with.jobs().segment.expect("segment job chained");
        assert!(segment_job.wait().await.is_some());
    }
}
