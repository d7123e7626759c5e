//! Translation of internal phase/job progress into the fixed client-facing
//! event vocabulary.
//!
//! Jobs run concurrently but every emission funnels through one translator
//! holding one lock, so the output sink sees a serialized stream. Client
//! renderers key state by section id; no cross-job ordering is promised.

mod events;
mod sink;

pub use events::{ClientEvent, DoneMetadata, Section};
pub use sink::{BufferSink, EventSink, SseSink};

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio::time::Instant;
use tracing::debug;

use crate::model::{InternalProgressEvent, JobStatus};
use crate::reconcile::CostLedger;

/// Static lookup from internal job identifiers to client sections.
///
/// Unrecognized identifiers map to nothing and are dropped silently, so new
/// internal jobs can ship before the client vocabulary learns about them.
fn sections_for(job: &str) -> &'static [Section] {
    match job {
        "discovery" => &[
            Section::IndustryMarket,
            Section::IcpAnalysis,
            Section::OfferAnalysis,
        ],
        "deep-analysis" => &[Section::CompetitorAnalysis],
        "synthesis" => &[Section::CrossAnalysis],
        "competitor-enrichment" => &[Section::CompetitorAnalysis],
        "keyword-intelligence" => &[Section::KeywordIntelligence],
        _ => &[],
    }
}

#[derive(Default)]
struct TranslatorState {
    started: HashSet<Section>,
    completed: HashSet<Section>,
}

pub struct ProgressTranslator {
    sink: Arc<dyn EventSink>,
    ledger: Arc<CostLedger>,
    started_at: Instant,
    state: Mutex<TranslatorState>,
}

impl ProgressTranslator {
    pub fn new(sink: Arc<dyn EventSink>, ledger: Arc<CostLedger>) -> Self {
        Self {
            sink,
            ledger,
            started_at: Instant::now(),
            state: Mutex::new(TranslatorState::default()),
        }
    }

    /// Map one internal event into zero or more client events.
    pub fn handle(&self, event: InternalProgressEvent) {
        let sections = sections_for(&event.job);
        if sections.is_empty() {
            debug!("Dropping progress event for unmapped job '{}'", event.job);
            return;
        }

        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        match event.status {
            JobStatus::Starting => {
                for &section in sections {
                    if state.started.insert(section) {
                        self.send(ClientEvent::section_start(section));
                    }
                }
                let percentage = Self::percentage(state.completed.len());
                self.send(ClientEvent::Progress {
                    percentage,
                    message: event.message.clone(),
                });
            }
            JobStatus::Complete => {
                for &section in sections {
                    if state.completed.insert(section) {
                        self.send(ClientEvent::section_complete(section));
                        self.send(self.metadata_snapshot(state.completed.len()));
                    }
                }
            }
        }
    }

    /// Terminal success event. The full report payload ships here only.
    pub fn emit_done(&self, report: crate::model::StrategyReport) {
        let metadata = DoneMetadata {
            total_time: self.elapsed_ms(),
            total_cost: self.ledger.total(),
        };
        self.send(ClientEvent::Done {
            success: true,
            result: Box::new(report),
            metadata,
        });
    }

    /// Terminal failure event; exactly one per failed stream.
    pub fn emit_error(&self, message: impl Into<String>, code: Option<&str>) {
        self.send(ClientEvent::Error {
            message: message.into(),
            code: code.map(str::to_string),
        });
    }

    pub fn completed_count(&self) -> usize {
        match self.state.lock() {
            Ok(guard) => guard.completed.len(),
            Err(poisoned) => poisoned.into_inner().completed.len(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    fn metadata_snapshot(&self, completed: usize) -> ClientEvent {
        ClientEvent::Metadata {
            elapsed_time: self.elapsed_ms(),
            estimated_cost: self.ledger.total(),
            completed_sections: completed,
            total_sections: Section::TOTAL,
        }
    }

    fn percentage(completed: usize) -> u8 {
        ((completed * 100) as f64 / Section::TOTAL as f64).round() as u8
    }

    fn send(&self, event: ClientEvent) {
        // Disconnected clients stop receiving immediately.
        if self.sink.is_closed() {
            return;
        }
        self.sink.emit(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::InternalProgressEvent;

    fn translator() -> (Arc<BufferSink>, ProgressTranslator) {
        let sink = Arc::new(BufferSink::new());
        let ledger = Arc::new(CostLedger::new());
        let translator = ProgressTranslator::new(sink.clone(), ledger);
        (sink, translator)
    }

    fn completes(events: &[ClientEvent]) -> Vec<Section> {
        events
            .iter()
            .filter_map(|e| match e {
                ClientEvent::SectionComplete { section, .. } => Some(*section),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_discovery_maps_to_three_sections() {
        let (sink, translator) = translator();
        translator.handle(InternalProgressEvent::starting("discovery", "running"));
        translator.handle(InternalProgressEvent::complete("discovery", "done", 100, 0.1));

        let events = sink.events();
        let starts = events
            .iter()
            .filter(|e| matches!(e, ClientEvent::SectionStart { .. }))
            .count();
        assert_eq!(starts, 3);
        assert_eq!(
            completes(&events),
            vec![
                Section::IndustryMarket,
                Section::IcpAnalysis,
                Section::OfferAnalysis
            ]
        );
    }

    #[tokio::test]
    async fn test_section_completes_at_most_once() {
        let (sink, translator) = translator();
        // Deep analysis and competitor enrichment both map to the
        // competitor-analysis section; only the first read completes it.
        translator.handle(InternalProgressEvent::complete("deep-analysis", "a", 1, 0.0));
        translator.handle(InternalProgressEvent::complete(
            "competitor-enrichment",
            "b",
            2,
            0.0,
        ));

        assert_eq!(completes(&sink.events()), vec![Section::CompetitorAnalysis]);
    }

    #[tokio::test]
    async fn test_unmapped_jobs_dropped_silently() {
        let (sink, translator) = translator();
        translator.handle(InternalProgressEvent::starting("seo-audit", "auditing"));
        translator.handle(InternalProgressEvent::complete("hook-extraction", "x", 1, 0.0));
        translator.handle(InternalProgressEvent::starting("brand-voice", "future job"));

        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn test_percentage_monotonic_and_bounded() {
        let (sink, translator) = translator();
        translator.handle(InternalProgressEvent::starting("discovery", "p1"));
        translator.handle(InternalProgressEvent::complete("discovery", "p1", 1, 0.0));
        translator.handle(InternalProgressEvent::starting("deep-analysis", "p2"));
        translator.handle(InternalProgressEvent::complete("deep-analysis", "p2", 2, 0.0));
        translator.handle(InternalProgressEvent::starting("synthesis", "p3"));
        translator.handle(InternalProgressEvent::complete("synthesis", "p3", 3, 0.0));
        translator.handle(InternalProgressEvent::complete(
            "keyword-intelligence",
            "kw",
            4,
            0.0,
        ));

        let mut last = 0u8;
        for event in sink.events() {
            if let ClientEvent::Progress { percentage, .. } = event {
                assert!(percentage <= 100);
                assert!(percentage >= last);
                last = percentage;
            }
        }
        // All six sections completed: three discovery sections plus
        // competitor, cross-analysis and keyword intelligence.
        assert_eq!(translator.completed_count(), 6);
    }

    #[tokio::test]
    async fn test_each_completion_followed_by_metadata() {
        let (sink, translator) = translator();
        translator.handle(InternalProgressEvent::complete("synthesis", "done", 9, 0.3));

        let events = sink.events();
        assert!(matches!(events[0], ClientEvent::SectionComplete { .. }));
        match &events[1] {
            ClientEvent::Metadata {
                completed_sections,
                total_sections,
                ..
            } => {
                assert_eq!(*completed_sections, 1);
                assert_eq!(*total_sections, 6);
            }
            other => panic!("expected metadata, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_closed_sink_suppresses_emissions() {
        let (sink, translator) = translator();
        sink.close();
        translator.handle(InternalProgressEvent::starting("discovery", "running"));
        assert!(sink.events().is_empty());
        // Internal state still advances; reconnect semantics stay coherent.
        translator.handle(InternalProgressEvent::complete("discovery", "done", 1, 0.0));
        assert_eq!(translator.completed_count(), 3);
    }
}
