use serde::Serialize;

use crate::model::StrategyReport;

/// Client-visible report sections. Closed, fixed set: its cardinality is
/// the percentage denominator for the whole request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Section {
    IndustryMarket,
    IcpAnalysis,
    OfferAnalysis,
    CompetitorAnalysis,
    CrossAnalysis,
    KeywordIntelligence,
}

impl Section {
    pub const ALL: [Section; 6] = [
        Section::IndustryMarket,
        Section::IcpAnalysis,
        Section::OfferAnalysis,
        Section::CompetitorAnalysis,
        Section::CrossAnalysis,
        Section::KeywordIntelligence,
    ];

    pub const TOTAL: usize = Self::ALL.len();

    pub fn label(&self) -> &'static str {
        match self {
            Section::IndustryMarket => "Industry & Market Overview",
            Section::IcpAnalysis => "ICP Analysis",
            Section::OfferAnalysis => "Offer Analysis",
            Section::CompetitorAnalysis => "Competitor Analysis",
            Section::CrossAnalysis => "Cross-Analysis Synthesis",
            Section::KeywordIntelligence => "Keyword Intelligence",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoneMetadata {
    pub total_time: u64,
    pub total_cost: f64,
}

/// The streamed client event vocabulary. One JSON object per event,
/// framed as `event: <type>\ndata: <json>\n\n`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    SectionStart { section: Section, label: String },

    #[serde(rename_all = "camelCase")]
    Progress { percentage: u8, message: String },

    #[serde(rename_all = "camelCase")]
    SectionComplete {
        section: Section,
        label: String,
        /// Always null; payloads ship only in `done`.
        data: serde_json::Value,
    },

    #[serde(rename_all = "camelCase")]
    Metadata {
        elapsed_time: u64,
        estimated_cost: f64,
        completed_sections: usize,
        total_sections: usize,
    },

    #[serde(rename_all = "camelCase")]
    Done {
        success: bool,
        result: Box<StrategyReport>,
        metadata: DoneMetadata,
    },

    #[serde(rename_all = "camelCase")]
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
}

impl ClientEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            ClientEvent::SectionStart { .. } => "section-start",
            ClientEvent::Progress { .. } => "progress",
            ClientEvent::SectionComplete { .. } => "section-complete",
            ClientEvent::Metadata { .. } => "metadata",
            ClientEvent::Done { .. } => "done",
            ClientEvent::Error { .. } => "error",
        }
    }

    pub fn section_start(section: Section) -> Self {
        ClientEvent::SectionStart {
            section,
            label: section.label().to_string(),
        }
    }

    pub fn section_complete(section: Section) -> Self {
        ClientEvent::SectionComplete {
            section,
            label: section.label().to_string(),
            data: serde_json::Value::Null,
        }
    }

    /// Serialize into a single SSE frame.
    pub fn to_sse_frame(&self) -> String {
        let data = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        format!("event: {}\ndata: {}\n\n", self.event_type(), data)
    }
}
