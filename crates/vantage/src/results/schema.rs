//! Canonical result schemas.
//!
//! These are the system's own normalized structures, independent of any
//! provider's native format. Every required section is optional at the
//! serde level so partially valid payloads still deserialize; the
//! `validate` methods check section presence afterwards. The
//! `raw_text` field is populated only by the fallback parse tier and
//! preserves provider output that could not be interpreted.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One sample on the emotion timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionSample {
    pub offset_seconds: f64,
    pub emotion: String,
    pub score: f64,
}

/// Aggregate emotion summary over the whole recording.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmotionSummary {
    #[serde(default)]
    pub dominant_emotion: String,
    #[serde(default)]
    pub mean_scores: BTreeMap<String, f64>,
}

/// Canonical emotion-timeline results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmotionResults {
    /// Provider-side job identifier the timeline belongs to.
    #[serde(default, alias = "job_id")]
    pub provider_job_id: String,
    #[serde(default)]
    pub timeline: Option<Vec<EmotionSample>>,
    #[serde(default)]
    pub summary: Option<EmotionSummary>,
    #[serde(default)]
    pub frame_count: Option<u64>,
    /// Verbatim provider output, kept when parsing fell back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
}

impl EmotionResults {
    /// Required-field presence check: job identifier, timeline,
    /// summary and frame count must all be present.
    pub fn validate(&self) -> bool {
        !self.provider_job_id.is_empty()
            && self.timeline.is_some()
            && self.summary.is_some()
            && self.frame_count.is_some()
    }

    /// Schema-conformant empty record carrying the unparseable output.
    pub fn fallback(provider_job_id: &str, raw: &str) -> Self {
        Self {
            provider_job_id: provider_job_id.to_string(),
            timeline: Some(Vec::new()),
            summary: Some(EmotionSummary::default()),
            frame_count: Some(0),
            raw_text: Some(raw.to_string()),
        }
    }
}

/// One segment of the session timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSegment {
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub activity: String,
}

/// Time attributed to one application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppUsage {
    pub app: String,
    pub seconds: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DistractionAnalysis {
    #[serde(default)]
    pub distraction_events: u32,
    #[serde(default)]
    pub total_distraction_seconds: f64,
    #[serde(default)]
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Insights {
    #[serde(default)]
    pub focus_ratio: f64,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// Canonical video-content results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentResults {
    #[serde(default)]
    pub time_segmentation: Option<Vec<TimeSegment>>,
    #[serde(default)]
    pub app_usage: Option<Vec<AppUsage>>,
    #[serde(default)]
    pub distraction_analysis: Option<DistractionAnalysis>,
    #[serde(default)]
    pub insights: Option<Insights>,
    /// Verbatim provider output, kept when parsing fell back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
}

impl ContentResults {
    /// Required-field presence check: time segmentation, app usage,
    /// distraction analysis and insights must all be present.
    pub fn validate(&self) -> bool {
        self.time_segmentation.is_some()
            && self.app_usage.is_some()
            && self.distraction_analysis.is_some()
            && self.insights.is_some()
    }

    /// Schema-conformant empty record carrying the unparseable output.
    pub fn fallback(raw: &str) -> Self {
        Self {
            time_segmentation: Some(Vec::new()),
            app_usage: Some(Vec::new()),
            distraction_analysis: Some(DistractionAnalysis::default()),
            insights: Some(Insights::default()),
            raw_text: Some(raw.to_string()),
        }
    }
}

/// The canonical results file written once per job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum ResultsDocument {
    Emotion(EmotionResults),
    Content(ContentResults),
}

impl ResultsDocument {
    pub fn validate(&self) -> bool {
        match self {
            ResultsDocument::Emotion(r) => r.validate(),
            ResultsDocument::Content(r) => r.validate(),
        }
    }
}
