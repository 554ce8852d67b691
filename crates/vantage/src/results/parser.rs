//! Response parsing with graceful degradation.
//!
//! Provider output arrives in three shapes: well-formed JSON, JSON
//! wrapped in prose or markdown fencing, or free text with no structure
//! at all (the model explained instead of answering). Parsing walks the
//! tiers in order and never fails: the last tier constructs a fallback
//! record that preserves the raw output verbatim.

use serde::de::DeserializeOwned;

use super::schema::{ContentResults, EmotionResults};

/// Which tier produced the canonical record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseTier {
    /// Direct strict parse of the whole payload.
    Strict,
    /// Strict parse succeeded after stripping wrapping text/fences.
    FenceStripped,
    /// No structure found; schema-conformant empty record with the
    /// original text preserved.
    Fallback,
}

impl ParseTier {
    /// Whether the payload itself was usable structured data.
    pub fn is_usable(&self) -> bool {
        !matches!(self, ParseTier::Fallback)
    }
}

/// A canonical record plus the tier that produced it.
#[derive(Debug, Clone)]
pub struct Parsed<T> {
    pub record: T,
    pub tier: ParseTier,
}

/// Extracts the first balanced JSON object from the response, tracking
/// string boundaries and escape sequences so braces inside strings do
/// not confuse the scan. Returns the input unchanged when no object
/// start is found.
fn extract_json(response: &str) -> &str {
    let start = match response.find('{') {
        Some(idx) => idx,
        None => return response,
    };

    let mut depth = 0;
    let mut in_string = false;
    let mut escape_next = false;
    let mut end = response.len();

    for (i, c) in response[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match c {
            '\\' if in_string => {
                escape_next = true;
            }
            '"' => {
                in_string = !in_string;
            }
            '{' if !in_string => {
                depth += 1;
            }
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    end = start + i + 1;
                    break;
                }
            }
            _ => {}
        }
    }

    &response[start..end]
}

/// Runs the first two tiers; `None` means the caller should fall back.
fn parse_structured<T: DeserializeOwned>(raw: &str) -> Option<(T, ParseTier)> {
    if let Ok(record) = serde_json::from_str::<T>(raw.trim()) {
        return Some((record, ParseTier::Strict));
    }

    let extracted = extract_json(raw);
    match serde_json::from_str::<T>(extracted) {
        Ok(record) => Some((record, ParseTier::FenceStripped)),
        Err(e) => {
            log::debug!("Structured parse failed after extraction: {}", e);
            None
        }
    }
}

/// Parses a content provider payload into the canonical schema.
pub fn parse_content(raw: &str) -> Parsed<ContentResults> {
    match parse_structured::<ContentResults>(raw) {
        Some((record, tier)) => Parsed { record, tier },
        None => {
            log::warn!("Content payload had no usable structure, storing fallback record");
            Parsed {
                record: ContentResults::fallback(raw),
                tier: ParseTier::Fallback,
            }
        }
    }
}

/// Parses an emotion provider payload into the canonical schema.
/// `provider_job_id` fills the job identifier when the payload omits it
/// (and is what the fallback record carries).
pub fn parse_emotion(raw: &str, provider_job_id: &str) -> Parsed<EmotionResults> {
    match parse_structured::<EmotionResults>(raw) {
        Some((mut record, tier)) => {
            if record.provider_job_id.is_empty() {
                record.provider_job_id = provider_job_id.to_string();
            }
            Parsed { record, tier }
        }
        None => {
            log::warn!("Emotion payload had no usable structure, storing fallback record");
            Parsed {
                record: EmotionResults::fallback(provider_job_id, raw),
                tier: ParseTier::Fallback,
            }
        }
    }
}
