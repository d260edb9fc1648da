use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON body of `POST /api/classify-text`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TextClaim {
    pub text: String,
}

/// One `(label, score)` pair as returned by the inference service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreEntry {
    pub label: String,
    pub score: f64,
}

/// FastAPI-style error body. Parsed opportunistically from failure
/// responses for diagnostics; never required.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
    pub detail: String,
}

/// Body of the service's `GET /` health endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthStatus {
    pub service: String,
    pub status: String,
}

/// How many detailed-analysis entries a rendered summary shows per category.
/// Truncation is a display contract only; the full sequences stay in the value.
pub const RENDERED_INDICATORS_PER_CATEGORY: usize = 3;

/// The normalized, validated outcome of a successful classification call.
///
/// `prediction` is any non-empty label string; the known domain values
/// ("Greenwashing", "Genuine Sustainability", "Marketing Hype") are not
/// enforced. `confidence` is semantically a probability but is accepted
/// unvalidated. `scores` keeps the service's ordering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassificationResult {
    pub prediction: String,
    pub confidence: f64,
    pub scores: Vec<ScoreEntry>,
    pub detailed_analysis: BTreeMap<String, Vec<ScoreEntry>>,
}

impl ClassificationResult {
    /// Normalize an already-parsed service response.
    ///
    /// `prediction` and `scores` are required; everything else is optional
    /// and unknown fields are ignored. A detailed-analysis category whose
    /// value is not a score sequence is dropped rather than failing the
    /// whole result.
    pub fn from_wire(value: Value) -> Result<Self, &'static str> {
        let object = match value {
            Value::Object(object) => object,
            _ => return Err("response is not a JSON object"),
        };

        let prediction = object
            .get("prediction")
            .and_then(Value::as_str)
            .filter(|p| !p.is_empty())
            .ok_or("prediction field absent or empty")?
            .to_string();

        let scores = object
            .get("scores")
            .cloned()
            .ok_or("scores field absent")?;
        let scores: Vec<ScoreEntry> = serde_json::from_value(scores)
            .map_err(|_| "scores field is not a score sequence")?;

        let confidence = object
            .get("confidence")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);

        let mut detailed_analysis = BTreeMap::new();
        if let Some(Value::Object(categories)) = object.get("detailed_analysis") {
            for (category, entries) in categories {
                match serde_json::from_value::<Vec<ScoreEntry>>(entries.clone()) {
                    Ok(entries) => {
                        detailed_analysis.insert(category.clone(), entries);
                    }
                    // Malformed category: omit from the result instead of
                    // rejecting the response.
                    Err(_) => continue,
                }
            }
        }

        Ok(Self {
            prediction,
            confidence,
            scores,
            detailed_analysis,
        })
    }

    /// Human-readable summary for presentation layers. Shows at most
    /// [`RENDERED_INDICATORS_PER_CATEGORY`] entries per category and skips
    /// categories with no entries.
    pub fn render_summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Prediction: {}", self.prediction);
        let _ = writeln!(out, "Confidence: {:.2}%", self.confidence * 100.0);

        if self.detailed_analysis.values().any(|e| !e.is_empty()) {
            let _ = writeln!(out, "Detailed analysis:");
            for (category, entries) in &self.detailed_analysis {
                if entries.is_empty() {
                    continue;
                }
                let _ = writeln!(out, "  {category}");
                for entry in entries.iter().take(RENDERED_INDICATORS_PER_CATEGORY) {
                    let _ = writeln!(out, "    - {}: {:.1}%", entry.label, entry.score * 100.0);
                }
            }
        }

        out
    }
}
