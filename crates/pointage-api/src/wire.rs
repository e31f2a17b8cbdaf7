//! Response bodies as the backend sends them.

use pointage_core::MatchResult;
use serde::Deserialize;

/// Body of `POST /recognize/`. A missing `name` means no face.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecognizeResponse {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub employee_id: Option<i64>,
    #[serde(default)]
    pub landmarks: Option<Vec<(f32, f32)>>,
}

impl From<RecognizeResponse> for MatchResult {
    fn from(r: RecognizeResponse) -> Self {
        MatchResult {
            name: r.name,
            confidence: r.confidence.unwrap_or(0.0).clamp(0.0, 1.0),
            employee_id: r.employee_id,
            landmarks: r.landmarks.unwrap_or_default(),
        }
    }
}
