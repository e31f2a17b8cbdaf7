use pointage_core::classifier::UNEXPECTED_RESPONSE;
use pointage_core::{classify, AttendanceOutcome, WriteResponse};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server returned {status}: {}", .detail.as_deref().unwrap_or("no detail"))]
    Status { status: u16, detail: Option<String> },
    #[error("could not decode response: {0}")]
    Decode(String),
    #[error("no JPEG frame in stream response")]
    NoFrame,
}

impl ApiError {
    /// Most specific operator-facing detail this error carries.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Status { detail, .. } => detail.as_deref(),
            Self::Decode(_) => Some(UNEXPECTED_RESPONSE),
            Self::Transport(_) | Self::NoFrame => None,
        }
    }
}

/// Fold a write/verify call result into a well-formed outcome.
pub fn outcome_of(result: Result<WriteResponse, ApiError>) -> AttendanceOutcome {
    match result {
        Ok(body) => classify(&body),
        Err(err) => {
            tracing::warn!(error = %err, "attendance request failed");
            AttendanceOutcome::technical(err.detail())
        }
    }
}

/// Extract a string `detail` from an error body (`{"detail": "Invalid PIN"}`).
///
/// Validation errors carry a list instead of a string; those yield `None`.
pub(crate) fn parse_detail(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    value.get("detail")?.as_str().map(str::to_string)
}
