//! Attendance decision engine.
//!
//! Decides, per recognition result, whether the overlay is all that changes
//! or whether an attendance write must be issued.

use crate::types::{Identity, MatchResult};

/// Minimum confidence for a named match to trigger a write, unless configured otherwise.
pub const DEFAULT_ACTION_THRESHOLD: f32 = 0.85;

/// A qualifying detection: exactly one write is issued for it.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteIntent {
    pub employee_id: i64,
    pub name: String,
    pub confidence: f32,
}

/// Result of [`DecisionEngine::decide`].
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// No face in frame.
    NoFace,
    /// A face that matches no enrolled employee, or a match with no employee id.
    Unauthorized { confidence: f32 },
    /// Named match below the action threshold.
    LowConfidence { name: String, confidence: f32 },
    /// Named match at or above the threshold.
    Write(WriteIntent),
}

impl Decision {
    pub fn is_write(&self) -> bool {
        matches!(self, Decision::Write(_))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DecisionEngine {
    threshold: f32,
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::new(DEFAULT_ACTION_THRESHOLD)
    }
}

impl DecisionEngine {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn decide(&self, m: &MatchResult) -> Decision {
        match m.identity() {
            Identity::NoFace => Decision::NoFace,
            Identity::Unknown => Decision::Unauthorized {
                confidence: m.confidence,
            },
            Identity::Named(name) => {
                // NaN compares false, so it is never actionable.
                let actionable = m.confidence >= self.threshold;
                if !actionable {
                    return Decision::LowConfidence {
                        name: name.to_string(),
                        confidence: m.confidence,
                    };
                }
                match m.employee_id {
                    Some(employee_id) => Decision::Write(WriteIntent {
                        employee_id,
                        name: name.to_string(),
                        confidence: m.confidence,
                    }),
                    None => {
                        tracing::debug!(name, "named match without employee id; not writing");
                        Decision::Unauthorized {
                            confidence: m.confidence,
                        }
                    }
                }
            }
        }
    }
}
