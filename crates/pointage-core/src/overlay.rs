//! Live-overlay model for the camera view.
//!
//! Each completed recognition round trip produces one [`OverlaySnapshot`] that
//! replaces the previous one. Renderers only read snapshots; the pipeline's
//! completion handler is the single writer.

use crate::types::{BlockInfo, BlockReason, Color, LogType};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// What the last round trip concluded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LiveStatus {
    NoFace,
    Unauthorized { confidence: f32 },
    LowConfidence { name: String, confidence: f32 },
    /// Above threshold, but the write produced neither a log nor a block.
    Recognized { name: String, confidence: f32 },
    Logged { name: String, confidence: f32, log_type: LogType },
    Blocked { name: String, confidence: f32, block: BlockInfo },
}

/// Headline shown over the video.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Banner {
    pub color: Color,
    pub title: String,
    pub subtitle: String,
}

impl LiveStatus {
    pub fn confidence(&self) -> Option<f32> {
        match self {
            Self::NoFace => None,
            Self::Unauthorized { confidence }
            | Self::LowConfidence { confidence, .. }
            | Self::Recognized { confidence, .. }
            | Self::Logged { confidence, .. }
            | Self::Blocked { confidence, .. } => Some(*confidence),
        }
    }

    pub fn banner(&self) -> Option<Banner> {
        match self {
            Self::Blocked { block, .. } => Some(Banner {
                color: block.color,
                title: block.reason.title().to_string(),
                subtitle: block.subtext.clone(),
            }),
            Self::Logged { name, .. } => Some(Banner {
                color: Color::SUCCESS_GREEN,
                title: format!("Bienvenue {}", first_name(name)),
                subtitle: "Pointage enregistré".to_string(),
            }),
            Self::LowConfidence { .. } => Some(Banner {
                color: Color::AMBER,
                title: "Confiance Faible".to_string(),
                subtitle: "Approchez-vous".to_string(),
            }),
            Self::Unauthorized { .. } => Some(Banner {
                color: Color::ERROR_RED,
                title: "Visage Inconnu".to_string(),
                subtitle: "Non autorisé".to_string(),
            }),
            Self::NoFace | Self::Recognized { .. } => None,
        }
    }
}

fn first_name(full: &str) -> &str {
    full.split(' ').next().unwrap_or(full)
}

/// Color band of the confidence badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConfidenceBand {
    Poor,
    Fair,
    Near,
    Good,
}

impl ConfidenceBand {
    /// Band a score against fixed cutoffs and the action threshold.
    pub fn of(confidence: f32, threshold: f32) -> Self {
        if confidence < 0.70 {
            Self::Poor
        } else if confidence < 0.80 {
            Self::Fair
        } else if confidence < threshold {
            Self::Near
        } else {
            Self::Good
        }
    }

    pub fn color(&self) -> Color {
        match self {
            Self::Poor => Color::ERROR_RED,
            Self::Fair => Color("#F97316"),
            Self::Near => Color("#3B82F6"),
            Self::Good => Color("#22C55E"),
        }
    }
}

/// Badge text, e.g. `87.5%`.
pub fn format_confidence(confidence: f32) -> String {
    format!("{:.1}%", confidence * 100.0)
}

/// One published overlay state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlaySnapshot {
    pub status: LiveStatus,
    pub landmarks: Vec<(f32, f32)>,
    pub updated_at: DateTime<Utc>,
}

impl Default for OverlaySnapshot {
    fn default() -> Self {
        Self {
            status: LiveStatus::NoFace,
            landmarks: Vec::new(),
            updated_at: Utc::now(),
        }
    }
}

/// De-duplicates blocked-outcome alert sounds across ticks.
///
/// A blocked result stays visible only for its tick, but the same rejection
/// usually repeats on every following tick while the employee stands in
/// frame. The sound fires on the first tick of a run only.
#[derive(Debug, Default)]
pub struct AlertLatch {
    last: Option<(i64, BlockReason)>,
}

impl AlertLatch {
    /// Record this tick's blocked key (`None` for any non-blocked tick).
    /// Returns true when the key starts a new occurrence.
    pub fn observe(&mut self, key: Option<(i64, BlockReason)>) -> bool {
        let fresh = key.is_some() && key != self.last;
        self.last = key;
        fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify_block;

    #[test]
    fn test_blocked_banner_uses_classified_copy() {
        let status = LiveStatus::Blocked {
            name: "Alice".into(),
            confidence: 0.9,
            block: classify_block("Veuillez attendre 30 minutes"),
        };
        let banner = status.banner().unwrap();
        assert_eq!(banner.color, Color::ORANGE);
        assert_eq!(banner.subtitle, "Attendre 30 minutes");
    }

    #[test]
    fn test_logged_banner_first_name() {
        let status = LiveStatus::Logged {
            name: "Alice Martin".into(),
            confidence: 0.93,
            log_type: LogType::Entry,
        };
        assert_eq!(status.banner().unwrap().title, "Bienvenue Alice");
    }

    #[test]
    fn test_no_banner_for_no_face() {
        assert!(LiveStatus::NoFace.banner().is_none());
        assert_eq!(LiveStatus::NoFace.confidence(), None);
    }

    #[test]
    fn test_confidence_bands() {
        assert_eq!(ConfidenceBand::of(0.5, 0.85), ConfidenceBand::Poor);
        assert_eq!(ConfidenceBand::of(0.75, 0.85), ConfidenceBand::Fair);
        assert_eq!(ConfidenceBand::of(0.84, 0.85), ConfidenceBand::Near);
        assert_eq!(ConfidenceBand::of(0.85, 0.85), ConfidenceBand::Good);
    }

    #[test]
    fn test_format_confidence() {
        assert_eq!(format_confidence(0.875), "87.5%");
    }

    #[test]
    fn test_latch_fires_once_per_run() {
        let mut latch = AlertLatch::default();
        let key = Some((7, BlockReason::AlreadyLogged));
        assert!(latch.observe(key));
        assert!(!latch.observe(key));
        assert!(!latch.observe(key));
        assert!(!latch.observe(None));
        assert!(latch.observe(key));
    }

    #[test]
    fn test_latch_new_reason_fires() {
        let mut latch = AlertLatch::default();
        assert!(latch.observe(Some((7, BlockReason::MinimumDuration))));
        assert!(latch.observe(Some((7, BlockReason::AlreadyLogged))));
        assert!(latch.observe(Some((8, BlockReason::AlreadyLogged))));
    }
}
