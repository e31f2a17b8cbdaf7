//! Block-reason classifier: maps write responses to [`AttendanceOutcome`].
//!
//! Server rejections arrive as free French text. Known phrasings are matched
//! by substring in a fixed priority order; the first hit wins. Wording the
//! server changes falls through to [`BlockReason::Unclassified`] and keeps the
//! raw message visible.

use crate::types::{AttendanceOutcome, BlockInfo, BlockReason, Color, LogType, Sound, WriteResponse};
use regex::Regex;
use std::sync::OnceLock;

/// Detail shown when a transport failure carries no server detail.
pub const CONNECTION_ERROR: &str = "Erreur de connexion";
/// Detail shown when a 2xx body has an unrecognized status and no detail.
pub const UNKNOWN_ERROR: &str = "Erreur inconnue";
/// Detail shown when a response body could not be decoded at all.
pub const UNEXPECTED_RESPONSE: &str = "Réponse inattendue";

static MINUTES_RE: OnceLock<Regex> = OnceLock::new();

fn minutes_re() -> &'static Regex {
    MINUTES_RE.get_or_init(|| Regex::new(r"(\d+)\s+minutes").expect("minutes regex is valid"))
}

/// Classify a decoded write/verify response body.
pub fn classify(response: &WriteResponse) -> AttendanceOutcome {
    match response.status.as_deref() {
        Some("logged") | Some("verified") => AttendanceOutcome::Logged {
            log_type: LogType::of_committed(response.log_type.as_deref()),
            employee_name: response.name.clone(),
        },
        Some("blocked") => {
            AttendanceOutcome::Blocked(classify_block(response.message.as_deref().unwrap_or("")))
        }
        _ => AttendanceOutcome::TechnicalError {
            detail: response
                .detail
                .clone()
                .unwrap_or_else(|| UNKNOWN_ERROR.to_string()),
        },
    }
}

/// Map a free-text rejection message to its reason, copy, color and sound.
pub fn classify_block(message: &str) -> BlockInfo {
    let lower = message.to_lowercase();
    let info = |reason: BlockReason, subtext: String, color: Color, sound: Option<Sound>| {
        BlockInfo {
            raw_message: message.to_string(),
            reason,
            subtext,
            color,
            sound,
        }
    };

    if message.contains("entrées sont autorisées uniquement entre") {
        info(BlockReason::EntryWindow, "Entrée: 03h00-13h30".into(), Color::RED, None)
    } else if message.contains("sorties sont autorisées uniquement entre") {
        info(BlockReason::ExitWindow, "Sortie: 12h00-23h59".into(), Color::RED, None)
    } else if lower.contains("attendre") && lower.contains("minutes") {
        let subtext = match minutes_re().captures(message) {
            Some(caps) => format!("Attendre {} minutes", &caps[1]),
            None => "Attendre quelques minutes".to_string(),
        };
        info(BlockReason::MinimumDuration, subtext, Color::ORANGE, Some(Sound::MinTime))
    } else if lower.contains("sortie déjà enregistrée") {
        info(
            BlockReason::ExitAlreadyLogged,
            "1 sortie max par jour".into(),
            Color::BLUE,
            Some(Sound::AlreadyLogged),
        )
    } else if lower.contains("déjà enregistré") {
        info(
            BlockReason::AlreadyLogged,
            "1 entrée/sortie max".into(),
            Color::BLUE,
            Some(Sound::AlreadyLogged),
        )
    } else {
        info(BlockReason::Unclassified, message.to_string(), Color::RED, None)
    }
}

impl AttendanceOutcome {
    /// Outcome for a request that produced no classifiable body.
    pub fn technical(detail: Option<&str>) -> Self {
        Self::TechnicalError {
            detail: detail.unwrap_or(CONNECTION_ERROR).to_string(),
        }
    }
}
