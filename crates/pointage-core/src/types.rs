use serde::{Deserialize, Serialize};

/// Best-effort face match returned by the recognition service for one frame.
///
/// `name == None` means no face was found. `name == Some("Unknown")` means a
/// face was found but matched no enrolled employee.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub name: Option<String>,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub employee_id: Option<i64>,
    /// Facial landmarks in source-frame pixel coordinates.
    #[serde(default)]
    pub landmarks: Vec<(f32, f32)>,
}

/// Sentinel name the recognition service uses for an unenrolled face.
pub const UNKNOWN_NAME: &str = "Unknown";

/// How a [`MatchResult`] should be read, independent of its confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity<'a> {
    NoFace,
    Unknown,
    Named(&'a str),
}

impl MatchResult {
    /// The empty result: no face detected. Also what a failed recognition call becomes.
    pub fn no_face() -> Self {
        Self::default()
    }

    pub fn identity(&self) -> Identity<'_> {
        match self.name.as_deref() {
            None | Some("") => Identity::NoFace,
            Some(UNKNOWN_NAME) => Identity::Unknown,
            Some(name) => Identity::Named(name),
        }
    }
}

/// Direction of a committed attendance event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogType {
    Entry,
    Exit,
}

impl LogType {
    /// Type of a write the server has already committed. Anything but
    /// `ENTRY`, including a missing field, reads as an exit.
    pub fn of_committed(raw: Option<&str>) -> Self {
        match raw {
            Some("ENTRY") => Self::Entry,
            _ => Self::Exit,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entry => "ENTRY",
            Self::Exit => "EXIT",
        }
    }
}

/// Named alert sounds. Each qualifying outcome fires at most one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Sound {
    EntrySuccess,
    ExitSuccess,
    AlreadyLogged,
    MinTime,
}

impl Sound {
    /// File name of the clip under the configured sound directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::EntrySuccess => "merci.wav",
            Self::ExitSuccess => "fin.wav",
            Self::AlreadyLogged => "inok.wav",
            Self::MinTime => "mintime.wav",
        }
    }

    pub fn for_log(log_type: LogType) -> Self {
        match log_type {
            LogType::Entry => Self::EntrySuccess,
            LogType::Exit => Self::ExitSuccess,
        }
    }
}

/// Display color as a CSS-style hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Color(pub &'static str);

impl Color {
    pub const RED: Color = Color("#FF0000");
    pub const ORANGE: Color = Color("#FFA500");
    pub const BLUE: Color = Color("#0099FF");
    pub const SUCCESS_GREEN: Color = Color("#10B981");
    pub const ERROR_RED: Color = Color("#EF4444");
    pub const AMBER: Color = Color("#F59E0B");

    pub fn as_hex(&self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// Closed taxonomy of server-side business-rule rejections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BlockReason {
    EntryWindow,
    ExitWindow,
    MinimumDuration,
    ExitAlreadyLogged,
    AlreadyLogged,
    /// Blocked, but the message matched none of the known patterns.
    Unclassified,
}

impl BlockReason {
    /// Operator-facing headline.
    pub fn title(&self) -> &'static str {
        match self {
            Self::EntryWindow => "Heure Entrée Dépassée",
            Self::ExitWindow => "Heure Sortie Dépassée",
            Self::MinimumDuration => "Temps de Travail minimum non achevé",
            Self::ExitAlreadyLogged => "Sortie Déjà Enregistrée",
            Self::AlreadyLogged => "Detection Déjà Effectué",
            Self::Unclassified => "Log Blocked",
        }
    }
}

/// A classified business-rule rejection, ready to render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockInfo {
    pub raw_message: String,
    pub reason: BlockReason,
    pub subtext: String,
    pub color: Color,
    pub sound: Option<Sound>,
}

/// Well-formed result of an attendance write or PIN verification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum AttendanceOutcome {
    Logged {
        log_type: LogType,
        employee_name: Option<String>,
    },
    Blocked(BlockInfo),
    TechnicalError {
        detail: String,
    },
}

/// Title, subtext and color of a resolved outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Feedback {
    pub title: String,
    pub subtext: String,
    pub color: Color,
}

impl AttendanceOutcome {
    /// The alert sound this outcome should trigger, if any.
    pub fn sound(&self) -> Option<Sound> {
        match self {
            Self::Logged { log_type, .. } => Some(Sound::for_log(*log_type)),
            Self::Blocked(info) => info.sound,
            Self::TechnicalError { .. } => None,
        }
    }

    /// Panel feedback copy for this outcome.
    pub fn feedback(&self) -> Feedback {
        match self {
            Self::Logged {
                log_type,
                employee_name,
            } => Feedback {
                title: employee_name.clone().unwrap_or_default(),
                subtext: match log_type {
                    LogType::Entry => "Entrée Enregistrée".to_string(),
                    LogType::Exit => "Sortie Enregistrée".to_string(),
                },
                color: Color::SUCCESS_GREEN,
            },
            Self::Blocked(info) => Feedback {
                title: info.reason.title().to_string(),
                subtext: info.subtext.clone(),
                color: info.color,
            },
            Self::TechnicalError { detail } => {
                let (title, subtext) = match detail.as_str() {
                    "Invalid PIN" => ("PIN Incorrect", "Veuillez réessayer".to_string()),
                    "Employee not found" => ("ID Inconnu", "Employé non trouvé".to_string()),
                    other => ("Erreur", other.to_string()),
                };
                Feedback {
                    title: title.to_string(),
                    subtext,
                    color: Color::ERROR_RED,
                }
            }
        }
    }
}

/// Body of `/log_attendance/` and `/verify-pin/` responses.
///
/// Every field is optional: the classifier decides what a missing field means.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, rename = "type")]
    pub log_type: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}
