use pointage_core::DEFAULT_ACTION_THRESHOLD;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("unknown profile {0:?} (expected \"kiosk\" or \"dashboard\")")]
    UnknownProfile(String),
    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Deployment profile. Picks the sampling defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Entrance kiosk: fast sampling on the clean (un-annotated) stream.
    Kiosk,
    /// Supervisor live view: slower sampling, higher quality, annotated stream.
    Dashboard,
}

impl Profile {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "kiosk" => Ok(Self::Kiosk),
            "dashboard" => Ok(Self::Dashboard),
            _ => Err(ConfigError::UnknownProfile(raw.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kiosk => "kiosk",
            Self::Dashboard => "dashboard",
        }
    }

    fn sample_period_ms(&self) -> u64 {
        match self {
            Self::Kiosk => 500,
            Self::Dashboard => 2000,
        }
    }

    fn jpeg_quality(&self) -> u8 {
        match self {
            Self::Kiosk => 75,
            Self::Dashboard => 95,
        }
    }

    fn clean_stream(&self) -> bool {
        matches!(self, Self::Kiosk)
    }
}

/// Daemon configuration: profile defaults, then the TOML file named by
/// `POINTAGE_CONFIG`, then `POINTAGE_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub profile: Profile,
    /// API base URL, e.g. `http://localhost:8000/api`.
    pub api_base: String,
    /// Per-request transport timeout.
    pub request_timeout_secs: u64,
    /// Minimum confidence for a named match to trigger an attendance write.
    pub action_threshold: f32,
    pub sample_period_ms: u64,
    /// JPEG quality (1-100) of frames sent for recognition.
    pub jpeg_quality: u8,
    /// Delay before a resolved PIN panel returns to idle.
    pub reset_delay_ms: u64,
    /// V4L2 device of the front (user-facing) camera.
    pub front_camera: String,
    /// V4L2 device of the rear camera, if the kiosk has one.
    pub rear_camera: Option<String>,
    /// Frames discarded after each camera acquisition (AGC/AE settling).
    pub warmup_frames: usize,
    pub sounds_enabled: bool,
    pub sound_dir: PathBuf,
    /// Player command; the sound file path is appended as the last argument.
    pub sound_player: String,
    /// Pull `/stream/{id}/clean` rather than the annotated `/stream/{id}`.
    pub clean_stream: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    profile: Option<String>,
    api_base: Option<String>,
    request_timeout_secs: Option<u64>,
    action_threshold: Option<f32>,
    sample_period_ms: Option<u64>,
    jpeg_quality: Option<u8>,
    reset_delay_ms: Option<u64>,
    front_camera: Option<String>,
    rear_camera: Option<String>,
    warmup_frames: Option<usize>,
    sounds_enabled: Option<bool>,
    sound_dir: Option<PathBuf>,
    sound_player: Option<String>,
    clean_stream: Option<bool>,
}

impl FileConfig {
    fn read(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    fn load_with(env: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let file = match env("POINTAGE_CONFIG") {
            Some(path) => FileConfig::read(Path::new(&path))?,
            None => FileConfig::default(),
        };
        Self::resolve(file, &env)
    }

    fn resolve(
        file: FileConfig,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let profile = match env("POINTAGE_PROFILE").or(file.profile) {
            Some(raw) => Profile::parse(&raw)?,
            None => Profile::Kiosk,
        };

        let config = Self {
            profile,
            api_base: env("POINTAGE_API_BASE")
                .or(file.api_base)
                .unwrap_or_else(|| "http://localhost:8000/api".to_string()),
            request_timeout_secs: env_parse(
                env,
                "POINTAGE_REQUEST_TIMEOUT_SECS",
                file.request_timeout_secs.unwrap_or(10),
            ),
            action_threshold: env_parse(
                env,
                "POINTAGE_ACTION_THRESHOLD",
                file.action_threshold.unwrap_or(DEFAULT_ACTION_THRESHOLD),
            ),
            sample_period_ms: env_parse(
                env,
                "POINTAGE_SAMPLE_PERIOD_MS",
                file.sample_period_ms.unwrap_or(profile.sample_period_ms()),
            ),
            jpeg_quality: env_parse(
                env,
                "POINTAGE_JPEG_QUALITY",
                file.jpeg_quality.unwrap_or(profile.jpeg_quality()),
            ),
            reset_delay_ms: env_parse(
                env,
                "POINTAGE_RESET_DELAY_MS",
                file.reset_delay_ms.unwrap_or(5000),
            ),
            front_camera: env("POINTAGE_FRONT_CAMERA")
                .or(file.front_camera)
                .unwrap_or_else(|| "/dev/video0".to_string()),
            rear_camera: env("POINTAGE_REAR_CAMERA")
                .or(file.rear_camera)
                .filter(|v| !v.is_empty()),
            warmup_frames: env_parse(
                env,
                "POINTAGE_WARMUP_FRAMES",
                file.warmup_frames.unwrap_or(4),
            ),
            sounds_enabled: env_bool(
                env,
                "POINTAGE_SOUNDS_ENABLED",
                file.sounds_enabled.unwrap_or(true),
            ),
            sound_dir: env("POINTAGE_SOUND_DIR")
                .map(PathBuf::from)
                .or(file.sound_dir)
                .unwrap_or_else(|| PathBuf::from("/usr/share/pointage/sounds")),
            sound_player: env("POINTAGE_SOUND_PLAYER")
                .or(file.sound_player)
                .unwrap_or_else(|| "aplay -q".to_string()),
            clean_stream: env_bool(
                env,
                "POINTAGE_CLEAN_STREAM",
                file.clean_stream.unwrap_or(profile.clean_stream()),
            ),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.action_threshold) {
            return Err(ConfigError::Invalid {
                key: "action_threshold",
                reason: format!("{} is outside [0, 1]", self.action_threshold),
            });
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConfigError::Invalid {
                key: "jpeg_quality",
                reason: format!("{} is outside 1..=100", self.jpeg_quality),
            });
        }
        if self.sample_period_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "sample_period_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "request_timeout_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.sound_player.split_whitespace().next().is_none() {
            return Err(ConfigError::Invalid {
                key: "sound_player",
                reason: "empty command".to_string(),
            });
        }
        Ok(())
    }

    pub fn sample_period(&self) -> Duration {
        Duration::from_millis(self.sample_period_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn reset_delay(&self) -> Duration {
        Duration::from_millis(self.reset_delay_ms)
    }
}

fn env_parse<T: std::str::FromStr>(
    env: &dyn Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    env(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_bool(env: &dyn Fn(&str) -> Option<String>, key: &str, default: bool) -> bool {
    env(key)
        .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off"))
        .unwrap_or(default)
}
