use pointage_core::Sound;
use std::path::PathBuf;
use std::process::Stdio;

/// Fire-and-forget alert channel.
pub trait AlertSink: Send + Sync {
    fn play(&self, sound: Sound);
}

/// What [`AlertPlayer::launch`] did with a sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Playback {
    /// Sounds are disabled or no player is configured.
    Skipped,
    Spawned,
    /// The player could not be started.
    Failed,
}

/// Plays sound files through an external player process.
pub struct AlertPlayer {
    command: Vec<String>,
    sound_dir: PathBuf,
    enabled: bool,
}

impl AlertPlayer {
    /// `player` is a command line such as `aplay -q`; the file path is appended.
    pub fn new(player: &str, sound_dir: PathBuf) -> Self {
        Self {
            command: player.split_whitespace().map(str::to_string).collect(),
            sound_dir,
            enabled: true,
        }
    }

    pub fn disabled() -> Self {
        Self {
            command: Vec::new(),
            sound_dir: PathBuf::new(),
            enabled: false,
        }
    }
}

impl AlertPlayer {
    /// Start the player for `sound` without waiting for it.
    pub fn launch(&self, sound: Sound) -> Playback {
        let Some((program, args)) = self.command.split_first().filter(|_| self.enabled) else {
            tracing::debug!(sound = sound.file_name(), "sounds disabled");
            return Playback::Skipped;
        };
        let path = self.sound_dir.join(sound.file_name());

        let spawned = tokio::process::Command::new(program)
            .args(args)
            .arg(&path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        match spawned {
            Ok(mut child) => {
                tokio::spawn(async move {
                    match child.wait().await {
                        Ok(status) if !status.success() => {
                            tracing::warn!(
                                path = %path.display(),
                                %status,
                                "sound player failed"
                            );
                        }
                        Err(err) => {
                            tracing::warn!(
                                path = %path.display(),
                                error = %err,
                                "sound player failed"
                            );
                        }
                        Ok(_) => {}
                    }
                });
                Playback::Spawned
            }
            Err(err) => {
                tracing::warn!(player = %program, error = %err, "could not start sound player");
                Playback::Failed
            }
        }
    }
}

impl AlertSink for AlertPlayer {
    fn play(&self, sound: Sound) {
        self.launch(sound);
    }
}
