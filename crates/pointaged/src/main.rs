use anyhow::{Context, Result};
use pointage_api::{ApiClient, AttendanceApi};
use pointage_core::overlay::{format_confidence, ConfidenceBand, OverlaySnapshot};
use pointage_core::panel::{PanelState, PanelView};
use pointage_hw::{FacingMode, V4lBackend};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;

mod alerts;
mod camera_worker;
mod config;
mod keypad;
mod kiosk;
mod pin;
mod pipeline;
mod source;
#[cfg(test)]
mod testing;

use alerts::{AlertPlayer, AlertSink};
use config::Config;
use keypad::Command;
use kiosk::{choose_source, Kiosk};
use pin::PinTerminal;
use pipeline::PipelineSettings;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::load().context("failed to load configuration")?;
    tracing::info!(
        profile = config.profile.as_str(),
        api = %config.api_base,
        threshold = config.action_threshold,
        "pointaged starting"
    );

    let api: Arc<dyn AttendanceApi> = Arc::new(
        ApiClient::new(&config.api_base, config.request_timeout())
            .context("failed to build HTTP client")?,
    );
    let alerts: Arc<dyn AlertSink> = if config.sounds_enabled {
        Arc::new(AlertPlayer::new(&config.sound_player, config.sound_dir.clone()))
    } else {
        Arc::new(AlertPlayer::disabled())
    };

    // The camera thread holds no device until the live view opens it.
    let backend = V4lBackend {
        front: config.front_camera.clone(),
        rear: config.rear_camera.clone(),
    };
    let camera = camera_worker::spawn_camera_worker(backend, FacingMode::User, config.warmup_frames)
        .context("failed to start camera thread")?;

    let (source, camera_id) = choose_source(api.as_ref(), &camera, config.clean_stream).await;
    tracing::info!(camera = %camera_id, "live view source selected");

    let mut kiosk = Kiosk::new(
        source,
        api.clone(),
        alerts.clone(),
        PipelineSettings {
            period: config.sample_period(),
            jpeg_quality: config.jpeg_quality,
            action_threshold: config.action_threshold,
            camera_id,
        },
    );
    if let Err(err) = kiosk.start().await {
        tracing::error!(error = %err, "live view unavailable; press r to retry");
    }
    tokio::spawn(render_overlay(kiosk.overlay(), config.action_threshold));

    let terminal = PinTerminal::new(api.clone(), alerts, config.reset_delay());
    tokio::spawn(render_panel(terminal.subscribe()));

    let (key_tx, mut key_rx) = mpsc::channel(32);
    tokio::spawn(keypad::read_stdin(key_tx));

    tracing::info!(
        live_view = kiosk.is_running(),
        prompt = terminal.view().prompt,
        "pointaged ready"
    );

    let mut keypad_open = true;
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
            command = key_rx.recv(), if keypad_open => match command {
                Some(Command::Key(key)) => terminal.press(key),
                Some(Command::FlipCamera) => match kiosk.flip_camera().await {
                    Ok(facing) => tracing::info!(facing = ?facing, "live view restarted"),
                    Err(err) => tracing::error!(error = %err, "camera switch failed"),
                },
                Some(Command::RetryCamera) => match kiosk.start().await {
                    Ok(()) => tracing::info!("live view running"),
                    Err(err) => tracing::error!(error = %err, "live view still unavailable"),
                },
                Some(Command::ReselectCamera) => {
                    let (source, camera_id) =
                        choose_source(api.as_ref(), &camera, config.clean_stream).await;
                    if let Err(err) = kiosk.switch_source(source, camera_id).await {
                        tracing::error!(error = %err, "camera reselection failed");
                    }
                }
                Some(Command::Quit) => break,
                None => keypad_open = false,
            },
        }
    }

    tracing::info!("pointaged shutting down");
    drop(terminal);
    kiosk.shutdown().await;

    Ok(())
}

/// Log each overlay change that carries a banner.
async fn render_overlay(mut overlay: watch::Receiver<OverlaySnapshot>, threshold: f32) {
    let mut last_banner = None;
    while overlay.changed().await.is_ok() {
        let snapshot = overlay.borrow_and_update().clone();
        let banner = snapshot.status.banner();
        if let Some(b) = banner.as_ref().filter(|_| banner != last_banner) {
            let confidence = snapshot.status.confidence().unwrap_or(0.0);
            tracing::info!(
                color = %b.color,
                confidence = %format_confidence(confidence),
                badge = %ConfidenceBand::of(confidence, threshold).color(),
                "{} - {}",
                b.title,
                b.subtitle
            );
        }
        last_banner = banner;
    }
}

/// Log the PIN panel as it changes.
async fn render_panel(mut panel: watch::Receiver<PanelView>) {
    while panel.changed().await.is_ok() {
        let view = panel.borrow_and_update().clone();
        match &view.state {
            PanelState::Resolved(resolution) => tracing::info!(
                color = %resolution.feedback.color,
                "{} - {}",
                resolution.feedback.title,
                resolution.feedback.subtext
            ),
            PanelState::Verifying => tracing::info!("verifying PIN"),
            _ => tracing::info!("{}: {}", view.prompt, view.display),
        }
    }
}
