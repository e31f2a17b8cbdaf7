use crate::alerts::AlertSink;
use crate::camera_worker::{CameraWorker, WorkerError};
use crate::pipeline::{Pipeline, PipelineSettings};
use crate::source::{LocalCamera, RemoteStream};
use pointage_api::AttendanceApi;
use pointage_core::cameras::{select_camera, SourceMode, DEFAULT_CAMERA_ID};
use pointage_core::overlay::OverlaySnapshot;
use pointage_hw::FacingMode;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

#[derive(Error, Debug)]
pub enum KioskError {
    #[error(transparent)]
    Camera(#[from] WorkerError),
    #[error("the live view uses a server camera; there is no local camera to switch")]
    RemoteSource,
}

/// Where the live view gets its frames.
pub enum VisualSource {
    Local(CameraWorker),
    Remote { camera_id: i64, clean: bool },
}

impl VisualSource {
    fn describe(&self) -> String {
        match self {
            Self::Local(_) => "local".to_string(),
            Self::Remote { camera_id, .. } => format!("stream/{camera_id}"),
        }
    }
}

/// Ask the server which camera to show, as `(source, camera name)`.
///
/// An unreachable or empty camera list falls back to the local camera.
pub async fn choose_source(
    api: &dyn AttendanceApi,
    camera: &CameraWorker,
    clean: bool,
) -> (VisualSource, String) {
    let cameras = match api.list_cameras().await {
        Ok(cameras) => cameras,
        Err(err) => {
            tracing::warn!(error = %err, "could not list cameras; using the local camera");
            Vec::new()
        }
    };
    match select_camera(&cameras) {
        Some(selected) => {
            let source = match selected.source_mode() {
                SourceMode::Local => VisualSource::Local(camera.clone()),
                SourceMode::Remote { camera_id } => VisualSource::Remote { camera_id, clean },
            };
            (source, selected.name.clone())
        }
        None => (
            VisualSource::Local(camera.clone()),
            DEFAULT_CAMERA_ID.to_string(),
        ),
    }
}

/// Live recognition view: one visual source, at most one running pipeline.
///
/// Camera acquisition failures leave the view stopped until the operator
/// retries with [`Kiosk::start`], [`Kiosk::flip_camera`] or
/// [`Kiosk::switch_source`]; nothing retries on a timer.
pub struct Kiosk {
    source: VisualSource,
    api: Arc<dyn AttendanceApi>,
    alerts: Arc<dyn AlertSink>,
    overlay: Arc<watch::Sender<OverlaySnapshot>>,
    settings: PipelineSettings,
    pipeline: Option<Pipeline>,
}

impl Kiosk {
    pub fn new(
        source: VisualSource,
        api: Arc<dyn AttendanceApi>,
        alerts: Arc<dyn AlertSink>,
        settings: PipelineSettings,
    ) -> Self {
        let (overlay, _) = watch::channel(OverlaySnapshot::default());
        Self {
            source,
            api,
            alerts,
            overlay: Arc::new(overlay),
            settings,
            pipeline: None,
        }
    }

    pub fn overlay(&self) -> watch::Receiver<OverlaySnapshot> {
        self.overlay.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.pipeline.is_some()
    }

    /// Acquire the source if needed and start sampling. A local camera is
    /// opened in its current facing mode.
    pub async fn start(&mut self) -> Result<(), KioskError> {
        if self.pipeline.is_some() {
            return Ok(());
        }
        let pipeline = match &self.source {
            VisualSource::Local(worker) => {
                worker.open().await?;
                self.spawn_pipeline(LocalCamera::new(worker.clone()))
            }
            VisualSource::Remote { camera_id, clean } => self.spawn_pipeline(RemoteStream::new(
                self.api.clone(),
                *camera_id,
                *clean,
            )),
        };
        self.pipeline = Some(pipeline);
        Ok(())
    }

    fn spawn_pipeline<S: crate::source::FrameSource + 'static>(&self, source: S) -> Pipeline {
        Pipeline::spawn(
            source,
            self.api.clone(),
            self.alerts.clone(),
            self.overlay.clone(),
            self.settings.clone(),
        )
    }

    /// Stop sampling. The pipeline blanks the overlay on its way out.
    pub async fn stop(&mut self) {
        if let Some(pipeline) = self.pipeline.take() {
            pipeline.shutdown().await;
        }
    }

    /// Switch between front and rear cameras.
    ///
    /// The pipeline is stopped first and restarted only if the new camera
    /// was acquired.
    pub async fn flip_camera(&mut self) -> Result<FacingMode, KioskError> {
        let VisualSource::Local(worker) = &self.source else {
            return Err(KioskError::RemoteSource);
        };
        let worker = worker.clone();
        self.stop().await;
        let facing = worker.toggle_facing().await?;
        tracing::info!(facing = ?facing, "camera switched");
        self.start().await?;
        Ok(facing)
    }

    /// Move the live view to another source.
    ///
    /// The pipeline stops and the local camera, if held, is released before
    /// the new source is acquired. On failure the view stays stopped on the
    /// new source, so [`Kiosk::start`] retries it.
    pub async fn switch_source(
        &mut self,
        source: VisualSource,
        camera_id: String,
    ) -> Result<(), KioskError> {
        self.stop().await;
        self.release_local().await;
        tracing::info!(
            from = %self.source.describe(),
            to = %source.describe(),
            camera = %camera_id,
            "switching live view source"
        );
        self.source = source;
        self.settings.camera_id = camera_id;
        self.start().await
    }

    async fn release_local(&self) {
        if let VisualSource::Local(worker) = &self.source {
            if let Err(err) = worker.release().await {
                tracing::warn!(error = %err, "camera release failed");
            }
        }
    }

    /// Stop sampling and release the camera.
    pub async fn shutdown(mut self) {
        self.stop().await;
        self.release_local().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera_worker::fake::FakeBackend;
    use crate::camera_worker::spawn_camera_worker;
    use crate::testing::{FakeApi, RecordingSink};
    use pointage_core::cameras::CameraDescriptor;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn settings() -> PipelineSettings {
        PipelineSettings {
            period: Duration::from_millis(500),
            jpeg_quality: 75,
            action_threshold: 0.85,
            camera_id: "Webcam".into(),
        }
    }

    fn kiosk(backend: &FakeBackend) -> (Kiosk, CameraWorker) {
        let worker = spawn_camera_worker(backend.clone(), FacingMode::User, 0).unwrap();
        let kiosk = Kiosk::new(
            VisualSource::Local(worker.clone()),
            Arc::new(FakeApi::default()),
            Arc::new(RecordingSink::default()),
            settings(),
        );
        (kiosk, worker)
    }

    fn cameras(json: &str) -> Vec<CameraDescriptor> {
        serde_json::from_str(json).unwrap()
    }

    #[tokio::test]
    async fn test_flip_releases_then_acquires() {
        let backend = FakeBackend::default();
        let (mut kiosk, _) = kiosk(&backend);
        kiosk.start().await.unwrap();

        assert_eq!(kiosk.flip_camera().await.unwrap(), FacingMode::Environment);
        assert!(kiosk.is_running());

        {
            let ledger = backend.ledger.lock().unwrap();
            assert_eq!(
                ledger.events,
                vec!["acquire User", "release User", "acquire Environment"]
            );
            assert_eq!(ledger.max_live, 1);
        }

        kiosk.shutdown().await;
        assert_eq!(backend.ledger.lock().unwrap().live, 0);
    }

    #[tokio::test]
    async fn test_failed_flip_leaves_view_stopped() {
        let backend = FakeBackend {
            rear_missing: true,
            ..Default::default()
        };
        let (mut kiosk, _) = kiosk(&backend);
        kiosk.start().await.unwrap();

        assert!(kiosk.flip_camera().await.is_err());
        assert!(!kiosk.is_running());
        assert_eq!(backend.ledger.lock().unwrap().live, 0);

        // Operator retries: back to the front camera.
        assert_eq!(kiosk.flip_camera().await.unwrap(), FacingMode::User);
        assert!(kiosk.is_running());
    }

    #[tokio::test]
    async fn test_start_retries_current_facing() {
        let backend = FakeBackend::default();
        backend.unplugged.store(true, Ordering::SeqCst);
        let (mut kiosk, _) = kiosk(&backend);

        assert!(kiosk.start().await.is_err());
        assert!(!kiosk.is_running());

        backend.unplugged.store(false, Ordering::SeqCst);
        kiosk.start().await.unwrap();
        assert!(kiosk.is_running());
        assert_eq!(backend.ledger.lock().unwrap().events, vec!["acquire User"]);

        // Starting a running view is a no-op.
        kiosk.start().await.unwrap();
        assert_eq!(backend.ledger.lock().unwrap().events.len(), 1);
    }

    #[tokio::test]
    async fn test_remote_source_cannot_flip() {
        let mut kiosk = Kiosk::new(
            VisualSource::Remote {
                camera_id: 2,
                clean: true,
            },
            Arc::new(FakeApi::default()),
            Arc::new(RecordingSink::default()),
            settings(),
        );
        kiosk.start().await.unwrap();
        assert!(matches!(kiosk.flip_camera().await, Err(KioskError::RemoteSource)));
        assert!(kiosk.is_running());
        kiosk.shutdown().await;
    }

    #[tokio::test]
    async fn test_switch_local_remote_local() {
        let backend = FakeBackend::default();
        let (mut kiosk, worker) = kiosk(&backend);
        kiosk.start().await.unwrap();

        kiosk
            .switch_source(
                VisualSource::Remote {
                    camera_id: 4,
                    clean: true,
                },
                "Porte".into(),
            )
            .await
            .unwrap();
        assert!(kiosk.is_running());
        {
            let ledger = backend.ledger.lock().unwrap();
            assert_eq!(ledger.events, vec!["acquire User", "release User"]);
            assert_eq!(ledger.live, 0);
        }
        assert_eq!(kiosk.settings.camera_id, "Porte");

        kiosk
            .switch_source(VisualSource::Local(worker), "Webcam".into())
            .await
            .unwrap();
        assert!(kiosk.is_running());
        {
            let ledger = backend.ledger.lock().unwrap();
            assert_eq!(
                ledger.events,
                vec!["acquire User", "release User", "acquire User"]
            );
            assert_eq!(ledger.max_live, 1);
        }

        kiosk.shutdown().await;
        assert_eq!(backend.ledger.lock().unwrap().live, 0);
    }

    #[tokio::test]
    async fn test_failed_switch_stays_stopped_on_new_source() {
        let backend = FakeBackend::default();
        let (mut kiosk, worker) = kiosk(&backend);
        kiosk
            .switch_source(
                VisualSource::Remote {
                    camera_id: 4,
                    clean: false,
                },
                "Porte".into(),
            )
            .await
            .unwrap();

        backend.unplugged.store(true, Ordering::SeqCst);
        assert!(kiosk
            .switch_source(VisualSource::Local(worker), "Webcam".into())
            .await
            .is_err());
        assert!(!kiosk.is_running());

        backend.unplugged.store(false, Ordering::SeqCst);
        kiosk.start().await.unwrap();
        assert!(kiosk.is_running());
        assert_eq!(backend.ledger.lock().unwrap().live, 1);
    }

    #[tokio::test]
    async fn test_choose_source_follows_selection() {
        let (_, worker) = kiosk(&FakeBackend::default());
        let api = FakeApi::default();
        *api.cameras.lock() = Some(cameras(
            r#"[
                {"id":1,"name":"Webcam","source":"0","is_selected":0},
                {"id":4,"name":"Porte","source":"rtsp://cam/4","is_selected":1}
            ]"#,
        ));

        let (source, name) = choose_source(&api, &worker, true).await;
        assert_eq!(name, "Porte");
        assert!(matches!(
            source,
            VisualSource::Remote {
                camera_id: 4,
                clean: true
            }
        ));
    }

    #[tokio::test]
    async fn test_choose_source_falls_back_to_local() {
        let (_, worker) = kiosk(&FakeBackend::default());
        let api = FakeApi::default();

        let (source, name) = choose_source(&api, &worker, false).await;
        assert!(matches!(source, VisualSource::Local(_)));
        assert_eq!(name, DEFAULT_CAMERA_ID);

        *api.cameras.lock() = None;
        let (source, name) = choose_source(&api, &worker, false).await;
        assert!(matches!(source, VisualSource::Local(_)));
        assert_eq!(name, DEFAULT_CAMERA_ID);
    }
}
