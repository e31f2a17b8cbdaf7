use pointage_hw::{CameraBackend, CameraError, CameraManager, FacingMode, Frame};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("camera error: {0}")]
    Camera(#[from] CameraError),
    #[error("failed to start camera thread: {0}")]
    Spawn(std::io::Error),
    #[error("camera thread exited")]
    ChannelClosed,
}

/// Messages sent to the camera thread.
enum WorkerRequest {
    Open {
        reply: oneshot::Sender<Result<(), CameraError>>,
    },
    Capture {
        reply: oneshot::Sender<Result<Option<Frame>, CameraError>>,
    },
    ToggleFacing {
        reply: oneshot::Sender<Result<FacingMode, CameraError>>,
    },
    Release {
        reply: oneshot::Sender<()>,
    },
}

/// Clone-safe handle to the camera thread.
///
/// The thread exclusively owns the [`CameraManager`], so at most one device
/// handle is ever live no matter how many clones issue requests.
#[derive(Clone)]
pub struct CameraWorker {
    tx: mpsc::Sender<WorkerRequest>,
}

impl CameraWorker {
    /// Acquire the camera for the current facing mode.
    pub async fn open(&self) -> Result<(), WorkerError> {
        self.request(|reply| WorkerRequest::Open { reply })
            .await?
            .map_err(WorkerError::from)
    }

    /// Grab one frame. `Ok(None)` when no camera is held.
    pub async fn capture(&self) -> Result<Option<Frame>, WorkerError> {
        self.request(|reply| WorkerRequest::Capture { reply })
            .await?
            .map_err(WorkerError::from)
    }

    /// Release the held camera and acquire the opposite-facing one.
    pub async fn toggle_facing(&self) -> Result<FacingMode, WorkerError> {
        self.request(|reply| WorkerRequest::ToggleFacing { reply })
            .await?
            .map_err(WorkerError::from)
    }

    pub async fn release(&self) -> Result<(), WorkerError> {
        self.request(|reply| WorkerRequest::Release { reply }).await
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> WorkerRequest,
    ) -> Result<T, WorkerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| WorkerError::ChannelClosed)?;
        reply_rx.await.map_err(|_| WorkerError::ChannelClosed)
    }
}

/// Spawn the camera thread. The camera is not acquired until [`CameraWorker::open`].
///
/// The thread exits, releasing the camera, once every handle is dropped.
pub fn spawn_camera_worker<B>(
    backend: B,
    facing: FacingMode,
    warmup_frames: usize,
) -> Result<CameraWorker, WorkerError>
where
    B: CameraBackend + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<WorkerRequest>(4);

    std::thread::Builder::new()
        .name("pointage-camera".into())
        .spawn(move || {
            let mut manager = CameraManager::new(backend, facing).with_warmup(warmup_frames);
            tracing::info!(facing = ?facing, "camera thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    WorkerRequest::Open { reply } => {
                        let _ = reply.send(manager.open());
                    }
                    WorkerRequest::Capture { reply } => {
                        let _ = reply.send(manager.capture());
                    }
                    WorkerRequest::ToggleFacing { reply } => {
                        let result = manager.toggle_facing().map(|()| manager.facing());
                        let _ = reply.send(result);
                    }
                    WorkerRequest::Release { reply } => {
                        manager.release();
                        let _ = reply.send(());
                    }
                }
            }
            tracing::info!("camera thread exiting");
        })
        .map_err(WorkerError::Spawn)?;

    Ok(CameraWorker { tx })
}
