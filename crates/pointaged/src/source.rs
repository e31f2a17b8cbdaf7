//! Visual sources the sampler pulls frames from.

use crate::camera_worker::{CameraWorker, WorkerError};
use async_trait::async_trait;
use pointage_api::{ApiError, AttendanceApi};
use pointage_hw::frame::is_dark_frame;
use pointage_hw::{Frame, PixelLayout};
use std::sync::Arc;
use thiserror::Error;

/// Share of near-black pixels above which a local frame counts as not ready.
const DARK_FRAME_PCT: f32 = 0.95;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error(transparent)]
    Camera(#[from] WorkerError),
    #[error(transparent)]
    Stream(#[from] ApiError),
}

#[async_trait]
pub trait FrameSource: Send {
    /// Pull the current frame. `Ok(None)` means the source is not ready yet,
    /// which costs the caller one tick and nothing else.
    async fn grab(&mut self) -> Result<Option<Frame>, SourceError>;
}

/// The kiosk's own camera, through the camera thread.
pub struct LocalCamera {
    worker: CameraWorker,
}

impl LocalCamera {
    pub fn new(worker: CameraWorker) -> Self {
        Self { worker }
    }
}

#[async_trait]
impl FrameSource for LocalCamera {
    async fn grab(&mut self) -> Result<Option<Frame>, SourceError> {
        let Some(frame) = self.worker.capture().await? else {
            return Ok(None);
        };
        if !frame.is_ready() {
            return Ok(None);
        }
        if frame.layout == PixelLayout::Luma8 && is_dark_frame(&frame.data, DARK_FRAME_PCT) {
            tracing::trace!("dark frame; exposure still settling");
            return Ok(None);
        }
        Ok(Some(frame))
    }
}

/// A server-side camera pulled through `/stream/{id}`.
pub struct RemoteStream {
    api: Arc<dyn AttendanceApi>,
    camera_id: i64,
    clean: bool,
}

impl RemoteStream {
    pub fn new(api: Arc<dyn AttendanceApi>, camera_id: i64, clean: bool) -> Self {
        Self {
            api,
            camera_id,
            clean,
        }
    }
}

#[async_trait]
impl FrameSource for RemoteStream {
    async fn grab(&mut self) -> Result<Option<Frame>, SourceError> {
        let jpeg = match self.api.stream_frame(self.camera_id, self.clean).await {
            Ok(jpeg) => jpeg,
            Err(ApiError::NoFrame) => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        match Frame::from_jpeg(&jpeg) {
            Ok(frame) if frame.is_ready() => Ok(Some(frame)),
            Ok(_) => Ok(None),
            Err(err) => {
                tracing::debug!(camera = self.camera_id, error = %err, "undecodable stream frame");
                Ok(None)
            }
        }
    }
}
