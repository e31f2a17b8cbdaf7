//! In-process fakes for the HTTP API and the alert channel.

use crate::alerts::AlertSink;
use async_trait::async_trait;
use parking_lot::Mutex;
use pointage_api::{ApiError, AttendanceApi};
use pointage_core::cameras::CameraDescriptor;
use pointage_core::{MatchResult, Sound, WriteResponse};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

type Reply = Box<dyn Fn() -> Result<WriteResponse, ApiError> + Send + Sync>;

pub struct FakeApi {
    pub recognition: Mutex<MatchResult>,
    pub recognize_delay: Mutex<Duration>,
    pub write_reply: Mutex<Reply>,
    pub pin_reply: Mutex<Reply>,
    pub stream: Mutex<Option<Vec<u8>>>,
    /// `None` makes `/cameras/` fail.
    pub cameras: Mutex<Option<Vec<CameraDescriptor>>>,
    pub recognize_calls: AtomicUsize,
    pub write_calls: AtomicUsize,
    pub pin_calls: AtomicUsize,
}

impl Default for FakeApi {
    fn default() -> Self {
        Self {
            recognition: Mutex::new(MatchResult::no_face()),
            recognize_delay: Mutex::new(Duration::ZERO),
            write_reply: Mutex::new(Box::new(|| Ok(logged("ENTRY")))),
            pin_reply: Mutex::new(Box::new(|| Ok(logged("ENTRY")))),
            stream: Mutex::new(None),
            cameras: Mutex::new(Some(Vec::new())),
            recognize_calls: AtomicUsize::new(0),
            write_calls: AtomicUsize::new(0),
            pin_calls: AtomicUsize::new(0),
        }
    }
}

impl FakeApi {
    pub fn recognizing(name: &str, employee_id: i64, confidence: f32) -> Self {
        let api = Self::default();
        *api.recognition.lock() = MatchResult {
            name: Some(name.to_string()),
            confidence,
            employee_id: Some(employee_id),
            landmarks: vec![(0.4, 0.5)],
        };
        api
    }

    pub fn reply_writes(
        &self,
        reply: impl Fn() -> Result<WriteResponse, ApiError> + Send + Sync + 'static,
    ) {
        *self.write_reply.lock() = Box::new(reply);
    }

    pub fn reply_pins(
        &self,
        reply: impl Fn() -> Result<WriteResponse, ApiError> + Send + Sync + 'static,
    ) {
        *self.pin_reply.lock() = Box::new(reply);
    }

    pub fn recognize_calls(&self) -> usize {
        self.recognize_calls.load(Ordering::SeqCst)
    }

    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    pub fn pin_calls(&self) -> usize {
        self.pin_calls.load(Ordering::SeqCst)
    }
}

pub fn logged(log_type: &str) -> WriteResponse {
    WriteResponse {
        status: Some("logged".into()),
        log_type: Some(log_type.into()),
        name: Some("Alice Martin".into()),
        ..Default::default()
    }
}

pub fn blocked(message: &str) -> WriteResponse {
    WriteResponse {
        status: Some("blocked".into()),
        message: Some(message.into()),
        ..Default::default()
    }
}

#[async_trait]
impl AttendanceApi for FakeApi {
    async fn recognize(&self, _jpeg: Vec<u8>) -> Result<MatchResult, ApiError> {
        self.recognize_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.recognize_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(self.recognition.lock().clone())
    }

    async fn log_attendance(
        &self,
        _employee_id: i64,
        _camera_id: &str,
        _confidence: f32,
    ) -> Result<WriteResponse, ApiError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        (*self.write_reply.lock())()
    }

    async fn verify_pin(
        &self,
        _employee_id: &str,
        _pin: &str,
        _photo: Option<Vec<u8>>,
    ) -> Result<WriteResponse, ApiError> {
        self.pin_calls.fetch_add(1, Ordering::SeqCst);
        (*self.pin_reply.lock())()
    }

    async fn list_cameras(&self) -> Result<Vec<CameraDescriptor>, ApiError> {
        self.cameras.lock().clone().ok_or(ApiError::Status {
            status: 503,
            detail: None,
        })
    }

    async fn stream_frame(&self, _camera_id: i64, _clean: bool) -> Result<Vec<u8>, ApiError> {
        self.stream.lock().clone().ok_or(ApiError::NoFrame)
    }
}

/// Records every sound it is asked to play.
#[derive(Default)]
pub struct RecordingSink {
    pub played: Mutex<Vec<Sound>>,
}

impl RecordingSink {
    pub fn played(&self) -> Vec<Sound> {
        self.played.lock().clone()
    }
}

impl AlertSink for RecordingSink {
    fn play(&self, sound: Sound) {
        self.played.lock().push(sound);
    }
}

/// Let spawned tasks run without letting the paused clock auto-advance.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
