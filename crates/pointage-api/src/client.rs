use crate::error::{parse_detail, ApiError};
use crate::mjpeg;
use crate::wire::RecognizeResponse;
use async_trait::async_trait;
use pointage_core::cameras::CameraDescriptor;
use pointage_core::{MatchResult, WriteResponse};
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Upper bound on bytes read while waiting for one MJPEG frame.
const MAX_STREAM_FRAME_BYTES: usize = 8 * 1024 * 1024;

/// Endpoints the kiosk consumes.
#[async_trait]
pub trait AttendanceApi: Send + Sync {
    /// `POST /recognize/` with one JPEG.
    async fn recognize(&self, jpeg: Vec<u8>) -> Result<MatchResult, ApiError>;

    /// `POST /log_attendance/`.
    async fn log_attendance(
        &self,
        employee_id: i64,
        camera_id: &str,
        confidence: f32,
    ) -> Result<WriteResponse, ApiError>;

    /// `POST /verify-pin/`, optionally with a photo of the person at the kiosk.
    async fn verify_pin(
        &self,
        employee_id: &str,
        pin: &str,
        photo: Option<Vec<u8>>,
    ) -> Result<WriteResponse, ApiError>;

    /// `GET /cameras/`.
    async fn list_cameras(&self) -> Result<Vec<CameraDescriptor>, ApiError>;

    /// One JPEG from `GET /stream/{id}/clean` (or `/stream/{id}` when `clean` is false).
    async fn stream_frame(&self, camera_id: i64, clean: bool) -> Result<Vec<u8>, ApiError>;
}

/// Recognize one frame, absorbing every failure as "no face".
///
/// Recognition errors are never fatal to the sampling loop; the next tick is
/// the retry.
pub async fn recognize_or_no_face(api: &dyn AttendanceApi, jpeg: Vec<u8>) -> MatchResult {
    match api.recognize(jpeg).await {
        Ok(m) => m,
        Err(err) => {
            tracing::debug!(error = %err, "recognition failed; treating as no face");
            MatchResult::no_face()
        }
    }
}

/// reqwest-backed client rooted at an API base such as `http://host:8000/api`.
#[derive(Clone)]
pub struct ApiClient {
    base: String,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(base: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base: base.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                detail: parse_detail(&body),
            });
        }
        serde_json::from_slice(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

fn jpeg_part(bytes: Vec<u8>) -> Result<Part, ApiError> {
    Ok(Part::bytes(bytes)
        .file_name("capture.jpg")
        .mime_str("image/jpeg")?)
}

#[async_trait]
impl AttendanceApi for ApiClient {
    async fn recognize(&self, jpeg: Vec<u8>) -> Result<MatchResult, ApiError> {
        let form = Form::new().part("file", jpeg_part(jpeg)?);
        let response = self
            .client
            .post(self.url("recognize/"))
            .multipart(form)
            .send()
            .await?;
        let body: RecognizeResponse = Self::read_json(response).await?;
        Ok(body.into())
    }

    async fn log_attendance(
        &self,
        employee_id: i64,
        camera_id: &str,
        confidence: f32,
    ) -> Result<WriteResponse, ApiError> {
        let response = self
            .client
            .post(self.url("log_attendance/"))
            .query(&[
                ("employee_id", employee_id.to_string()),
                ("camera_id", camera_id.to_string()),
                ("confidence", confidence.to_string()),
            ])
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn verify_pin(
        &self,
        employee_id: &str,
        pin: &str,
        photo: Option<Vec<u8>>,
    ) -> Result<WriteResponse, ApiError> {
        let mut form = Form::new()
            .text("pin", pin.to_string())
            .text("employee_id", employee_id.to_string());
        if let Some(photo) = photo {
            form = form.part("photo", jpeg_part(photo)?);
        }
        let response = self
            .client
            .post(self.url("verify-pin/"))
            .multipart(form)
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn list_cameras(&self) -> Result<Vec<CameraDescriptor>, ApiError> {
        let response = self.client.get(self.url("cameras/")).send().await?;
        Self::read_json(response).await
    }

    async fn stream_frame(&self, camera_id: i64, clean: bool) -> Result<Vec<u8>, ApiError> {
        let path = if clean {
            format!("stream/{camera_id}/clean")
        } else {
            format!("stream/{camera_id}")
        };
        let mut response = self.client.get(self.url(&path)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                detail: None,
            });
        }

        // Dropping the response after the first frame closes the stream.
        let mut buf = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            buf.extend_from_slice(&chunk);
            if let Some(range) = mjpeg::first_jpeg(&buf) {
                return Ok(buf[range].to_vec());
            }
            if buf.len() > MAX_STREAM_FRAME_BYTES {
                break;
            }
        }
        Err(ApiError::NoFrame)
    }
}
