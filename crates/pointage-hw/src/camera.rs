//! V4L2 camera capture via the `v4l` crate.

use crate::frame::{self, Frame};
use crate::lifecycle::{CameraBackend, CameraHandle};
use std::path::Path;
use thiserror::Error;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("no camera configured for facing mode {0:?}")]
    NoDeviceForFacing(FacingMode),
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("device busy")]
    DeviceBusy,
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailed(String),
    #[error("streaming not supported")]
    StreamingNotSupported,
}

/// Front (`User`) or rear (`Environment`) camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FacingMode {
    User,
    Environment,
}

impl FacingMode {
    pub fn toggled(&self) -> Self {
        match self {
            Self::User => Self::Environment,
            Self::Environment => Self::User,
        }
    }
}

/// Info about a discovered V4L2 device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
    pub driver: String,
    pub bus: String,
}

/// Negotiated pixel format for the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// YUYV 4:2:2 packed (2 bytes/pixel, extract Y channel).
    Yuyv,
    /// 8-bit grayscale.
    Grey,
    /// 16-bit little-endian grayscale.
    Y16,
}

/// V4L2 camera device handle. Dropping it closes the device.
pub struct V4lCamera {
    device: Device,
    pub width: u32,
    pub height: u32,
    pub device_path: String,
    pub fourcc: FourCC,
    pixel_format: PixelFormat,
}

impl V4lCamera {
    /// Open a V4L2 camera device by path (e.g., "/dev/video0").
    pub fn open(device_path: &str) -> Result<Self, CameraError> {
        if !Path::new(device_path).exists() {
            return Err(CameraError::DeviceNotFound(device_path.to_string()));
        }

        let device = Device::with_path(device_path).map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => {
                CameraError::PermissionDenied(device_path.to_string())
            }
            _ if e.to_string().contains("busy") || e.to_string().contains("EBUSY") => {
                CameraError::DeviceBusy
            }
            _ => CameraError::DeviceNotFound(format!("{device_path}: {e}")),
        })?;

        let caps = device.query_caps().map_err(|e| {
            CameraError::CaptureFailed(format!("failed to query capabilities: {e}"))
        })?;

        tracing::info!(
            device = device_path,
            driver = %caps.driver,
            card = %caps.card,
            "opened camera"
        );

        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            return Err(CameraError::StreamingNotSupported);
        }

        // Keep the driver's native resolution; only ask for YUYV.
        let mut fmt = device.format().map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to get format: {e}"))
        })?;
        fmt.fourcc = FourCC::new(b"YUYV");

        let negotiated = device.set_format(&fmt).map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to set format: {e}"))
        })?;

        let fourcc = negotiated.fourcc;
        let pixel_format = if fourcc == FourCC::new(b"GREY") {
            PixelFormat::Grey
        } else if fourcc == FourCC::new(b"YUYV") {
            PixelFormat::Yuyv
        } else if fourcc == FourCC::new(b"Y16 ") || fourcc == FourCC::new(b"Y16\0") {
            PixelFormat::Y16
        } else {
            return Err(CameraError::FormatNegotiationFailed(format!(
                "unsupported pixel format: {fourcc:?} (need YUYV, GREY, or Y16)"
            )));
        };

        tracing::info!(
            width = negotiated.width,
            height = negotiated.height,
            fourcc = ?fourcc,
            "negotiated format"
        );

        Ok(Self {
            device,
            width: negotiated.width,
            height: negotiated.height,
            device_path: device_path.to_string(),
            fourcc,
            pixel_format,
        })
    }

    /// Capture a single grayscale frame.
    pub fn capture_frame(&self) -> Result<Frame, CameraError> {
        let mut stream =
            MmapStream::with_buffers(&self.device, BufType::VideoCapture, 4).map_err(|e| {
                CameraError::CaptureFailed(format!("failed to create mmap stream: {e}"))
            })?;

        let (buf, _meta) = stream
            .next()
            .map_err(|e| CameraError::CaptureFailed(format!("failed to dequeue buffer: {e}")))?;

        let gray = self.buf_to_grayscale(buf)?;
        Ok(Frame::luma(gray, self.width, self.height))
    }

    fn buf_to_grayscale(&self, buf: &[u8]) -> Result<Vec<u8>, CameraError> {
        let pixels = (self.width * self.height) as usize;

        match self.pixel_format {
            PixelFormat::Grey => {
                if buf.len() < pixels {
                    return Err(CameraError::CaptureFailed(format!(
                        "GREY buffer too short: expected {pixels}, got {}",
                        buf.len()
                    )));
                }
                Ok(buf[..pixels].to_vec())
            }
            PixelFormat::Y16 => {
                let expected_bytes = pixels * 2;
                if buf.len() < expected_bytes {
                    return Err(CameraError::CaptureFailed(format!(
                        "Y16 buffer too short: expected {expected_bytes}, got {}",
                        buf.len()
                    )));
                }
                // Keep the high byte of each little-endian sample.
                Ok(buf[..expected_bytes].chunks_exact(2).map(|px| px[1]).collect())
            }
            PixelFormat::Yuyv => frame::yuyv_to_grayscale(buf, self.width, self.height)
                .map_err(|e| CameraError::CaptureFailed(format!("YUYV conversion failed: {e}"))),
        }
    }

    /// List available V4L2 video capture devices.
    pub fn list_devices() -> Vec<DeviceInfo> {
        let mut devices = Vec::new();

        for i in 0..16 {
            let path = format!("/dev/video{i}");
            if !Path::new(&path).exists() {
                continue;
            }
            let Ok(dev) = Device::with_path(&path) else {
                continue;
            };
            let Ok(caps) = dev.query_caps() else {
                continue;
            };
            if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
                continue;
            }
            devices.push(DeviceInfo {
                path,
                name: caps.card.clone(),
                driver: caps.driver.clone(),
                bus: caps.bus.clone(),
            });
        }

        devices
    }
}

impl CameraHandle for V4lCamera {
    fn capture(&mut self) -> Result<Frame, CameraError> {
        self.capture_frame()
    }

    fn release(self) {
        tracing::debug!(device = %self.device_path, "closing camera device");
        drop(self);
    }
}

/// Maps facing modes to V4L2 device paths.
#[derive(Debug, Clone)]
pub struct V4lBackend {
    pub front: String,
    pub rear: Option<String>,
}

impl CameraBackend for V4lBackend {
    type Handle = V4lCamera;

    fn acquire(&mut self, facing: FacingMode) -> Result<V4lCamera, CameraError> {
        let path = match facing {
            FacingMode::User => Some(self.front.as_str()),
            FacingMode::Environment => self.rear.as_deref(),
        }
        .ok_or(CameraError::NoDeviceForFacing(facing))?;
        V4lCamera::open(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facing_toggle() {
        assert_eq!(FacingMode::User.toggled(), FacingMode::Environment);
        assert_eq!(FacingMode::Environment.toggled(), FacingMode::User);
    }

    #[test]
    fn test_missing_rear_camera() {
        let mut backend = V4lBackend {
            front: "/dev/video0".into(),
            rear: None,
        };
        assert!(matches!(
            backend.acquire(FacingMode::Environment),
            Err(CameraError::NoDeviceForFacing(FacingMode::Environment))
        ));
    }

    #[test]
    fn test_missing_device_path() {
        assert!(matches!(
            V4lCamera::open("/dev/does-not-exist-video"),
            Err(CameraError::DeviceNotFound(_))
        ));
    }
}
