//! Camera descriptors served by `/cameras/` and the selection rule applied to them.

use serde::{Deserialize, Deserializer, Serialize};

/// `source` value meaning "use the local device camera".
pub const LOCAL_SOURCE: &str = "0";

/// Camera identifier sent with writes when no descriptor is known.
pub const DEFAULT_CAMERA_ID: &str = "Webcam";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraDescriptor {
    pub id: i64,
    pub name: String,
    pub source: String,
    #[serde(default, deserialize_with = "truthy")]
    pub is_selected: bool,
    #[serde(default, deserialize_with = "truthy")]
    pub is_active: bool,
}

/// Where the visual feed comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMode {
    /// Local device camera owned by this process.
    Local,
    /// Pull-image stream served by the backend (e.g. RTSP-backed).
    Remote { camera_id: i64 },
}

impl CameraDescriptor {
    pub fn source_mode(&self) -> SourceMode {
        if self.source == LOCAL_SOURCE {
            SourceMode::Local
        } else {
            SourceMode::Remote { camera_id: self.id }
        }
    }
}

/// Pick the camera to drive: the one flagged selected, else the local
/// device camera, else the first entry.
pub fn select_camera(cameras: &[CameraDescriptor]) -> Option<&CameraDescriptor> {
    cameras
        .iter()
        .find(|c| c.is_selected)
        .or_else(|| cameras.iter().find(|c| c.source == LOCAL_SOURCE))
        .or_else(|| cameras.first())
}

/// Accepts `0`/`1` integers (as stored server-side) as well as booleans.
fn truthy<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Bool(b) => b,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        _ => false,
    })
}
