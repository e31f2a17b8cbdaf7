//! pointage-hw — Local camera ownership and frame handling.
//!
//! Provides the camera lifecycle manager (one live handle per view, released
//! before any re-acquisition), a V4L2 backend, and the frame conversions and
//! JPEG encoding used by the sampler.

pub mod camera;
pub mod frame;
pub mod lifecycle;

pub use camera::{CameraError, FacingMode, V4lBackend, V4lCamera};
pub use frame::{Frame, FrameSample, PixelLayout};
pub use lifecycle::{CameraBackend, CameraHandle, CameraManager};
