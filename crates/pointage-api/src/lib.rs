//! pointage-api — Client for the attendance backend.
//!
//! Wraps the recognition, attendance-write, PIN-verification, camera-list
//! and stream endpoints behind the [`AttendanceApi`] trait so the kiosk can
//! run against the real server or an in-process double.

pub mod client;
pub mod error;
pub mod mjpeg;
pub mod wire;

pub use client::{recognize_or_no_face, ApiClient, AttendanceApi};
pub use error::{outcome_of, ApiError};
