//! pointage-core — Decision and presentation logic for the attendance kiosk.
//!
//! Turns recognition results into attendance decisions, classifies the
//! server's write responses into a closed outcome taxonomy, and models the
//! PIN panel and live overlay state machines. No I/O lives here.

pub mod cameras;
pub mod classifier;
pub mod decision;
pub mod overlay;
pub mod panel;
pub mod types;

pub use classifier::classify;
pub use decision::{Decision, DecisionEngine, WriteIntent, DEFAULT_ACTION_THRESHOLD};
pub use types::{
    AttendanceOutcome, BlockInfo, BlockReason, Color, LogType, MatchResult, Sound, WriteResponse,
};
