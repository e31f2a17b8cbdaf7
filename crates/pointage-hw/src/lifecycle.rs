//! Camera lifecycle manager.
//!
//! Owns at most one live camera handle. Any re-acquisition (facing-mode
//! switch, re-open) releases the held handle first, and dropping the manager
//! releases whatever it still holds.

use crate::camera::{CameraError, FacingMode};
use crate::frame::Frame;

/// Source of camera handles, e.g. V4L2 devices or a test double.
pub trait CameraBackend {
    type Handle: CameraHandle;

    fn acquire(&mut self, facing: FacingMode) -> Result<Self::Handle, CameraError>;
}

/// An exclusively-owned, live camera.
pub trait CameraHandle {
    fn capture(&mut self) -> Result<Frame, CameraError>;

    /// Stop the device and give it back to the system.
    fn release(self);
}

pub struct CameraManager<B: CameraBackend> {
    backend: B,
    facing: FacingMode,
    handle: Option<B::Handle>,
    warmup_frames: usize,
}

impl<B: CameraBackend> CameraManager<B> {
    pub fn new(backend: B, facing: FacingMode) -> Self {
        Self {
            backend,
            facing,
            handle: None,
            warmup_frames: 0,
        }
    }

    /// Frames to discard right after each acquisition.
    pub fn with_warmup(mut self, frames: usize) -> Self {
        self.warmup_frames = frames;
        self
    }

    pub fn facing(&self) -> FacingMode {
        self.facing
    }

    pub fn is_live(&self) -> bool {
        self.handle.is_some()
    }

    /// Acquire a camera for the current facing mode, releasing any held one first.
    ///
    /// On failure the manager holds nothing.
    pub fn open(&mut self) -> Result<(), CameraError> {
        self.release();
        let mut handle = self.backend.acquire(self.facing)?;
        tracing::info!(facing = ?self.facing, "camera acquired");
        for _ in 0..self.warmup_frames {
            let _ = handle.capture();
        }
        self.handle = Some(handle);
        Ok(())
    }

    /// Release the current camera, then acquire one facing `facing`.
    pub fn switch_facing(&mut self, facing: FacingMode) -> Result<(), CameraError> {
        self.facing = facing;
        self.open()
    }

    pub fn toggle_facing(&mut self) -> Result<(), CameraError> {
        self.switch_facing(self.facing.toggled())
    }

    /// Capture from the live camera. `Ok(None)` when no camera is held.
    pub fn capture(&mut self) -> Result<Option<Frame>, CameraError> {
        match self.handle.as_mut() {
            Some(handle) => handle.capture().map(Some),
            None => Ok(None),
        }
    }

    pub fn release(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.release();
            tracing::info!(facing = ?self.facing, "camera released");
        }
    }
}

impl<B: CameraBackend> Drop for CameraManager<B> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Acquire(FacingMode),
        Release(FacingMode),
    }

    #[derive(Default)]
    struct Ledger {
        events: Vec<Event>,
        live: usize,
        max_live: usize,
    }

    struct FakeBackend {
        ledger: Rc<RefCell<Ledger>>,
        fail_on: Option<FacingMode>,
    }

    struct FakeHandle {
        facing: FacingMode,
        ledger: Rc<RefCell<Ledger>>,
        captures: usize,
    }

    impl CameraBackend for FakeBackend {
        type Handle = FakeHandle;

        fn acquire(&mut self, facing: FacingMode) -> Result<FakeHandle, CameraError> {
            if self.fail_on == Some(facing) {
                return Err(CameraError::DeviceBusy);
            }
            let mut ledger = self.ledger.borrow_mut();
            ledger.events.push(Event::Acquire(facing));
            ledger.live += 1;
            ledger.max_live = ledger.max_live.max(ledger.live);
            Ok(FakeHandle {
                facing,
                ledger: self.ledger.clone(),
                captures: 0,
            })
        }
    }

    impl CameraHandle for FakeHandle {
        fn capture(&mut self) -> Result<Frame, CameraError> {
            self.captures += 1;
            Ok(Frame::luma(vec![128; 4], 2, 2))
        }

        fn release(self) {
            let mut ledger = self.ledger.borrow_mut();
            ledger.events.push(Event::Release(self.facing));
            ledger.live -= 1;
        }
    }

    fn manager(fail_on: Option<FacingMode>) -> (CameraManager<FakeBackend>, Rc<RefCell<Ledger>>) {
        let ledger = Rc::new(RefCell::new(Ledger::default()));
        let backend = FakeBackend {
            ledger: ledger.clone(),
            fail_on,
        };
        (CameraManager::new(backend, FacingMode::User), ledger)
    }

    #[test]
    fn test_switch_releases_before_acquiring() {
        let (mut mgr, ledger) = manager(None);
        mgr.open().unwrap();
        ledger.borrow_mut().events.clear();

        mgr.switch_facing(FacingMode::Environment).unwrap();

        let ledger = ledger.borrow();
        assert_eq!(
            ledger.events,
            vec![Event::Release(FacingMode::User), Event::Acquire(FacingMode::Environment)]
        );
        assert_eq!(ledger.max_live, 1);
        assert_eq!(ledger.live, 1);
    }

    #[test]
    fn test_repeated_toggles_never_hold_two() {
        let (mut mgr, ledger) = manager(None);
        mgr.open().unwrap();
        for _ in 0..5 {
            mgr.toggle_facing().unwrap();
        }
        assert_eq!(mgr.facing(), FacingMode::Environment);
        assert_eq!(ledger.borrow().max_live, 1);
    }

    #[test]
    fn test_drop_releases() {
        let (mut mgr, ledger) = manager(None);
        mgr.open().unwrap();
        drop(mgr);
        let ledger = ledger.borrow();
        assert_eq!(ledger.live, 0);
        assert_eq!(ledger.events.last(), Some(&Event::Release(FacingMode::User)));
    }

    #[test]
    fn test_failed_acquire_leaves_no_source() {
        let (mut mgr, ledger) = manager(Some(FacingMode::Environment));
        mgr.open().unwrap();
        assert!(mgr.switch_facing(FacingMode::Environment).is_err());
        assert!(!mgr.is_live());
        assert_eq!(ledger.borrow().live, 0);
        assert!(mgr.capture().unwrap().is_none());
    }

    #[test]
    fn test_warmup_frames_discarded() {
        let (mgr, _ledger) = manager(None);
        let mut mgr = mgr.with_warmup(3);
        mgr.open().unwrap();
        assert_eq!(mgr.handle.as_ref().map(|h| h.captures), Some(3));
        assert!(mgr.capture().unwrap().is_some());
    }

    #[test]
    fn test_release_without_handle_is_noop() {
        let (mut mgr, ledger) = manager(None);
        mgr.release();
        assert!(ledger.borrow().events.is_empty());
    }
}
