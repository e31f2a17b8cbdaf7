//! PIN check-in terminal.
//!
//! Drives a [`PinPad`] from keypad input, submits credentials to
//! `/verify-pin/`, and returns the panel to idle a fixed delay after each
//! resolution. At most one reset timer is outstanding; it is aborted when a
//! new one is scheduled and when the terminal is dropped.

use crate::alerts::AlertSink;
use parking_lot::Mutex;
use pointage_api::{outcome_of, AttendanceApi};
use pointage_core::panel::{Key, PanelView, PinPad, PinSubmission};
use pointage_core::AttendanceOutcome;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

struct Panel {
    pad: PinPad,
    reset_timer: Option<JoinHandle<()>>,
}

struct Shared {
    api: Arc<dyn AttendanceApi>,
    alerts: Arc<dyn AlertSink>,
    reset_delay: Duration,
    panel: Mutex<Panel>,
    view: watch::Sender<PanelView>,
}

pub struct PinTerminal {
    shared: Arc<Shared>,
}

impl PinTerminal {
    pub fn new(
        api: Arc<dyn AttendanceApi>,
        alerts: Arc<dyn AlertSink>,
        reset_delay: Duration,
    ) -> Self {
        let pad = PinPad::new();
        let (view, _) = watch::channel(pad.view());
        Self {
            shared: Arc::new(Shared {
                api,
                alerts,
                reset_delay,
                panel: Mutex::new(Panel {
                    pad,
                    reset_timer: None,
                }),
                view,
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PanelView> {
        self.shared.view.subscribe()
    }

    pub fn view(&self) -> PanelView {
        self.shared.view.borrow().clone()
    }

    /// Feed one key. A completed entry is submitted in the background.
    pub fn press(&self, key: Key) {
        let submission = {
            let mut panel = self.shared.panel.lock();
            let submission = panel.pad.press(key);
            self.shared.view.send_replace(panel.pad.view());
            submission
        };
        if let Some(submission) = submission {
            tracing::info!(employee_id = %submission.employee_id, "PIN submitted");
            tokio::spawn(submit(Arc::downgrade(&self.shared), submission));
        }
    }
}

impl Drop for PinTerminal {
    fn drop(&mut self) {
        if let Some(timer) = self.shared.panel.lock().reset_timer.take() {
            timer.abort();
        }
    }
}

async fn submit(shared: Weak<Shared>, submission: PinSubmission) {
    let Some(api) = shared.upgrade().map(|s| s.api.clone()) else {
        return;
    };
    let result = api
        .verify_pin(&submission.employee_id, &submission.pin, None)
        .await;
    let outcome = outcome_of(result);

    let Some(shared) = shared.upgrade() else {
        tracing::debug!("terminal closed; PIN result discarded");
        return;
    };
    shared.resolve(&outcome);
}

impl Shared {
    fn resolve(self: &Arc<Self>, outcome: &AttendanceOutcome) {
        let mut panel = self.panel.lock();
        if !panel.pad.resolve(outcome) {
            return;
        }
        match outcome {
            AttendanceOutcome::Logged { log_type, .. } => {
                tracing::info!(log_type = log_type.as_str(), "PIN attendance logged");
            }
            AttendanceOutcome::Blocked(block) => {
                tracing::warn!(
                    reason = ?block.reason,
                    message = %block.raw_message,
                    "PIN attendance blocked"
                );
            }
            AttendanceOutcome::TechnicalError { detail } => {
                tracing::warn!(%detail, "PIN verification failed");
            }
        }
        if let Some(sound) = outcome.sound() {
            self.alerts.play(sound);
        }
        self.view.send_replace(panel.pad.view());

        if let Some(previous) = panel.reset_timer.take() {
            previous.abort();
        }
        let weak = Arc::downgrade(self);
        let delay = self.reset_delay;
        panel.reset_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(shared) = weak.upgrade() {
                shared.reset();
            }
        }));
    }

    fn reset(&self) {
        let mut panel = self.panel.lock();
        panel.pad.reset();
        panel.reset_timer = None;
        self.view.send_replace(panel.pad.view());
    }
}
