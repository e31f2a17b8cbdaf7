//! PIN panel state machine.
//!
//! `Idle → Collecting(ID) → Collecting(PIN) → Verifying → Resolved → Idle`.
//! The machine is synchronous and clock-free: the owner submits the returned
//! [`PinSubmission`], feeds the outcome back through [`PinPad::resolve`], and
//! schedules [`PinPad::reset`].

use crate::types::{AttendanceOutcome, Feedback};
use serde::Serialize;

pub const MAX_ID_LEN: usize = 6;
pub const MAX_PIN_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Digit(u8),
    Clear,
    Enter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Field {
    EmployeeId,
    Pin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResolutionKind {
    Success,
    Blocked,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub kind: ResolutionKind,
    pub feedback: Feedback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PanelState {
    Idle,
    Collecting(Field),
    Verifying,
    Resolved(Resolution),
}

/// Credentials to submit, produced by `Enter` on a non-empty PIN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinSubmission {
    pub employee_id: String,
    pub pin: String,
}

/// Render-ready view of the panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelView {
    pub state: PanelState,
    pub prompt: &'static str,
    /// Entered ID in clear, or the PIN masked.
    pub display: String,
}

#[derive(Debug, Clone, PartialEq)]
enum Phase {
    Input,
    Verifying,
    Resolved(Resolution),
}

#[derive(Debug, Clone)]
pub struct PinPad {
    step: Field,
    employee_id: String,
    pin: String,
    phase: Phase,
}

impl Default for PinPad {
    fn default() -> Self {
        Self {
            step: Field::EmployeeId,
            employee_id: String::new(),
            pin: String::new(),
            phase: Phase::Input,
        }
    }
}

impl PinPad {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PanelState {
        match &self.phase {
            Phase::Verifying => PanelState::Verifying,
            Phase::Resolved(r) => PanelState::Resolved(r.clone()),
            Phase::Input => match self.step {
                Field::EmployeeId if self.employee_id.is_empty() => PanelState::Idle,
                step => PanelState::Collecting(step),
            },
        }
    }

    pub fn employee_id(&self) -> &str {
        &self.employee_id
    }

    pub fn pin(&self) -> &str {
        &self.pin
    }

    /// Apply one key. Keys are ignored while verifying or resolved.
    pub fn press(&mut self, key: Key) -> Option<PinSubmission> {
        if self.phase != Phase::Input {
            return None;
        }
        match key {
            Key::Digit(d) if d <= 9 => {
                let (field, cap) = match self.step {
                    Field::EmployeeId => (&mut self.employee_id, MAX_ID_LEN),
                    Field::Pin => (&mut self.pin, MAX_PIN_LEN),
                };
                if field.len() < cap {
                    field.push(char::from(b'0' + d));
                }
                None
            }
            Key::Digit(_) => None,
            Key::Clear => {
                match self.step {
                    Field::Pin if self.pin.is_empty() => self.step = Field::EmployeeId,
                    Field::Pin => self.pin.clear(),
                    Field::EmployeeId => self.employee_id.clear(),
                }
                None
            }
            Key::Enter => match self.step {
                Field::EmployeeId => {
                    if !self.employee_id.is_empty() {
                        self.step = Field::Pin;
                    }
                    None
                }
                Field::Pin => {
                    if self.pin.is_empty() {
                        return None;
                    }
                    self.phase = Phase::Verifying;
                    Some(PinSubmission {
                        employee_id: self.employee_id.clone(),
                        pin: self.pin.clone(),
                    })
                }
            },
        }
    }

    /// Move `Verifying → Resolved`. Returns false (and changes nothing) when
    /// no submission is pending.
    pub fn resolve(&mut self, outcome: &AttendanceOutcome) -> bool {
        if self.phase != Phase::Verifying {
            return false;
        }
        let kind = match outcome {
            AttendanceOutcome::Logged { .. } => ResolutionKind::Success,
            AttendanceOutcome::Blocked(_) => ResolutionKind::Blocked,
            AttendanceOutcome::TechnicalError { .. } => ResolutionKind::Error,
        };
        self.phase = Phase::Resolved(Resolution {
            kind,
            feedback: outcome.feedback(),
        });
        true
    }

    /// Back to `Idle` with every entered digit cleared.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn view(&self) -> PanelView {
        let (prompt, display) = match self.step {
            Field::EmployeeId => ("Entrez votre ID", self.employee_id.clone()),
            Field::Pin => ("Entrez votre PIN", "•".repeat(self.pin.chars().count())),
        };
        PanelView {
            state: self.state(),
            prompt,
            display,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify_block;
    use crate::types::LogType;

    fn type_digits(pad: &mut PinPad, digits: &str) {
        for c in digits.chars() {
            pad.press(Key::Digit(c.to_digit(10).unwrap() as u8));
        }
    }

    #[test]
    fn test_starts_idle() {
        assert_eq!(PinPad::new().state(), PanelState::Idle);
    }

    #[test]
    fn test_id_capped_at_six() {
        let mut pad = PinPad::new();
        type_digits(&mut pad, "1234567");
        assert_eq!(pad.employee_id(), "123456");
        assert_eq!(pad.state(), PanelState::Collecting(Field::EmployeeId));
    }

    #[test]
    fn test_pin_capped_at_four() {
        let mut pad = PinPad::new();
        type_digits(&mut pad, "12");
        pad.press(Key::Enter);
        type_digits(&mut pad, "987654");
        assert_eq!(pad.pin(), "9876");
        assert_eq!(pad.view().display, "••••");
    }

    #[test]
    fn test_enter_with_empty_id_is_noop() {
        let mut pad = PinPad::new();
        assert_eq!(pad.press(Key::Enter), None);
        assert_eq!(pad.state(), PanelState::Idle);
    }

    #[test]
    fn test_enter_with_empty_pin_is_noop() {
        let mut pad = PinPad::new();
        type_digits(&mut pad, "42");
        pad.press(Key::Enter);
        assert_eq!(pad.press(Key::Enter), None);
        assert_eq!(pad.state(), PanelState::Collecting(Field::Pin));
    }

    #[test]
    fn test_submission() {
        let mut pad = PinPad::new();
        type_digits(&mut pad, "42");
        pad.press(Key::Enter);
        type_digits(&mut pad, "1234");
        let sub = pad.press(Key::Enter).unwrap();
        assert_eq!(
            sub,
            PinSubmission {
                employee_id: "42".into(),
                pin: "1234".into(),
            }
        );
        assert_eq!(pad.state(), PanelState::Verifying);
    }

    #[test]
    fn test_clear_steps_back() {
        let mut pad = PinPad::new();
        type_digits(&mut pad, "42");
        pad.press(Key::Enter);
        type_digits(&mut pad, "12");
        pad.press(Key::Clear);
        assert_eq!(pad.pin(), "");
        assert_eq!(pad.state(), PanelState::Collecting(Field::Pin));
        pad.press(Key::Clear);
        assert_eq!(pad.state(), PanelState::Collecting(Field::EmployeeId));
        assert_eq!(pad.employee_id(), "42");
        pad.press(Key::Clear);
        assert_eq!(pad.state(), PanelState::Idle);
    }

    #[test]
    fn test_input_ignored_while_verifying_and_resolved() {
        let mut pad = PinPad::new();
        type_digits(&mut pad, "42");
        pad.press(Key::Enter);
        type_digits(&mut pad, "1234");
        pad.press(Key::Enter);
        pad.press(Key::Digit(5));
        pad.press(Key::Clear);
        assert_eq!(pad.state(), PanelState::Verifying);

        assert!(pad.resolve(&AttendanceOutcome::Blocked(classify_block("déjà enregistré"))));
        pad.press(Key::Digit(5));
        pad.press(Key::Clear);
        assert_eq!(pad.press(Key::Enter), None);
        assert_eq!(pad.pin(), "1234");
        assert!(matches!(
            pad.state(),
            PanelState::Resolved(Resolution { kind: ResolutionKind::Blocked, .. })
        ));
    }

    #[test]
    fn test_resolve_requires_pending_submission() {
        let mut pad = PinPad::new();
        assert!(!pad.resolve(&AttendanceOutcome::technical(None)));
        assert_eq!(pad.state(), PanelState::Idle);
    }

    #[test]
    fn test_resolve_success_and_reset() {
        let mut pad = PinPad::new();
        type_digits(&mut pad, "42");
        pad.press(Key::Enter);
        type_digits(&mut pad, "1234");
        pad.press(Key::Enter);
        pad.resolve(&AttendanceOutcome::Logged {
            log_type: LogType::Entry,
            employee_name: Some("Alice".into()),
        });
        match pad.state() {
            PanelState::Resolved(r) => {
                assert_eq!(r.kind, ResolutionKind::Success);
                assert_eq!(r.feedback.title, "Alice");
                assert_eq!(r.feedback.subtext, "Entrée Enregistrée");
            }
            other => panic!("unexpected state {other:?}"),
        }
        pad.reset();
        assert_eq!(pad.state(), PanelState::Idle);
        assert_eq!(pad.employee_id(), "");
        assert_eq!(pad.pin(), "");
    }
}
