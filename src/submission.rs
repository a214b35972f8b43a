//! Submit-control state for the batch and manual surfaces.
//!
//! Each surface is single-flight: a trigger while a request is outstanding is
//! rejected, never queued. A control is enabled only when its input is ready
//! and nothing is in flight.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmissionState {
    #[default]
    Idle,
    InFlight,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitRejected {
    #[error("a submission is already in progress")]
    InFlight,
    #[error("no valid input to submit")]
    NotReady,
}

/// One submission surface (batch file or manual form).
#[derive(Debug, Clone, Default)]
pub struct Surface {
    state: SubmissionState,
    input_ready: bool,
}

impl Surface {
    pub fn with_input_ready(ready: bool) -> Self {
        Surface {
            state: SubmissionState::Idle,
            input_ready: ready,
        }
    }

    pub fn state(&self) -> SubmissionState {
        self.state
    }

    pub fn input_ready(&self) -> bool {
        self.input_ready
    }

    pub fn is_in_flight(&self) -> bool {
        self.state == SubmissionState::InFlight
    }

    pub fn control_enabled(&self) -> bool {
        self.input_ready && !self.is_in_flight()
    }

    pub fn set_input_ready(&mut self, ready: bool) {
        self.input_ready = ready;
    }

    /// Move to `InFlight`. Called synchronously at trigger time, before the
    /// request is started.
    pub fn begin(&mut self) -> Result<(), SubmitRejected> {
        if self.is_in_flight() {
            return Err(SubmitRejected::InFlight);
        }
        if !self.input_ready {
            return Err(SubmitRejected::NotReady);
        }
        self.state = SubmissionState::InFlight;
        Ok(())
    }

    /// Leave `InFlight` with the request's outcome.
    pub fn settle(&mut self, succeeded: bool) {
        if !self.is_in_flight() {
            log::warn!("Settling a surface that was not in flight ({:?})", self.state);
        }
        self.state = if succeeded {
            SubmissionState::Succeeded
        } else {
            SubmissionState::Failed
        };
    }
}

/// Both submission surfaces. They share nothing but the busy indicator derived
/// from their states.
#[derive(Debug, Clone)]
pub struct SubmissionController {
    pub batch: Surface,
    pub manual: Surface,
}

impl Default for SubmissionController {
    fn default() -> Self {
        SubmissionController {
            // No file selected at startup.
            batch: Surface::with_input_ready(false),
            // Blank form fields submit as 0.0, so the form is always ready.
            manual: Surface::with_input_ready(true),
        }
    }
}

impl SubmissionController {
    /// Whether the busy loader should be shown.
    pub fn loader_visible(&self) -> bool {
        self.batch.is_in_flight() || self.manual.is_in_flight()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let c = SubmissionController::default();
        assert!(!c.batch.control_enabled());
        assert!(c.manual.control_enabled());
        assert!(!c.loader_visible());
    }

    #[test]
    fn test_single_flight() {
        let mut s = Surface::with_input_ready(true);
        s.begin().unwrap();
        assert!(!s.control_enabled());
        assert_eq!(s.begin(), Err(SubmitRejected::InFlight));
        s.settle(false);
        assert_eq!(s.state(), SubmissionState::Failed);
        assert!(s.control_enabled());
        s.begin().unwrap();
        s.settle(true);
        assert_eq!(s.state(), SubmissionState::Succeeded);
    }

    #[test]
    fn test_not_ready_is_rejected() {
        let mut s = Surface::with_input_ready(false);
        assert_eq!(s.begin(), Err(SubmitRejected::NotReady));
        assert_eq!(s.state(), SubmissionState::Idle);
    }

    #[test]
    fn test_input_cleared_mid_flight_keeps_control_disabled() {
        let mut s = Surface::with_input_ready(true);
        s.begin().unwrap();
        s.set_input_ready(false);
        s.settle(true);
        assert!(!s.control_enabled());
        s.set_input_ready(true);
        assert!(s.control_enabled());
    }

    #[test]
    fn test_surfaces_are_independent() {
        let mut c = SubmissionController::default();
        c.batch.set_input_ready(true);
        c.batch.begin().unwrap();
        assert!(c.loader_visible());
        c.manual.begin().unwrap();
        c.batch.settle(true);
        assert!(c.loader_visible());
        assert!(!c.manual.control_enabled());
        c.manual.settle(true);
        assert!(!c.loader_visible());
    }
}
