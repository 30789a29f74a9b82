use std::collections::BTreeSet;

/// Where a location session currently is.
///
/// A completed step is reported through `SessionEvent::StepCompleted`; between
/// steps the session stays `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Running,
    Finished,
}

/// Observable state of a location session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    /// 1-based number of the step being played; 0 before the first start.
    pub current_step: usize,
    pub completed_steps: BTreeSet<usize>,
    pub is_running: bool,
}

impl SessionState {
    #[must_use]
    pub fn phase(&self, step_count: usize) -> SessionPhase {
        if self.is_running {
            SessionPhase::Running
        } else if step_count > 0 && self.completed_steps.len() >= step_count {
            SessionPhase::Finished
        } else {
            SessionPhase::Idle
        }
    }

    #[must_use]
    pub fn can_start(&self, step_count: usize) -> bool {
        !self.is_running && self.completed_steps.len() < step_count
    }

    #[must_use]
    pub fn can_reset(&self) -> bool {
        !self.completed_steps.is_empty()
    }
}

/// Session state plus the bookkeeping that guards pending step timers.
#[derive(Debug, Default)]
pub(crate) struct SessionInner {
    pub(crate) state: SessionState,
    /// Bumped by reset and close; a run only mutates state while its captured
    /// epoch is still current.
    pub(crate) epoch: u64,
    pub(crate) closed: bool,
}

impl SessionInner {
    pub(crate) fn invalidate(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        self.state.is_running = false;
    }
}
