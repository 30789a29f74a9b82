use serde::{Deserialize, Serialize};

/// Highest value a location's progress can take.
pub const MAX_PROGRESS: u8 = 100;

/// Completion state of a single location.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationProgress {
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub progress: u8,
}

impl LocationProgress {
    #[must_use]
    pub fn new(completed: bool, progress: u8) -> Self {
        Self {
            completed,
            progress,
        }
    }

    /// Overwrite the fields present in `delta`, keeping the others.
    pub fn merge(&mut self, delta: ProgressDelta) {
        if let Some(completed) = delta.completed {
            self.completed = completed;
        }
        if let Some(progress) = delta.progress {
            self.progress = progress.min(MAX_PROGRESS);
        }
    }
}

/// Partial update emitted when a location session ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
}

impl ProgressDelta {
    /// The delta sent when every step of a location has been finished.
    #[must_use]
    pub fn completed() -> Self {
        Self {
            completed: Some(true),
            progress: Some(MAX_PROGRESS),
        }
    }

    /// The delta sent when a session is reset.
    #[must_use]
    pub fn cleared() -> Self {
        Self {
            completed: Some(false),
            progress: Some(0),
        }
    }

    #[must_use]
    pub fn with_progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress);
        self
    }

    #[must_use]
    pub fn with_completed(mut self, completed: bool) -> Self {
        self.completed = Some(completed);
        self
    }
}
