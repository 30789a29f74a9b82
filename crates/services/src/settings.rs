use std::time::Duration;

use hunt_core::model::DEFAULT_SNAPSHOT_KEY;

/// How long each location step takes before it counts as completed.
pub const DEFAULT_STEP_DELAY: Duration = Duration::from_millis(2000);

/// Library-side knobs, filled in by the binary from flags and environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSettings {
    pub snapshot_key: String,
    pub step_delay: Duration,
    /// Run `GameState::repair` after loading a persisted snapshot.
    pub repair_on_load: bool,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            snapshot_key: DEFAULT_SNAPSHOT_KEY.to_string(),
            step_delay: DEFAULT_STEP_DELAY,
            repair_on_load: false,
        }
    }
}

impl GameSettings {
    #[must_use]
    pub fn with_step_delay(mut self, step_delay: Duration) -> Self {
        self.step_delay = step_delay;
        self
    }

    #[must_use]
    pub fn with_repair_on_load(mut self, repair_on_load: bool) -> Self {
        self.repair_on_load = repair_on_load;
        self
    }
}
