mod progress;
mod service;
mod state;

// Public API of the location session subsystem.
pub use progress::SessionProgress;
pub use service::{LocationSession, RunOutcome, SessionEvent, SessionRun};
pub use state::{SessionPhase, SessionState};
