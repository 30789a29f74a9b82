#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod progress_store;
pub mod sessions;
pub mod settings;
pub mod user_service;

pub use hunt_core::Clock;

pub use app_services::{AppServices, PlayerProgress};
pub use error::{AppServicesError, UserServiceError};
pub use progress_store::{ProgressSink, ProgressStore, initialize};
pub use sessions::{
    LocationSession, RunOutcome, SessionEvent, SessionPhase, SessionProgress, SessionRun,
    SessionState,
};
pub use settings::{DEFAULT_STEP_DELAY, GameSettings};
pub use user_service::UserService;
