mod game_state;
mod ids;
mod progress;
mod snapshot;
mod user;

pub use ids::{LocationError, LocationId, UserId};

pub use game_state::{GameState, RepairReport};
pub use progress::{LocationProgress, MAX_PROGRESS, ProgressDelta};
pub use snapshot::{DEFAULT_SNAPSHOT_KEY, GameSnapshot, SnapshotError};
pub use user::{NewUser, User, UserError, leaderboard, rank_of};
