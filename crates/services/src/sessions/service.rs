use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use hunt_core::catalog::{self, LocationDefinition, StepDefinition};
use hunt_core::model::{LocationId, ProgressDelta};
use tokio::sync::{Mutex as AsyncMutex, broadcast};
use tracing::{debug, info};

use super::progress::SessionProgress;
use super::state::{SessionInner, SessionPhase, SessionState};
use crate::progress_store::ProgressSink;

const EVENT_CAPACITY: usize = 16;

//
// ─── EVENTS ────────────────────────────────────────────────────────────────────
//

/// Emitted while a location session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// `step` is 1-based.
    StepCompleted { location: LocationId, step: usize },
    Finished { location: LocationId },
}

/// How a call to [`LocationSession::start`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Already running, already finished, or closed; nothing happened.
    Ignored,
    Finished,
    /// Reset or closed while a step was pending.
    Cancelled,
}

/// Outcome of one `start` call together with the events it emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRun {
    pub outcome: RunOutcome,
    pub events: Vec<SessionEvent>,
}

impl SessionRun {
    fn ignored() -> Self {
        Self {
            outcome: RunOutcome::Ignored,
            events: Vec::new(),
        }
    }
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One open location page: plays the location's steps in order, one timed
/// delay per step, and reports the result to a [`ProgressSink`].
///
/// Handles are cheap to clone and share the same session, so a UI can spawn
/// `start` and call `reset` or `close` from elsewhere while a step is pending.
#[derive(Clone)]
pub struct LocationSession {
    definition: &'static LocationDefinition,
    inner: Arc<Mutex<SessionInner>>,
    /// Held while a result is sent to the sink, so a finishing run and a
    /// reset reach the sink in the same order they take effect here.
    report_gate: Arc<AsyncMutex<()>>,
    sink: Arc<dyn ProgressSink>,
    step_delay: Duration,
    events: broadcast::Sender<SessionEvent>,
}

impl LocationSession {
    #[must_use]
    pub fn new(location: LocationId, sink: Arc<dyn ProgressSink>, step_delay: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            definition: catalog::location(location),
            inner: Arc::new(Mutex::new(SessionInner::default())),
            report_gate: Arc::new(AsyncMutex::new(())),
            sink,
            step_delay,
            events,
        }
    }

    /// Open a session for a wire key; unknown keys play the seed location.
    #[must_use]
    pub fn open(key: &str, sink: Arc<dyn ProgressSink>, step_delay: Duration) -> Self {
        Self::new(LocationId::resolve(key), sink, step_delay)
    }

    #[must_use]
    pub fn location(&self) -> LocationId {
        self.definition.id
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.definition.name
    }

    #[must_use]
    pub fn steps(&self) -> &'static [StepDefinition] {
        self.definition.steps
    }

    #[must_use]
    pub fn step_count(&self) -> usize {
        self.definition.steps.len()
    }

    /// Receive events from every subsequent run of this session.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.lock().state.clone()
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.lock().state.phase(self.step_count())
    }

    #[must_use]
    pub fn current_step(&self) -> usize {
        self.lock().state.current_step
    }

    #[must_use]
    pub fn completed_steps(&self) -> Vec<usize> {
        self.lock().state.completed_steps.iter().copied().collect()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.lock().state.is_running
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    #[must_use]
    pub fn can_start(&self) -> bool {
        let inner = self.lock();
        !inner.closed && inner.state.can_start(self.step_count())
    }

    #[must_use]
    pub fn can_reset(&self) -> bool {
        self.lock().state.can_reset()
    }

    /// Returns a summary of the current session progress.
    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        SessionProgress::new(self.step_count(), self.lock().state.completed_steps.len())
    }

    /// Play every step in order and report completion to the sink.
    ///
    /// A no-op while already running or once all steps are done. If the
    /// session is reset or closed during a step delay, the run stops without
    /// touching state or emitting anything further.
    pub async fn start(&self) -> SessionRun {
        let location = self.location();
        let step_count = self.step_count();
        let epoch = {
            let mut inner = self.lock();
            if inner.closed || !inner.state.can_start(step_count) {
                debug!(%location, "start ignored");
                return SessionRun::ignored();
            }
            inner.state.is_running = true;
            inner.epoch
        };

        let mut events = Vec::with_capacity(step_count + 1);
        for index in 0..step_count {
            {
                let mut inner = self.lock();
                if inner.epoch != epoch {
                    return self.cancelled(events);
                }
                inner.state.current_step = index + 1;
            }

            tokio::time::sleep(self.step_delay).await;

            {
                let mut inner = self.lock();
                if inner.epoch != epoch {
                    return self.cancelled(events);
                }
                inner.state.completed_steps.insert(index);
            }
            let event = SessionEvent::StepCompleted {
                location,
                step: index + 1,
            };
            self.emit(event);
            events.push(event);
        }

        let _gate = self.report_gate.lock().await;
        if self.lock().epoch != epoch {
            return self.cancelled(events);
        }

        let finished = SessionEvent::Finished { location };
        self.emit(finished);
        events.push(finished);
        info!(%location, "location session finished");

        self.sink
            .apply_location_result(location, ProgressDelta::completed())
            .await;

        let mut inner = self.lock();
        if inner.epoch == epoch {
            inner.state.is_running = false;
        }

        SessionRun {
            outcome: RunOutcome::Finished,
            events,
        }
    }

    /// Return to the initial state and clear this location's progress.
    ///
    /// Allowed at any time; a pending step delay of a running `start` is
    /// cancelled.
    pub async fn reset(&self) {
        {
            let mut inner = self.lock();
            inner.invalidate();
            inner.state.current_step = 0;
            inner.state.completed_steps.clear();
        }
        info!(location = %self.location(), "location session reset");

        let _gate = self.report_gate.lock().await;
        self.sink
            .apply_location_result(self.location(), ProgressDelta::cleared())
            .await;
    }

    /// Discard the session: any pending step resumes as a no-op and further
    /// starts are ignored. Progress is left as it is.
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.invalidate();
        inner.closed = true;
        debug!(location = %self.definition.id, "location session closed");
    }

    fn cancelled(&self, events: Vec<SessionEvent>) -> SessionRun {
        debug!(location = %self.location(), "location session run cancelled");
        SessionRun {
            outcome: RunOutcome::Cancelled,
            events,
        }
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine; the run also returns its events.
        let _ = self.events.send(event);
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for LocationSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("LocationSession")
            .field("location", &self.definition.id)
            .field("current_step", &inner.state.current_step)
            .field("completed_steps", &inner.state.completed_steps)
            .field("is_running", &inner.state.is_running)
            .field("epoch", &inner.epoch)
            .field("step_delay", &self.step_delay)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress_store::ProgressStore;
    use crate::settings::DEFAULT_STEP_DELAY;
    use hunt_core::model::{DEFAULT_SNAPSHOT_KEY, GameState, LocationProgress};
    use hunt_core::time::fixed_clock;
    use storage::repository::InMemoryRepository;
    use tokio::sync::broadcast::error::TryRecvError;
    use tokio::time::Instant;

    fn build_store() -> Arc<ProgressStore> {
        Arc::new(ProgressStore::new(
            GameState::initial(),
            Arc::new(InMemoryRepository::new()),
            fixed_clock(),
            DEFAULT_SNAPSHOT_KEY,
        ))
    }

    fn build_session(store: &Arc<ProgressStore>, location: LocationId) -> LocationSession {
        let sink: Arc<dyn ProgressSink> = store.clone();
        LocationSession::new(location, sink, DEFAULT_STEP_DELAY)
    }

    fn drain(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut out = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(event) => out.push(event),
                Err(TryRecvError::Empty | TryRecvError::Closed) => return out,
                Err(TryRecvError::Lagged(_)) => {}
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn full_run_completes_steps_and_reports_progress() {
        let store = build_store();
        let session = build_session(&store, LocationId::Library);
        let mut rx = session.subscribe();
        let began = Instant::now();

        let run = session.start().await;

        assert_eq!(run.outcome, RunOutcome::Finished);
        assert_eq!(
            run.events,
            vec![
                SessionEvent::StepCompleted { location: LocationId::Library, step: 1 },
                SessionEvent::StepCompleted { location: LocationId::Library, step: 2 },
                SessionEvent::Finished { location: LocationId::Library },
            ]
        );
        assert_eq!(drain(&mut rx), run.events);
        assert!(began.elapsed() >= DEFAULT_STEP_DELAY * 2);

        assert_eq!(session.completed_steps(), vec![0, 1]);
        assert!(!session.is_running());
        assert_eq!(session.phase(), SessionPhase::Finished);
        assert!(!session.can_start());
        assert!(session.can_reset());

        let state = store.snapshot().await;
        assert_eq!(state.location(LocationId::Library), LocationProgress::new(true, 100));
        assert_eq!(state.total_progress(), 17);
        assert!(state.is_unlocked(LocationId::Decoding));
        assert!(!state.is_unlocked(LocationId::Puzzle));
    }

    #[tokio::test(start_paused = true)]
    async fn steps_are_revealed_one_delay_at_a_time() {
        let store = build_store();
        let session = build_session(&store, LocationId::Forest);
        let handle = tokio::spawn({
            let session = session.clone();
            async move { session.start().await }
        });

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(session.current_step(), 1);
        assert!(session.completed_steps().is_empty());

        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert_eq!(session.current_step(), 2);
        assert_eq!(session.completed_steps(), vec![0]);
        assert_eq!(session.phase(), SessionPhase::Running);

        let run = handle.await.unwrap();
        assert_eq!(run.outcome, RunOutcome::Finished);
        assert_eq!(session.phase(), SessionPhase::Finished);
    }

    #[tokio::test(start_paused = true)]
    async fn start_while_running_is_ignored() {
        let store = build_store();
        let session = build_session(&store, LocationId::Library);
        let mut rx = session.subscribe();
        let handle = tokio::spawn({
            let session = session.clone();
            async move { session.start().await }
        });

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert!(session.is_running());

        let second = session.start().await;
        assert_eq!(second, SessionRun::ignored());
        assert_eq!(session.current_step(), 1);
        assert!(drain(&mut rx).is_empty());

        let first = handle.await.unwrap();
        assert_eq!(first.outcome, RunOutcome::Finished);
        assert_eq!(first.events.len(), 3);
        assert_eq!(drain(&mut rx).len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn start_after_finishing_is_ignored() {
        let store = build_store();
        let session = build_session(&store, LocationId::Library);
        session.start().await;

        let again = session.start().await;
        assert_eq!(again.outcome, RunOutcome::Ignored);
        assert_eq!(session.completed_steps(), vec![0, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_mid_run_cancels_pending_step() {
        let store = build_store();
        let session = build_session(&store, LocationId::Library);
        let mut rx = session.subscribe();
        let handle = tokio::spawn({
            let session = session.clone();
            async move { session.start().await }
        });

        // Step 0 completes at 2000ms; step 1 would complete at 4000ms.
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(session.completed_steps(), vec![0]);

        session.reset().await;
        assert!(session.completed_steps().is_empty());
        assert_eq!(session.current_step(), 0);
        assert!(!session.is_running());

        let run = handle.await.unwrap();
        assert_eq!(run.outcome, RunOutcome::Cancelled);
        assert_eq!(
            run.events,
            vec![SessionEvent::StepCompleted { location: LocationId::Library, step: 1 }]
        );
        assert!(session.completed_steps().is_empty());
        assert_eq!(drain(&mut rx).len(), 1);

        let state = store.snapshot().await;
        assert_eq!(state.location(LocationId::Library), LocationProgress::new(false, 0));
        assert_eq!(state.total_progress(), 0);
        assert!(!state.is_unlocked(LocationId::Decoding));
    }

    #[tokio::test(start_paused = true)]
    async fn session_can_be_replayed_after_reset() {
        let store = build_store();
        let session = build_session(&store, LocationId::Library);
        session.start().await;
        session.reset().await;
        assert!(session.can_start());

        let run = session.start().await;
        assert_eq!(run.outcome, RunOutcome::Finished);
        assert_eq!(store.total_progress().await, 17);
    }

    #[tokio::test]
    async fn reset_twice_matches_reset_once() {
        let store = build_store();
        let session = build_session(&store, LocationId::Temple);

        session.reset().await;
        let once = (session.state(), store.snapshot().await);
        session.reset().await;
        let twice = (session.state(), store.snapshot().await);

        assert_eq!(once, twice);
        assert_eq!(once.0, SessionState::default());
    }

    #[tokio::test(start_paused = true)]
    async fn close_mid_run_leaves_progress_untouched() {
        let store = build_store();
        let session = build_session(&store, LocationId::Library);
        let handle = tokio::spawn({
            let session = session.clone();
            async move { session.start().await }
        });

        tokio::time::sleep(Duration::from_millis(2500)).await;
        session.close();

        let run = handle.await.unwrap();
        assert_eq!(run.outcome, RunOutcome::Cancelled);
        assert_eq!(session.completed_steps(), vec![0]);
        assert!(session.is_closed());
        assert!(!session.can_start());
        assert_eq!(session.start().await.outcome, RunOutcome::Ignored);
        assert_eq!(store.snapshot().await, GameState::initial());
    }

    /// Records deltas in arrival order; completions stall first, like a sink
    /// waiting on a contended lock.
    struct StallingSink {
        stall: Duration,
        applied: Mutex<Vec<ProgressDelta>>,
    }

    #[async_trait::async_trait]
    impl ProgressSink for StallingSink {
        async fn apply_location_result(
            &self,
            _location: LocationId,
            delta: ProgressDelta,
        ) -> GameState {
            if delta.completed == Some(true) {
                tokio::time::sleep(self.stall).await;
            }
            self.applied
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(delta);
            GameState::initial()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn reset_during_final_report_is_applied_last() {
        let sink = Arc::new(StallingSink {
            stall: Duration::from_millis(1000),
            applied: Mutex::new(Vec::new()),
        });
        let dyn_sink: Arc<dyn ProgressSink> = sink.clone();
        let session = LocationSession::new(LocationId::Library, dyn_sink, DEFAULT_STEP_DELAY);
        let handle = tokio::spawn({
            let session = session.clone();
            async move { session.start().await }
        });

        // Both steps are done at 4000 ms; the completion is still in flight.
        tokio::time::sleep(Duration::from_millis(4500)).await;
        session.reset().await;
        let run = handle.await.unwrap();

        assert_eq!(run.outcome, RunOutcome::Finished);
        let applied = sink
            .applied
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        assert_eq!(
            applied,
            vec![ProgressDelta::completed(), ProgressDelta::cleared()]
        );
        assert_eq!(session.phase(), SessionPhase::Idle);
        assert!(!session.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn reset_before_final_report_cancels_the_completion() {
        let sink = Arc::new(StallingSink {
            stall: Duration::ZERO,
            applied: Mutex::new(Vec::new()),
        });
        let dyn_sink: Arc<dyn ProgressSink> = sink.clone();
        let session = LocationSession::new(LocationId::Library, dyn_sink, DEFAULT_STEP_DELAY);

        // Hold the gate the way an in-flight reset would, so the run blocks
        // right after its last step.
        let gate = Arc::clone(&session.report_gate);
        let held = gate.lock().await;
        let handle = tokio::spawn({
            let session = session.clone();
            async move { session.start().await }
        });
        tokio::time::sleep(Duration::from_millis(4500)).await;
        session.lock().invalidate();
        drop(held);

        let run = handle.await.unwrap();
        assert_eq!(run.outcome, RunOutcome::Cancelled);
        assert!(!run.events.contains(&SessionEvent::Finished {
            location: LocationId::Library
        }));
        assert!(
            sink.applied
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .is_empty()
        );
    }

    #[test]
    fn unknown_key_opens_seed_location() {
        let store = build_store();
        let sink: Arc<dyn ProgressSink> = store;
        let session = LocationSession::open("lighthouse", sink, DEFAULT_STEP_DELAY);
        assert_eq!(session.location(), LocationId::Library);
        assert_eq!(session.step_count(), 2);
        assert_eq!(session.steps()[0].title, "Find the old tomes");
        assert_eq!(session.progress().remaining, 2);
    }
}
