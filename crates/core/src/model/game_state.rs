use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::ids::LocationId;
use super::progress::{LocationProgress, MAX_PROGRESS, ProgressDelta};
use super::snapshot::GameSnapshot;

/// Aggregate progress across all hunt locations.
///
/// `total_progress` and `unlocked_locations` are derived from the per-location
/// records and are refreshed by [`GameState::apply_delta`]. A location, once
/// unlocked, stays unlocked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameState {
    locations: BTreeMap<LocationId, LocationProgress>,
    total_progress: u8,
    unlocked_locations: Vec<LocationId>,
    last_played: Option<DateTime<Utc>>,
}

/// Changes made by [`GameState::repair`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub clamped: Vec<LocationId>,
    pub seed_restored: bool,
    pub total_corrected: Option<(u8, u8)>,
    pub unlocked_added: Vec<LocationId>,
}

impl RepairReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.clamped.is_empty()
            && !self.seed_restored
            && self.total_corrected.is_none()
            && self.unlocked_added.is_empty()
    }
}

impl GameState {
    /// Fresh game: nothing played, only the seed location open.
    #[must_use]
    pub fn initial() -> Self {
        Self {
            locations: LocationId::ALL
                .into_iter()
                .map(|id| (id, LocationProgress::default()))
                .collect(),
            total_progress: 0,
            unlocked_locations: vec![LocationId::SEED],
            last_played: None,
        }
    }

    /// Overlay a persisted snapshot on top of the initial state.
    ///
    /// Each top-level field present in the snapshot replaces the default one;
    /// nothing is validated or recomputed here.
    #[must_use]
    pub fn from_snapshot(snapshot: GameSnapshot) -> Self {
        let mut state = Self::initial();
        for (id, record) in snapshot.locations() {
            state.locations.insert(id, record);
        }
        if let Some(total) = snapshot.total_progress {
            state.total_progress = total;
        }
        if let Some(unlocked) = snapshot.unlocked_ids() {
            state.unlocked_locations = unlocked;
        }
        if let Some(last_played) = snapshot.last_played {
            state.last_played = Some(last_played);
        }
        state
    }

    /// Merge a session result into one location and refresh derived fields.
    pub fn apply_delta(&mut self, id: LocationId, delta: ProgressDelta, now: DateTime<Utc>) {
        self.locations.entry(id).or_default().merge(delta);
        self.recompute_total_progress();
        self.recompute_unlocked();
        self.last_played = Some(now);
    }

    /// Rounded mean of all six locations' progress.
    pub fn recompute_total_progress(&mut self) {
        self.total_progress = mean_progress(&self.locations);
    }

    /// Re-evaluate the whole prerequisite chain and append newly met unlocks.
    pub fn recompute_unlocked(&mut self) {
        if !self.unlocked_locations.contains(&LocationId::SEED) {
            self.unlocked_locations.insert(0, LocationId::SEED);
        }
        for id in LocationId::ALL {
            let Some(prerequisite) = id.prerequisite() else {
                continue;
            };
            let met = self
                .locations
                .get(&prerequisite)
                .is_some_and(|record| record.completed);
            if met && !self.unlocked_locations.contains(&id) {
                self.unlocked_locations.push(id);
            }
        }
    }

    /// Bring a leniently loaded state back in line with its invariants.
    pub fn repair(&mut self) -> RepairReport {
        let mut report = RepairReport::default();

        for (id, record) in &mut self.locations {
            if record.progress > MAX_PROGRESS {
                record.progress = MAX_PROGRESS;
                report.clamped.push(*id);
            }
        }

        let before_total = self.total_progress;
        self.recompute_total_progress();
        if before_total != self.total_progress {
            report.total_corrected = Some((before_total, self.total_progress));
        }

        report.seed_restored = !self.unlocked_locations.contains(&LocationId::SEED);
        let before_unlocked = self.unlocked_locations.clone();
        self.recompute_unlocked();
        report.unlocked_added = self
            .unlocked_locations
            .iter()
            .filter(|id| !before_unlocked.contains(id) && !id.is_seed())
            .copied()
            .collect();

        report
    }

    #[must_use]
    pub fn location(&self, id: LocationId) -> LocationProgress {
        self.locations.get(&id).copied().unwrap_or_default()
    }

    pub fn locations(&self) -> impl Iterator<Item = (LocationId, LocationProgress)> + '_ {
        self.locations.iter().map(|(id, record)| (*id, *record))
    }

    #[must_use]
    pub fn total_progress(&self) -> u8 {
        self.total_progress
    }

    #[must_use]
    pub fn unlocked(&self) -> &[LocationId] {
        &self.unlocked_locations
    }

    #[must_use]
    pub fn is_unlocked(&self, id: LocationId) -> bool {
        self.unlocked_locations.contains(&id)
    }

    #[must_use]
    pub fn last_played(&self) -> Option<DateTime<Utc>> {
        self.last_played
    }

    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.locations.values().filter(|r| r.completed).count()
    }

    /// True once every location has been completed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.completed_count() == LocationId::ALL.len()
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::initial()
    }
}

fn mean_progress(locations: &BTreeMap<LocationId, LocationProgress>) -> u8 {
    let count = LocationId::ALL.len() as u32;
    let sum: u32 = LocationId::ALL
        .iter()
        .map(|id| locations.get(id).map_or(0, |r| u32::from(r.progress)))
        .sum();
    // Non-negative operands, so adding half the divisor rounds half away from zero.
    let rounded = (sum + count / 2) / count;
    u8::try_from(rounded).unwrap_or(u8::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn complete(state: &mut GameState, id: LocationId) {
        state.apply_delta(id, ProgressDelta::completed(), fixed_now());
    }

    #[test]
    fn initial_state_only_unlocks_seed() {
        let state = GameState::initial();
        assert_eq!(state.unlocked(), &[LocationId::Library]);
        assert_eq!(state.total_progress(), 0);
        assert_eq!(state.last_played(), None);
        assert_eq!(state.locations().count(), 6);
    }

    #[test]
    fn completing_seed_unlocks_only_next_location() {
        let mut state = GameState::initial();
        complete(&mut state, LocationId::Library);

        assert_eq!(state.total_progress(), 17);
        assert_eq!(state.unlocked(), &[LocationId::Library, LocationId::Decoding]);
        assert!(!state.is_unlocked(LocationId::Puzzle));
        assert_eq!(state.last_played(), Some(fixed_now()));
    }

    #[test]
    fn total_progress_rounds_half_up() {
        let mut state = GameState::initial();
        // 3 / 6 = 0.5 -> 1
        state.apply_delta(
            LocationId::Cave,
            ProgressDelta::default().with_progress(3),
            fixed_now(),
        );
        assert_eq!(state.total_progress(), 1);

        // 2 / 6 = 0.33 -> 0
        state.apply_delta(
            LocationId::Cave,
            ProgressDelta::default().with_progress(2),
            fixed_now(),
        );
        assert_eq!(state.total_progress(), 0);
    }

    #[test]
    fn total_matches_rounded_mean_for_mixed_progress() {
        let mut state = GameState::initial();
        let values = [100_u8, 100, 50, 25, 0, 10];
        for (id, value) in LocationId::ALL.into_iter().zip(values) {
            state.apply_delta(id, ProgressDelta::default().with_progress(value), fixed_now());
        }
        let sum: u32 = values.iter().map(|v| u32::from(*v)).sum();
        let expected = (f64::from(sum) / 6.0).round() as u8;
        assert_eq!(state.total_progress(), expected);
    }

    #[test]
    fn reset_never_relocks_unlocked_locations() {
        let mut state = GameState::initial();
        complete(&mut state, LocationId::Library);
        complete(&mut state, LocationId::Decoding);
        state.apply_delta(LocationId::Library, ProgressDelta::cleared(), fixed_now());

        assert_eq!(
            state.unlocked(),
            &[LocationId::Library, LocationId::Decoding, LocationId::Puzzle]
        );
        assert_eq!(state.total_progress(), 17);
    }

    #[test]
    fn completing_out_of_order_does_not_skip_ahead() {
        let mut state = GameState::initial();
        complete(&mut state, LocationId::Temple);

        assert!(state.is_unlocked(LocationId::Forest));
        assert!(!state.is_unlocked(LocationId::Decoding));
        assert!(!state.is_unlocked(LocationId::Cave));
    }

    #[test]
    fn finishing_all_locations_unlocks_the_whole_chain() {
        let mut state = GameState::initial();
        for id in LocationId::ALL {
            complete(&mut state, id);
        }
        assert_eq!(state.unlocked(), &LocationId::ALL);
        assert_eq!(state.total_progress(), 100);
        assert!(state.is_finished());
    }

    #[test]
    fn snapshot_overlay_keeps_defaults_for_missing_fields() {
        let snapshot = GameSnapshot::from_json(
            r#"{"library":{"completed":true,"progress":100},"totalProgress":17}"#,
        )
        .unwrap();
        let state = GameState::from_snapshot(snapshot);

        assert_eq!(state.location(LocationId::Library), LocationProgress::new(true, 100));
        assert_eq!(state.location(LocationId::Cave), LocationProgress::default());
        assert_eq!(state.total_progress(), 17);
        // Unlocks are not recomputed on load.
        assert_eq!(state.unlocked(), &[LocationId::Library]);
    }

    #[test]
    fn repair_fixes_stale_snapshot() {
        let snapshot = GameSnapshot::from_json(
            r#"{
                "library": {"completed": true, "progress": 180},
                "totalProgress": 55,
                "unlockedLocations": ["decoding"]
            }"#,
        )
        .unwrap();
        let mut state = GameState::from_snapshot(snapshot);
        let report = state.repair();

        assert_eq!(report.clamped, vec![LocationId::Library]);
        assert!(report.seed_restored);
        assert_eq!(report.total_corrected, Some((55, 17)));
        assert!(report.unlocked_added.is_empty());
        assert_eq!(state.unlocked(), &[LocationId::Library, LocationId::Decoding]);
        assert!(state.repair().is_clean());
    }
}
