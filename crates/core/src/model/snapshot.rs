use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use super::game_state::GameState;
use super::ids::LocationId;
use super::progress::LocationProgress;

/// Storage key the snapshot is saved under unless configured otherwise.
pub const DEFAULT_SNAPSHOT_KEY: &str = "treasureGameData";

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SnapshotError {
    #[error("malformed snapshot: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("snapshot is not a JSON object")]
    NotAnObject,
    #[error("failed to encode snapshot: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Persisted shape of a [`GameState`].
///
/// Every field is optional so that partial or older saves still load; fields
/// that are missing or unreadable simply keep their defaults when overlaid.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library: Option<LocationProgress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decoding: Option<LocationProgress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub puzzle: Option<LocationProgress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temple: Option<LocationProgress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forest: Option<LocationProgress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cave: Option<LocationProgress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unlocked_locations: Option<Vec<String>>,
    pub last_played: Option<DateTime<Utc>>,
}

impl GameSnapshot {
    #[must_use]
    pub fn from_state(state: &GameState) -> Self {
        let mut snapshot = Self {
            total_progress: Some(state.total_progress()),
            unlocked_locations: Some(
                state
                    .unlocked()
                    .iter()
                    .map(|id| id.key().to_string())
                    .collect(),
            ),
            last_played: state.last_played(),
            ..Self::default()
        };
        for (id, record) in state.locations() {
            *snapshot.slot_mut(id) = Some(record);
        }
        snapshot
    }

    /// Decode a snapshot body key by key.
    ///
    /// A top-level field whose value has the wrong type is dropped on its own
    /// and the rest of the save is kept. Numbers are rounded and saturated
    /// into `0..=255`; `lastPlayed` accepts RFC 3339 text or epoch
    /// milliseconds.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::Malformed` if the body is not JSON and
    /// `SnapshotError::NotAnObject` if it is JSON but not an object.
    pub fn from_json(body: &str) -> Result<Self, SnapshotError> {
        let value: Value = serde_json::from_str(body).map_err(SnapshotError::Malformed)?;
        let Value::Object(fields) = value else {
            return Err(SnapshotError::NotAnObject);
        };

        let mut snapshot = Self::default();
        for id in LocationId::ALL {
            *snapshot.slot_mut(id) = decode_field(&fields, id.key(), decode_record);
        }
        snapshot.total_progress = decode_field(&fields, "totalProgress", decode_percent);
        snapshot.unlocked_locations = decode_field(&fields, "unlockedLocations", decode_keys);
        snapshot.last_played = decode_field(&fields, "lastPlayed", decode_timestamp);
        Ok(snapshot)
    }

    /// Encode the snapshot as JSON.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::Encode` if serialization fails.
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        serde_json::to_string(self).map_err(SnapshotError::Encode)
    }

    /// Location records present in the snapshot.
    pub fn locations(&self) -> impl Iterator<Item = (LocationId, LocationProgress)> + '_ {
        LocationId::ALL
            .into_iter()
            .filter_map(|id| self.slot(id).map(|record| (id, record)))
    }

    /// Known ids from `unlockedLocations`, in stored order.
    ///
    /// Unknown keys are dropped rather than failing the whole load.
    #[must_use]
    pub fn unlocked_ids(&self) -> Option<Vec<LocationId>> {
        let keys = self.unlocked_locations.as_ref()?;
        let mut ids = Vec::with_capacity(keys.len());
        for key in keys {
            match key.parse::<LocationId>() {
                Ok(id) if !ids.contains(&id) => ids.push(id),
                Ok(_) => {}
                Err(err) => debug!(%err, "dropping unlocked entry from snapshot"),
            }
        }
        Some(ids)
    }

    fn slot(&self, id: LocationId) -> Option<LocationProgress> {
        match id {
            LocationId::Library => self.library,
            LocationId::Decoding => self.decoding,
            LocationId::Puzzle => self.puzzle,
            LocationId::Temple => self.temple,
            LocationId::Forest => self.forest,
            LocationId::Cave => self.cave,
        }
    }

    fn slot_mut(&mut self, id: LocationId) -> &mut Option<LocationProgress> {
        match id {
            LocationId::Library => &mut self.library,
            LocationId::Decoding => &mut self.decoding,
            LocationId::Puzzle => &mut self.puzzle,
            LocationId::Temple => &mut self.temple,
            LocationId::Forest => &mut self.forest,
            LocationId::Cave => &mut self.cave,
        }
    }
}

//
// ─── Lenient field decoding ────────────────────────────────────────────────────
//

fn decode_field<T>(
    fields: &Map<String, Value>,
    key: &str,
    decode: impl FnOnce(&Value) -> Option<T>,
) -> Option<T> {
    let raw = fields.get(key).filter(|raw| !raw.is_null())?;
    let decoded = decode(raw);
    if decoded.is_none() {
        warn!(key, value = %raw, "ignoring unreadable snapshot field");
    }
    decoded
}

/// A location record; unreadable members fall back to their defaults.
fn decode_record(raw: &Value) -> Option<LocationProgress> {
    let fields = raw.as_object()?;
    let mut record = LocationProgress::default();
    if let Some(completed) = fields.get("completed") {
        match completed.as_bool() {
            Some(completed) => record.completed = completed,
            None => debug!(value = %completed, "ignoring unreadable completed flag"),
        }
    }
    if let Some(progress) = fields.get("progress") {
        match decode_percent(progress) {
            Some(progress) => record.progress = progress,
            None => debug!(value = %progress, "ignoring unreadable progress value"),
        }
    }
    Some(record)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn decode_percent(raw: &Value) -> Option<u8> {
    let value = raw.as_f64().filter(|v| v.is_finite())?;
    Some(value.round().clamp(0.0, f64::from(u8::MAX)) as u8)
}

fn decode_keys(raw: &Value) -> Option<Vec<String>> {
    let entries = raw.as_array()?;
    Some(
        entries
            .iter()
            .filter_map(|entry| {
                let key = entry.as_str().map(str::to_string);
                if key.is_none() {
                    debug!(value = %entry, "dropping non-text unlocked entry");
                }
                key
            })
            .collect(),
    )
}

fn decode_timestamp(raw: &Value) -> Option<DateTime<Utc>> {
    match raw {
        Value::String(text) => DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|at| at.with_timezone(&Utc)),
        Value::Number(millis) => millis.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProgressDelta;
    use crate::time::fixed_now;

    #[test]
    fn encodes_with_camel_case_save_keys() {
        let mut state = GameState::initial();
        state.apply_delta(LocationId::Library, ProgressDelta::completed(), fixed_now());

        let json = GameSnapshot::from_state(&state).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["library"]["completed"], true);
        assert_eq!(value["library"]["progress"], 100);
        assert_eq!(value["cave"]["progress"], 0);
        assert_eq!(value["totalProgress"], 17);
        assert_eq!(
            value["unlockedLocations"],
            serde_json::json!(["library", "decoding"])
        );
        assert_eq!(value["lastPlayed"], "2023-11-14T22:13:20Z");
    }

    #[test]
    fn state_survives_snapshot_round_trip() {
        let mut state = GameState::initial();
        state.apply_delta(LocationId::Library, ProgressDelta::completed(), fixed_now());
        state.apply_delta(
            LocationId::Decoding,
            ProgressDelta::default().with_progress(40),
            fixed_now(),
        );

        let body = GameSnapshot::from_state(&state).to_json().unwrap();
        let restored = GameState::from_snapshot(GameSnapshot::from_json(&body).unwrap());
        assert_eq!(restored, state);
    }

    #[test]
    fn unknown_and_duplicate_unlocked_entries_are_dropped() {
        let snapshot = GameSnapshot::from_json(
            r#"{"unlockedLocations":["library","atlantis","decoding","library"]}"#,
        )
        .unwrap();
        assert_eq!(
            snapshot.unlocked_ids(),
            Some(vec![LocationId::Library, LocationId::Decoding])
        );
    }

    #[test]
    fn null_last_played_is_accepted() {
        let snapshot = GameSnapshot::from_json(r#"{"lastPlayed":null}"#).unwrap();
        assert_eq!(snapshot.last_played, None);
    }

    #[test]
    fn truncated_body_is_malformed() {
        let err = GameSnapshot::from_json("{\"library\": ").unwrap_err();
        assert!(matches!(err, SnapshotError::Malformed(_)));
    }

    #[test]
    fn non_object_body_is_rejected() {
        let err = GameSnapshot::from_json("[1, 2, 3]").unwrap_err();
        assert!(matches!(err, SnapshotError::NotAnObject));
    }

    const USABLE_FIELDS: &str =
        r#""library":{"completed":true,"progress":100},"unlockedLocations":["library","decoding"]"#;

    fn with_usable_fields(extra: &str) -> GameSnapshot {
        GameSnapshot::from_json(&format!("{{{USABLE_FIELDS},{extra}}}")).unwrap()
    }

    fn assert_usable_fields_kept(snapshot: &GameSnapshot) {
        assert_eq!(snapshot.library, Some(LocationProgress::new(true, 100)));
        assert_eq!(
            snapshot.unlocked_ids(),
            Some(vec![LocationId::Library, LocationId::Decoding])
        );
    }

    #[test]
    fn mistyped_field_does_not_discard_the_rest() {
        let snapshot = with_usable_fields(r#""totalProgress":"lots""#);
        assert_usable_fields_kept(&snapshot);
        assert_eq!(snapshot.total_progress, None);

        let snapshot = with_usable_fields(r#""lastPlayed":{"at":"noon"}"#);
        assert_usable_fields_kept(&snapshot);
        assert_eq!(snapshot.last_played, None);

        let snapshot = with_usable_fields(r#""temple":"done""#);
        assert_usable_fields_kept(&snapshot);
        assert_eq!(snapshot.temple, None);
    }

    #[test]
    fn loose_numbers_and_epoch_timestamps_are_accepted() {
        let snapshot = with_usable_fields(r#""totalProgress":16.5,"lastPlayed":1700000000000"#);
        assert_usable_fields_kept(&snapshot);
        assert_eq!(snapshot.total_progress, Some(17));
        assert_eq!(snapshot.last_played, Some(fixed_now()));
    }

    #[test]
    fn unreadable_record_member_falls_back_to_default() {
        let snapshot = with_usable_fields(r#""decoding":{"completed":true,"progress":"40"}"#);
        assert_usable_fields_kept(&snapshot);
        assert_eq!(snapshot.decoding, Some(LocationProgress::new(true, 0)));
    }
}
