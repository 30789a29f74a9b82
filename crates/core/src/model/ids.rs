use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Identifier of one of the six hunt locations.
///
/// Variants are declared in prerequisite-chain order, so the derived `Ord`
/// matches the order in which locations unlock.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationId {
    Library,
    Decoding,
    Puzzle,
    Temple,
    Forest,
    Cave,
}

impl LocationId {
    /// Every location, in chain order.
    pub const ALL: [LocationId; 6] = [
        LocationId::Library,
        LocationId::Decoding,
        LocationId::Puzzle,
        LocationId::Temple,
        LocationId::Forest,
        LocationId::Cave,
    ];

    /// The location that is unlocked from the start.
    pub const SEED: LocationId = LocationId::Library;

    /// Wire key used in snapshots and on the command line.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            LocationId::Library => "library",
            LocationId::Decoding => "decoding",
            LocationId::Puzzle => "puzzle",
            LocationId::Temple => "temple",
            LocationId::Forest => "forest",
            LocationId::Cave => "cave",
        }
    }

    /// Position in the prerequisite chain (seed is 0).
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// The location that must be completed before this one unlocks.
    #[must_use]
    pub fn prerequisite(self) -> Option<LocationId> {
        self.index()
            .checked_sub(1)
            .and_then(|prev| Self::ALL.get(prev).copied())
    }

    /// The location this one unlocks once completed.
    #[must_use]
    pub fn successor(self) -> Option<LocationId> {
        Self::ALL.get(self.index() + 1).copied()
    }

    #[must_use]
    pub fn is_seed(self) -> bool {
        self == Self::SEED
    }

    /// Parse a wire key, falling back to the seed location when unknown.
    #[must_use]
    pub fn resolve(key: &str) -> LocationId {
        key.parse().unwrap_or(Self::SEED)
    }
}

/// Unique identifier for a registered player
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(u64);

impl UserId {
    /// Creates a new `UserId`
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying u64 value
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LocationId({})", self.key())
    }
}

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({})", self.0)
    }
}

// ─── Display Implementations ───────────────────────────────────────────────────

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─── FromStr Implementations ───────────────────────────────────────────────────

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LocationError {
    #[error("unknown location: {0}")]
    UnknownLocation(String),
}

impl FromStr for LocationId {
    type Err = LocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim();
        Self::ALL
            .into_iter()
            .find(|id| id.key() == key)
            .ok_or_else(|| LocationError::UnknownLocation(key.to_string()))
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_links_each_location_to_its_neighbours() {
        assert_eq!(LocationId::Library.prerequisite(), None);
        assert_eq!(LocationId::Decoding.prerequisite(), Some(LocationId::Library));
        assert_eq!(LocationId::Cave.prerequisite(), Some(LocationId::Forest));
        assert_eq!(LocationId::Forest.successor(), Some(LocationId::Cave));
        assert_eq!(LocationId::Cave.successor(), None);
    }

    #[test]
    fn location_keys_round_trip_through_from_str() {
        for id in LocationId::ALL {
            assert_eq!(id.key().parse::<LocationId>().unwrap(), id);
        }
    }

    #[test]
    fn unknown_location_is_rejected_by_parse_but_resolved_to_seed() {
        let err = "volcano".parse::<LocationId>().unwrap_err();
        assert_eq!(err, LocationError::UnknownLocation("volcano".into()));
        assert_eq!(LocationId::resolve("volcano"), LocationId::Library);
        assert_eq!(LocationId::resolve("temple"), LocationId::Temple);
    }

    #[test]
    fn location_serializes_as_lowercase_key() {
        let json = serde_json::to_string(&LocationId::Puzzle).unwrap();
        assert_eq!(json, "\"puzzle\"");
    }
}
