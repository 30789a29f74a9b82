//! Static content for the six hunt locations.

use crate::model::LocationId;

/// One step of a location's mini-game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepDefinition {
    pub icon: &'static str,
    pub title: &'static str,
    pub description: &'static str,
}

/// Everything the session engine and views need about a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationDefinition {
    pub id: LocationId,
    pub name: &'static str,
    pub description: &'static str,
    pub steps: &'static [StepDefinition],
}

/// Entry of the location overview, in chain order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationInfo {
    pub id: LocationId,
    pub name: &'static str,
    pub icon: &'static str,
    pub description: &'static str,
}

const fn step(
    icon: &'static str,
    title: &'static str,
    description: &'static str,
) -> StepDefinition {
    StepDefinition {
        icon,
        title,
        description,
    }
}

static DEFINITIONS: [LocationDefinition; 6] = [
    LocationDefinition {
        id: LocationId::Library,
        name: "Ancient Library",
        description: "Search the dusty shelves for clues",
        steps: &[
            step("🔍", "Find the old tomes", "Searching the shelves for records of the treasure..."),
            step("📜", "Read the diary", "Deciphering the explorer's old diary..."),
        ],
    },
    LocationDefinition {
        id: LocationId::Decoding,
        name: "Decoding Room",
        description: "Read ancient scripts and mysterious symbols",
        steps: &[
            step("📖", "Analyse the script", "Studying the grammar and structure of the script..."),
            step("🧩", "Crack the cipher", "Applying cryptography to uncover the hidden message..."),
        ],
    },
    LocationDefinition {
        id: LocationId::Puzzle,
        name: "Puzzle Hall",
        description: "Solve the old riddles on the way to the temple",
        steps: &[
            step("❓", "Learn the rules", "Working out how the riddle is meant to be solved..."),
            step("🔢", "Solve the riddle", "Operating the mechanism in the right order..."),
        ],
    },
    LocationDefinition {
        id: LocationId::Temple,
        name: "Hidden Temple",
        description: "Look for the final treasure",
        steps: &[
            step("🔍", "Find the chest", "Searching the depths of the temple for the chest..."),
            step("🗝️", "Open the chest", "Using the collected clues to open the chest..."),
        ],
    },
    LocationDefinition {
        id: LocationId::Forest,
        name: "Misty Forest",
        description: "Explore the hidden forest paths",
        steps: &[
            step("🧭", "Find the path", "Finding the right direction through the mist..."),
            step("🌿", "Gather herbs", "Looking for the mysterious healing herbs..."),
        ],
    },
    LocationDefinition {
        id: LocationId::Cave,
        name: "Crystal Cave",
        description: "Collect energy crystals",
        steps: &[
            step("⛏️", "Mine crystals", "Searching the cave walls for crystals..."),
            step("💫", "Charge crystals", "Filling the crystals with mysterious energy..."),
        ],
    },
];

static OVERVIEW: [LocationInfo; 6] = [
    LocationInfo {
        id: LocationId::Library,
        name: "Ancient Library",
        icon: "📚",
        description: "Find the first clues",
    },
    LocationInfo {
        id: LocationId::Decoding,
        name: "Decoding Room",
        icon: "🔍",
        description: "Read the ancient scripts",
    },
    LocationInfo {
        id: LocationId::Puzzle,
        name: "Puzzle Hall",
        icon: "🧩",
        description: "Solve the old riddles",
    },
    LocationInfo {
        id: LocationId::Temple,
        name: "Hidden Temple",
        icon: "🏛️",
        description: "Find the final treasure",
    },
    LocationInfo {
        id: LocationId::Forest,
        name: "Misty Forest",
        icon: "🌳",
        description: "Explore the hidden paths",
    },
    LocationInfo {
        id: LocationId::Cave,
        name: "Crystal Cave",
        icon: "💎",
        description: "Collect energy crystals",
    },
];

#[must_use]
pub fn location(id: LocationId) -> &'static LocationDefinition {
    &DEFINITIONS[id.index()]
}

/// Definition for a wire key; unknown keys get the seed location.
#[must_use]
pub fn location_by_key(key: &str) -> &'static LocationDefinition {
    location(LocationId::resolve(key))
}

#[must_use]
pub fn step_definitions(id: LocationId) -> &'static [StepDefinition] {
    location(id).steps
}

#[must_use]
pub fn all_locations() -> &'static [LocationInfo] {
    &OVERVIEW
}
