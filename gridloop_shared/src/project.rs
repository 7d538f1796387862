use serde::{Deserialize, Serialize};

/// Current save format version. Field additions do not bump this; loaders
/// skip members they do not recognize.
pub const PROJECT_VERSION: u32 = 1;

/// A single note event stored on a step. Duration is in clock ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteEvent {
    #[serde(rename = "n")]
    pub note: u8,
    #[serde(rename = "v")]
    pub velocity: u8,
    #[serde(rename = "d")]
    pub duration: u16,
}

impl NoteEvent {
    pub const ZERO: NoteEvent = NoteEvent {
        note: 0,
        velocity: 0,
        duration: 0,
    };

    /// True when the event satisfies the storage invariants
    /// (note and velocity in MIDI range, duration at least one tick).
    pub fn is_valid(&self) -> bool {
        self.note <= 127 && self.velocity <= 127 && self.duration >= 1
    }
}

/// Serialized state of one track: the step-event grid plus the stateful
/// direction bookkeeping that must survive a save/load cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackSnapshot {
    /// One entry per step; each entry lists the events on that step.
    #[serde(default)]
    pub events: Vec<Vec<NoteEvent>>,
    #[serde(rename = "shuffleOrder", default)]
    pub shuffle_order: Vec<u8>,
    #[serde(rename = "shufflePos", default = "one")]
    pub shuffle_pos: u8,
    #[serde(rename = "brownianPos", default = "one")]
    pub brownian_pos: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectData {
    pub version: u32,
    #[serde(rename = "numTracks")]
    pub num_tracks: u32,
    #[serde(default)]
    pub tracks: Vec<TrackSnapshot>,
}

fn one() -> u8 {
    1
}
