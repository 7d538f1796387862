use gridloop_shared::project::NoteEvent;

use crate::config::{MAX_EVENTS_PER_STEP, MAX_STEPS};
use crate::rng::SplitMix32;

/// Events for a single step. All events on a step fire together; insertion
/// order is preserved but not meaningful. No two events share a note number.
#[derive(Debug, Clone, Copy)]
pub struct StepEvents {
    pub events: [NoteEvent; MAX_EVENTS_PER_STEP],
    pub count: u8,
}

impl StepEvents {
    pub const EMPTY: StepEvents = StepEvents {
        events: [NoteEvent::ZERO; MAX_EVENTS_PER_STEP],
        count: 0,
    };

    pub fn has_note(&self, note: u8) -> bool {
        self.events[..self.count as usize].iter().any(|e| e.note == note)
    }

    /// Append an event. Inserts that would overflow the step or duplicate a
    /// note number are silently skipped.
    pub fn add(&mut self, note: u8, velocity: u8, duration: u16) -> bool {
        if self.count as usize >= MAX_EVENTS_PER_STEP || self.has_note(note) {
            return false;
        }
        self.events[self.count as usize] = NoteEvent { note, velocity, duration };
        self.count += 1;
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &NoteEvent> {
        self.events[..self.count as usize].iter()
    }

    pub fn clear(&mut self) {
        self.count = 0;
    }
}

/// The step-event grid of one track. Only indices `0..length-1` are
/// semantically live; the rest keep zeroed counts.
#[derive(Debug, Clone, Copy)]
pub struct TrackData {
    pub steps: [StepEvents; MAX_STEPS],
}

impl TrackData {
    pub const EMPTY: TrackData = TrackData {
        steps: [StepEvents::EMPTY; MAX_STEPS],
    };

    pub fn clear(&mut self) {
        for s in self.steps.iter_mut() {
            s.count = 0;
        }
    }
}

/// Duration countdown slot for one sounding note, indexed by MIDI note
/// number. The output channel and destination are captured at note-on so the
/// matching note-off cannot land on the wrong port after a parameter change.
#[derive(Debug, Clone, Copy)]
pub struct PlayingNote {
    pub remaining: u16,
    pub out_ch: u8,
    pub destination: u32,
    pub active: bool,
}

impl PlayingNote {
    pub const OFF: PlayingNote = PlayingNote {
        remaining: 0,
        out_ch: 1,
        destination: 0,
        active: false,
    };
}

/// Derived values that are recomputed only when Length or Division change.
#[derive(Debug, Clone, Copy)]
pub struct TrackCache {
    pub effective_quantize: u8,
    pub loop_len: u8,
    pub dirty: bool,
}

impl TrackCache {
    pub const DIRTY: TrackCache = TrackCache {
        effective_quantize: 1,
        loop_len: 1,
        dirty: true,
    };

    pub fn invalidate(&mut self) {
        self.dirty = true;
    }
}

/// Complete per-track runtime state.
pub struct TrackState {
    // Step event data
    pub data: TrackData,

    // Playing notes (duration tracking) and their velocities
    pub playing: [PlayingNote; 128],
    pub active_notes: [u8; 128],

    // Shuffle direction state
    pub shuffle_order: [u8; MAX_STEPS],
    pub shuffle_pos: u8,

    // Playback state
    pub clock_count: u16,
    pub div_counter: u16,
    pub loop_count: u16,
    pub step: u8,
    pub last_step: u8,
    pub brownian_pos: u8,
    pub active_vel: u8,
    pub octave_play_count: u16,

    // Enable-transition detection
    pub last_enabled: i16,

    pub cache: TrackCache,

    // Per-track PRNG stream
    pub rng: SplitMix32,
}

/// Identity permutation `1..=MAX_STEPS`, the reset state of a shuffle order.
pub fn identity_order() -> [u8; MAX_STEPS] {
    let mut order = [0u8; MAX_STEPS];
    for (i, slot) in order.iter_mut().enumerate() {
        *slot = (i + 1) as u8;
    }
    order
}

impl TrackState {
    pub fn new(seed: u32, enabled: bool) -> Self {
        Self {
            data: TrackData::EMPTY,
            playing: [PlayingNote::OFF; 128],
            active_notes: [0; 128],
            shuffle_order: identity_order(),
            shuffle_pos: 1,
            clock_count: 0,
            div_counter: 0,
            loop_count: 0,
            step: 0,
            last_step: 1,
            brownian_pos: 1,
            active_vel: 0,
            octave_play_count: 0,
            last_enabled: enabled as i16,
            cache: TrackCache::DIRTY,
            rng: SplitMix32::new(seed),
        }
    }

    /// Reset playback position for a transport start.
    pub fn reset_position(&mut self) {
        self.step = 0;
        self.clock_count = 0;
        self.div_counter = 0;
        self.loop_count = 0;
        self.last_step = 1;
        self.brownian_pos = 1;
        self.shuffle_pos = 1;
        self.octave_play_count = 0;
        self.shuffle_order = identity_order();
    }

    /// Drop every playing-note slot without emitting MIDI. Callers are
    /// responsible for sending the offs first.
    pub fn silence(&mut self) {
        for n in 0..128 {
            self.playing[n].active = false;
            self.playing[n].remaining = 0;
            self.active_notes[n] = 0;
        }
        self.active_vel = 0;
    }

    /// Recompute the UI velocity after a note was released.
    pub fn refresh_active_vel(&mut self) {
        if self.active_notes.iter().all(|&v| v == 0) {
            self.active_vel = 0;
        }
    }
}
