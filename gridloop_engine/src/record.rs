use crate::config::{safe_step_index, safe_track_index};
use crate::engine::Engine;
use crate::params::{
    TrackParams, PARAM_RECORD, PARAM_REC_DIVISION, PARAM_REC_MODE, PARAM_REC_SNAP,
    PARAM_REC_TRACK, REC_MODE_REPLACE, REC_MODE_STEP,
};
use crate::quantize::{
    cached_quantize, quantize_duration, snap_step_subclock, snap_to_division_subclock,
};
use crate::transport::RecordState;

/// A live MIDI input note between note-on and note-off, captured pending the
/// recording commit. At most one per MIDI note number; a second note-on
/// overwrites the earlier capture.
#[derive(Debug, Clone, Copy)]
pub struct HeldNote {
    pub note: u8,
    pub velocity: u8,
    pub track: u8,
    /// Division-snapped step where the event will be stored
    pub quantized_step: u8,
    /// Raw-step-snapped position used to measure duration
    pub effective_step: u8,
    pub quantize: u8,
    pub loop_len: u8,
    pub raw_step: u8,
    pub active: bool,
}

impl HeldNote {
    pub const INACTIVE: HeldNote = HeldNote {
        note: 0,
        velocity: 0,
        track: 0,
        quantized_step: 1,
        effective_step: 1,
        quantize: 1,
        loop_len: 1,
        raw_step: 1,
        active: false,
    };
}

/// Everything a recording operation needs, captured once per MIDI event so
/// the snap math sees one consistent view of the clock.
#[derive(Debug, Clone, Copy)]
pub struct RecordingContext {
    pub track: usize,
    pub loop_len: i32,
    pub quantize: i32,
    pub snap_threshold: f32,
    pub raw_step: i32,
    pub step_fraction: f32,
}

impl Engine {
    /// Cached `(effective_quantize, loop_len)` for a track.
    pub(crate) fn track_quantize(&mut self, track: usize) -> (i32, i32) {
        let length = TrackParams::new(&self.params, track).length();
        let division = self.params[PARAM_REC_DIVISION] as i32;
        cached_quantize(length, division, &mut self.tracks[track].cache)
    }

    /// Build a recording context from the current playback position and the
    /// fraction of the running clock tick that has elapsed.
    pub(crate) fn recording_context(&mut self, track: usize) -> RecordingContext {
        let (quantize, loop_len) = self.track_quantize(track);
        let raw_step = (self.tracks[track].step as i32).clamp(1, loop_len);
        let step_fraction = if self.step_duration > 0.0 {
            (self.step_time / self.step_duration).clamp(0.0, 1.0)
        } else {
            0.0
        };
        RecordingContext {
            track,
            loop_len,
            quantize,
            snap_threshold: self.params[PARAM_REC_SNAP] as f32 / 100.0,
            raw_step,
            step_fraction,
        }
    }

    // LIVE RECORDING

    /// Start tracking a held note. Captures both the division-snapped store
    /// position and the raw-snapped position used later for duration.
    pub(crate) fn record_note_on(&mut self, ctx: &RecordingContext, note: u8, velocity: u8) {
        let held = &mut self.held[note as usize & 0x7F];
        held.active = true;
        held.note = note;
        held.velocity = velocity;
        held.track = ctx.track as u8;
        held.quantized_step = snap_to_division_subclock(
            ctx.raw_step,
            ctx.step_fraction,
            ctx.quantize,
            ctx.snap_threshold,
            ctx.loop_len,
        ) as u8;
        held.effective_step =
            snap_step_subclock(ctx.raw_step, ctx.step_fraction, ctx.snap_threshold, ctx.loop_len)
                as u8;
        held.quantize = ctx.quantize as u8;
        held.loop_len = ctx.loop_len as u8;
        held.raw_step = ctx.raw_step as u8;
    }

    /// Complete a held note and store the event. Duration is the wrapped
    /// raw-step distance, rounded to a quantize multiple and clamped so the
    /// note cannot out-run the loop from its quantized start.
    pub(crate) fn record_note_off(&mut self, ctx: &RecordingContext, note: u8) {
        let held = self.held[note as usize & 0x7F];
        if !held.active {
            return;
        }

        let effective_end = snap_step_subclock(
            ctx.raw_step,
            ctx.step_fraction,
            ctx.snap_threshold,
            held.loop_len as i32,
        );

        let mut duration = effective_end - held.effective_step as i32;
        if duration < 0 {
            duration += held.loop_len as i32;
        }
        duration = duration.max(1);
        duration = quantize_duration(duration, held.quantize as i32);

        let max_duration = held.loop_len as i32 - held.quantized_step as i32 + 1;
        duration = duration.min(max_duration);

        let track = safe_track_index(held.track as i32, self.num_tracks);
        let step_idx = safe_step_index(held.quantized_step as i32 - 1);
        self.tracks[track].data.steps[step_idx].add(note, held.velocity, duration as u16);

        self.held[note as usize & 0x7F].active = false;
    }

    /// Commit all held notes, treating the current playback step as their
    /// end. Runs when live recording stops.
    pub(crate) fn finalize_held_notes(&mut self) {
        for note in 0..128usize {
            let held = self.held[note];
            if !held.active {
                continue;
            }

            let track = safe_track_index(held.track as i32, self.num_tracks);
            let current_step = (self.tracks[track].step as i32).clamp(1, held.loop_len as i32);

            let mut duration = current_step - held.effective_step as i32;
            if duration < 0 {
                duration += held.loop_len as i32;
            }
            duration = duration.max(1);
            duration = quantize_duration(duration, held.quantize as i32);

            let max_duration = held.loop_len as i32 - held.quantized_step as i32 + 1;
            duration = duration.min(max_duration);

            let step_idx = safe_step_index(held.quantized_step as i32 - 1);
            self.tracks[track].data.steps[step_idx].add(note as u8, held.velocity, duration as u16);

            self.held[note].active = false;
        }
    }

    /// Drop all held notes without recording them (record track changed).
    pub(crate) fn clear_held_notes(&mut self) {
        for held in self.held.iter_mut() {
            held.active = false;
        }
    }

    // STEP RECORDING

    /// Insert a note at the cursor's division boundary with a one-division
    /// duration. Chords land on the same step until a note-off drains the
    /// held input.
    pub(crate) fn step_record_note_on(&mut self, track: usize, note: u8, velocity: u8) {
        let (quantize, loop_len) = self.track_quantize(track);
        if self.step_rec_pos == 0 {
            self.step_rec_pos = 1;
        }

        let mut target = (self.step_rec_pos as i32 - 1) * quantize + 1;
        if target > loop_len {
            target = 1;
            self.step_rec_pos = 1;
        }

        let max_duration = (loop_len - target + 1).max(1);
        let duration = quantize.min(max_duration) as u16;

        let step_idx = safe_step_index(target - 1);
        self.tracks[track].data.steps[step_idx].add(note, velocity, duration);
    }

    /// A note-off that drains all held input notes advances the cursor,
    /// wrapping past the last division.
    pub(crate) fn step_record_note_off(&mut self, track: usize) {
        if self.input_notes.iter().any(|&h| h) {
            return;
        }

        let (quantize, loop_len) = self.track_quantize(track);
        let num_divisions = (loop_len / quantize).max(1);

        let mut pos = self.step_rec_pos.max(1) as i32 + 1;
        if pos > num_divisions {
            pos = 1;
        }
        self.step_rec_pos = pos as u8;
    }

    // STATE MACHINE

    /// Consume Record / Rec Mode / Rec Track once per block and step the
    /// recording state machine. Runs before the clock stage so a record-on
    /// edge in the same block takes effect before the tick it records
    /// against.
    pub(crate) fn update_record_machine(&mut self) {
        let record = self.params[PARAM_RECORD];
        let rec_mode = self.params[PARAM_REC_MODE];
        let rec_track_param = self.params[PARAM_REC_TRACK];
        let is_step_mode = rec_mode == REC_MODE_STEP;

        // Switching the record track mid-recording abandons held notes
        if rec_track_param != self.last_rec_track {
            self.clear_held_notes();
            if self.record == RecordState::Step {
                self.step_rec_pos = 1;
            }
            self.last_rec_track = rec_track_param;
        }

        let record_changed = record != self.last_record;

        match self.record {
            RecordState::Idle => {
                if record_changed && record == 1 {
                    if is_step_mode {
                        self.step_rec_pos = 1;
                        self.record = RecordState::Step;
                    } else if self.transport.is_running() {
                        if rec_mode == REC_MODE_REPLACE {
                            let t = self.rec_track();
                            self.tracks[t].data.clear();
                        }
                        self.record = RecordState::Live;
                    } else {
                        self.record = RecordState::LivePending;
                    }
                }
            }

            RecordState::Live => {
                if record_changed && record == 0 {
                    self.finalize_held_notes();
                    self.record = RecordState::Idle;
                } else if is_step_mode {
                    // Mode changed to Step while live recording
                    self.finalize_held_notes();
                    self.step_rec_pos = 1;
                    self.record = RecordState::Step;
                }
            }

            RecordState::Step => {
                if record_changed && record == 0 {
                    self.step_rec_pos = 0;
                    self.record = RecordState::Idle;
                } else if !is_step_mode {
                    // Mode changed to Live while step recording
                    self.step_rec_pos = 0;
                    if self.transport.is_running() {
                        if rec_mode == REC_MODE_REPLACE {
                            let t = self.rec_track();
                            self.tracks[t].data.clear();
                        }
                        self.record = RecordState::Live;
                    } else {
                        self.record = RecordState::LivePending;
                    }
                }
            }

            RecordState::LivePending => {
                if record_changed && record == 0 {
                    self.record = RecordState::Idle;
                } else if is_step_mode {
                    self.step_rec_pos = 1;
                    self.record = RecordState::Step;
                } else if self.transport.is_running() {
                    // Normally promoted by handle_transport_start; kept as a
                    // safety net in case the block ordering ever changes
                    if rec_mode == REC_MODE_REPLACE {
                        let t = self.rec_track();
                        self.tracks[t].data.clear();
                    }
                    self.record = RecordState::Live;
                }
            }
        }

        self.last_record = record;
    }
}
