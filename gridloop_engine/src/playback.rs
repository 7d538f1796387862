use gridloop_shared::project::NoteEvent;
use gridloop_shared::{dest_to_mask, scale, with_channel, MIDI_NOTE_OFF, MIDI_NOTE_ON};

use crate::conditions::{self, COND_FIXED};
use crate::config::{safe_note_index, safe_track_index, MAX_DELAYED_NOTES, MAX_STEPS};
use crate::directions::{calculate_track_step, detect_wrap, Direction};
use crate::engine::Engine;
use crate::midi::MidiSender;
use crate::modifiers::{apply_binary_modifiers, apply_modifiers};
use crate::params::{
    TrackParams, PARAM_FILL, PARAM_REC_MODE, PARAM_SCALE_ROOT, PARAM_SCALE_TYPE, REC_MODE_REPLACE,
};
use crate::track::PlayingNote;
use crate::transport::{RecordState, TransportState};

/// A note waiting out its humanization delay before emission.
#[derive(Debug, Clone, Copy)]
pub struct DelayedNote {
    pub note: u8,
    pub velocity: u8,
    pub track: u8,
    pub out_ch: u8,
    pub duration: u16,
    /// Remaining delay in milliseconds
    pub delay: u16,
    pub destination: u32,
    pub active: bool,
}

impl DelayedNote {
    pub const INACTIVE: DelayedNote = DelayedNote {
        note: 0,
        velocity: 0,
        track: 0,
        out_ch: 1,
        duration: 0,
        delay: 0,
        destination: 0,
        active: false,
    };
}

impl Engine {
    // TRANSPORT CONTROL

    /// Gate rising edge: reset every track's playback position and start.
    /// A pending live recording is promoted now that the transport runs.
    pub(crate) fn handle_transport_start(&mut self) {
        for ts in self.tracks.iter_mut() {
            ts.reset_position();
        }
        self.step_time = 0.0;
        self.transport = TransportState::Running;

        if self.record == RecordState::LivePending {
            let rec = self.rec_track();
            if self.params[PARAM_REC_MODE] == REC_MODE_REPLACE {
                self.tracks[rec].data.clear();
            }
            self.record = RecordState::Live;
        }
    }

    /// Gate falling edge: finalize held notes, silence everything, stop.
    pub(crate) fn handle_transport_stop(&mut self, out: &mut dyn MidiSender) {
        if self.record == RecordState::Live {
            self.finalize_held_notes();
            self.record = RecordState::Idle;
        }

        self.transport = TransportState::Stopped;
        self.send_all_notes_off(out);

        for ts in self.tracks.iter_mut() {
            ts.step = 0;
            ts.clock_count = 0;
            ts.div_counter = 0;
            ts.loop_count = 0;
            ts.silence();
            ts.brownian_pos = 1;
            ts.shuffle_pos = 1;
        }

        for dn in self.delayed.iter_mut() {
            dn.active = false;
        }

        self.step_time = 0.0;
    }

    // DELAYED NOTE PROCESSING (humanization)

    /// Advance every pending delay by the block duration (minimum 1 ms) and
    /// emit the notes that came due, priming their playing-note slots.
    pub(crate) fn process_delayed_notes(&mut self, dt: f32, out: &mut dyn MidiSender) {
        let decrement = ((dt * 1000.0) as i32).max(1) as u16;

        for i in 0..MAX_DELAYED_NOTES {
            if !self.delayed[i].active {
                continue;
            }
            let dn = self.delayed[i];

            if dn.delay <= decrement {
                out.send_midi(
                    dn.destination,
                    with_channel(MIDI_NOTE_ON, dn.out_ch as i32),
                    dn.note,
                    dn.velocity,
                );

                // Stored indices may be stale; clamp rather than trust them
                let track = safe_track_index(dn.track as i32, self.num_tracks);
                let note = safe_note_index(dn.note as i32);
                let ts = &mut self.tracks[track];
                ts.playing[note] = PlayingNote {
                    remaining: dn.duration,
                    out_ch: dn.out_ch,
                    destination: dn.destination,
                    active: true,
                };
                ts.active_notes[note] = dn.velocity;
                ts.active_vel = dn.velocity;

                self.delayed[i].active = false;
            } else {
                self.delayed[i].delay -= decrement;
            }
        }
    }

    /// Put a note into the delay pool. A full pool drops the note.
    pub(crate) fn schedule_delayed_note(
        &mut self,
        note: u8,
        velocity: u8,
        track: u8,
        out_ch: u8,
        duration: u16,
        delay: u16,
        destination: u32,
    ) -> bool {
        for slot in self.delayed.iter_mut() {
            if !slot.active {
                *slot = DelayedNote {
                    note,
                    velocity,
                    track,
                    out_ch,
                    duration,
                    delay,
                    destination,
                    active: true,
                };
                return true;
            }
        }
        log::debug!("delayed-note pool full, dropping note {}", note);
        false
    }

    // NOTE DURATION PROCESSING

    /// Count down playing-note durations; expired notes get their off on the
    /// channel/destination captured at note-on.
    fn process_note_durations(&mut self, track: usize, out: &mut dyn MidiSender) {
        for n in 0..128 {
            let pn = self.tracks[track].playing[n];
            if !pn.active {
                continue;
            }

            if pn.remaining <= 1 {
                out.send_midi(
                    pn.destination,
                    with_channel(MIDI_NOTE_OFF, pn.out_ch as i32),
                    n as u8,
                    0,
                );
                let ts = &mut self.tracks[track];
                ts.playing[n].active = false;
                ts.playing[n].remaining = 0;
                ts.active_notes[n] = 0;
                ts.refresh_active_vel();
            } else {
                self.tracks[track].playing[n].remaining -= 1;
            }
        }
    }

    // PANIC

    /// Silence everything on every track and drop all pending delays.
    fn handle_panic(&mut self, out: &mut dyn MidiSender) {
        self.send_all_notes_off(out);
        for ts in self.tracks.iter_mut() {
            ts.silence();
        }
        for dn in self.delayed.iter_mut() {
            dn.active = false;
        }
    }

    // OCTAVE JUMP

    /// Semitone shift for this step trigger; all notes on the step share it.
    /// Inactive while both range ends are 0. Every `bypass`-th note-play is
    /// forced unshifted.
    fn calculate_octave_jump(&mut self, track: usize) -> i32 {
        let tp = TrackParams::new(&self.params, track);
        let oct_min = tp.oct_min();
        let oct_max = tp.oct_max();
        if oct_min == 0 && oct_max == 0 {
            return 0;
        }
        let bypass = tp.oct_bypass();
        let prob = tp.oct_prob();

        let ts = &mut self.tracks[track];
        ts.octave_play_count = ts.octave_play_count.wrapping_add(1);

        if bypass > 0 && (ts.octave_play_count as i32 % bypass) == 0 {
            return 0;
        }

        if ts.rng.next_float_01() * 100.0 < prob as f32 {
            let octave = ts.rng.next_range(oct_min, oct_max);
            return octave * 12;
        }

        0
    }

    // NOTE EMISSION

    /// Emit one note now, or hand it to the delay pool when the track
    /// humanizes.
    #[allow(clippy::too_many_arguments)]
    fn emit_note(
        &mut self,
        track: usize,
        ev: NoteEvent,
        note_shift: i32,
        vel_offset: i32,
        humanize: i32,
        out_ch: i32,
        destination: u32,
        out: &mut dyn MidiSender,
    ) {
        let shifted = (ev.note as i32 + note_shift).clamp(0, 127) as u8;
        let note = scale::quantize(
            shifted,
            self.params[PARAM_SCALE_ROOT] as i32,
            scale::ScaleType::from_index(self.params[PARAM_SCALE_TYPE] as i32),
        ) as usize;
        let velocity = (ev.velocity as i32 + vel_offset).clamp(0, 127) as u8;

        let delay = if humanize > 0 {
            self.tracks[track].rng.next_range(0, humanize)
        } else {
            0
        };

        if delay == 0 {
            out.send_midi(destination, with_channel(MIDI_NOTE_ON, out_ch), note as u8, velocity);
            let ts = &mut self.tracks[track];
            // Same-note collision steals the slot: last-on wins
            ts.playing[note] = PlayingNote {
                remaining: ev.duration,
                out_ch: out_ch as u8,
                destination,
                active: true,
            };
            ts.active_notes[note] = velocity;
            ts.active_vel = velocity;
        } else {
            self.schedule_delayed_note(
                note as u8,
                velocity,
                track as u8,
                out_ch as u8,
                ev.duration,
                delay as u16,
                destination,
            );
        }
    }

    /// Play every event stored on the final step.
    fn play_track_events(
        &mut self,
        track: usize,
        final_step: i32,
        fixed: bool,
        out: &mut dyn MidiSender,
    ) {
        let step_idx = final_step - 1;
        if !(0..MAX_STEPS as i32).contains(&step_idx) {
            return;
        }
        let evs = self.tracks[track].data.steps[step_idx as usize];
        if evs.count == 0 {
            return;
        }

        let tp = TrackParams::new(&self.params, track);
        let vel_offset = tp.velocity();
        let humanize = tp.humanize();
        let out_ch = tp.channel();
        let destination = dest_to_mask(tp.destination());

        // Fixed trig conditions suppress the octave jump entirely
        let note_shift = if fixed { 0 } else { self.calculate_octave_jump(track) };

        for e in 0..evs.count as usize {
            self.emit_note(
                track,
                evs.events[e],
                note_shift,
                vel_offset,
                humanize,
                out_ch,
                destination,
                out,
            );
        }
    }

    // TRACK PROCESSING
    //
    // The step pipeline runs in strict order on every clock the track's
    // division admits:
    //
    //   1. base step from the direction mode (stateful for Brownian/Shuffle)
    //   2. continuous modifiers: Stability -> Motion -> Randomness ->
    //      Gravity -> Pedal
    //   3. binary filters: No Repeat, then Step Mask
    //
    // Direction intent is established before any modification; binary
    // filters see the fully modified result; the No-Repeat comparison uses
    // the previous cycle's FINAL step, never the raw base step. Disabled
    // tracks still run the pipeline (positions stay coherent) but suppress
    // emission.

    pub(crate) fn process_track(
        &mut self,
        track: usize,
        panic_on_wrap: bool,
        out: &mut dyn MidiSender,
    ) {
        // Duration countdowns first, independent of step calculation
        self.process_note_durations(track, out);

        let tp = TrackParams::new(&self.params, track);
        let loop_len = tp.length();
        let enabled = tp.enabled();
        let dir = Direction::from_index(tp.direction());
        let stride = tp.stride_size();

        // One-shot all-notes-off on the enabled -> disabled transition
        if !enabled && self.tracks[track].last_enabled == 1 {
            self.send_track_notes_off(track, out);
        }
        self.tracks[track].last_enabled = enabled as i16;

        // Advance clock and run the step pipeline
        let prev_pos;
        let final_step;
        {
            let ts = &mut self.tracks[track];
            ts.clock_count = ts.clock_count.wrapping_add(1);
            prev_pos = ts.step as i32;

            let tp = TrackParams::new(&self.params, track);
            let base_step = calculate_track_step(ts, loop_len, dir, stride);
            let last = ts.last_step as i32;
            let modified = apply_modifiers(&tp, base_step, last, loop_len, &mut ts.rng);
            let step = apply_binary_modifiers(&tp, modified, last, loop_len, &mut ts.rng);

            ts.last_step = step as u8;
            ts.step = step as u8;
            final_step = step;
        }

        // Loop wrap: bump the loop counter, panic globally if configured
        let clock_count = self.tracks[track].clock_count as i32;
        let wrapped = detect_wrap(prev_pos, final_step, loop_len, dir, clock_count);
        if wrapped && clock_count > 1 {
            self.tracks[track].loop_count = self.tracks[track].loop_count.wrapping_add(1);
        }
        if wrapped && panic_on_wrap {
            self.handle_panic(out);
        }

        if !enabled {
            return;
        }

        // Trig conditions: track-level gate first, then per-step A and B
        let fill_active = self.params[PARAM_FILL] == 1;
        let loop_count = self.tracks[track].loop_count;
        let tp = TrackParams::new(&self.params, track);

        if !conditions::evaluate(tp.step_cond(), loop_count, fill_active) {
            return;
        }

        let cond_step_a = tp.cond_step_a();
        let cond_step_b = tp.cond_step_b();
        let mut step_cond_met = true;
        if cond_step_a > 0 && final_step == cond_step_a {
            step_cond_met = conditions::evaluate(tp.cond_a(), loop_count, fill_active);
        }
        if cond_step_b > 0 && final_step == cond_step_b {
            step_cond_met = conditions::evaluate(tp.cond_b(), loop_count, fill_active);
        }
        if !step_cond_met {
            return;
        }

        // Fixed forces full probability and no octave jump
        let mut fixed = tp.step_cond() == COND_FIXED;
        if cond_step_a > 0 && final_step == cond_step_a && tp.cond_a() == COND_FIXED {
            fixed = true;
        }
        if cond_step_b > 0 && final_step == cond_step_b && tp.cond_b() == COND_FIXED {
            fixed = true;
        }

        let mut prob = tp.step_prob();
        if cond_step_a > 0 && final_step == cond_step_a {
            prob = tp.prob_a();
        }
        if cond_step_b > 0 && final_step == cond_step_b {
            prob = tp.prob_b();
        }
        if fixed {
            prob = 100;
        }

        // Short-circuit so a certain step costs no PRNG draw
        let pass =
            prob >= 100 || ((self.tracks[track].rng.next_float_01() * 100.0) as i32) < prob;
        if pass {
            self.play_track_events(track, final_step, fixed, out);
        }
    }
}
