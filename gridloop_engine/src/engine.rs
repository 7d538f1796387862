use anyhow::bail;

use gridloop_shared::{dest_to_mask, scale, with_channel, MIDI_NOTE_OFF, MIDI_NOTE_ON};

use crate::config::{
    GATE_THRESHOLD_HIGH, GATE_THRESHOLD_LOW, MAX_DELAYED_NOTES, MAX_TRACKS, MIN_TRACKS,
    safe_track_index,
};
use crate::midi::MidiSender;
use crate::params::{
    default_parameters, param_spec, total_params, TrackParams, GLOBAL_PARAM_COUNT,
    PARAM_CLEAR_ALL, PARAM_CLEAR_TRACK, PARAM_CLOCK_BUS, PARAM_GENERATE, PARAM_MIDI_IN_CH,
    PARAM_PANIC_ON_WRAP, PARAM_REC_DIVISION, PARAM_REC_TRACK, PARAM_RUN_BUS, PARAM_SCALE_ROOT,
    PARAM_SCALE_TYPE, TRACK_LENGTH, TRACK_PARAM_COUNT,
};
use crate::playback::DelayedNote;
use crate::record::HeldNote;
use crate::track::TrackState;
use crate::transport::{RecordState, TransportState};

pub struct Engine {
    pub(crate) num_tracks: usize,

    // Flat parameter array: global block, then one block per track.
    // Read-only during a block; written by set_parameter between blocks.
    pub(crate) params: Vec<i16>,

    // Per-track state
    pub(crate) tracks: Vec<TrackState>,

    // Held notes during recording, indexed by MIDI note number
    pub(crate) held: [HeldNote; 128],

    // Delayed notes for humanization
    pub(crate) delayed: [DelayedNote; MAX_DELAYED_NOTES],

    // State machines
    pub(crate) transport: TransportState,
    pub(crate) record: RecordState,

    // Gate/trigger edge detection
    prev_gate_high: bool,
    prev_clock_high: bool,

    // Timing
    pub(crate) step_time: f32,
    pub(crate) step_duration: f32,

    // Edge detection for latched parameters
    pub(crate) last_record: i16,
    pub(crate) last_rec_track: i16,
    last_clear_track: i16,
    last_clear_all: i16,
    last_generate: i16,

    // Step record cursor: 1-based division index, 0 = inactive
    pub(crate) step_rec_pos: u8,

    // Held-input display state
    pub(crate) input_vel: u8,
    pub(crate) input_notes: [bool; 128],

    // Maps original input note -> quantized note sent, so the matching
    // note-off releases the right note
    note_map: [u8; 128],
}

impl Engine {
    /// Construct with a seed from system entropy.
    pub fn new(num_tracks: usize) -> Result<Self, anyhow::Error> {
        Self::with_seed(num_tracks, fastrand::u32(..))
    }

    /// Construct with an explicit PRNG seed. Track `t` gets the stream
    /// `seed + t`, so tracks are independent but reproducible.
    pub fn with_seed(num_tracks: usize, seed: u32) -> Result<Self, anyhow::Error> {
        if !(MIN_TRACKS..=MAX_TRACKS).contains(&num_tracks) {
            bail!(
                "track count {} outside supported range {}-{}",
                num_tracks,
                MIN_TRACKS,
                MAX_TRACKS
            );
        }

        let mut note_map = [0u8; 128];
        for (i, slot) in note_map.iter_mut().enumerate() {
            *slot = i as u8;
        }

        let tracks: Vec<TrackState> = (0..num_tracks)
            .map(|t| TrackState::new(seed.wrapping_add(t as u32), t == 0))
            .collect();

        eprintln!("[Engine] Constructed: {} tracks, seed {:#010x}", num_tracks, seed);

        Ok(Self {
            num_tracks,
            params: default_parameters(num_tracks),
            tracks,
            held: [HeldNote::INACTIVE; 128],
            delayed: [DelayedNote::INACTIVE; MAX_DELAYED_NOTES],
            transport: TransportState::Stopped,
            record: RecordState::Idle,
            prev_gate_high: false,
            prev_clock_high: false,
            step_time: 0.0,
            step_duration: 0.1,
            last_record: 0,
            last_rec_track: 0,
            last_clear_track: 0,
            last_clear_all: 0,
            last_generate: 0,
            step_rec_pos: 0,
            input_vel: 0,
            input_notes: [false; 128],
            note_map,
        })
    }

    // PARAMETERS

    /// Parameter-change entry point (serialized with the audio callback by
    /// the host). Values clamp to the parameter's range.
    pub fn set_parameter(&mut self, index: usize, value: i16) {
        if index >= self.params.len() {
            return;
        }
        let spec = param_spec(index);
        self.params[index] = value.clamp(spec.min, spec.max);
        self.parameter_changed(index);
    }

    pub fn parameter(&self, index: usize) -> i16 {
        self.params.get(index).copied().unwrap_or(0)
    }

    pub fn total_params(&self) -> usize {
        total_params(self.num_tracks)
    }

    /// Invalidate derived state after a parameter write.
    fn parameter_changed(&mut self, index: usize) {
        // Division is global: every track's grid shifts
        if index == PARAM_REC_DIVISION {
            for ts in self.tracks.iter_mut() {
                ts.cache.invalidate();
            }
            if self.record == RecordState::Step {
                self.step_rec_pos = 1;
            }
            return;
        }

        if index >= GLOBAL_PARAM_COUNT {
            let track = (index - GLOBAL_PARAM_COUNT) / TRACK_PARAM_COUNT;
            let offset = (index - GLOBAL_PARAM_COUNT) % TRACK_PARAM_COUNT;
            if offset == TRACK_LENGTH && track < self.num_tracks {
                self.tracks[track].cache.invalidate();
                if track == self.rec_track() && self.record == RecordState::Step {
                    self.step_rec_pos = 1;
                }
            }
        }
    }

    pub(crate) fn rec_track(&self) -> usize {
        safe_track_index(self.params[PARAM_REC_TRACK] as i32, self.num_tracks)
    }

    // AUDIO BLOCK ENTRY

    /// Per-block audio callback. `bus_frames` holds `num_buses` contiguous
    /// runs of `num_frames` samples; the Run/Clock parameters select 1-based
    /// bus indices (0 = none) and the last sample of the block is the
    /// observed CV.
    pub fn process_block(
        &mut self,
        bus_frames: &[f32],
        num_frames: usize,
        sample_rate: f32,
        out: &mut dyn MidiSender,
    ) {
        if num_frames == 0 || sample_rate <= 0.0 {
            return;
        }
        let dt = num_frames as f32 / sample_rate;

        // Read CV at the last sample of the selected buses
        let read_bus = |bus: i16| -> f32 {
            if bus <= 0 {
                return 0.0;
            }
            let idx = (bus as usize - 1) * num_frames + num_frames - 1;
            bus_frames.get(idx).copied().unwrap_or(0.0)
        };
        let gate_val = read_bus(self.params[PARAM_RUN_BUS]);
        let clock_val = read_bus(self.params[PARAM_CLOCK_BUS]);

        let gate_high = gate_val > GATE_THRESHOLD_HIGH;
        let gate_low = gate_val < GATE_THRESHOLD_LOW;
        let clock_high = clock_val > GATE_THRESHOLD_HIGH;
        let clock_low = clock_val < GATE_THRESHOLD_LOW;

        // Gate edge detection (transport control)
        if gate_high && !self.prev_gate_high {
            self.handle_transport_start();
        } else if gate_low && self.prev_gate_high {
            self.handle_transport_stop(out);
        }
        self.prev_gate_high = gate_high && !gate_low;

        // Clock edge detection (latched for the clock stage below)
        let clock_rising = clock_high && !self.prev_clock_high;
        self.prev_clock_high = clock_high && !clock_low;

        // Latched parameter edges: Clear Track, Clear All, Generate.
        // Each executes at most once per rising edge.
        let clear_track = self.params[PARAM_CLEAR_TRACK];
        if clear_track != self.last_clear_track {
            if clear_track == 1 {
                let track = self.rec_track();
                self.send_track_notes_off(track, out);
                self.tracks[track].data.clear();
            }
            self.last_clear_track = clear_track;
        }

        let clear_all = self.params[PARAM_CLEAR_ALL];
        if clear_all != self.last_clear_all {
            if clear_all == 1 {
                for t in 0..self.num_tracks {
                    self.send_track_notes_off(t, out);
                    self.tracks[t].data.clear();
                }
            }
            self.last_clear_all = clear_all;
        }

        let generate = self.params[PARAM_GENERATE];
        if generate != self.last_generate {
            if generate == 1 {
                let track = self.rec_track();
                self.execute_generate(track, out);
            }
            self.last_generate = generate;
        }

        // Timing and delayed notes
        self.step_time += dt;
        self.process_delayed_notes(dt, out);

        // Recording state machine
        self.update_record_machine();

        // Clock trigger processing
        if clock_rising && self.transport.is_running() {
            if self.step_time > 1e-6 {
                self.step_duration = self.step_time;
            }
            self.step_time = 0.0;

            let panic_on_wrap = self.params[PARAM_PANIC_ON_WRAP] == 1;

            for t in 0..self.num_tracks {
                let clock_div = TrackParams::new(&self.params, t).clock_div() as u16;
                self.tracks[t].div_counter += 1;
                if self.tracks[t].div_counter >= clock_div {
                    self.tracks[t].div_counter = 0;
                    self.process_track(t, panic_on_wrap, out);
                }
            }
        }
    }

    // MIDI-IN ENTRY

    /// MIDI input callback: one three-byte message. Handles the channel
    /// filter, scale quantization, pass-through to the record track's output,
    /// held-input display state, and routing into the recorder.
    pub fn midi_message(&mut self, byte0: u8, byte1: u8, byte2: u8, out: &mut dyn MidiSender) {
        let status = byte0 & 0xF0;
        let channel = byte0 & 0x0F;

        // Channel filter
        let filter = self.params[PARAM_MIDI_IN_CH] as i32;
        if filter > 0 && channel as i32 != filter - 1 {
            return;
        }

        let track = self.rec_track();
        let tp = TrackParams::new(&self.params, track);
        let out_ch = tp.channel();
        let dest = dest_to_mask(tp.destination());

        let is_note_on = status == MIDI_NOTE_ON && byte2 > 0;
        let is_note_off = status == MIDI_NOTE_OFF || (status == MIDI_NOTE_ON && byte2 == 0);
        if !is_note_on && !is_note_off {
            return; // unsupported statuses ignored
        }

        // Scale quantization at the input, before pass-through and recording.
        // The note map lets the matching note-off release the note actually
        // sent.
        let mut note = byte1 & 0x7F;
        if is_note_on {
            let quantized = scale::quantize(
                note,
                self.params[PARAM_SCALE_ROOT] as i32,
                scale::ScaleType::from_index(self.params[PARAM_SCALE_TYPE] as i32),
            );
            self.note_map[note as usize] = quantized;
            note = quantized;
        } else {
            note = self.note_map[note as usize];
        }

        // Pass-through when the input channel differs from the output
        let in_ch = channel as i32 + 1;
        if in_ch != out_ch {
            out.send_midi(dest, with_channel(status, out_ch), note, byte2);
        }

        // Held-input display state
        if is_note_on {
            self.input_notes[note as usize] = true;
            self.input_vel = byte2;
        } else {
            self.input_notes[note as usize] = false;
            if !self.input_notes.iter().any(|&h| h) {
                self.input_vel = 0;
            }
        }

        // Step recording runs independently of the transport
        if self.record == RecordState::Step {
            if is_note_on {
                self.step_record_note_on(track, note, byte2);
            } else {
                self.step_record_note_off(track);
            }
            return;
        }

        if self.record != RecordState::Live {
            return;
        }

        let ctx = self.recording_context(track);
        if is_note_on {
            self.record_note_on(&ctx, note, byte2);
        } else {
            self.record_note_off(&ctx, note);
        }
    }

    // UI-VISIBLE STATE

    pub fn num_tracks(&self) -> usize {
        self.num_tracks
    }

    pub fn transport_state(&self) -> TransportState {
        self.transport
    }

    pub fn record_state(&self) -> RecordState {
        self.record
    }

    /// Current 1-based step of a track, 0 before the first clock.
    pub fn track_step(&self, track: usize) -> u8 {
        self.tracks[safe_track_index(track as i32, self.num_tracks)].step
    }

    pub fn track_active_velocity(&self, track: usize) -> u8 {
        self.tracks[safe_track_index(track as i32, self.num_tracks)].active_vel
    }

    pub fn input_velocity(&self) -> u8 {
        self.input_vel
    }

    /// Step-record cursor (1-based division index), 0 when not step
    /// recording.
    pub fn step_record_cursor(&self) -> u8 {
        self.step_rec_pos
    }
}
