use gridloop_shared::project::NoteEvent;
use gridloop_shared::scale;

use crate::config::{safe_step_index, MAX_STEPS};
use crate::engine::Engine;
use crate::midi::MidiSender;
use crate::params::{
    GEN_MODE_INVERT, GEN_MODE_NEW, GEN_MODE_REORDER, GEN_MODE_REPITCH, PARAM_GEN_BIAS,
    PARAM_GEN_DENSITY, PARAM_GEN_GATE_RAND, PARAM_GEN_MODE, PARAM_GEN_NOTE_RAND, PARAM_GEN_RANGE,
    PARAM_GEN_TIES, PARAM_GEN_VEL_VAR, PARAM_SCALE_ROOT, PARAM_SCALE_TYPE,
};

impl Engine {
    /// Generate rising edge: run the configured transform on one track.
    /// The track's sounding notes are released first so a regenerated
    /// pattern cannot strand them.
    pub(crate) fn execute_generate(&mut self, track: usize, out: &mut dyn MidiSender) {
        if track >= self.num_tracks {
            return;
        }

        self.send_track_notes_off(track, out);

        match self.params[PARAM_GEN_MODE] {
            GEN_MODE_NEW => self.generate_new(track),
            GEN_MODE_REORDER => self.generate_reorder(track),
            GEN_MODE_REPITCH => self.generate_repitch(track),
            GEN_MODE_INVERT => self.generate_invert(track),
            _ => {}
        }
    }

    // MODE: NEW - fresh monophonic pattern

    fn generate_new(&mut self, track: usize) {
        let density = self.params[PARAM_GEN_DENSITY] as i32;
        let bias = self.params[PARAM_GEN_BIAS] as i32;
        let range = self.params[PARAM_GEN_RANGE] as i32;
        let note_rand = self.params[PARAM_GEN_NOTE_RAND] as i32;
        let vel_var = self.params[PARAM_GEN_VEL_VAR] as i32;
        let ties = self.params[PARAM_GEN_TIES] as i32;
        let gate_rand = self.params[PARAM_GEN_GATE_RAND] as i32;
        let scale_root = self.params[PARAM_SCALE_ROOT] as i32;
        let scale_type = scale::ScaleType::from_index(self.params[PARAM_SCALE_TYPE] as i32);

        let (quantize, loop_len) = self.track_quantize(track);

        let ts = &mut self.tracks[track];
        ts.data.clear();

        for s in 1..=loop_len {
            // Only place notes on division boundaries
            if quantize > 1 && (s - 1) % quantize != 0 {
                continue;
            }

            // Density roll
            if ts.rng.next_range(1, 100) > density {
                continue;
            }

            // Note: bias +/- (range * note_rand / 100), scale-quantized
            let spread = (range * note_rand) / 100;
            let raw = if spread > 0 {
                bias + ts.rng.next_range(-spread, spread)
            } else {
                bias
            };
            let note = scale::quantize(raw.clamp(0, 127) as u8, scale_root, scale_type);

            // Velocity: centered on 100, varied by vel_var
            let vel_spread = (100 * vel_var) / 200;
            let vel = if vel_spread > 0 {
                100 + ts.rng.next_range(-vel_spread, vel_spread)
            } else {
                100
            };
            let vel = vel.clamp(1, 127) as u8;

            // Duration: one division unit, randomly shortened by gate_rand %
            let max_dur = quantize.max(1);
            let min_dur = (max_dur - (max_dur * gate_rand) / 100).max(1);
            let dur = if min_dur < max_dur {
                ts.rng.next_range(min_dur, max_dur)
            } else {
                max_dur
            } as u16;

            ts.data.steps[safe_step_index(s - 1)].add(note, vel, dur);
        }

        // Pass 2: ties extend a note's duration to reach the next occupied
        // step, wrapping around the loop
        if ties > 0 {
            let len = loop_len as usize;
            for s in 0..len {
                if ts.data.steps[s].count == 0 {
                    continue;
                }
                if ts.rng.next_range(1, 100) > ties {
                    continue;
                }

                let mut dist = 0;
                for d in 1..len {
                    if ts.data.steps[(s + d) % len].count > 0 {
                        dist = d;
                        break;
                    }
                }
                if dist == 0 {
                    continue; // only note in the loop
                }

                let evs = &mut ts.data.steps[s];
                for e in 0..evs.count as usize {
                    evs.events[e].duration = dist as u16;
                }
            }
        }
    }

    // MODE: REORDER - shuffle pitches onto the same rhythm

    fn generate_reorder(&mut self, track: usize) {
        let (_, loop_len) = self.track_quantize(track);
        let len = loop_len as usize;
        let ts = &mut self.tracks[track];

        // Collect all events and the occupied step positions
        let mut collected = [NoteEvent::ZERO; MAX_STEPS];
        let mut count = 0usize;
        let mut positions = [0usize; MAX_STEPS];
        let mut pos_count = 0usize;

        for s in 0..len {
            if ts.data.steps[s].count > 0 {
                positions[pos_count] = s;
                pos_count += 1;
            }
            for e in ts.data.steps[s].iter() {
                if count < MAX_STEPS {
                    collected[count] = *e;
                    count += 1;
                }
            }
        }

        if count == 0 {
            return;
        }

        // Fisher-Yates shuffle the collected notes
        for i in (1..count).rev() {
            let j = ts.rng.next_range(0, i as i32) as usize;
            collected.swap(i, j);
        }

        // Redistribute onto the original rhythm
        ts.data.clear();
        let mut note_idx = 0usize;
        for &s in positions.iter().take(pos_count) {
            if note_idx >= count {
                break;
            }
            let ev = collected[note_idx];
            ts.data.steps[s].add(ev.note, ev.velocity, ev.duration);
            note_idx += 1;
        }
    }

    // MODE: RE-PITCH - new pitches, same rhythm

    fn generate_repitch(&mut self, track: usize) {
        let bias = self.params[PARAM_GEN_BIAS] as i32;
        let range = self.params[PARAM_GEN_RANGE] as i32;
        let note_rand = self.params[PARAM_GEN_NOTE_RAND] as i32;
        let scale_root = self.params[PARAM_SCALE_ROOT] as i32;
        let scale_type = scale::ScaleType::from_index(self.params[PARAM_SCALE_TYPE] as i32);

        let (_, loop_len) = self.track_quantize(track);
        let spread = (range * note_rand) / 100;

        let ts = &mut self.tracks[track];
        for s in 0..loop_len as usize {
            let evs = &mut ts.data.steps[s];
            for e in 0..evs.count as usize {
                let raw = if spread > 0 {
                    bias + ts.rng.next_range(-spread, spread)
                } else {
                    bias
                };
                evs.events[e].note =
                    scale::quantize(raw.clamp(0, 127) as u8, scale_root, scale_type);
            }
        }
    }

    // MODE: INVERT - reverse the step sequence in place

    fn generate_invert(&mut self, track: usize) {
        let (_, loop_len) = self.track_quantize(track);
        let ts = &mut self.tracks[track];

        let mut left = 0usize;
        let mut right = loop_len as usize - 1;
        while left < right {
            ts.data.steps.swap(left, right);

            // Re-clamp durations to the loop space left from the new position
            for (idx, max_dur) in [(left, loop_len - left as i32), (right, loop_len - right as i32)]
            {
                let evs = &mut ts.data.steps[idx];
                for e in 0..evs.count as usize {
                    if evs.events[e].duration > max_dur as u16 {
                        evs.events[e].duration = max_dur as u16;
                    }
                }
            }

            left += 1;
            right -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::MidiLog;
    use crate::params::{
        track_param, PARAM_GEN_TIES, PARAM_REC_DIVISION, TRACK_LENGTH,
    };

    fn engine_with_pattern() -> Engine {
        let mut engine = Engine::with_seed(1, 0xDEAD_BEEF).unwrap();
        engine.set_parameter(track_param(0, TRACK_LENGTH), 8);
        engine.tracks[0].data.steps[0].add(60, 100, 2);
        engine.tracks[0].data.steps[3].add(64, 90, 1);
        engine.tracks[0].data.steps[6].add(67, 80, 4);
        engine
    }

    #[test]
    fn test_new_deterministic_grid() {
        // Full density, no pitch spread, full ties: one C on every division
        // boundary, each tied to the next
        let mut engine = Engine::with_seed(1, 42).unwrap();
        engine.set_parameter(track_param(0, TRACK_LENGTH), 16);
        engine.set_parameter(PARAM_REC_DIVISION, 2); // quantize 4
        engine.set_parameter(PARAM_GEN_DENSITY, 100);
        engine.set_parameter(PARAM_GEN_NOTE_RAND, 0);
        engine.set_parameter(PARAM_GEN_BIAS, 60);
        engine.set_parameter(PARAM_GEN_TIES, 100);
        engine.set_parameter(PARAM_GEN_MODE, GEN_MODE_NEW);

        let mut log = MidiLog::new();
        engine.execute_generate(0, &mut log);

        for s in 0..16 {
            let evs = &engine.tracks[0].data.steps[s];
            if s % 4 == 0 {
                assert_eq!(evs.count, 1, "step {}", s + 1);
                assert_eq!(evs.events[0].note, 60);
                assert_eq!(evs.events[0].velocity, 100);
                assert_eq!(evs.events[0].duration, 4);
            } else {
                assert_eq!(evs.count, 0, "step {}", s + 1);
            }
        }
    }

    #[test]
    fn test_reorder_preserves_rhythm_and_notes() {
        let mut engine = engine_with_pattern();
        let mut log = MidiLog::new();
        engine.set_parameter(PARAM_GEN_MODE, GEN_MODE_REORDER);
        engine.execute_generate(0, &mut log);

        let occupied: Vec<usize> = (0..8)
            .filter(|&s| engine.tracks[0].data.steps[s].count > 0)
            .collect();
        assert_eq!(occupied, vec![0, 3, 6]);

        let mut notes: Vec<u8> = occupied
            .iter()
            .flat_map(|&s| engine.tracks[0].data.steps[s].iter().map(|e| e.note))
            .collect();
        notes.sort_unstable();
        assert_eq!(notes, vec![60, 64, 67]);
    }

    #[test]
    fn test_repitch_keeps_rhythm_velocity_duration() {
        let mut engine = engine_with_pattern();
        let mut log = MidiLog::new();
        engine.set_parameter(PARAM_GEN_MODE, GEN_MODE_REPITCH);
        engine.set_parameter(PARAM_GEN_BIAS, 72);
        engine.set_parameter(PARAM_GEN_NOTE_RAND, 0);
        engine.execute_generate(0, &mut log);

        let step0 = &engine.tracks[0].data.steps[0];
        assert_eq!(step0.events[0].note, 72);
        assert_eq!(step0.events[0].velocity, 100);
        assert_eq!(step0.events[0].duration, 2);
        assert_eq!(engine.tracks[0].data.steps[3].events[0].note, 72);
        assert_eq!(engine.tracks[0].data.steps[6].events[0].note, 72);
    }

    #[test]
    fn test_invert_reverses_and_clamps() {
        let mut engine = engine_with_pattern();
        let mut log = MidiLog::new();
        engine.set_parameter(PARAM_GEN_MODE, GEN_MODE_INVERT);
        engine.execute_generate(0, &mut log);

        // steps 1,4,7 (of 8) become steps 8,5,2
        assert_eq!(engine.tracks[0].data.steps[7].events[0].note, 60);
        assert_eq!(engine.tracks[0].data.steps[4].events[0].note, 64);
        assert_eq!(engine.tracks[0].data.steps[1].events[0].note, 67);
        // durations re-clamp to the loop space left from the new position:
        // the 2-tick note now on the last step shrinks to 1
        assert_eq!(engine.tracks[0].data.steps[7].events[0].duration, 1);
        assert_eq!(engine.tracks[0].data.steps[1].events[0].duration, 4);
    }

    #[test]
    fn test_generate_single_track_engine() {
        let mut engine = Engine::with_seed(1, 7).unwrap();
        engine.set_parameter(PARAM_GEN_DENSITY, 100);
        engine.set_parameter(PARAM_GEN_MODE, GEN_MODE_NEW);
        let mut log = MidiLog::new();
        engine.execute_generate(0, &mut log);
        let total: u32 = (0..16).map(|s| engine.tracks[0].data.steps[s].count as u32).sum();
        assert!(total > 0);
    }
}
