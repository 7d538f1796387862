#[cfg(test)]
mod tests {
    use gridloop_shared::{with_channel, DEST_USB, MIDI_CC, MIDI_NOTE_OFF, MIDI_NOTE_ON};

    use crate::config::{MAX_DELAYED_NOTES, MAX_STEPS};
    use crate::engine::Engine;
    use crate::midi::MidiLog;
    use crate::params::{
        track_param, TrackParams, PARAM_CLOCK_BUS, PARAM_FILL, PARAM_PANIC_ON_WRAP,
        PARAM_RUN_BUS, TRACK_CHANNEL, TRACK_CLOCK_DIV, TRACK_COND_STEP_A, TRACK_COND_A,
        TRACK_DIRECTION, TRACK_ENABLED, TRACK_LENGTH, TRACK_NO_REPEAT, TRACK_OCT_BYPASS,
        TRACK_OCT_MAX, TRACK_OCT_MIN, TRACK_OCT_PROB, TRACK_STEP_COND, TRACK_STEP_PROB,
    };
    use crate::playback::DelayedNote;
    use crate::transport::TransportState;

    const FRAMES: usize = 16;
    const SAMPLE_RATE: f32 = 48_000.0;

    fn engine(tracks: usize) -> Engine {
        let mut e = Engine::with_seed(tracks, 0x00C0_FFEE).unwrap();
        e.set_parameter(PARAM_RUN_BUS, 1);
        e.set_parameter(PARAM_CLOCK_BUS, 2);
        e
    }

    fn block(e: &mut Engine, gate: f32, clock: f32, log: &mut MidiLog) {
        let mut bus = [0.0f32; 2 * FRAMES];
        for i in 0..FRAMES {
            bus[i] = gate;
            bus[FRAMES + i] = clock;
        }
        e.process_block(&bus, FRAMES, SAMPLE_RATE, log);
    }

    fn start(e: &mut Engine, log: &mut MidiLog) {
        block(e, 5.0, 0.0, log);
    }

    fn tick(e: &mut Engine, log: &mut MidiLog) {
        block(e, 5.0, 5.0, log);
        block(e, 5.0, 0.0, log);
    }

    fn stop(e: &mut Engine, log: &mut MidiLog) {
        block(e, 0.0, 0.0, log);
    }

    fn note_ons(log: &MidiLog) -> Vec<u8> {
        log.messages
            .iter()
            .filter(|(_, s, _, d2)| s & 0xF0 == MIDI_NOTE_ON && *d2 > 0)
            .map(|(_, _, d1, _)| *d1)
            .collect()
    }

    fn note_messages(log: &MidiLog) -> Vec<(u8, u8)> {
        log.messages
            .iter()
            .filter(|(_, s, _, _)| {
                let st = s & 0xF0;
                st == MIDI_NOTE_ON || st == MIDI_NOTE_OFF
            })
            .map(|(_, s, d1, _)| (s & 0xF0, *d1))
            .collect()
    }

    /// End-of-block invariants from the data model.
    fn assert_invariants(e: &Engine) {
        for (t, ts) in e.tracks.iter().enumerate() {
            for n in 0..128 {
                let pn = &ts.playing[n];
                assert_eq!(pn.active, pn.remaining > 0, "track {} note {}", t, n);
                assert_eq!(pn.active, ts.active_notes[n] > 0, "track {} note {}", t, n);
            }
            let length = TrackParams::new(&e.params, t).length();
            assert!((ts.step as i32) <= length, "step out of range on track {}", t);
            assert!((1..=length).contains(&(ts.brownian_pos as i32)));
            assert!((1..=length + 1).contains(&(ts.shuffle_pos as i32)));
        }
        let pending = e.delayed.iter().filter(|d| d.active).count();
        assert!(pending <= MAX_DELAYED_NOTES);
    }

    #[test]
    fn test_forward_sequencer_end_to_end() {
        let mut e = engine(1);
        e.set_parameter(track_param(0, TRACK_LENGTH), 4);
        for (i, n) in [60u8, 62, 64, 65].iter().enumerate() {
            e.tracks[0].data.steps[i].add(*n, 100, 1);
        }

        let mut log = MidiLog::new();
        start(&mut e, &mut log);
        assert_eq!(e.transport_state(), TransportState::Running);
        for _ in 0..8 {
            tick(&mut e, &mut log);
        }

        let expected: Vec<(u8, u8)> = vec![
            (MIDI_NOTE_ON, 60),
            (MIDI_NOTE_OFF, 60),
            (MIDI_NOTE_ON, 62),
            (MIDI_NOTE_OFF, 62),
            (MIDI_NOTE_ON, 64),
            (MIDI_NOTE_OFF, 64),
            (MIDI_NOTE_ON, 65),
            (MIDI_NOTE_OFF, 65),
            (MIDI_NOTE_ON, 60),
            (MIDI_NOTE_OFF, 60),
            (MIDI_NOTE_ON, 62),
            (MIDI_NOTE_OFF, 62),
            (MIDI_NOTE_ON, 64),
            (MIDI_NOTE_OFF, 64),
            (MIDI_NOTE_ON, 65),
        ];
        assert_eq!(note_messages(&log), expected);
        assert_invariants(&e);

        // Stop silences the hanging F4 via All Notes Off on the track's
        // channel and destination
        log.clear();
        stop(&mut e, &mut log);
        assert_eq!(
            log.messages,
            vec![(DEST_USB, with_channel(MIDI_CC, 1), 123, 0)]
        );
        assert!(!e.tracks[0].playing[65].active);
        assert_invariants(&e);
    }

    #[test]
    fn test_pendulum_with_no_repeat_passes_through() {
        // 1,2,3,2,1,... has no consecutive duplicates, so No Repeat can
        // never fire and the output matches the raw sequence
        let mut e = engine(1);
        e.set_parameter(track_param(0, TRACK_LENGTH), 3);
        e.set_parameter(track_param(0, TRACK_DIRECTION), 2); // Pendulum
        e.set_parameter(track_param(0, TRACK_NO_REPEAT), 1);
        for (i, n) in [60u8, 62, 64].iter().enumerate() {
            e.tracks[0].data.steps[i].add(*n, 100, 1);
        }

        let mut log = MidiLog::new();
        start(&mut e, &mut log);
        for _ in 0..8 {
            tick(&mut e, &mut log);
        }
        assert_eq!(note_ons(&log), vec![60, 62, 64, 62, 60, 62, 64, 62]);
    }

    #[test]
    fn test_pingpong_no_repeat_skips_doubled_endpoint() {
        // Ping-pong repeats endpoints (1,2,3,3,2,1); No Repeat advances the
        // doubled 3 to 1
        let mut e = engine(1);
        e.set_parameter(track_param(0, TRACK_LENGTH), 3);
        e.set_parameter(track_param(0, TRACK_DIRECTION), 3); // PingPong
        e.set_parameter(track_param(0, TRACK_NO_REPEAT), 1);
        for (i, n) in [60u8, 62, 64].iter().enumerate() {
            e.tracks[0].data.steps[i].add(*n, 100, 1);
        }

        let mut log = MidiLog::new();
        start(&mut e, &mut log);
        for _ in 0..4 {
            tick(&mut e, &mut log);
        }
        assert_eq!(note_ons(&log), vec![60, 62, 64, 60]);
    }

    #[test]
    fn test_panic_on_wrap_silences_all_tracks() {
        let mut e = engine(2);
        e.set_parameter(PARAM_PANIC_ON_WRAP, 1);
        e.set_parameter(track_param(0, TRACK_LENGTH), 2);
        e.set_parameter(track_param(1, TRACK_ENABLED), 1);
        e.set_parameter(track_param(1, TRACK_LENGTH), 8);
        e.tracks[0].data.steps[0].add(60, 100, 10);
        e.tracks[0].data.steps[1].add(61, 100, 10);
        e.tracks[1].data.steps[0].add(48, 100, 10);

        let mut log = MidiLog::new();
        start(&mut e, &mut log);
        tick(&mut e, &mut log); // t0 step 1, t1 plays its long note
        tick(&mut e, &mut log); // t0 step 2
        assert!(e.tracks[0].playing[60].active);
        assert!(e.tracks[1].playing[48].active);

        // Third tick wraps track 0 (length 2): panic clears everything
        log.clear();
        tick(&mut e, &mut log);

        // One All Notes Off per unique channel+destination (ch1 and ch2)
        let cc: Vec<(u32, u8, u8, u8)> = log
            .messages
            .iter()
            .copied()
            .filter(|(_, s, d1, _)| s & 0xF0 == MIDI_CC && *d1 == 123)
            .collect();
        assert_eq!(
            cc,
            vec![
                (DEST_USB, with_channel(MIDI_CC, 1), 123, 0),
                (DEST_USB, with_channel(MIDI_CC, 2), 123, 0),
            ]
        );

        // Track 1's long note is gone and its pools stay empty; track 0
        // immediately re-emits its step-1 note after the panic
        assert!(!e.tracks[1].playing[48].active);
        assert!(e.tracks[0].playing[60].active);
        assert!(e.delayed.iter().all(|d| !d.active));
        assert_invariants(&e);
    }

    #[test]
    fn test_shared_channel_note_off_suppressed() {
        let mut e = engine(2);
        for t in 0..2 {
            e.set_parameter(track_param(t, TRACK_ENABLED), 1);
            e.set_parameter(track_param(t, TRACK_CHANNEL), 5);
            e.set_parameter(track_param(t, TRACK_LENGTH), 4);
            e.tracks[t].data.steps[0].add(60, 100, 10);
        }

        let mut log = MidiLog::new();
        start(&mut e, &mut log);
        tick(&mut e, &mut log);
        assert!(e.tracks[0].playing[60].active);
        assert!(e.tracks[1].playing[60].active);

        // Disable track 0: its all-notes-off must not orphan track 1's C4
        e.set_parameter(track_param(0, TRACK_ENABLED), 0);
        log.clear();
        tick(&mut e, &mut log);

        let offs: Vec<(u8, u8)> = log
            .messages
            .iter()
            .filter(|(_, s, _, _)| s & 0xF0 == MIDI_NOTE_OFF)
            .map(|(_, s, d1, _)| (*s, *d1))
            .collect();
        assert!(
            offs.is_empty(),
            "off for a note still held by the other track: {:?}",
            offs
        );
        assert!(!e.tracks[0].playing[60].active);
        assert!(e.tracks[1].playing[60].active);
        assert_invariants(&e);
    }

    #[test]
    fn test_clock_division_gates_track() {
        let mut e = engine(1);
        e.set_parameter(track_param(0, TRACK_LENGTH), 2);
        e.set_parameter(track_param(0, TRACK_CLOCK_DIV), 2);
        e.tracks[0].data.steps[0].add(60, 100, 1);
        e.tracks[0].data.steps[1].add(62, 100, 1);

        let mut log = MidiLog::new();
        start(&mut e, &mut log);
        for _ in 0..4 {
            tick(&mut e, &mut log);
        }
        // Track advances on every second clock only
        assert_eq!(note_ons(&log), vec![60, 62]);
    }

    #[test]
    fn test_track_condition_gates_whole_loops() {
        // Condition 1 is the 1:2 ratio: play on even loop counts only
        let mut e = engine(1);
        e.set_parameter(track_param(0, TRACK_LENGTH), 2);
        e.set_parameter(track_param(0, TRACK_STEP_COND), 1);
        e.tracks[0].data.steps[0].add(60, 100, 1);
        e.tracks[0].data.steps[1].add(62, 100, 1);

        let mut log = MidiLog::new();
        start(&mut e, &mut log);
        for _ in 0..6 {
            tick(&mut e, &mut log);
        }
        // Loop 0 plays, loop 1 is skipped, loop 2 plays
        assert_eq!(note_ons(&log), vec![60, 62, 60, 62]);
    }

    #[test]
    fn test_per_step_condition_targets_one_step() {
        // Step 2 carries a Fill condition; everything else always plays
        let mut e = engine(1);
        e.set_parameter(track_param(0, TRACK_LENGTH), 2);
        e.set_parameter(track_param(0, TRACK_COND_STEP_A), 2);
        e.set_parameter(track_param(0, TRACK_COND_A), 73); // Fill
        e.tracks[0].data.steps[0].add(60, 100, 1);
        e.tracks[0].data.steps[1].add(62, 100, 1);

        let mut log = MidiLog::new();
        start(&mut e, &mut log);
        tick(&mut e, &mut log);
        tick(&mut e, &mut log);
        assert_eq!(note_ons(&log), vec![60]);

        e.set_parameter(PARAM_FILL, 1);
        log.clear();
        tick(&mut e, &mut log);
        tick(&mut e, &mut log);
        assert_eq!(note_ons(&log), vec![60, 62]);
    }

    #[test]
    fn test_fixed_condition_forces_probability_and_no_jump() {
        let mut e = engine(1);
        e.set_parameter(track_param(0, TRACK_LENGTH), 1);
        e.set_parameter(track_param(0, TRACK_STEP_PROB), 0);
        e.set_parameter(track_param(0, TRACK_STEP_COND), 75); // Fixed
        e.set_parameter(track_param(0, TRACK_OCT_MIN), 2);
        e.set_parameter(track_param(0, TRACK_OCT_MAX), 2);
        e.set_parameter(track_param(0, TRACK_OCT_PROB), 100);
        e.tracks[0].data.steps[0].add(60, 100, 1);

        let mut log = MidiLog::new();
        start(&mut e, &mut log);
        for _ in 0..4 {
            tick(&mut e, &mut log);
        }
        // Zero step probability is overridden, octave jump suppressed
        assert_eq!(note_ons(&log), vec![60, 60, 60, 60]);
    }

    #[test]
    fn test_octave_jump_with_bypass() {
        let mut e = engine(1);
        e.set_parameter(track_param(0, TRACK_LENGTH), 1);
        e.set_parameter(track_param(0, TRACK_OCT_MIN), 1);
        e.set_parameter(track_param(0, TRACK_OCT_MAX), 1);
        e.set_parameter(track_param(0, TRACK_OCT_PROB), 100);
        e.set_parameter(track_param(0, TRACK_OCT_BYPASS), 2);
        e.tracks[0].data.steps[0].add(60, 100, 1);

        let mut log = MidiLog::new();
        start(&mut e, &mut log);
        for _ in 0..4 {
            tick(&mut e, &mut log);
        }
        // Every second note-play is forced unshifted
        assert_eq!(note_ons(&log), vec![72, 60, 72, 60]);
    }

    #[test]
    fn test_delayed_note_drains_after_delay() {
        let mut e = engine(1);
        let mut log = MidiLog::new();

        e.delayed[0] = DelayedNote {
            note: 60,
            velocity: 90,
            track: 0,
            out_ch: 1,
            duration: 4,
            delay: 3,
            destination: DEST_USB,
            active: true,
        };

        // Each 16-frame block advances delays by the 1 ms minimum
        block(&mut e, 0.0, 0.0, &mut log);
        block(&mut e, 0.0, 0.0, &mut log);
        assert!(e.delayed[0].active);
        assert!(note_ons(&log).is_empty());

        block(&mut e, 0.0, 0.0, &mut log);
        assert!(!e.delayed[0].active);
        assert_eq!(note_ons(&log), vec![60]);
        // The playing slot is primed for duration countdown
        assert!(e.tracks[0].playing[60].active);
        assert_eq!(e.tracks[0].playing[60].remaining, 4);
        assert_eq!(e.tracks[0].active_notes[60], 90);
        assert_invariants(&e);
    }

    #[test]
    fn test_delayed_pool_overflow_drops_note() {
        let mut e = engine(1);
        for slot in e.delayed.iter_mut() {
            slot.active = true;
            slot.delay = 60_000;
        }
        let scheduled = e.schedule_delayed_note(60, 100, 0, 1, 4, 10, DEST_USB);
        assert!(!scheduled);
        assert_eq!(e.delayed.iter().filter(|d| d.active).count(), MAX_DELAYED_NOTES);
    }

    #[test]
    fn test_transport_start_resets_positions() {
        let mut e = engine(1);
        e.set_parameter(track_param(0, TRACK_LENGTH), 4);
        e.tracks[0].data.steps[0].add(60, 100, 1);

        let mut log = MidiLog::new();
        start(&mut e, &mut log);
        for _ in 0..3 {
            tick(&mut e, &mut log);
        }
        assert_eq!(e.tracks[0].step, 3);

        // A fresh gate rising edge restarts from the top
        stop(&mut e, &mut log);
        log.clear();
        start(&mut e, &mut log);
        tick(&mut e, &mut log);
        assert_eq!(e.tracks[0].step, 1);
        assert_eq!(note_ons(&log), vec![60]);
    }

    #[test]
    fn test_disabled_track_keeps_position_without_emitting() {
        let mut e = engine(1);
        e.set_parameter(track_param(0, TRACK_LENGTH), 4);
        e.set_parameter(track_param(0, TRACK_ENABLED), 0);
        e.tracks[0].data.steps[0].add(60, 100, 1);

        let mut log = MidiLog::new();
        start(&mut e, &mut log);
        for _ in 0..3 {
            tick(&mut e, &mut log);
        }
        assert_eq!(e.tracks[0].step, 3);
        assert!(note_ons(&log).is_empty());
    }

    #[test]
    fn test_shuffle_direction_permutes_each_cycle() {
        let mut e = engine(1);
        let len = 8;
        e.set_parameter(track_param(0, TRACK_LENGTH), len as i16);
        e.set_parameter(track_param(0, TRACK_DIRECTION), 11); // Shuffle
        for s in 0..len {
            e.tracks[0].data.steps[s].add(40 + s as u8, 100, 1);
        }

        let mut log = MidiLog::new();
        start(&mut e, &mut log);
        for _ in 0..len * 3 {
            tick(&mut e, &mut log);
        }
        let ons = note_ons(&log);
        for cycle in ons.chunks(len) {
            let mut sorted: Vec<u8> = cycle.to_vec();
            sorted.sort_unstable();
            let expected: Vec<u8> = (40..40 + len as u8).collect();
            assert_eq!(sorted, expected, "each shuffle cycle visits every step once");
        }
        // The permutation invariant holds on the stored order too
        let mut head: Vec<u8> = e.tracks[0].shuffle_order[..len].to_vec();
        head.sort_unstable();
        assert_eq!(head, (1..=len as u8).collect::<Vec<u8>>());
        assert_invariants(&e);
    }

    #[test]
    fn test_start_and_clock_in_same_block() {
        // Transport edge is handled before the clock edge: one reset and one
        // first tick in a single block
        let mut e = engine(1);
        e.set_parameter(track_param(0, TRACK_LENGTH), 4);
        e.tracks[0].data.steps[0].add(60, 100, 1);

        let mut log = MidiLog::new();
        block(&mut e, 5.0, 5.0, &mut log);
        assert_eq!(e.transport_state(), TransportState::Running);
        assert_eq!(e.tracks[0].step, 1);
        assert_eq!(note_ons(&log), vec![60]);
    }

    #[test]
    fn test_length_one_wraps_every_clock() {
        let mut e = engine(1);
        e.set_parameter(track_param(0, TRACK_LENGTH), 1);
        e.tracks[0].data.steps[0].add(60, 100, 1);

        let mut log = MidiLog::new();
        start(&mut e, &mut log);
        for _ in 0..5 {
            tick(&mut e, &mut log);
        }
        assert_eq!(note_ons(&log), vec![60; 5]);
        // Wrap on every clock after the first: loop count trails by one
        assert_eq!(e.tracks[0].loop_count, 4);
    }

    #[test]
    fn test_out_of_range_bus_reads_as_silent() {
        let mut e = engine(1);
        e.set_parameter(PARAM_RUN_BUS, 28); // beyond the 2 buses we provide
        let mut log = MidiLog::new();
        block(&mut e, 5.0, 0.0, &mut log);
        assert_eq!(e.transport_state(), TransportState::Stopped);
    }

    #[test]
    fn test_steps_stay_inside_loop_across_directions() {
        for dir in 0..12i16 {
            let mut e = engine(1);
            let len = 5;
            e.set_parameter(track_param(0, TRACK_LENGTH), len);
            e.set_parameter(track_param(0, TRACK_DIRECTION), dir);
            for s in 0..len as usize {
                e.tracks[0].data.steps[s].add(60, 100, 1);
            }
            let mut log = MidiLog::new();
            start(&mut e, &mut log);
            for _ in 0..MAX_STEPS {
                tick(&mut e, &mut log);
                let step = e.tracks[0].step as i16;
                assert!((1..=len).contains(&step), "dir {} step {}", dir, step);
            }
            assert_invariants(&e);
        }
    }
}
