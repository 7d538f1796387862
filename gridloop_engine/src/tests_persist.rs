#[cfg(test)]
mod tests {
    use crate::engine::Engine;
    use crate::params::{track_param, TRACK_LENGTH};

    fn engine_with_pattern(tracks: usize) -> Engine {
        let mut e = Engine::with_seed(tracks, 0xBEEF).unwrap();
        for t in 0..tracks {
            e.set_parameter(track_param(t, TRACK_LENGTH), 16);
            e.tracks[t].data.steps[0].add(60 + t as u8, 100, 4);
            e.tracks[t].data.steps[4].add(67, 90, 2);
            e.tracks[t].brownian_pos = 3;
            e.tracks[t].shuffle_pos = 5;
        }
        e
    }

    #[test]
    fn test_save_load_round_trip_is_byte_equal() {
        let e = engine_with_pattern(2);
        let saved = e.save_to_string().unwrap();

        let mut fresh = Engine::with_seed(2, 1).unwrap();
        fresh.load_from_str(&saved).unwrap();
        let resaved = fresh.save_to_string().unwrap();

        assert_eq!(saved, resaved);
    }

    #[test]
    fn test_load_restores_events_and_state() {
        let e = engine_with_pattern(1);
        let saved = e.save_to_string().unwrap();

        let mut fresh = Engine::with_seed(1, 99).unwrap();
        fresh.load_from_str(&saved).unwrap();

        let evs = &fresh.tracks[0].data.steps[0];
        assert_eq!(evs.count, 1);
        assert_eq!(evs.events[0].note, 60);
        assert_eq!(evs.events[0].duration, 4);
        assert_eq!(fresh.tracks[0].data.steps[4].events[0].note, 67);
        assert_eq!(fresh.tracks[0].brownian_pos, 3);
        assert_eq!(fresh.tracks[0].shuffle_pos, 5);
    }

    #[test]
    fn test_track_count_mismatch_loads_prefix() {
        let e = engine_with_pattern(4);
        let saved = e.save_to_string().unwrap();

        let mut small = Engine::with_seed(2, 1).unwrap();
        small.load_from_str(&saved).unwrap();
        assert_eq!(small.tracks[0].data.steps[0].events[0].note, 60);
        assert_eq!(small.tracks[1].data.steps[0].events[0].note, 61);

        // And a larger engine only fills what the save provides
        let mut big = Engine::with_seed(8, 1).unwrap();
        big.load_from_str(&saved).unwrap();
        assert_eq!(big.tracks[3].data.steps[0].events[0].note, 63);
        assert_eq!(big.tracks[4].data.steps[0].count, 0);
    }

    #[test]
    fn test_parse_failure_leaves_state_untouched() {
        let mut e = engine_with_pattern(1);
        assert!(e.load_from_str("not json at all").is_err());
        assert_eq!(e.tracks[0].data.steps[0].events[0].note, 60);
        assert_eq!(e.tracks[0].brownian_pos, 3);
    }

    #[test]
    fn test_invalid_events_skipped_on_load() {
        let json = r#"{
            "version": 1,
            "numTracks": 1,
            "tracks": [
                {
                    "events": [
                        [
                            {"n": 200, "v": 100, "d": 1},
                            {"n": 64, "v": 100, "d": 0},
                            {"n": 64, "v": 100, "d": 2}
                        ]
                    ],
                    "shuffleOrder": [],
                    "shufflePos": 1,
                    "brownianPos": 1
                }
            ]
        }"#;

        let mut e = Engine::with_seed(1, 1).unwrap();
        e.load_from_str(json).unwrap();
        let evs = &e.tracks[0].data.steps[0];
        assert_eq!(evs.count, 1, "out-of-range note and zero duration skipped");
        assert_eq!(evs.events[0].note, 64);
        assert_eq!(evs.events[0].duration, 2);
    }

    #[test]
    fn test_load_clamps_direction_state() {
        let json = r#"{
            "version": 1,
            "numTracks": 1,
            "tracks": [
                {"events": [], "shuffleOrder": [], "shufflePos": 0, "brownianPos": 0}
            ]
        }"#;

        let mut e = Engine::with_seed(1, 1).unwrap();
        e.load_from_str(json).unwrap();
        assert_eq!(e.tracks[0].shuffle_pos, 1);
        assert_eq!(e.tracks[0].brownian_pos, 1);
    }
}
