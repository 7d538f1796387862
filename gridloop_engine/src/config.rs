// Tunable constants for the sequencing engine.

// Track configuration
pub const MIN_TRACKS: usize = 1;
pub const MAX_TRACKS: usize = 8;

// Sequence configuration
pub const MAX_STEPS: usize = 128;
pub const MAX_EVENTS_PER_STEP: usize = 8;

// Humanization delay pool size
pub const MAX_DELAYED_NOTES: usize = 64;

// Brownian motion step delta range
pub const BROWNIAN_DELTA_MIN: i32 = -2;
pub const BROWNIAN_DELTA_MAX: i32 = 2;

// Step mask divisors
pub const MASK_SPARSE_DIVISOR: i32 = 3; // every 3rd step (step % 3 == 1)
pub const MASK_DENSE_DIVISOR: i32 = 4; // skip every 4th step (step % 4 != 0)

// Random mask probability threshold (0.0 to 1.0)
pub const MASK_RANDOM_THRESHOLD: f32 = 0.5;

// Gate detection thresholds (volts, against the CV inputs)
pub const GATE_THRESHOLD_HIGH: f32 = 2.0;
pub const GATE_THRESHOLD_LOW: f32 = 0.5;

/// Division parameter index (0-4) to actual quantize target.
pub const QUANTIZE_VALUES: [i32; 5] = [1, 2, 4, 8, 16];

// Saturating index accessors. Out-of-range indices are considered normal
// (stale pool entries, parameter races) and clamp instead of panicking.

pub fn safe_step_index(idx: i32) -> usize {
    idx.clamp(0, MAX_STEPS as i32 - 1) as usize
}

pub fn safe_note_index(idx: i32) -> usize {
    idx.clamp(0, 127) as usize
}

pub fn safe_track_index(idx: i32, num_tracks: usize) -> usize {
    idx.clamp(0, num_tracks as i32 - 1) as usize
}
