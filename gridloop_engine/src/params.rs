use crate::config::{MAX_STEPS, MAX_TRACKS};

// Flat i16 parameter array: the global block first, then one block per
// track. Read-only during a block; writes arrive through set_parameter.

// GLOBAL PARAMETER INDICES

pub const PARAM_RUN_BUS: usize = 0; // CV input bus selector for run/gate (0 = none)
pub const PARAM_CLOCK_BUS: usize = 1; // CV input bus selector for clock (0 = none)
pub const PARAM_RECORD: usize = 2;
pub const PARAM_REC_TRACK: usize = 3;
pub const PARAM_REC_DIVISION: usize = 4;
pub const PARAM_REC_MODE: usize = 5;
pub const PARAM_REC_SNAP: usize = 6;
pub const PARAM_MIDI_IN_CH: usize = 7;
pub const PARAM_PANIC_ON_WRAP: usize = 8;
pub const PARAM_SCALE_ROOT: usize = 9;
pub const PARAM_SCALE_TYPE: usize = 10;
pub const PARAM_CLEAR_TRACK: usize = 11;
pub const PARAM_CLEAR_ALL: usize = 12;
pub const PARAM_GENERATE: usize = 13;
pub const PARAM_GEN_MODE: usize = 14;
pub const PARAM_GEN_DENSITY: usize = 15;
pub const PARAM_GEN_BIAS: usize = 16;
pub const PARAM_GEN_RANGE: usize = 17;
pub const PARAM_GEN_NOTE_RAND: usize = 18;
pub const PARAM_GEN_VEL_VAR: usize = 19;
pub const PARAM_GEN_TIES: usize = 20;
pub const PARAM_GEN_GATE_RAND: usize = 21;
pub const PARAM_FILL: usize = 22;

pub const GLOBAL_PARAM_COUNT: usize = 23;

// PER-TRACK PARAMETER OFFSETS

pub const TRACK_ENABLED: usize = 0;
pub const TRACK_LENGTH: usize = 1;
pub const TRACK_CLOCK_DIV: usize = 2;
pub const TRACK_DIRECTION: usize = 3;
pub const TRACK_STRIDE_SIZE: usize = 4;
pub const TRACK_VELOCITY: usize = 5;
pub const TRACK_HUMANIZE: usize = 6;
pub const TRACK_CHANNEL: usize = 7;
pub const TRACK_DESTINATION: usize = 8;
pub const TRACK_STABILITY: usize = 9;
pub const TRACK_MOTION: usize = 10;
pub const TRACK_RANDOMNESS: usize = 11;
pub const TRACK_GRAVITY: usize = 12;
pub const TRACK_GRAVITY_ANCHOR: usize = 13;
pub const TRACK_PEDAL: usize = 14;
pub const TRACK_PEDAL_STEP: usize = 15;
pub const TRACK_NO_REPEAT: usize = 16;
pub const TRACK_STEP_MASK: usize = 17;
pub const TRACK_OCT_MIN: usize = 18;
pub const TRACK_OCT_MAX: usize = 19;
pub const TRACK_OCT_PROB: usize = 20;
pub const TRACK_OCT_BYPASS: usize = 21;
pub const TRACK_STEP_PROB: usize = 22;
pub const TRACK_STEP_COND: usize = 23;
pub const TRACK_COND_STEP_A: usize = 24;
pub const TRACK_COND_A: usize = 25;
pub const TRACK_PROB_A: usize = 26;
pub const TRACK_COND_STEP_B: usize = 27;
pub const TRACK_COND_B: usize = 28;
pub const TRACK_PROB_B: usize = 29;

pub const TRACK_PARAM_COUNT: usize = 30;

/// Index of a track parameter in the flat array.
pub fn track_param(track: usize, offset: usize) -> usize {
    GLOBAL_PARAM_COUNT + track * TRACK_PARAM_COUNT + offset
}

/// Total parameter count for a given track count.
pub fn total_params(num_tracks: usize) -> usize {
    GLOBAL_PARAM_COUNT + num_tracks * TRACK_PARAM_COUNT
}

// Recording mode values
pub const REC_MODE_REPLACE: i16 = 0;
pub const REC_MODE_OVERDUB: i16 = 1;
pub const REC_MODE_STEP: i16 = 2;

// Generate mode values
pub const GEN_MODE_NEW: i16 = 0;
pub const GEN_MODE_REORDER: i16 = 1;
pub const GEN_MODE_REPITCH: i16 = 2;
pub const GEN_MODE_INVERT: i16 = 3;

// PARAMETER DEFINITIONS

/// Range and default of one parameter. Incoming writes clamp to `[min, max]`.
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub min: i16,
    pub max: i16,
    pub def: i16,
}

const fn spec(name: &'static str, min: i16, max: i16, def: i16) -> ParamSpec {
    ParamSpec { name, min, max, def }
}

pub const GLOBAL_SPECS: [ParamSpec; GLOBAL_PARAM_COUNT] = [
    spec("Run Input", 0, 28, 0),
    spec("Clock Input", 0, 28, 0),
    spec("Record", 0, 1, 0),
    spec("Rec Track", 0, MAX_TRACKS as i16 - 1, 0),
    spec("Rec Division", 0, 4, 0),
    spec("Rec Mode", 0, 2, 0),
    spec("Rec Snap", 50, 100, 75),
    spec("MIDI In Ch", 0, 16, 0),
    spec("Panic On Wrap", 0, 1, 0),
    spec("Scale Root", 0, 11, 0),
    spec("Scale Type", 0, 11, 0),
    spec("Clear Track", 0, 1, 0),
    spec("Clear All", 0, 1, 0),
    spec("Generate", 0, 1, 0),
    spec("Gen Mode", 0, 3, 0),
    spec("Gen Density", 1, 100, 50),
    spec("Gen Bias", 0, 127, 60),
    spec("Gen Range", 0, 48, 12),
    spec("Gen Note Rand", 0, 100, 100),
    spec("Gen Vel Var", 0, 100, 0),
    spec("Gen Ties", 0, 100, 0),
    spec("Gen Gate Rand", 0, 100, 0),
    spec("Fill", 0, 1, 0),
];

pub const TRACK_SPECS: [ParamSpec; TRACK_PARAM_COUNT] = [
    spec("Enabled", 0, 1, 0),
    spec("Length", 1, MAX_STEPS as i16, 16),
    spec("Clock Div", 1, 16, 1),
    spec("Direction", 0, 11, 0),
    spec("Stride Size", 2, 16, 2),
    spec("Velocity", -64, 64, 0),
    spec("Humanize", 0, 100, 0),
    spec("Channel", 1, 16, 1),
    spec("Destination", 0, 4, 2),
    spec("Stability", 0, 100, 0),
    spec("Motion", 0, 100, 0),
    spec("Randomness", 0, 100, 0),
    spec("Gravity", 0, 100, 0),
    spec("Anchor", 1, MAX_STEPS as i16, 1),
    spec("Pedal", 0, 100, 0),
    spec("Pedal Step", 1, MAX_STEPS as i16, 1),
    spec("No Repeat", 0, 1, 0),
    spec("Step Mask", 0, 7, 0),
    spec("Oct Min", 0, 4, 0),
    spec("Oct Max", 0, 4, 0),
    spec("Oct Prob", 0, 100, 0),
    spec("Oct Bypass", 0, 64, 0),
    spec("Step Prob", 0, 100, 100),
    spec("Step Cond", 0, 75, 0),
    spec("Cond Step A", 0, MAX_STEPS as i16, 0),
    spec("Cond A", 0, 75, 0),
    spec("Prob A", 0, 100, 100),
    spec("Cond Step B", 0, MAX_STEPS as i16, 0),
    spec("Cond B", 0, 75, 0),
    spec("Prob B", 0, 100, 100),
];

/// Spec for an arbitrary flat index.
pub fn param_spec(index: usize) -> ParamSpec {
    if index < GLOBAL_PARAM_COUNT {
        GLOBAL_SPECS[index]
    } else {
        TRACK_SPECS[(index - GLOBAL_PARAM_COUNT) % TRACK_PARAM_COUNT]
    }
}

/// Build the default parameter array for a track count. Track 1 starts
/// enabled on channel 1; further tracks start disabled on channels 2, 3, ...
pub fn default_parameters(num_tracks: usize) -> Vec<i16> {
    let mut v = Vec::with_capacity(total_params(num_tracks));
    for s in GLOBAL_SPECS.iter() {
        v.push(s.def);
    }
    for t in 0..num_tracks {
        for (offset, s) in TRACK_SPECS.iter().enumerate() {
            let def = match offset {
                TRACK_ENABLED => (t == 0) as i16,
                TRACK_CHANNEL => ((t % 16) + 1) as i16,
                _ => s.def,
            };
            v.push(def);
        }
    }
    v
}

// TRACK PARAMETERS ACCESSOR

/// Typed view of one track's parameter block. Keeps the flat-array index
/// math out of the playback code.
#[derive(Clone, Copy)]
pub struct TrackParams<'a> {
    v: &'a [i16],
    track: usize,
}

impl<'a> TrackParams<'a> {
    pub fn new(v: &'a [i16], track: usize) -> Self {
        Self { v, track }
    }

    fn raw(&self, offset: usize) -> i32 {
        self.v[track_param(self.track, offset)] as i32
    }

    // Basic track settings
    pub fn enabled(&self) -> bool {
        self.raw(TRACK_ENABLED) == 1
    }
    pub fn length(&self) -> i32 {
        self.raw(TRACK_LENGTH).clamp(1, MAX_STEPS as i32)
    }
    pub fn clock_div(&self) -> i32 {
        self.raw(TRACK_CLOCK_DIV).clamp(1, 16)
    }
    pub fn direction(&self) -> i32 {
        self.raw(TRACK_DIRECTION)
    }
    pub fn stride_size(&self) -> i32 {
        self.raw(TRACK_STRIDE_SIZE)
    }

    // Output settings
    pub fn channel(&self) -> i32 {
        self.raw(TRACK_CHANNEL).clamp(1, 16)
    }
    pub fn destination(&self) -> i32 {
        self.raw(TRACK_DESTINATION)
    }
    pub fn velocity(&self) -> i32 {
        self.raw(TRACK_VELOCITY) // offset, can be negative
    }
    pub fn humanize(&self) -> i32 {
        self.raw(TRACK_HUMANIZE)
    }

    // Continuous modifiers
    pub fn stability(&self) -> i32 {
        self.raw(TRACK_STABILITY)
    }
    pub fn motion(&self) -> i32 {
        self.raw(TRACK_MOTION)
    }
    pub fn randomness(&self) -> i32 {
        self.raw(TRACK_RANDOMNESS)
    }
    pub fn gravity(&self) -> i32 {
        self.raw(TRACK_GRAVITY)
    }
    pub fn gravity_anchor(&self, loop_len: i32) -> i32 {
        self.raw(TRACK_GRAVITY_ANCHOR).clamp(1, loop_len)
    }
    pub fn pedal(&self) -> i32 {
        self.raw(TRACK_PEDAL)
    }
    pub fn pedal_step(&self, loop_len: i32) -> i32 {
        self.raw(TRACK_PEDAL_STEP).clamp(1, loop_len)
    }

    // Binary modifiers
    pub fn no_repeat(&self) -> bool {
        self.raw(TRACK_NO_REPEAT) == 1
    }
    pub fn step_mask(&self) -> i32 {
        self.raw(TRACK_STEP_MASK)
    }

    // Octave jump
    pub fn oct_min(&self) -> i32 {
        self.raw(TRACK_OCT_MIN)
    }
    pub fn oct_max(&self) -> i32 {
        self.raw(TRACK_OCT_MAX)
    }
    pub fn oct_prob(&self) -> i32 {
        self.raw(TRACK_OCT_PROB)
    }
    pub fn oct_bypass(&self) -> i32 {
        self.raw(TRACK_OCT_BYPASS)
    }

    // Step conditions
    pub fn step_prob(&self) -> i32 {
        self.raw(TRACK_STEP_PROB)
    }
    pub fn step_cond(&self) -> i32 {
        self.raw(TRACK_STEP_COND)
    }
    pub fn cond_step_a(&self) -> i32 {
        self.raw(TRACK_COND_STEP_A)
    }
    pub fn cond_a(&self) -> i32 {
        self.raw(TRACK_COND_A)
    }
    pub fn prob_a(&self) -> i32 {
        self.raw(TRACK_PROB_A)
    }
    pub fn cond_step_b(&self) -> i32 {
        self.raw(TRACK_COND_STEP_B)
    }
    pub fn cond_b(&self) -> i32 {
        self.raw(TRACK_COND_B)
    }
    pub fn prob_b(&self) -> i32 {
        self.raw(TRACK_PROB_B)
    }
}
