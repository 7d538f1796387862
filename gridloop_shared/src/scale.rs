use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScaleType {
    Off,

    // Diatonic modes
    Ionian,
    Dorian,
    Phrygian,
    Lydian,
    Mixolydian,
    Aeolian,
    Locrian,

    // Harmonic/Melodic
    HarmonicMinor,
    MelodicMinor,

    // Pentatonic
    MajorPentatonic,
    MinorPentatonic,
}

impl Default for ScaleType {
    fn default() -> Self {
        Self::Off
    }
}

impl ScaleType {
    /// Constant array of all scale types for O(1) parameter lookup.
    const ALL: [ScaleType; 12] = [
        ScaleType::Off,
        ScaleType::Ionian,
        ScaleType::Dorian,
        ScaleType::Phrygian,
        ScaleType::Lydian,
        ScaleType::Mixolydian,
        ScaleType::Aeolian,
        ScaleType::Locrian,
        ScaleType::HarmonicMinor,
        ScaleType::MelodicMinor,
        ScaleType::MajorPentatonic,
        ScaleType::MinorPentatonic,
    ];

    /// Lookup by parameter value. Out-of-range values fall back to Off.
    pub fn from_index(idx: i32) -> ScaleType {
        if idx < 0 {
            return ScaleType::Off;
        }
        Self::ALL.get(idx as usize).copied().unwrap_or(ScaleType::Off)
    }

    pub fn get_intervals(&self) -> &'static [u8] {
        match self {
            ScaleType::Off => &[],
            ScaleType::Ionian => &[0, 2, 4, 5, 7, 9, 11],
            ScaleType::Dorian => &[0, 2, 3, 5, 7, 9, 10],
            ScaleType::Phrygian => &[0, 1, 3, 5, 7, 8, 10],
            ScaleType::Lydian => &[0, 2, 4, 6, 7, 9, 11],
            ScaleType::Mixolydian => &[0, 2, 4, 5, 7, 9, 10],
            ScaleType::Aeolian => &[0, 2, 3, 5, 7, 8, 10],
            ScaleType::Locrian => &[0, 1, 3, 5, 6, 8, 10],
            ScaleType::HarmonicMinor => &[0, 2, 3, 5, 7, 8, 11],
            ScaleType::MelodicMinor => &[0, 2, 3, 5, 7, 9, 11],
            ScaleType::MajorPentatonic => &[0, 2, 4, 7, 9],
            ScaleType::MinorPentatonic => &[0, 3, 5, 7, 10],
        }
    }

    pub fn iter() -> impl Iterator<Item = ScaleType> {
        Self::ALL.into_iter()
    }
}

/// Maps pitch class (0-11) to white key index (0-6).
/// Black keys map down to the white key below them:
/// C=0, C#->0, D=1, D#->1, E=2, F=3, F#->3, G=4, G#->4, A=5, A#->5, B=6
const PC_TO_WHITE_KEY: [u8; 12] = [0, 0, 1, 1, 2, 3, 3, 4, 4, 5, 5, 6];

/// Quantize a MIDI note to a root + scale combination.
///
/// Maps white key positions to scale degrees, so the keyboard keeps a
/// "one note per white key" feel across scales of different sizes; for
/// pentatonic scales the two surplus white keys wrap into the next octave.
/// Returns the note unchanged when the scale is Off.
///
/// # Arguments
/// * `note` - The MIDI note number to quantize (0-127)
/// * `root` - The root pitch class (0-11)
/// * `scale` - The scale type to use
pub fn quantize(note: u8, root: i32, scale: ScaleType) -> u8 {
    if scale == ScaleType::Off {
        return note;
    }

    let intervals = scale.get_intervals();
    if intervals.is_empty() {
        return note;
    }
    let scale_size = intervals.len() as i32;

    let pc = (note % 12) as usize;
    let octave = (note / 12) as i32;
    let white_key = PC_TO_WHITE_KEY[pc] as i32;

    let extra_octave = white_key / scale_size;
    let degree = (white_key % scale_size) as usize;

    let out = (octave + extra_octave) * 12 + root.clamp(0, 11) + intervals[degree] as i32;
    out.clamp(0, 127) as u8
}
