// Trig condition codes:
//   0       Always
//   1-35    A:B ratios for periods 2-8 (true when loop_count % B == A-1)
//   36-70   the negated ratios
//   71-74   First, !First, Fill, !Fill
//   75      Fixed

/// Condition code for Fixed.
pub const COND_FIXED: i32 = 75;

const NUM_RATIOS: i32 = 35;

// A:B ratio lookup, period and position per ratio index 0-34
#[rustfmt::skip]
const RATIO_PERIOD: [u16; 35] = [
    2, 2,
    3, 3, 3,
    4, 4, 4, 4,
    5, 5, 5, 5, 5,
    6, 6, 6, 6, 6, 6,
    7, 7, 7, 7, 7, 7, 7,
    8, 8, 8, 8, 8, 8, 8, 8,
];
#[rustfmt::skip]
const RATIO_POS: [u16; 35] = [
    0, 1,
    0, 1, 2,
    0, 1, 2, 3,
    0, 1, 2, 3, 4,
    0, 1, 2, 3, 4, 5,
    0, 1, 2, 3, 4, 5, 6,
    0, 1, 2, 3, 4, 5, 6, 7,
];

/// Evaluate a trig condition against the loop counter and the global fill
/// flag. Unknown codes pass (treated as Always).
pub fn evaluate(cond: i32, loop_count: u16, fill_active: bool) -> bool {
    if cond <= 0 {
        return true; // Always
    }

    // Positive A:B ratios (1-35)
    if cond <= NUM_RATIOS {
        let idx = (cond - 1) as usize;
        return loop_count % RATIO_PERIOD[idx] == RATIO_POS[idx];
    }

    // Negated A:B ratios (36-70)
    if cond <= NUM_RATIOS * 2 {
        let idx = (cond - NUM_RATIOS - 1) as usize;
        return loop_count % RATIO_PERIOD[idx] != RATIO_POS[idx];
    }

    match cond {
        71 => loop_count == 0,  // First
        72 => loop_count != 0,  // !First
        73 => fill_active,      // Fill
        74 => !fill_active,     // !Fill
        COND_FIXED => true,     // Fixed (semantics handled by the emitter)
        _ => true,
    }
}
