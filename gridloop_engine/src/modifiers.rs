use crate::config::{MASK_DENSE_DIVISOR, MASK_RANDOM_THRESHOLD, MASK_SPARSE_DIVISOR};
use crate::params::TrackParams;
use crate::rng::SplitMix32;

// CONTINUOUS MODIFIERS

// Probability rolls in a fixed order: Stability -> Motion -> Randomness ->
// Gravity -> Pedal. The binary filters below run afterwards, so they always
// see the fully modified step.
pub fn apply_modifiers(
    tp: &TrackParams,
    base_step: i32,
    last_step: i32,
    loop_len: i32,
    rng: &mut SplitMix32,
) -> i32 {
    let mut step = base_step;

    // Stability: chance to hold the previous cycle's final step
    let stability = tp.stability();
    if stability > 0 && rng.next_float_01() * 100.0 < stability as f32 {
        if last_step > 0 {
            step = last_step;
        }
    }

    // Motion: jitter step position
    let motion = tp.motion();
    if motion > 0 {
        let max_jitter = ((loop_len * motion) / 100).max(1);
        let jitter = rng.next_range(-max_jitter, max_jitter);
        step = ((step - 1 + jitter + loop_len * 100) % loop_len) + 1;
    }

    // Randomness: chance to override with a uniform step
    let randomness = tp.randomness();
    if randomness > 0 && rng.next_float_01() * 100.0 < randomness as f32 {
        step = rng.next_range(1, loop_len);
    }

    // Gravity: step one position toward the anchor
    let gravity = tp.gravity();
    if gravity > 0 && rng.next_float_01() * 100.0 < gravity as f32 {
        let anchor = tp.gravity_anchor(loop_len);
        let diff = anchor - step;
        if diff != 0 {
            step += if diff > 0 { 1 } else { -1 };
            step = ((step - 1 + loop_len) % loop_len) + 1;
        }
    }

    // Pedal: chance to return to the pedal step
    let pedal = tp.pedal();
    if pedal > 0 && rng.next_float_01() * 100.0 < pedal as f32 {
        step = tp.pedal_step(loop_len);
    }

    step
}

// STEP MASK

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMask {
    All,
    Odds,
    Evens,
    FirstHalf,
    SecondHalf,
    Sparse,
    Dense,
    Random,
}

impl StepMask {
    const ALL_MASKS: [StepMask; 8] = [
        StepMask::All,
        StepMask::Odds,
        StepMask::Evens,
        StepMask::FirstHalf,
        StepMask::SecondHalf,
        StepMask::Sparse,
        StepMask::Dense,
        StepMask::Random,
    ];

    /// Map a Step Mask parameter value. Out-of-range codes fall back to All.
    pub fn from_index(idx: i32) -> StepMask {
        if idx < 0 {
            return StepMask::All;
        }
        Self::ALL_MASKS.get(idx as usize).copied().unwrap_or(StepMask::All)
    }

    fn allows(&self, step: i32, loop_len: i32, rng: &mut SplitMix32) -> bool {
        match self {
            StepMask::All => true,
            StepMask::Odds => step % 2 == 1,
            StepMask::Evens => step % 2 == 0,
            StepMask::FirstHalf => step <= loop_len / 2,
            StepMask::SecondHalf => step > loop_len / 2,
            StepMask::Sparse => step % MASK_SPARSE_DIVISOR == 1,
            StepMask::Dense => step % MASK_DENSE_DIVISOR != 0,
            StepMask::Random => rng.next_float_01() < MASK_RANDOM_THRESHOLD,
        }
    }
}

/// Scan forward cyclically from `step` until the mask allows a step. If the
/// mask rejects a full cycle (possible for Random, or FirstHalf at length 1),
/// the original step stands.
fn apply_step_mask(mask: StepMask, step: i32, loop_len: i32, rng: &mut SplitMix32) -> i32 {
    for i in 0..loop_len {
        let candidate = ((step - 1 + i) % loop_len) + 1;
        if mask.allows(candidate, loop_len, rng) {
            return candidate;
        }
    }
    step
}

// BINARY MODIFIERS

pub fn apply_binary_modifiers(
    tp: &TrackParams,
    step: i32,
    prev_step: i32,
    loop_len: i32,
    rng: &mut SplitMix32,
) -> i32 {
    let mut step = step;

    // No Repeat: skip if same as previous cycle's final step
    if tp.no_repeat() && step == prev_step && loop_len > 1 {
        step = (step % loop_len) + 1;
    }

    // Step Mask: walk forward to the next allowed step
    let mask = StepMask::from_index(tp.step_mask());
    if mask != StepMask::All {
        step = apply_step_mask(mask, step, loop_len, rng);
    }

    step
}
