use crate::config::{BROWNIAN_DELTA_MAX, BROWNIAN_DELTA_MIN, MAX_STEPS};
use crate::rng::SplitMix32;
use crate::track::TrackState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
    Pendulum,
    PingPong,
    Stride,
    OddEven,
    Hopscotch,
    Converge,
    Diverge,
    Brownian,
    Random,
    Shuffle,
}

impl Direction {
    const ALL: [Direction; 12] = [
        Direction::Forward,
        Direction::Reverse,
        Direction::Pendulum,
        Direction::PingPong,
        Direction::Stride,
        Direction::OddEven,
        Direction::Hopscotch,
        Direction::Converge,
        Direction::Diverge,
        Direction::Brownian,
        Direction::Random,
        Direction::Shuffle,
    ];

    /// Map a Direction parameter value to a mode. Out-of-range codes fall
    /// back to Forward.
    pub fn from_index(idx: i32) -> Direction {
        if idx < 0 {
            return Direction::Forward;
        }
        Self::ALL.get(idx as usize).copied().unwrap_or(Direction::Forward)
    }
}

// STATELESS DIRECTION DISPATCH

/// 1-based step for a 1-based clock count. Brownian and Shuffle are handled
/// by `calculate_track_step`; here they fall back to Forward.
pub fn step_for_clock(
    clock_count: i32,
    loop_len: i32,
    dir: Direction,
    stride_size: i32,
    rng: &mut SplitMix32,
) -> i32 {
    if loop_len == 1 {
        return 1;
    }
    if clock_count < 1 {
        return 0;
    }

    let c = clock_count;
    let len = loop_len;

    match dir {
        Direction::Forward => ((c - 1) % len) + 1,
        Direction::Reverse => len - ((c - 1) % len),
        Direction::Pendulum => {
            // Cycle length 2(L-1): endpoints are not repeated
            let cycle = 2 * (len - 1);
            let pos = (c - 1) % cycle;
            if pos < len {
                pos + 1
            } else {
                2 * len - 1 - pos
            }
        }
        Direction::PingPong => {
            // Cycle length 2L: endpoints are repeated
            let cycle = 2 * len;
            let pos = (c - 1) % cycle;
            if pos < len {
                pos + 1
            } else {
                2 * len - pos
            }
        }
        Direction::Stride => (((c - 1) * stride_size) % len) + 1,
        Direction::OddEven => {
            let pos = ((c - 1) % len) + 1;
            let num_odds = (len + 1) / 2;
            if pos <= num_odds {
                (pos - 1) * 2 + 1
            } else {
                (pos - num_odds) * 2
            }
        }
        Direction::Hopscotch => {
            // pos / next-forward pairs: 1,1,2,2,3,3,...
            let pos = ((c - 1) % (len * 2)) + 1;
            let step_index = (pos + 1) / 2;
            if pos % 2 == 1 {
                ((step_index - 1) % len) + 1
            } else {
                let next_forward = (step_index % len) + 1;
                ((next_forward - 2 + len) % len) + 1
            }
        }
        Direction::Converge => {
            // Outside-in pairing: 1, L, 2, L-1, ...
            let pos = ((c - 1) % len) + 1;
            let pair = (pos + 1) / 2;
            if pos % 2 == 1 {
                pair
            } else {
                len - pair + 1
            }
        }
        Direction::Diverge => {
            // Middle-out pairing
            let pos = ((c - 1) % len) + 1;
            let mid = (len + 1) / 2;
            let pair = (pos + 1) / 2;
            if pos % 2 == 1 {
                mid - pair + 1
            } else {
                mid + pair
            }
        }
        Direction::Random => rng.next_range(1, len),
        // Stateful modes: callers go through calculate_track_step
        Direction::Brownian | Direction::Shuffle => ((c - 1) % len) + 1,
    }
}

// STATEFUL DIRECTION HELPERS

/// One Brownian step: delta in [-2, 2], zero forced to +1 so the walk always
/// moves, wrapped into `1..=loop_len`.
pub fn update_brownian_step(current_pos: i32, loop_len: i32, rng: &mut SplitMix32) -> i32 {
    let mut delta = rng.next_range(BROWNIAN_DELTA_MIN, BROWNIAN_DELTA_MAX);
    if delta == 0 {
        delta = 1;
    }
    let new_pos = current_pos + delta;
    ((new_pos - 1 + loop_len * 100) % loop_len) + 1
}

/// Fisher-Yates permutation of `1..=loop_len` into the head of `order`.
pub fn generate_shuffle_order(order: &mut [u8; MAX_STEPS], loop_len: i32, rng: &mut SplitMix32) {
    let len = loop_len.clamp(1, MAX_STEPS as i32) as usize;
    for (i, slot) in order.iter_mut().take(len).enumerate() {
        *slot = (i + 1) as u8;
    }
    for i in (1..len).rev() {
        let j = rng.next_range(0, i as i32) as usize;
        order.swap(i, j);
    }
}

/// Base-step dispatch including the stateful modes.
pub fn calculate_track_step(
    ts: &mut TrackState,
    loop_len: i32,
    dir: Direction,
    stride_size: i32,
) -> i32 {
    match dir {
        Direction::Brownian => {
            if ts.clock_count == 1 {
                ts.brownian_pos = 1;
            } else {
                ts.brownian_pos =
                    update_brownian_step(ts.brownian_pos as i32, loop_len, &mut ts.rng) as u8;
            }
            ts.brownian_pos as i32
        }
        Direction::Shuffle => {
            if ts.shuffle_pos as i32 > loop_len {
                generate_shuffle_order(&mut ts.shuffle_order, loop_len, &mut ts.rng);
                ts.shuffle_pos = 1;
            }
            let step = ts.shuffle_order[(ts.shuffle_pos - 1) as usize] as i32;
            ts.shuffle_pos += 1;
            step
        }
        _ => step_for_clock(ts.clock_count as i32, loop_len, dir, stride_size, &mut ts.rng),
    }
}

// WRAP DETECTION

/// True exactly when the current step completes a full cycle for the given
/// direction mode.
pub fn detect_wrap(
    prev_pos: i32,
    curr_pos: i32,
    loop_len: i32,
    dir: Direction,
    clock_count: i32,
) -> bool {
    if prev_pos < 1 {
        return false;
    }
    if loop_len <= 1 {
        return curr_pos == 1;
    }

    match dir {
        Direction::Forward => curr_pos == 1 && prev_pos == loop_len,
        Direction::Reverse => curr_pos == loop_len && prev_pos == 1,
        Direction::Pendulum => {
            (curr_pos == 1 && prev_pos == 2) || (curr_pos == loop_len && prev_pos == loop_len - 1)
        }
        Direction::PingPong => {
            let cycle = 2 * loop_len;
            (clock_count - 1) % cycle == 0
        }
        Direction::Stride => clock_count > 1 && curr_pos == 1,
        Direction::Hopscotch => clock_count > 1 && ((clock_count - 1) % (loop_len * 2)) == 0,
        Direction::OddEven
        | Direction::Converge
        | Direction::Diverge
        | Direction::Brownian
        | Direction::Random
        | Direction::Shuffle => clock_count > 1 && ((clock_count - 1) % loop_len) == 0,
    }
}
