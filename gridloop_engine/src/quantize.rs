use crate::config::QUANTIZE_VALUES;
use crate::track::TrackCache;

/// Largest divisor `q <= min(target, loop_len)` with `loop_len % q == 0`.
/// The result always divides the loop length, so division boundaries line up
/// with the loop wrap.
pub fn find_valid_quantize(loop_len: i32, target_quantize: i32) -> i32 {
    let max_q = target_quantize.min(loop_len);
    for q in (1..=max_q.max(1)).rev() {
        if loop_len % q == 0 {
            return q;
        }
    }
    1
}

/// Effective quantize for a track length and a Division parameter index.
pub fn effective_quantize(loop_len: i32, division_index: i32) -> i32 {
    let idx = division_index.clamp(0, QUANTIZE_VALUES.len() as i32 - 1) as usize;
    find_valid_quantize(loop_len, QUANTIZE_VALUES[idx])
}

/// Cached variant: recomputes only when the cache is dirty.
/// Returns `(quantize, loop_len)`.
pub fn cached_quantize(loop_len: i32, division_index: i32, cache: &mut TrackCache) -> (i32, i32) {
    if cache.dirty {
        cache.effective_quantize = effective_quantize(loop_len, division_index) as u8;
        cache.loop_len = loop_len as u8;
        cache.dirty = false;
    }
    (cache.effective_quantize as i32, cache.loop_len as i32)
}

// STEP SNAPPING (for recording)

/// Snap a raw step to itself or the next step, depending on how far into the
/// current clock tick the event landed. Wraps to 1 past the loop end.
pub fn snap_step_subclock(raw_step: i32, step_fraction: f32, threshold: f32, loop_len: i32) -> i32 {
    if step_fraction < threshold {
        return raw_step;
    }
    let snapped = raw_step + 1;
    if snapped > loop_len {
        1
    } else {
        snapped
    }
}

/// Snap to the nearest division boundary: position within the current
/// division decides between this boundary and the next, wrapping to 1 at
/// loop overflow.
pub fn snap_to_division_subclock(
    raw_step: i32,
    step_fraction: f32,
    quantize: i32,
    threshold: f32,
    loop_len: i32,
) -> i32 {
    let step_in_division = (raw_step - 1) % quantize;
    let division_position = (step_in_division as f32 + step_fraction) / quantize as f32;
    let current_division = (raw_step - 1) / quantize;
    let mut quantized_step = current_division * quantize + 1;

    if division_position >= threshold {
        quantized_step = (current_division + 1) * quantize + 1;
        if quantized_step > loop_len {
            quantized_step = 1;
        }
    }
    quantized_step
}

// DURATION QUANTIZATION

/// Round a duration to the nearest multiple of the quantize unit
/// (half-away-from-zero), never below one unit.
pub fn quantize_duration(duration: i32, quantize: i32) -> i32 {
    if quantize <= 1 {
        return duration;
    }
    let quantized = ((duration + quantize / 2) / quantize) * quantize;
    quantized.max(quantize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_valid_quantize() {
        assert_eq!(find_valid_quantize(16, 4), 4);
        assert_eq!(find_valid_quantize(16, 16), 16);
        // Target does not divide the length: fall to the largest that does
        assert_eq!(find_valid_quantize(12, 8), 6);
        assert_eq!(find_valid_quantize(7, 4), 1);
        assert_eq!(find_valid_quantize(1, 16), 1);
    }

    #[test]
    fn test_effective_quantize_table() {
        assert_eq!(effective_quantize(16, 0), 1);
        assert_eq!(effective_quantize(16, 2), 4);
        assert_eq!(effective_quantize(16, 4), 16);
        assert_eq!(effective_quantize(8, 4), 8); // target 16 clamped by length
    }

    #[test]
    fn test_cache_refresh_on_dirty_only() {
        let mut cache = TrackCache::DIRTY;
        assert_eq!(cached_quantize(16, 2, &mut cache), (4, 16));
        assert!(!cache.dirty);
        // Stale inputs are ignored until invalidated
        assert_eq!(cached_quantize(12, 0, &mut cache), (4, 16));
        cache.invalidate();
        assert_eq!(cached_quantize(12, 0, &mut cache), (1, 12));
    }

    #[test]
    fn test_snap_step_subclock() {
        assert_eq!(snap_step_subclock(2, 0.1, 0.75, 16), 2);
        assert_eq!(snap_step_subclock(2, 0.8, 0.75, 16), 3);
        assert_eq!(snap_step_subclock(16, 0.9, 0.75, 16), 1);
        // Snap at 100% never advances
        assert_eq!(snap_step_subclock(2, 0.999, 1.0, 16), 2);
    }

    #[test]
    fn test_snap_to_division() {
        // Step 2 fraction 0.1 with quantize 4: position 0.275 of the
        // division, below a 75% threshold -> snap back to boundary step 1
        assert_eq!(snap_to_division_subclock(2, 0.1, 4, 0.75, 16), 1);
        // Step 4 fraction 0.5: position 0.875 -> forward to step 5
        assert_eq!(snap_to_division_subclock(4, 0.5, 4, 0.75, 16), 5);
        // Last division snapping forward wraps to 1
        assert_eq!(snap_to_division_subclock(16, 0.9, 4, 0.75, 16), 1);
        // Quantize 1 degenerates to per-step snapping
        assert_eq!(snap_to_division_subclock(3, 0.9, 1, 0.75, 16), 4);
    }

    #[test]
    fn test_quantize_duration() {
        assert_eq!(quantize_duration(1, 4), 4); // rounds up to one unit
        assert_eq!(quantize_duration(5, 4), 4);
        assert_eq!(quantize_duration(6, 4), 8);
        assert_eq!(quantize_duration(7, 1), 7); // quantize 1 is identity
        assert_eq!(quantize_duration(10, 4), 12);
    }
}
