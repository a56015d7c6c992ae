//! Encoded-resolution and bit-rate-ladder arithmetic used by the streamer's
//! outer loop (`ComputeVideoSize`) and its "weak encoder" recovery path.

/// Smallest permitted video dimension on either axis.
pub const MIN_VIDEO_RESOLUTION: i32 = 128;

/// Floor for the bit-rate ladder; below this the streamer fatal-exits
/// instead of reducing further.
pub const MIN_BIT_RATE: i64 = 100_000;

fn round_up_to_multiple_of(v: i32, m: i32) -> i32 {
    let m = m.max(1);
    ((v + m - 1) / m) * m
}

/// Picks encoded dimensions for a display given the encoder's maximum
/// resolution and size alignment.
///
/// Guarantees (checked by the caller's tests, see `§8` in `SPEC_FULL.md`):
/// `w % alignment_w == 0`, `h % alignment_h == 0`, `w,h >= 128`,
/// `w <= max_w`, `h <= max_h`, and the aspect ratio is preserved to within
/// one alignment step.
#[must_use]
pub fn compute_video_size(
    display_size: (i32, i32),
    max_resolution: (i32, i32),
    alignment: (i32, i32),
) -> (i32, i32) {
    let (dw, dh) = (f64::from(display_size.0), f64::from(display_size.1));
    let (max_w, max_h) = (f64::from(max_resolution.0), f64::from(max_resolution.1));
    debug_assert!(dw > 0.0 && dh > 0.0, "display size must be positive");

    let min_scale = (f64::from(MIN_VIDEO_RESOLUTION) / dw).max(f64::from(MIN_VIDEO_RESOLUTION) / dh);
    let scale = (max_w / dw).min(max_h / dh).clamp(min_scale, 1.0);

    let align_w = alignment.0.max(8);
    let align_h = alignment.1.max(1);

    let mut scaled_w = dw * scale;

    // Round width up, derive height from the display's aspect ratio, round
    // height up. If either exceeds the encoder's max, step the width down
    // by one alignment unit and retry.
    loop {
        let w = round_up_to_multiple_of(scaled_w.round() as i32, align_w).max(MIN_VIDEO_RESOLUTION);
        let h_unaligned = (f64::from(w) * dh / dw).round() as i32;
        let h = round_up_to_multiple_of(h_unaligned, align_h).max(MIN_VIDEO_RESOLUTION);

        if w <= max_resolution.0 && h <= max_resolution.1 {
            return (w, h);
        }

        scaled_w -= f64::from(align_w);
        if scaled_w <= f64::from(MIN_VIDEO_RESOLUTION) {
            // Can't shrink further without violating the minimum; return
            // the smallest aligned size even if it nominally exceeds max
            // (an encoder whose max is below 128 on an axis is a
            // misconfiguration the caller must reject earlier).
            let w = round_up_to_multiple_of(MIN_VIDEO_RESOLUTION, align_w);
            let h = round_up_to_multiple_of(
                (f64::from(w) * dh / dw).round() as i32,
                align_h,
            )
            .max(MIN_VIDEO_RESOLUTION);
            return (w, h);
        }
    }
}

/// Rounds `v` to the nearest value of the form `n * 10^k` with `n in {1,2,5}`,
/// used by the bit-rate ladder. Thresholds sit at the geometric means
/// between adjacent steps (`sqrt(2)`, `sqrt(10)`, `sqrt(50)`).
#[must_use]
pub fn round_to_one_two_five_scale(v: f64) -> i64 {
    if v <= 0.0 {
        return 0;
    }
    let exponent = v.log10().floor();
    let base = 10f64.powf(exponent);
    let mantissa = v / base;

    let step = if mantissa < 2f64.sqrt() {
        1.0
    } else if mantissa < 10f64.sqrt() {
        2.0
    } else if mantissa < 50f64.sqrt() {
        5.0
    } else {
        10.0
    };
    (step * base).round() as i64
}

/// Halves the current bit rate and rounds it onto the 1-2-5 ladder.
/// Returns `None` once the floor ([`MIN_BIT_RATE`]) would be breached,
/// signalling the caller should fatal-exit instead.
#[must_use]
pub fn reduce_bit_rate(current: i64) -> Option<i64> {
    let reduced = round_to_one_two_five_scale(current as f64 / 2.0);
    if reduced < MIN_BIT_RATE {
        None
    } else {
        Some(reduced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_size_respects_contract() {
        let cases = [
            ((1080, 2400), (1920, 1920), (2, 2)),
            ((720, 1600), (1280, 1280), (16, 16)),
            ((1440, 3200), (1024, 1024), (2, 2)),
        ];
        for (display, max, align) in cases {
            let (w, h) = compute_video_size(display, max, align);
            assert_eq!(w % align.0.max(8), 0);
            assert_eq!(h % align.1.max(1), 0);
            assert!(w >= MIN_VIDEO_RESOLUTION);
            assert!(h >= MIN_VIDEO_RESOLUTION);
            assert!(w <= max.0);
            assert!(h <= max.1);
        }
    }

    #[test]
    fn video_size_preserves_aspect_ratio_roughly() {
        let (w, h) = compute_video_size((1080, 2400), (1920, 1920), (2, 2));
        let src_ratio = 1080.0 / 2400.0;
        let out_ratio = f64::from(w) / f64::from(h);
        assert!((src_ratio - out_ratio).abs() < 0.05);
    }

    #[test]
    fn bit_rate_ladder_matches_scenario() {
        // 8 Mbit/s halved -> nearest 1-2-5 value to 4 Mbit/s -> 5 Mbit/s.
        assert_eq!(reduce_bit_rate(8_000_000), Some(5_000_000));
    }

    #[test]
    fn bit_rate_ladder_floors_at_minimum() {
        let mut rate = 200_000;
        loop {
            match reduce_bit_rate(rate) {
                Some(r) => {
                    assert!(r >= MIN_BIT_RATE);
                    rate = r;
                }
                None => break,
            }
        }
    }

    #[test]
    fn round_125_picks_nearest_step() {
        assert_eq!(round_to_one_two_five_scale(1.0), 1);
        assert_eq!(round_to_one_two_five_scale(190.0), 200);
        assert_eq!(round_to_one_two_five_scale(3.0), 2);
        assert_eq!(round_to_one_two_five_scale(4.0), 5);
        assert_eq!(round_to_one_two_five_scale(8.0), 10);
    }
}
