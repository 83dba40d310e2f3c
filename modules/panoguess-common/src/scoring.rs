//! Distance to score on a fixed piecewise-linear curve.
//!
//! | distance (km) | points |
//! |---|---|
//! | < 0.1 | 5000 |
//! | < 1 | 4000–5000 |
//! | < 5 | 3000–4000 |
//! | < 25 | 2000–3000 |
//! | < 100 | 1000–2000 |
//! | < 500 | 0–1000 |
//! | ≥ 500 | 0 |
//!
//! Breakpoints use half-open `<` tests and the curve is continuous at every
//! one of them.

pub const MAX_SCORE_PER_ROUND: u32 = 5000;

/// Score for a guess `distance_km` away from the target, in `[0, 5000]`.
///
/// Negative or NaN distances are treated as a perfect guess and an infinite
/// distance as a miss.
pub fn score_from_distance(distance_km: f64) -> u32 {
    let d = distance_km;
    if d.is_nan() || d < 0.1 {
        return MAX_SCORE_PER_ROUND;
    }
    let points = if d < 1.0 {
        4000.0 + (1.0 - d) * 1000.0
    } else if d < 5.0 {
        3000.0 + (5.0 - d) / 4.0 * 1000.0
    } else if d < 25.0 {
        2000.0 + (25.0 - d) / 20.0 * 1000.0
    } else if d < 100.0 {
        1000.0 + (100.0 - d) / 75.0 * 1000.0
    } else if d < 500.0 {
        (500.0 - d) / 400.0 * 1000.0
    } else {
        return 0;
    };
    // round-half-up on a non-negative value, same as Math.round
    (points + 0.5).floor() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_values() {
        assert_eq!(score_from_distance(0.0), 5000);
        assert_eq!(score_from_distance(0.05), 5000);
        assert_eq!(score_from_distance(500.0), 0);
        assert_eq!(score_from_distance(1000.0), 0);
        assert_eq!(score_from_distance(f64::INFINITY), 0);
    }

    #[test]
    fn first_branch_boundary_is_half_open() {
        // 0.1 falls into the second branch: 4000 + 0.9 * 1000
        assert_eq!(score_from_distance(0.1), 4900);
        assert_eq!(score_from_distance(0.099_999), 5000);
    }

    #[test]
    fn curve_is_continuous_at_breakpoints() {
        // Left-hand formula evaluated exactly at each breakpoint must match
        // the right-hand branch that actually applies there.
        let left: [(f64, f64); 5] = [
            (1.0, 4000.0 + (1.0 - 1.0) * 1000.0),
            (5.0, 3000.0 + (5.0 - 5.0) / 4.0 * 1000.0),
            (25.0, 2000.0 + (25.0 - 25.0) / 20.0 * 1000.0),
            (100.0, 1000.0 + (100.0 - 100.0) / 75.0 * 1000.0),
            (500.0, (500.0 - 500.0) / 400.0 * 1000.0),
        ];
        for (d, expected) in left {
            assert_eq!(
                score_from_distance(d),
                expected as u32,
                "discontinuity at {d} km"
            );
        }
        assert_eq!(score_from_distance(1.0), 4000);
        assert_eq!(score_from_distance(5.0), 3000);
        assert_eq!(score_from_distance(25.0), 2000);
        assert_eq!(score_from_distance(100.0), 1000);
    }

    #[test]
    fn just_below_breakpoints_rounds_to_breakpoint_value() {
        assert_eq!(score_from_distance(0.999_9), 4000);
        assert_eq!(score_from_distance(4.999_9), 3000);
        assert_eq!(score_from_distance(24.999), 2000);
        assert_eq!(score_from_distance(99.99), 1000);
        assert_eq!(score_from_distance(499.9), 0);
    }

    #[test]
    fn mid_branch_values() {
        assert_eq!(score_from_distance(0.7), 4300);
        assert_eq!(score_from_distance(3.0), 3500);
        assert_eq!(score_from_distance(15.0), 2500);
        assert_eq!(score_from_distance(62.5), 1500);
        assert_eq!(score_from_distance(300.0), 500);
    }

    #[test]
    fn never_increases_with_distance() {
        let mut prev = score_from_distance(0.0);
        let mut d = 0.0;
        while d <= 600.0 {
            let s = score_from_distance(d);
            assert!(s <= prev, "score rose from {prev} to {s} at {d} km");
            assert!(s <= MAX_SCORE_PER_ROUND);
            prev = s;
            d += 0.037;
        }
    }
}
