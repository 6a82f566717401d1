//! Threshold validation.
//!
//! Each field is clamped to its range, then the pair is re-checked so that
//! `danger_distance < safe_distance` holds.  `safe_distance` is applied
//! first against the current danger value; `danger_distance` is applied
//! second against the possibly-updated safe value.  The two adjustments can
//! therefore never undo each other.

use rover_types::{
    DANGER_DISTANCE_RANGE, RoverError, SAFE_DISTANCE_RANGE, SPEED_LIMIT_RANGE, SafetyThresholds,
    ThresholdUpdate,
};

/// Minimum gap kept between the two distances when one pushes the other.
const DISTANCE_GAP: i32 = 5;

/// Return `current` with every field present in `update` applied.
///
/// # Errors
///
/// Returns [`RoverError::InvalidInput`] if any present value is not finite.
/// Validation happens before anything is applied.
pub fn apply_update(
    current: SafetyThresholds,
    update: &ThresholdUpdate,
) -> Result<SafetyThresholds, RoverError> {
    let speed_limit = update.speed_limit.map(|v| whole("speed_limit", v)).transpose()?;
    let safe = update.safe_distance.map(|v| whole("safe_distance", v)).transpose()?;
    let danger = update.danger_distance.map(|v| whole("danger_distance", v)).transpose()?;

    let mut t = current;

    if let Some(v) = speed_limit {
        t.speed_limit = clamp(v, SPEED_LIMIT_RANGE);
    }

    if let Some(v) = safe {
        t.safe_distance = clamp(v, SAFE_DISTANCE_RANGE);
        if t.danger_distance >= t.safe_distance {
            t.danger_distance = (t.safe_distance - DISTANCE_GAP).max(DANGER_DISTANCE_RANGE.0);
        }
    }

    if let Some(v) = danger {
        let new_danger = clamp(v, DANGER_DISTANCE_RANGE);
        if new_danger >= t.safe_distance {
            t.safe_distance = (new_danger + DISTANCE_GAP).min(SAFE_DISTANCE_RANGE.1);
        }
        t.danger_distance = new_danger;
    }

    Ok(t)
}

fn whole(field: &str, v: f64) -> Result<i64, RoverError> {
    if !v.is_finite() {
        return Err(RoverError::InvalidInput(format!("{field} must be a finite number")));
    }
    // Saturating cast: anything huge clamps to the range edge below.
    Ok(v.trunc() as i64)
}

fn clamp(v: i64, (lo, hi): (i32, i32)) -> i32 {
    v.clamp(i64::from(lo), i64::from(hi)) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds(speed_limit: i32, safe: i32, danger: i32) -> SafetyThresholds {
        SafetyThresholds {
            speed_limit,
            safe_distance: safe,
            danger_distance: danger,
        }
    }

    fn update(speed: Option<f64>, safe: Option<f64>, danger: Option<f64>) -> ThresholdUpdate {
        ThresholdUpdate {
            speed_limit: speed,
            safe_distance: safe,
            danger_distance: danger,
        }
    }

    #[test]
    fn danger_above_safe_raises_safe() {
        let t = apply_update(thresholds(100, 40, 20), &update(None, None, Some(90.0))).unwrap();
        assert_eq!(t.danger_distance, 40);
        assert_eq!(t.safe_distance, 45);
    }

    #[test]
    fn safe_below_danger_lowers_danger() {
        let t = apply_update(thresholds(100, 60, 35), &update(None, Some(25.0), None)).unwrap();
        assert_eq!(t.safe_distance, 25);
        assert_eq!(t.danger_distance, 20);
    }

    #[test]
    fn lowering_safe_to_minimum_keeps_gap() {
        let t = apply_update(thresholds(100, 40, 20), &update(None, Some(0.0), None)).unwrap();
        assert_eq!(t.safe_distance, 20);
        assert_eq!(t.danger_distance, 15);
    }

    #[test]
    fn both_fields_apply_safe_then_danger() {
        let t = apply_update(
            thresholds(100, 40, 20),
            &update(None, Some(20.0), Some(40.0)),
        )
        .unwrap();
        assert_eq!(t.danger_distance, 40);
        assert_eq!(t.safe_distance, 45);
    }

    #[test]
    fn speed_limit_is_clamped_and_truncated() {
        let t = apply_update(thresholds(100, 40, 20), &update(Some(150.0), None, None)).unwrap();
        assert_eq!(t.speed_limit, 100);
        let t = apply_update(t, &update(Some(-3.0), None, None)).unwrap();
        assert_eq!(t.speed_limit, 0);
        let t = apply_update(t, &update(Some(42.9), None, None)).unwrap();
        assert_eq!(t.speed_limit, 42);
    }

    #[test]
    fn non_finite_rejected_without_partial_apply() {
        let start = thresholds(100, 40, 20);
        let res = apply_update(start, &update(Some(50.0), Some(f64::NAN), None));
        assert!(matches!(res, Err(RoverError::InvalidInput(_))));
    }

    #[test]
    fn invariant_holds_over_update_sequences() {
        let values = [-100.0, 0.0, 5.0, 15.0, 20.0, 25.0, 39.0, 40.0, 41.0, 60.0, 80.0, 1e9];
        let mut t = SafetyThresholds::default();
        for &a in &values {
            for &b in &values {
                for u in [
                    update(None, Some(a), None),
                    update(None, None, Some(b)),
                    update(None, Some(a), Some(b)),
                ] {
                    t = apply_update(t, &u).unwrap();
                    assert!(t.danger_distance < t.safe_distance, "{t:?}");
                    assert!((20..=80).contains(&t.safe_distance), "{t:?}");
                    assert!((5..=40).contains(&t.danger_distance), "{t:?}");
                }
            }
        }
    }
}
