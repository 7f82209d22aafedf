use crate::domain::Sample;

const MS_PER_HOUR: f64 = 3_600_000.0;

/// Trapezoidal energy (kWh) for an interval bounded by two power readings (W).
fn trapezoid_kwh(p0_w: f64, p1_w: f64, hours: f64) -> f64 {
    (((p0_w + p1_w) / 2.0) / 1000.0 * hours).max(0.0)
}

/// Energy produced between the previous accepted sample and `next`.
///
/// Returns `None` when there is nothing to integrate against: no previous
/// sample, a previous reading of zero (not warmed up), or a timestamp that
/// does not move forward.
pub fn energy_delta_kwh(previous: Option<&Sample>, next: &Sample) -> Option<f64> {
    let prev = previous?;
    if prev.power <= 0.0 {
        return None;
    }
    let elapsed_ms = (next.timestamp - prev.timestamp).num_milliseconds();
    if elapsed_ms <= 0 {
        return None;
    }
    let hours = elapsed_ms as f64 / MS_PER_HOUR;
    Some(trapezoid_kwh(prev.power, next.power, hours))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, FixedOffset, TimeZone};
    use proptest::prelude::*;

    fn at(h: u32, m: u32, s: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 5, 9, h, m, s)
            .unwrap()
    }

    fn sample(ts: DateTime<FixedOffset>, power: f64) -> Sample {
        Sample::new(ts, 121.0, power / 121.0, power)
    }

    #[test]
    fn test_ten_second_interval() {
        let prev = sample(at(10, 0, 0), 500.0);
        let next = sample(at(10, 0, 10), 520.0);
        let delta = energy_delta_kwh(Some(&prev), &next).unwrap();
        let expected = ((500.0 + 520.0) / 2.0) / 1000.0 * (10.0 / 3600.0);
        assert!((delta - expected).abs() < 1e-12);
        assert!((delta - 0.0014167).abs() < 1e-7);
    }

    #[test]
    fn test_falling_power_is_symmetric() {
        let up = energy_delta_kwh(Some(&sample(at(10, 0, 0), 500.0)), &sample(at(10, 0, 10), 520.0));
        let down = energy_delta_kwh(Some(&sample(at(10, 0, 0), 520.0)), &sample(at(10, 0, 10), 500.0));
        assert_eq!(up, down);
    }

    #[test]
    fn test_skipped_without_previous() {
        assert_eq!(energy_delta_kwh(None, &sample(at(10, 0, 0), 500.0)), None);
    }

    #[test]
    fn test_skipped_when_previous_power_zero() {
        let prev = sample(at(10, 0, 0), 0.0);
        assert_eq!(energy_delta_kwh(Some(&prev), &sample(at(10, 0, 10), 500.0)), None);
    }

    #[test]
    fn test_skipped_when_time_does_not_advance() {
        let prev = sample(at(10, 0, 10), 500.0);
        assert_eq!(energy_delta_kwh(Some(&prev), &sample(at(10, 0, 10), 500.0)), None);
        assert_eq!(energy_delta_kwh(Some(&prev), &sample(at(10, 0, 0), 500.0)), None);
    }

    #[test]
    fn test_uneven_gap_uses_actual_elapsed_time() {
        // a slow tick: 47.5 s instead of the configured 10 s
        let prev = sample(at(12, 0, 0), 1000.0);
        let next = Sample::new(prev.timestamp + Duration::milliseconds(47_500), 121.0, 8.0, 1000.0);
        let delta = energy_delta_kwh(Some(&prev), &next).unwrap();
        assert!((delta - 47.5 / 3600.0).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn prop_delta_never_negative(
            p0 in 0.001f64..5_000.0,
            p1 in -50.0f64..5_000.0,
            gap_ms in 1i64..3_600_000,
        ) {
            let prev = sample(at(10, 0, 0), p0);
            let next = Sample::new(prev.timestamp + Duration::milliseconds(gap_ms), 121.0, 1.0, p1);
            let delta = energy_delta_kwh(Some(&prev), &next).unwrap();
            prop_assert!(delta >= 0.0);
        }
    }
}
