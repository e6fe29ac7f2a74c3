//! Equal-population time buckets.
//!
//! Quartile edges come from the timestamp distribution of the whole input
//! (linear interpolation between order statistics). A record belongs to the
//! first quartile whose upper edge it does not exceed. When timestamps repeat
//! enough for edges to coincide, the later buckets simply stay empty.

use chrono::{DateTime, Utc};

use crate::types::TimePeriod;

/// Quantile edges at 0, 25, 50, 75 and 100 percent, in epoch milliseconds.
pub fn quartile_edges(sorted_millis: &[i64]) -> Option<[f64; 5]> {
    if sorted_millis.is_empty() {
        return None;
    }
    let quantile = |q: f64| -> f64 {
        let pos = q * (sorted_millis.len() - 1) as f64;
        let lo = pos.floor() as usize;
        let hi = pos.ceil() as usize;
        let lo_v = sorted_millis[lo] as f64;
        let hi_v = sorted_millis[hi] as f64;
        lo_v + (hi_v - lo_v) * (pos - lo as f64)
    };
    Some([
        quantile(0.0),
        quantile(0.25),
        quantile(0.5),
        quantile(0.75),
        quantile(1.0),
    ])
}

/// Assign each timestamp its period, positionally.
pub fn assign_periods(timestamps: &[DateTime<Utc>]) -> Vec<TimePeriod> {
    let mut sorted: Vec<i64> = timestamps.iter().map(|t| t.timestamp_millis()).collect();
    sorted.sort_unstable();
    let Some(edges) = quartile_edges(&sorted) else {
        return Vec::new();
    };

    timestamps
        .iter()
        .map(|t| period_for(t.timestamp_millis() as f64, &edges))
        .collect()
}

fn period_for(value: f64, edges: &[f64; 5]) -> TimePeriod {
    if value <= edges[1] {
        TimePeriod::Q1
    } else if value <= edges[2] {
        TimePeriod::Q2
    } else if value <= edges[3] {
        TimePeriod::Q3
    } else {
        TimePeriod::Q4
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ts;

    fn count(periods: &[TimePeriod], p: TimePeriod) -> usize {
        periods.iter().filter(|&&x| x == p).count()
    }

    #[test]
    fn test_eight_distinct_timestamps_split_evenly() {
        let stamps: Vec<_> = (1..=8).map(|d| ts(d, 0)).collect();
        let periods = assign_periods(&stamps);
        for p in TimePeriod::ALL {
            assert_eq!(count(&periods, p), 2, "{} should hold 2", p);
        }
        assert_eq!(periods[0], TimePeriod::Q1);
        assert_eq!(periods[7], TimePeriod::Q4);
    }

    #[test]
    fn test_unsorted_input_is_positional() {
        let stamps = vec![ts(8, 0), ts(1, 0), ts(5, 0), ts(3, 0)];
        let periods = assign_periods(&stamps);
        assert_eq!(
            periods,
            vec![TimePeriod::Q4, TimePeriod::Q1, TimePeriod::Q3, TimePeriod::Q2]
        );
    }

    #[test]
    fn test_every_record_gets_exactly_one_period() {
        let stamps: Vec<_> = (0..37).map(|i| ts(1 + (i % 9) as u32, (i % 5) as u32)).collect();
        let periods = assign_periods(&stamps);
        assert_eq!(periods.len(), stamps.len());
        let total: usize = TimePeriod::ALL.iter().map(|&p| count(&periods, p)).sum();
        assert_eq!(total, stamps.len());
    }

    #[test]
    fn test_periods_are_monotonic_in_time() {
        let stamps: Vec<_> = (0..50).map(|i| ts(1 + (i % 20) as u32, (i % 7) as u32)).collect();
        let periods = assign_periods(&stamps);
        for i in 0..stamps.len() {
            for j in 0..stamps.len() {
                if stamps[i] < stamps[j] {
                    assert!(periods[i] <= periods[j]);
                }
            }
        }
    }

    #[test]
    fn test_identical_timestamps_do_not_panic() {
        let stamps = vec![ts(2, 0); 5];
        let periods = assign_periods(&stamps);
        assert_eq!(periods, vec![TimePeriod::Q1; 5]);
    }

    #[test]
    fn test_two_distinct_values_degenerate() {
        let stamps = vec![ts(1, 0), ts(1, 0), ts(1, 0), ts(9, 0)];
        let periods = assign_periods(&stamps);
        assert_eq!(count(&periods, TimePeriod::Q1), 3);
        assert_eq!(count(&periods, TimePeriod::Q4), 1);
    }

    #[test]
    fn test_single_and_empty() {
        assert_eq!(assign_periods(&[ts(1, 0)]), vec![TimePeriod::Q1]);
        assert!(assign_periods(&[]).is_empty());
        assert!(quartile_edges(&[]).is_none());
    }
}
