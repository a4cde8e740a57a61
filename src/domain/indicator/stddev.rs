//! Standard deviation helpers.
//!
//! Sample standard deviation (divides by n-1) over a trailing window.
//! STDDEV(n)[i] = sqrt(sum((X[i-j] - mean)^2 for j in 0..n) / (n - 1))
//! A window containing an absent value is itself absent.

use super::IndicatorSeries;

/// Sample standard deviation of a slice; `None` with fewer than two values.
pub fn sample_stddev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values
        .iter()
        .map(|v| {
            let diff = v - mean;
            diff * diff
        })
        .sum::<f64>()
        / (n - 1.0);
    Some(variance.sqrt())
}

/// Rolling sample standard deviation over a series that may contain gaps.
pub fn rolling_sample_stddev(values: &[Option<f64>], period: usize) -> IndicatorSeries {
    let mut out = Vec::with_capacity(values.len());
    let mut window: Vec<f64> = Vec::with_capacity(period);

    for i in 0..values.len() {
        if period < 2 || i + 1 < period {
            out.push(None);
            continue;
        }
        window.clear();
        window.extend(values[i + 1 - period..=i].iter().flatten().copied());
        if window.len() == period {
            out.push(sample_stddev(&window));
        } else {
            out.push(None);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_stddev_known_value() {
        // mean 5, squared deviations sum 32, / 7 → sqrt(4.571428...)
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let sd = sample_stddev(&v).unwrap();
        assert!((sd - (32.0_f64 / 7.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn sample_stddev_needs_two_values() {
        assert!(sample_stddev(&[1.0]).is_none());
        assert!(sample_stddev(&[]).is_none());
    }

    #[test]
    fn constant_series_has_zero_stddev() {
        let v: Vec<Option<f64>> = vec![Some(3.0); 5];
        let s = rolling_sample_stddev(&v, 3);
        assert_eq!(s[1], None);
        assert!(s[2].unwrap().abs() < 1e-12);
    }

    #[test]
    fn gap_inside_window_is_absent() {
        let v = vec![None, Some(1.0), Some(2.0), Some(3.0)];
        let s = rolling_sample_stddev(&v, 3);
        assert_eq!(s[2], None);
        assert!(s[3].is_some());
    }
}
