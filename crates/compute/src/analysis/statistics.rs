/// Summary statistics over grid samples. `NaN` (missing) samples are skipped.
pub struct Statistics;

impl Statistics {
    pub fn mean(values: &[f64]) -> Option<f64> {
        let mut sum = 0.0;
        let mut n = 0usize;
        for &v in values.iter().filter(|v| !v.is_nan()) {
            sum += v;
            n += 1;
        }
        if n == 0 {
            return None;
        }
        Some(sum / n as f64)
    }

    pub fn min_max(values: &[f64]) -> Option<(f64, f64)> {
        let mut finite = values.iter().copied().filter(|v| v.is_finite());
        let first = finite.next()?;
        Some(finite.fold((first, first), |(min, max), v| (min.min(v), max.max(v))))
    }
}

#[cfg(test)]
mod tests {
    use super::Statistics;

    #[test]
    fn mean_works() {
        let m = Statistics::mean(&[1.0, 2.0, 3.0]).unwrap();
        assert!((m - 2.0).abs() < 1e-9);
    }

    #[test]
    fn missing_samples_are_skipped() {
        let values = [f64::NAN, 4.0, -1.0, f64::NAN];
        assert_eq!(Statistics::mean(&values), Some(1.5));
        assert_eq!(Statistics::min_max(&values), Some((-1.0, 4.0)));
        assert_eq!(Statistics::min_max(&[f64::NAN]), None);
        assert_eq!(Statistics::mean(&[]), None);
    }
}
