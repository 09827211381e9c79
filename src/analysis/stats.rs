//! Small statistics kernels over `f64` slices

use statrs::statistics::{Data, OrderStatistics, Statistics};

/// Mean of the finite values, `NaN` if there are none.
pub(super) fn finite_mean(values: &[f64]) -> f64 {
    values.iter().filter(|v| v.is_finite()).mean()
}

/// Finite values, sorted ascending.
pub(super) fn sorted_finite(values: &[f64]) -> Vec<f64> {
    let mut out: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    out.sort_by(f64::total_cmp);
    out
}

/// Sample quantile (median-unbiased estimator), `q` in `[0, 1]`.
///
/// `q = 0` and `q = 1` give the minimum and maximum. `NaN` for no data.
pub(super) fn quantile(values: &[f64], q: f64) -> f64 {
    Data::new(values.to_vec()).quantile(q.clamp(0.0, 1.0))
}

/// Ranks starting at 1, ties share their average rank.
pub(super) fn ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    let mut out = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        #[allow(clippy::cast_precision_loss)]
        let shared = (start + end + 1) as f64 / 2.0;
        for &i in &order[start..end] {
            out[i] = shared;
        }
        start = end;
    }
    out
}

/// Pearson correlation; 0 when either side has no variance.
pub(super) fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let ma = finite_mean(a);
    let mb = finite_mean(b);
    let (mut sab, mut saa, mut sbb) = (0.0, 0.0, 0.0);
    for (x, y) in a.iter().zip(b) {
        let (dx, dy) = (x - ma, y - mb);
        sab += dx * dy;
        saa += dx * dx;
        sbb += dy * dy;
    }
    if saa <= 0.0 || sbb <= 0.0 {
        0.0
    } else {
        (sab / (saa * sbb).sqrt()).clamp(-1.0, 1.0)
    }
}

/// Spearman rank correlation over the pairs where both values are finite.
///
/// Returns 0 for fewer than three such pairs.
pub(super) fn spearman(a: &[f64], b: &[f64]) -> f64 {
    let (x, y): (Vec<f64>, Vec<f64>) = a
        .iter()
        .zip(b)
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|(x, y)| (*x, *y))
        .unzip();
    if x.len() < 3 {
        return 0.0;
    }
    pearson(&ranks(&x), &ranks(&y))
}

/// Two-sample Kolmogorov-Smirnov statistic of sorted samples.
pub(super) fn ks_statistic(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let (na, nb) = (a.len() as f64, b.len() as f64);
    let (mut i, mut j) = (0, 0);
    let mut best: f64 = 0.0;
    while i < a.len() && j < b.len() {
        let v = a[i].min(b[j]);
        while i < a.len() && a[i] <= v {
            i += 1;
        }
        while j < b.len() && b[j] <= v {
            j += 1;
        }
        #[allow(clippy::cast_precision_loss)]
        let gap = (i as f64 / na - j as f64 / nb).abs();
        best = best.max(gap);
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranks_average_ties() {
        assert_eq!(ranks(&[10.0, 20.0, 10.0, 5.0]), vec![2.5, 4.0, 2.5, 1.0]);
    }

    #[test]
    fn test_spearman_monotone() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0];
        let b = [1.0, 8.0, 27.0, 64.0, 125.0];
        assert!((spearman(&a, &b) - 1.0).abs() < 1e-12);
        let c: Vec<f64> = b.iter().map(|v| -v).collect();
        assert!((spearman(&a, &c) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_spearman_skips_missing_and_constant() {
        let a = [1.0, 2.0, f64::NAN, 4.0];
        let b = [3.0, 3.0, 3.0, 3.0];
        assert_eq!(spearman(&a, &b), 0.0);
    }

    #[test]
    fn test_quantile_bounds_and_median() {
        let s = [3.0, 0.0, 10.0, 5.0, 1.0];
        assert_eq!(quantile(&s, 0.0), 0.0);
        assert_eq!(quantile(&s, 1.0), 10.0);
        assert!((quantile(&s, 0.5) - 3.0).abs() < 1e-12);
        assert!(quantile(&[], 0.5).is_nan());
    }

    #[test]
    fn test_finite_mean_skips_missing() {
        assert!((finite_mean(&[1.0, f64::NAN, 3.0]) - 2.0).abs() < 1e-12);
        assert!(finite_mean(&[f64::NAN]).is_nan());
    }

    #[test]
    fn test_ks_identical_and_disjoint() {
        let a = [1.0, 2.0, 3.0];
        assert_eq!(ks_statistic(&a, &a), 0.0);
        assert_eq!(ks_statistic(&a, &[10.0, 11.0]), 1.0);
    }
}
