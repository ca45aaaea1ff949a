//! Descriptive statistics used by the charts

/// Arithmetic mean; `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Sample standard deviation (n - 1)
pub fn std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

/// Quantile with linear interpolation between closest ranks. `sorted` must
/// be ascending.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut v = values.to_vec();
    v.sort_by(f64::total_cmp);
    v
}

/// Pearson correlation over the pairs where both sides are present.
/// `None` with fewer than two pairs or when either side is constant.
pub fn pearson(xs: &[Option<f64>], ys: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        sxy += (x - mx) * (y - my);
        sxx += (x - mx).powi(2);
        syy += (y - my).powi(2);
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some((sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0))
}

/// `bins + 1` equal-width edges covering `[min, max]`. A zero-width range is
/// widened by 0.5 on each side.
pub fn histogram_edges(min: f64, max: f64, bins: usize) -> Vec<f64> {
    let bins = bins.max(1);
    let (lo, hi) = if max > min {
        (min, max)
    } else {
        (min - 0.5, max + 0.5)
    };
    let step = (hi - lo) / bins as f64;
    (0..=bins).map(|i| lo + step * i as f64).collect()
}

/// Count values per bin; the last bin includes its right edge.
pub fn histogram_counts(values: &[f64], edges: &[f64]) -> Vec<u64> {
    let bins = edges.len().saturating_sub(1);
    let mut counts = vec![0u64; bins];
    if bins == 0 {
        return counts;
    }
    let lo = edges[0];
    let hi = edges[bins];
    let width = (hi - lo) / bins as f64;
    for &v in values {
        if v < lo || v > hi {
            continue;
        }
        let idx = (((v - lo) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }
    counts
}

/// Gaussian kernel bandwidth by Scott's rule
pub fn scott_bandwidth(values: &[f64]) -> Option<f64> {
    let sd = std_dev(values)?;
    if sd == 0.0 {
        return None;
    }
    Some(sd * (values.len() as f64).powf(-0.2))
}

/// Gaussian kernel density estimate evaluated at `points`
pub fn kde(values: &[f64], bandwidth: f64, points: &[f64]) -> Vec<f64> {
    let n = values.len() as f64;
    let norm = 1.0 / (n * bandwidth * (2.0 * std::f64::consts::PI).sqrt());
    points
        .iter()
        .map(|&x| {
            values
                .iter()
                .map(|&v| (-0.5 * ((x - v) / bandwidth).powi(2)).exp())
                .sum::<f64>()
                * norm
        })
        .collect()
}

/// `count` evenly spaced points over `[lo, hi]`
pub fn linspace(lo: f64, hi: f64, count: usize) -> Vec<f64> {
    if count < 2 {
        return vec![lo];
    }
    let step = (hi - lo) / (count - 1) as f64;
    (0..count).map(|i| lo + step * i as f64).collect()
}

/// 1-based ranks, ties sharing their average rank
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = rank;
        }
        i = j + 1;
    }
    ranks
}

/// Five-number summary with Tukey whiskers
#[derive(Debug, Clone, PartialEq)]
pub struct BoxStats {
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    /// Lowest value within 1.5 IQR of q1
    pub whisker_low: f64,
    /// Highest value within 1.5 IQR of q3
    pub whisker_high: f64,
    pub outliers: Vec<f64>,
    /// Half-width of the median confidence notch
    pub notch: f64,
}

impl BoxStats {
    pub fn compute(values: &[f64]) -> Option<Self> {
        let s = sorted(values);
        let q1 = quantile(&s, 0.25)?;
        let median = quantile(&s, 0.5)?;
        let q3 = quantile(&s, 0.75)?;
        let iqr = q3 - q1;
        let low_fence = q1 - 1.5 * iqr;
        let high_fence = q3 + 1.5 * iqr;
        let inside: Vec<f64> = s
            .iter()
            .copied()
            .filter(|v| *v >= low_fence && *v <= high_fence)
            .collect();
        let whisker_low = inside.first().copied().unwrap_or(q1);
        let whisker_high = inside.last().copied().unwrap_or(q3);
        let outliers = s
            .iter()
            .copied()
            .filter(|v| *v < low_fence || *v > high_fence)
            .collect();
        let notch = 1.57 * iqr / (s.len() as f64).sqrt();
        Some(Self {
            q1,
            median,
            q3,
            whisker_low,
            whisker_high,
            outliers,
            notch,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_mean_and_std() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[1.0, 2.0, 3.0]), Some(2.0));
        assert!(close(std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap(), 2.138089935299395));
        assert_eq!(std_dev(&[1.0]), None);
    }

    #[test]
    fn test_quantile_linear() {
        let s = [1.0, 2.0, 3.0, 4.0];
        assert!(close(quantile(&s, 0.5).unwrap(), 2.5));
        assert!(close(quantile(&s, 0.25).unwrap(), 1.75));
        assert_eq!(quantile(&[], 0.5), None);
    }

    #[test]
    fn test_pearson() {
        let xs = [Some(1.0), Some(2.0), Some(3.0), None];
        let ys = [Some(2.0), Some(4.0), Some(6.0), Some(100.0)];
        assert!(close(pearson(&xs, &ys).unwrap(), 1.0));
        let neg = [Some(3.0), Some(2.0), Some(1.0), Some(0.0)];
        assert!(close(pearson(&xs, &neg).unwrap(), -1.0));
        let constant = [Some(1.0), Some(1.0), Some(1.0), Some(1.0)];
        assert_eq!(pearson(&xs, &constant), None);
    }

    #[test]
    fn test_histogram() {
        let edges = histogram_edges(0.0, 10.0, 5);
        assert_eq!(edges, vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0]);
        let counts = histogram_counts(&[0.0, 1.0, 2.0, 9.9, 10.0], &edges);
        assert_eq!(counts, vec![2, 1, 0, 0, 2]);
    }

    #[test]
    fn test_histogram_single_value() {
        let edges = histogram_edges(3.0, 3.0, 2);
        assert_eq!(edges, vec![2.5, 3.0, 3.5]);
        assert_eq!(histogram_counts(&[3.0, 3.0], &edges), vec![0, 2]);
    }

    #[test]
    fn test_kde_integrates_to_one() {
        let values = [1.0, 2.0, 2.5, 3.0, 7.0];
        let bw = scott_bandwidth(&values).unwrap();
        let grid = linspace(-10.0, 20.0, 3001);
        let step = grid[1] - grid[0];
        let area: f64 = kde(&values, bw, &grid).iter().sum::<f64>() * step;
        assert!((area - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_average_ranks() {
        assert_eq!(average_ranks(&[10.0, 20.0, 10.0, 5.0]), vec![2.5, 4.0, 2.5, 1.0]);
    }

    #[test]
    fn test_box_stats() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 100.0];
        let b = BoxStats::compute(&values).unwrap();
        assert_eq!(b.median, 5.0);
        assert_eq!(b.q1, 3.0);
        assert_eq!(b.q3, 7.0);
        assert_eq!(b.whisker_high, 8.0);
        assert_eq!(b.outliers, vec![100.0]);
        assert!(BoxStats::compute(&[]).is_none());
    }
}
