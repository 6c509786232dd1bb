//! Linear-regression trend classification over a window tail.

use emstream_types::Trend;

/// Classify the trend of `values` (oldest first) by least-squares slope.
///
/// The trend is `Increasing`/`Decreasing` only when the Pearson correlation
/// coefficient of value against index exceeds `correlation_threshold` in
/// magnitude; otherwise `Stable`. Fewer than `min_points` values is always
/// `Stable`.
pub fn classify_trend(values: &[f64], correlation_threshold: f64, min_points: usize) -> Trend {
    if values.len() < min_points.max(2) {
        return Trend::Stable;
    }

    let n = values.len() as f64;
    let mean_x = (values.len() - 1) as f64 / 2.0;
    let mean_y = values.iter().sum::<f64>() / n;

    let mut cov_xy = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - mean_x;
        let dy = y - mean_y;
        cov_xy += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    // A flat series has zero variance in y; no trend to report.
    if var_y == 0.0 || var_x == 0.0 {
        return Trend::Stable;
    }

    let r = cov_xy / (var_x.sqrt() * var_y.sqrt());
    if r.abs() <= correlation_threshold {
        return Trend::Stable;
    }

    let slope = cov_xy / var_x;
    if slope > 0.0 {
        Trend::Increasing
    } else {
        Trend::Decreasing
    }
}
