//! Per-(device, metric) rolling mean and standard deviation windows.

use dashmap::DashMap;
use emstream_types::{MetricKey, RollingSnapshot};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Minimum samples before statistics are considered meaningful. Below this
/// the snapshot reports `stddev = 0.0` and consumers must treat the stream
/// as having insufficient data.
pub const MIN_SAMPLES: usize = 10;

struct Window {
    values: VecDeque<f64>,
    last_update: chrono::DateTime<chrono::Utc>,
}

/// Incremental mean/stddev tracker over a bounded recent-value window per
/// (device, metric) key.
///
/// Windows are created lazily on first update for a key and never destroyed;
/// memory is bounded by the number of distinct keys times the window size.
/// Each key's window sits behind its own lock, so updates for one key apply
/// in arrival order without contending with other keys.
pub struct RollingStatistics {
    window_size: usize,
    tail_size: usize,
    windows: DashMap<MetricKey, Mutex<Window>>,
}

impl RollingStatistics {
    /// Default window capacity in samples.
    pub const DEFAULT_WINDOW: usize = 1000;

    pub fn new(window_size: usize, tail_size: usize) -> Self {
        Self {
            window_size: window_size.max(1),
            tail_size: tail_size.max(1),
            windows: DashMap::new(),
        }
    }

    /// Append `value` to the window for `key` and return the recomputed
    /// snapshot.
    ///
    /// Statistics are recomputed from the full window each update: population
    /// standard deviation, `sqrt(mean((x_i - mean)^2))`.
    pub fn update(&self, key: MetricKey, value: f64) -> RollingSnapshot {
        let now = chrono::Utc::now();
        let entry = self.windows.entry(key).or_insert_with(|| {
            Mutex::new(Window {
                values: VecDeque::with_capacity(self.window_size),
                last_update: now,
            })
        });
        let mut window = entry.lock().expect("rolling window lock poisoned");

        if window.values.len() >= self.window_size {
            window.values.pop_front();
        }
        window.values.push_back(value);
        window.last_update = now;

        let sample_count = window.values.len();
        let mean = window.values.iter().sum::<f64>() / sample_count as f64;
        let stddev = if sample_count >= MIN_SAMPLES {
            let variance = window
                .values
                .iter()
                .map(|v| {
                    let d = v - mean;
                    d * d
                })
                .sum::<f64>()
                / sample_count as f64;
            variance.sqrt()
        } else {
            0.0
        };

        let tail_start = sample_count.saturating_sub(self.tail_size);
        let tail: Vec<f64> = window.values.iter().skip(tail_start).copied().collect();

        RollingSnapshot {
            mean,
            stddev,
            sample_count,
            tail,
            last_update: now,
        }
    }

    /// Number of distinct (device, metric) streams tracked.
    pub fn stream_count(&self) -> usize {
        self.windows.len()
    }
}

impl Default for RollingStatistics {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WINDOW, 20)
    }
}
