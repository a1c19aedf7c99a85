//! Bounded rolling metrics.
//!
//! A small fixed-window tracker for scalar series (scan durations, churn
//! rate, capture ratio, circuit-breaker state) that the sampler and scanner
//! report on every cycle. Windows are bounded so long-running processes
//! don't grow this unbounded.

use std::collections::{HashMap, VecDeque};

/// A single named series with a bounded history.
#[derive(Debug, Clone)]
struct Series {
    window: VecDeque<f64>,
    capacity: usize,
}

impl Series {
    fn new(capacity: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, value: f64) {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(value);
    }

    fn latest(&self) -> Option<f64> {
        self.window.back().copied()
    }

    fn avg(&self) -> Option<f64> {
        if self.window.is_empty() {
            return None;
        }
        Some(self.window.iter().sum::<f64>() / self.window.len() as f64)
    }

    fn min(&self) -> Option<f64> {
        self.window.iter().copied().fold(None, |acc, v| {
            Some(acc.map_or(v, |m: f64| m.min(v)))
        })
    }

    fn max(&self) -> Option<f64> {
        self.window.iter().copied().fold(None, |acc, v| {
            Some(acc.map_or(v, |m: f64| m.max(v)))
        })
    }
}

/// A registry of bounded named metric series, keyed by free-form name
/// (e.g. `"scan_duration_ms"`, `"churn_rate"`, `"capture_ratio"`).
#[derive(Debug, Clone)]
pub struct Metrics {
    window_capacity: usize,
    series: HashMap<String, Series>,
}

impl Metrics {
    pub fn new(window_capacity: usize) -> Self {
        Self {
            window_capacity: window_capacity.max(1),
            series: HashMap::new(),
        }
    }

    /// Record a sample for `name`, creating the series if needed.
    pub fn set(&mut self, name: &str, value: f64) {
        self.series
            .entry(name.to_string())
            .or_insert_with(|| Series::new(self.window_capacity))
            .push(value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.series.get(name).and_then(Series::latest)
    }

    pub fn avg(&self, name: &str) -> Option<f64> {
        self.series.get(name).and_then(Series::avg)
    }

    pub fn min(&self, name: &str) -> Option<f64> {
        self.series.get(name).and_then(Series::min)
    }

    pub fn max(&self, name: &str) -> Option<f64> {
        self.series.get(name).and_then(Series::max)
    }

    /// A flat snapshot of the latest value for every tracked series.
    pub fn snapshot(&self) -> HashMap<String, f64> {
        self.series
            .iter()
            .filter_map(|(k, s)| s.latest().map(|v| (k.clone(), v)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get_latest() {
        let mut m = Metrics::new(3);
        m.set("churn_rate", 1.0);
        m.set("churn_rate", 2.0);
        assert_eq!(m.get("churn_rate"), Some(2.0));
    }

    #[test]
    fn window_drops_oldest_past_capacity() {
        let mut m = Metrics::new(2);
        m.set("x", 1.0);
        m.set("x", 2.0);
        m.set("x", 3.0);
        assert_eq!(m.min("x"), Some(2.0));
        assert_eq!(m.max("x"), Some(3.0));
    }

    #[test]
    fn avg_over_window() {
        let mut m = Metrics::new(4);
        for v in [2.0, 4.0, 6.0] {
            m.set("y", v);
        }
        assert_eq!(m.avg("y"), Some(4.0));
    }

    #[test]
    fn missing_series_returns_none() {
        let m = Metrics::new(4);
        assert_eq!(m.get("nope"), None);
        assert_eq!(m.avg("nope"), None);
    }

    #[test]
    fn snapshot_reports_latest_per_series() {
        let mut m = Metrics::new(4);
        m.set("a", 1.0);
        m.set("b", 2.0);
        let snap = m.snapshot();
        assert_eq!(snap.get("a"), Some(&1.0));
        assert_eq!(snap.get("b"), Some(&2.0));
    }
}
