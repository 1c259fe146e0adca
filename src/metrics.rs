//! Request metrics and statistics tracking for the prediction service.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector for the prediction endpoints
pub struct ServiceMetrics {
    /// Total `/predict` requests received
    pub requests_total: AtomicU64,
    /// Requests that ended in an error response
    pub errors_total: AtomicU64,
    /// Errors by kind (invalid_request, invalid_shape, ...)
    errors_by_kind: RwLock<HashMap<String, u64>>,
    /// Successful predictions by class label
    predictions_by_class: RwLock<HashMap<String, u64>>,
    /// Prediction latencies (in microseconds)
    latencies: RwLock<Vec<u64>>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl ServiceMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            requests_total: AtomicU64::new(0),
            errors_total: AtomicU64::new(0),
            errors_by_kind: RwLock::new(HashMap::new()),
            predictions_by_class: RwLock::new(HashMap::new()),
            latencies: RwLock::new(Vec::with_capacity(1000)),
            start_time: Instant::now(),
        }
    }

    /// Record a successful prediction
    pub fn record_prediction(&self, latency: Duration, class_name: &str) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut latencies) = self.latencies.write() {
            latencies.push(latency.as_micros() as u64);
            // Keep only the most recent samples
            if latencies.len() > 10000 {
                latencies.drain(0..5000);
            }
        }

        if let Ok(mut by_class) = self.predictions_by_class.write() {
            *by_class.entry(class_name.to_string()).or_insert(0) += 1;
        }
    }

    /// Record a request that failed
    pub fn record_error(&self, kind: &str) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        self.errors_total.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut by_kind) = self.errors_by_kind.write() {
            *by_kind.entry(kind.to_string()).or_insert(0) += 1;
        }
    }

    /// Get prediction latency statistics
    pub fn get_latency_stats(&self) -> LatencyStats {
        let latencies = match self.latencies.read() {
            Ok(latencies) => latencies,
            Err(_) => return LatencyStats::default(),
        };
        if latencies.is_empty() {
            return LatencyStats::default();
        }

        let mut sorted: Vec<u64> = latencies.clone();
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();
        let percentile = |q: f64| sorted[((count as f64 * q) as usize).min(count - 1)];

        LatencyStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: percentile(0.95),
            p99_us: percentile(0.99),
            max_us: *sorted.last().unwrap_or(&0),
        }
    }

    /// Get current throughput (requests per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.requests_total.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Get errors by kind
    pub fn get_errors_by_kind(&self) -> HashMap<String, u64> {
        self.errors_by_kind
            .read()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// Get successful predictions by class label
    pub fn get_predictions_by_class(&self) -> HashMap<String, u64> {
        self.predictions_by_class
            .read()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let requests = self.requests_total.load(Ordering::Relaxed);
        let errors = self.errors_total.load(Ordering::Relaxed);
        let error_rate = if requests > 0 {
            (errors as f64 / requests as f64) * 100.0
        } else {
            0.0
        };

        let latency = self.get_latency_stats();

        info!(
            requests,
            errors,
            error_rate = format!("{:.1}%", error_rate),
            throughput = format!("{:.2} req/s", self.get_throughput()),
            "Prediction service summary"
        );
        info!(
            count = latency.count,
            mean_us = latency.mean_us,
            p50_us = latency.p50_us,
            p95_us = latency.p95_us,
            p99_us = latency.p99_us,
            max_us = latency.max_us,
            "Prediction latency"
        );

        let mut by_class: Vec<(String, u64)> = self.get_predictions_by_class().into_iter().collect();
        by_class.sort();
        for (class_name, count) in by_class {
            info!(class = %class_name, count, "Predictions by class");
        }

        let mut by_kind: Vec<(String, u64)> = self.get_errors_by_kind().into_iter().collect();
        by_kind.sort();
        for (kind, count) in by_kind {
            info!(kind = %kind, count, "Errors by kind");
        }
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Prediction latency statistics
#[derive(Debug, Default, PartialEq, Eq)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Periodic metrics reporter
pub struct MetricsReporter {
    metrics: Arc<ServiceMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<ServiceMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let period = Duration::from_secs(self.interval_secs.max(1));
        // First tick completes immediately; skip it so the first summary has data
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = ServiceMetrics::new();

        metrics.record_prediction(Duration::from_micros(100), "setosa");
        metrics.record_prediction(Duration::from_micros(200), "setosa");
        metrics.record_prediction(Duration::from_micros(300), "virginica");
        metrics.record_error("invalid_shape");

        assert_eq!(metrics.requests_total.load(Ordering::Relaxed), 4);
        assert_eq!(metrics.errors_total.load(Ordering::Relaxed), 1);

        let by_class = metrics.get_predictions_by_class();
        assert_eq!(by_class.get("setosa"), Some(&2));
        assert_eq!(by_class.get("virginica"), Some(&1));
        assert_eq!(metrics.get_errors_by_kind().get("invalid_shape"), Some(&1));
    }

    #[test]
    fn test_latency_stats() {
        let metrics = ServiceMetrics::new();
        for us in 1..=100 {
            metrics.record_prediction(Duration::from_micros(us), "versicolor");
        }

        let stats = metrics.get_latency_stats();
        assert_eq!(stats.count, 100);
        assert_eq!(stats.mean_us, 50);
        assert_eq!(stats.p50_us, 51);
        assert_eq!(stats.p95_us, 96);
        assert_eq!(stats.p99_us, 100);
        assert_eq!(stats.max_us, 100);
    }

    #[test]
    fn test_empty_stats() {
        let metrics = ServiceMetrics::new();
        assert_eq!(metrics.get_latency_stats(), LatencyStats::default());
        metrics.print_summary();
    }
}
