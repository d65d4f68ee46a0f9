//! Upstream call metrics
//!
//! Keeps a rolling window of outcomes per provider so the health check can
//! report latency percentiles and success rates.

use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::RwLock;

/// Maximum number of samples kept per provider
const WINDOW_SIZE: usize = 100;

/// Snapshot of one provider's call statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderMetrics {
    pub provider_name: String,
    pub latency_p50_ms: f64,
    pub latency_p99_ms: f64,
    /// Success rate over the rolling window (0.0 to 1.0)
    pub success_rate: f64,
    pub total_requests: u64,
    pub failed_requests: u64,
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    latency_ms: f64,
    success: bool,
}

#[derive(Debug, Default)]
struct ProviderWindow {
    samples: VecDeque<Sample>,
    total_requests: u64,
    failed_requests: u64,
}

impl ProviderWindow {
    fn push(&mut self, sample: Sample) {
        self.total_requests += 1;
        if !sample.success {
            self.failed_requests += 1;
        }
        if self.samples.len() == WINDOW_SIZE {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    fn report(&self, provider_name: &str) -> ProviderMetrics {
        let mut latencies: Vec<f64> = self
            .samples
            .iter()
            .filter(|s| s.success)
            .map(|s| s.latency_ms)
            .collect();
        latencies.sort_by(f64::total_cmp);

        let succeeded = self.samples.iter().filter(|s| s.success).count();
        let success_rate = if self.samples.is_empty() {
            1.0
        } else {
            succeeded as f64 / self.samples.len() as f64
        };

        ProviderMetrics {
            provider_name: provider_name.to_string(),
            latency_p50_ms: percentile(&latencies, 50.0),
            latency_p99_ms: percentile(&latencies, 99.0),
            success_rate,
            total_requests: self.total_requests,
            failed_requests: self.failed_requests,
        }
    }
}

/// Nearest-rank percentile over sorted values
fn percentile(sorted_values: &[f64], p: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }
    let rank = (p / 100.0 * sorted_values.len() as f64).ceil() as usize;
    sorted_values[rank.clamp(1, sorted_values.len()) - 1]
}

/// Per-provider call statistics shared across requests
#[derive(Debug, Default)]
pub struct UpstreamMetrics {
    windows: RwLock<HashMap<&'static str, ProviderWindow>>,
}

impl UpstreamMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one upstream call
    pub async fn record(&self, provider_name: &'static str, latency: Duration, success: bool) {
        let sample = Sample {
            latency_ms: latency.as_secs_f64() * 1000.0,
            success,
        };
        self.windows
            .write()
            .await
            .entry(provider_name)
            .or_default()
            .push(sample);
    }

    /// Metrics for one provider; an unseen provider reports no traffic
    pub async fn provider(&self, provider_name: &str) -> ProviderMetrics {
        let windows = self.windows.read().await;
        match windows.get(provider_name) {
            Some(window) => window.report(provider_name),
            None => ProviderWindow::default().report(provider_name),
        }
    }

    /// Metrics for every provider seen so far, sorted by name
    pub async fn snapshot(&self) -> Vec<ProviderMetrics> {
        let windows = self.windows.read().await;
        let mut all: Vec<ProviderMetrics> = windows
            .iter()
            .map(|(name, window)| window.report(name))
            .collect();
        all.sort_by(|a, b| a.provider_name.cmp(&b.provider_name));
        all
    }
}
