//! Metrics for upstream fetches
//!
//! Tracks success rates, error counts, and response times for each upstream host

use crate::error::TransportError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostMetrics {
    pub host: String,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub average_response_time_ms: f64,
    pub total_response_time_ms: u64,
    pub retry_count: u64,
    pub rate_limit_hits: u64,
    pub server_errors: u64,
    pub timeout_count: u64,
}

impl HostMetrics {
    pub fn new(host: String) -> Self {
        Self {
            host,
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            last_success: None,
            last_failure: None,
            last_error: None,
            average_response_time_ms: 0.0,
            total_response_time_ms: 0,
            retry_count: 0,
            rate_limit_hits: 0,
            server_errors: 0,
            timeout_count: 0,
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            (self.successful_requests as f64 / self.total_requests as f64) * 100.0
        }
    }

    pub fn record_success(&mut self, response_time: Duration) {
        self.total_requests += 1;
        self.successful_requests += 1;
        self.last_success = Some(Utc::now());

        let response_ms = response_time.as_millis() as u64;
        self.total_response_time_ms += response_ms;
        self.average_response_time_ms =
            self.total_response_time_ms as f64 / self.successful_requests as f64;
    }

    pub fn record_failure(&mut self, error: &TransportError) {
        self.total_requests += 1;
        self.failed_requests += 1;
        self.last_failure = Some(Utc::now());
        self.last_error = Some(error.to_string());

        match error {
            TransportError::Status { status, .. } if status.as_u16() == 429 => {
                self.rate_limit_hits += 1
            }
            TransportError::Status { status, .. } if status.is_server_error() => {
                self.server_errors += 1
            }
            e if e.is_timeout() => self.timeout_count += 1,
            _ => {}
        }
    }

    pub fn record_retry(&mut self) {
        self.retry_count += 1;
    }
}

/// Shared per-host metrics, fed by the HTTP client and read by `/metrics`
pub struct MetricsTracker {
    metrics: Mutex<HashMap<String, HostMetrics>>,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self {
            metrics: Mutex::new(HashMap::new()),
        }
    }

    // Counters stay usable even if a holder panicked mid-update
    fn entries(&self) -> MutexGuard<'_, HashMap<String, HostMetrics>> {
        self.metrics.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record_success(&self, host: &str, response_time: Duration) {
        let mut metrics = self.entries();
        let host_metrics = metrics
            .entry(host.to_string())
            .or_insert_with(|| HostMetrics::new(host.to_string()));
        host_metrics.record_success(response_time);

        log::debug!(
            "[{}] Success - Response time: {}ms - Success rate: {:.2}%",
            host,
            response_time.as_millis(),
            host_metrics.success_rate()
        );
    }

    pub fn record_failure(&self, host: &str, error: &TransportError) {
        let mut metrics = self.entries();
        let host_metrics = metrics
            .entry(host.to_string())
            .or_insert_with(|| HostMetrics::new(host.to_string()));
        host_metrics.record_failure(error);

        log::warn!(
            "[{}] Failure - Error: {} - Success rate: {:.2}%",
            host,
            error,
            host_metrics.success_rate()
        );
    }

    pub fn record_retry(&self, host: &str) {
        let mut metrics = self.entries();
        let host_metrics = metrics
            .entry(host.to_string())
            .or_insert_with(|| HostMetrics::new(host.to_string()));
        host_metrics.record_retry();

        log::debug!("[{}] Retry attempt - Total retries: {}", host, host_metrics.retry_count);
    }

    pub fn get_metrics(&self, host: &str) -> Option<HostMetrics> {
        self.entries().get(host).cloned()
    }

    /// All hosts, sorted by name
    pub fn get_all_metrics(&self) -> Vec<HostMetrics> {
        let mut all: Vec<HostMetrics> = self.entries().values().cloned().collect();
        all.sort_by(|a, b| a.host.cmp(&b.host));
        all
    }
}

impl Default for MetricsTracker {
    fn default() -> Self {
        Self::new()
    }
}
