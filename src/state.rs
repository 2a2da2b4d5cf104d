//! # Application State Management
//!
//! State shared by every request handler: the configuration loaded at
//! startup, the conversion pipeline, and request metrics.
//!
//! ## Sharing Pattern:
//! - **Arc<AppConfig>**: read-only after startup, so no lock is needed
//! - **Arc<ConversionPipeline>**: stateless per request; every conversion owns
//!   its own scratch files
//! - **Arc<RwLock<AppMetrics>>**: counters updated by the metrics middleware
//!   and the convert handler
//!
//! Nothing here is global. Each `AppState` is built explicitly, so tests can
//! run several apps side by side with different collaborators.

use crate::config::AppConfig;
use crate::media::ConversionPipeline;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pipeline: Arc<ConversionPipeline>,
    pub metrics: Arc<RwLock<AppMetrics>>,
    pub start_time: Instant,
}

/// Counters collected across all HTTP requests.
///
/// - **request_count** / **error_count**: every request, from the middleware
/// - **active_conversions**: conversions currently running
/// - **conversions_completed** / **conversions_failed**: finished conversions
/// - **endpoint_metrics**: per `METHOD /path` statistics
#[derive(Debug, Default, Clone)]
pub struct AppMetrics {
    pub request_count: u64,
    pub error_count: u64,
    pub active_conversions: u32,
    pub conversions_completed: u64,
    pub conversions_failed: u64,
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

/// Detailed performance metrics for a specific API endpoint.
#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

impl AppState {
    pub fn new(config: AppConfig, pipeline: ConversionPipeline) -> Self {
        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
        }
    }

    /// State with the production pipeline described by `config`.
    pub fn from_config(config: AppConfig) -> Self {
        let pipeline = ConversionPipeline::from_config(&config);
        Self::new(config, pipeline)
    }

    /// Apply `update` to the metrics under the write lock.
    ///
    /// A poisoned lock only means a panic happened mid-update; the counters
    /// are still usable.
    fn with_metrics<F: FnOnce(&mut AppMetrics)>(&self, update: F) {
        let mut metrics = self.metrics.write().unwrap_or_else(PoisonError::into_inner);
        update(&mut metrics);
    }

    pub fn increment_request_count(&self) {
        self.with_metrics(|metrics| metrics.request_count += 1);
    }

    pub fn increment_error_count(&self) {
        self.with_metrics(|metrics| metrics.error_count += 1);
    }

    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        self.with_metrics(|metrics| {
            let endpoint_metric = metrics
                .endpoint_metrics
                .entry(endpoint.to_string())
                .or_default();

            endpoint_metric.request_count += 1;
            endpoint_metric.total_duration_ms += duration_ms;

            if is_error {
                endpoint_metric.error_count += 1;
            }
        });
    }

    /// Mark a conversion as running until the returned guard is dropped.
    pub fn begin_conversion(&self) -> ConversionGuard {
        self.with_metrics(|metrics| metrics.active_conversions += 1);
        ConversionGuard {
            metrics: Arc::clone(&self.metrics),
        }
    }

    pub fn record_conversion(&self, succeeded: bool) {
        self.with_metrics(|metrics| {
            if succeeded {
                metrics.conversions_completed += 1;
            } else {
                metrics.conversions_failed += 1;
            }
        });
    }

    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        self.metrics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// Decrements `active_conversions` when dropped, so a failed or cancelled
/// request is never counted as still running.
pub struct ConversionGuard {
    metrics: Arc<RwLock<AppMetrics>>,
}

impl Drop for ConversionGuard {
    fn drop(&mut self) {
        let mut metrics = self.metrics.write().unwrap_or_else(PoisonError::into_inner);
        metrics.active_conversions = metrics.active_conversions.saturating_sub(1);
    }
}

impl EndpointMetric {
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}
