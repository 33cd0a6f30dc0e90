//! Running conversion statistics.
//!
//! One [`ConversionMetrics`] lives inside each
//! [`DocumentConverter`](crate::convert::DocumentConverter) for the whole
//! process lifetime. Direction operations receive it as an explicit `&mut`
//! parameter; there is no global instance.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::PandocConfig;

/// Wall-clock bounds of one conversion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimingEntry {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimingEntry {
    pub fn seconds(&self) -> f64 {
        (self.end - self.start)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }
}

/// Input/output sizes of one conversion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SizeEntry {
    pub original: u64,
    pub converted: u64,
    /// `converted / original`, or 0 when `original` is 0.
    pub ratio: f64,
}

/// Process-lifetime counters and per-file maps.
///
/// Maps are append-only (a re-converted file overwrites its own entry).
/// A path appears in `errors` iff its most recent conversion failed.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionMetrics {
    /// Keyed by input file name.
    pub conversion_times: BTreeMap<String, TimingEntry>,
    /// Keyed by input file name.
    pub file_sizes: BTreeMap<String, SizeEntry>,
    /// Keyed by input path.
    pub errors: BTreeMap<String, String>,
    pub start_time: DateTime<Utc>,
    pub total_attempts: u64,
    pub successful_conversions: u64,
    pub failed_conversions: u64,
}

impl Default for ConversionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversionMetrics {
    pub fn new() -> Self {
        Self {
            conversion_times: BTreeMap::new(),
            file_sizes: BTreeMap::new(),
            errors: BTreeMap::new(),
            start_time: Utc::now(),
            total_attempts: 0,
            successful_conversions: 0,
            failed_conversions: 0,
        }
    }

    pub(crate) fn record_success(&mut self, input_key: &str) {
        self.successful_conversions += 1;
        self.errors.remove(input_key);
    }

    pub(crate) fn record_failure(&mut self, input_key: &str, error: &str) {
        self.failed_conversions += 1;
        self.errors.insert(input_key.to_string(), error.to_string());
    }

    /// Condensed view for status reports.
    pub fn summary(&self) -> MetricsSummary {
        let finished = self.successful_conversions + self.failed_conversions;
        let success_rate = if finished == 0 {
            0.0
        } else {
            self.successful_conversions as f64 / finished as f64
        };
        MetricsSummary {
            total_attempts: self.total_attempts,
            successful_conversions: self.successful_conversions,
            failed_conversions: self.failed_conversions,
            success_rate,
            total_conversion_seconds: self.conversion_times.values().map(|t| t.seconds()).sum(),
            elapsed_seconds: (Utc::now() - self.start_time)
                .to_std()
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0),
        }
    }
}

/// Aggregate numbers derived from [`ConversionMetrics`].
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub total_attempts: u64,
    pub successful_conversions: u64,
    pub failed_conversions: u64,
    /// Successes over finished conversions (0 when none finished).
    pub success_rate: f64,
    pub total_conversion_seconds: f64,
    pub elapsed_seconds: f64,
}

/// Record timing and size for a finished conversion.
///
/// Each half is gated by its own toggle in `config.metrics`; with both off
/// this is a no-op.
pub fn track_metrics(
    filename: &str,
    start_time: DateTime<Utc>,
    original_size: u64,
    converted_size: u64,
    metrics: &mut ConversionMetrics,
    config: &PandocConfig,
) {
    if config.metrics.track_conversion_time {
        metrics.conversion_times.insert(
            filename.to_string(),
            TimingEntry {
                start: start_time,
                end: Utc::now(),
            },
        );
    }

    if config.metrics.track_file_sizes {
        let ratio = if original_size == 0 {
            0.0
        } else {
            converted_size as f64 / original_size as f64
        };
        metrics.file_sizes.insert(
            filename.to_string(),
            SizeEntry {
                original: original_size,
                converted: converted_size,
                ratio,
            },
        );
    }

    tracing::debug!(
        file = filename,
        original = original_size,
        converted = converted_size,
        "Tracked conversion metrics"
    );
}
