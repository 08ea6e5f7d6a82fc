//! Measurement reporting toward an external diagnostics collaborator
//!
//! The health-monitoring subsystem samples named numeric measurements
//! against its own thresholds and publishes aggregated status records; none
//! of that lives here. The matching core's only obligation is to hand over
//! measurements by key, which this narrow sink interface captures.

use log::debug;

/// Consumer of named numeric measurements (match counts, inlier ratios).
///
/// Reporting never affects matching correctness; sinks must not fail.
pub trait MeasurementSink {
    fn report(&self, key: &str, value: f64);
}

/// Sink that routes measurements to the log facade at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl MeasurementSink for LogSink {
    fn report(&self, key: &str, value: f64) {
        debug!("measurement {} = {}", key, value);
    }
}
