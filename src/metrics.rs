// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation.
//!
//! Uses the `metrics` crate facade; the host process installs the exporter.
//!
//! # Metric Naming Convention
//! - `keyspace_router_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `command`: store verb (GET, MSET, EXPIRE, ...), `OTHER` for generic
//!   commands outside the dispatch table
//! - `status`: success, error
//! - `topology`: standalone, cluster

use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

/// Count one store command by outcome.
pub fn record_command(command: &str, success: bool) {
    counter!(
        "keyspace_router_commands_total",
        "command" => command.to_string(),
        "status" => if success { "success" } else { "error" }
    )
    .increment(1);
}

pub fn record_latency(command: &str, duration: Duration) {
    histogram!(
        "keyspace_router_command_seconds",
        "command" => command.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Keys touched by one multi-key command.
pub fn record_batch_size(command: &str, count: usize) {
    histogram!(
        "keyspace_router_batch_keys",
        "command" => command.to_string()
    )
    .record(count as f64);
}

pub fn record_connection_error(topology: &str) {
    counter!(
        "keyspace_router_connection_errors_total",
        "topology" => topology.to_string()
    )
    .increment(1);
}

/// Generic commands forwarded without an implicit expiration. Unlabelled:
/// the command names come from callers.
pub fn record_unexpired_passthrough() {
    counter!("keyspace_router_passthrough_total").increment(1);
}

/// 1 while a client handle is live, 0 otherwise.
pub fn set_client_active(topology: &str, active: bool) {
    gauge!(
        "keyspace_router_client_active",
        "topology" => topology.to_string()
    )
    .set(if active { 1.0 } else { 0.0 });
}

/// Records command latency when dropped.
pub struct LatencyTimer {
    command: String,
    start: Instant,
}

impl LatencyTimer {
    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            start: Instant::now(),
        }
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        record_latency(&self.command, self.start.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};
    use metrics_util::MetricKind;

    #[test]
    fn test_command_counter_labels() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_command("GET", true);
            record_command("GET", true);
            record_command("GET", false);
        });

        let snapshot = snapshotter.snapshot().into_vec();
        let success = snapshot.iter().find(|(key, _, _, _)| {
            key.kind() == MetricKind::Counter
                && key.key().name() == "keyspace_router_commands_total"
                && key.key().labels().any(|l| l.key() == "status" && l.value() == "success")
        });
        match success {
            Some((_, _, _, DebugValue::Counter(n))) => assert_eq!(*n, 2),
            other => panic!("unexpected snapshot entry: {:?}", other),
        }
    }

    #[test]
    fn test_latency_timer_records_on_drop() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            let _timer = LatencyTimer::new("SET");
        });

        let snapshot = snapshotter.snapshot().into_vec();
        assert!(snapshot.iter().any(|(key, _, _, value)| {
            key.key().name() == "keyspace_router_command_seconds"
                && matches!(value, DebugValue::Histogram(samples) if samples.len() == 1)
        }));
    }

    #[test]
    fn test_helpers_without_recorder() {
        // no recorder installed: every call must be a no-op
        record_batch_size("MGET", 3);
        record_connection_error("cluster");
        record_unexpired_passthrough();
        set_client_active("standalone", true);
    }
}
