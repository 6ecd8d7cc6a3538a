// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The exporter's scrape-visible metrics.

use tfx_metrics::{metric, GaugeVec, IntCounterVec, IntGauge, MetricsRegistry};
use tracing::debug;

/// The gauges the exporter publishes.
///
/// Gauges are independently keyed per topic, so a scrape racing a refresh
/// cycle may observe a mix of old and new values; each individual value is
/// always one that some completed probe produced.
#[derive(Debug, Clone)]
pub struct ExporterMetrics {
    /// Unix timestamp (seconds) of the most recently produced record, per
    /// topic.
    pub topic_last_event_timestamp_seconds: GaugeVec,
    /// 1 if the last refresh cycle completed without a broker-level error,
    /// 0 otherwise.
    pub exporter_up: IntGauge,
    /// Completed refresh cycles, labeled by outcome.
    pub refresh_cycles: IntCounterVec,
}

impl ExporterMetrics {
    /// Registers the exporter's metrics into `registry`.
    pub fn register_into(registry: &MetricsRegistry) -> ExporterMetrics {
        ExporterMetrics {
            topic_last_event_timestamp_seconds: registry.register(metric!(
                name: "topic_last_event_timestamp_seconds",
                help: "Unix timestamp (seconds) of the most recently produced record for this topic.",
                var_labels: ["topic"],
            )),
            exporter_up: registry.register(metric!(
                name: "exporter_up",
                help: "1 if the last refresh cycle completed without broker errors, 0 otherwise.",
            )),
            refresh_cycles: registry.register(metric!(
                name: "refresh_cycles_total",
                help: "Completed refresh cycles by outcome.",
                var_labels: ["outcome"],
            )),
        }
    }

    /// Sets the freshness gauge for one topic.
    pub fn set_topic_freshness(&self, topic: &str, unix_seconds: f64) {
        self.topic_last_event_timestamp_seconds
            .with_label_values(&[topic])
            .set(unix_seconds);
        debug!(topic, unix_seconds, "updated freshness gauge");
    }

    /// Marks the last cycle as healthy.
    pub fn set_healthy(&self) {
        self.exporter_up.set(1);
    }

    /// Marks the last cycle as unhealthy.
    pub fn set_unhealthy(&self) {
        self.exporter_up.set(0);
    }
}
