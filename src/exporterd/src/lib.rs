// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The topic freshness exporter engine.
//!
//! The exporter periodically discovers the Kafka topics matching a set of
//! name prefixes and publishes, per topic, the timestamp of the most
//! recently produced record as a Prometheus gauge. It reads exactly one
//! record per non-empty partition per cycle, never joins a consumer group,
//! and never commits an offset.
//!
//! Control flow, outermost first: [`schedule::run_loop`] drives strictly
//! sequential refresh cycles; [`refresh::refresh`] resolves topics and fans
//! probes out over a bounded worker pool; [`probe::probe_topic`] computes
//! one topic's freshness from its partition watermarks. Results land in
//! [`metrics::ExporterMetrics`], which the HTTP endpoint in `tfx-metrics`
//! serves on every scrape.

#![warn(missing_docs, missing_debug_implementations)]

use std::time::Duration;

pub mod metrics;
pub mod probe;
pub mod refresh;
pub mod resolve;
pub mod schedule;

#[cfg(test)]
pub(crate) mod testutil;

/// Engine settings, fixed for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct ExporterConfig {
    /// Topic name prefixes to scrape.
    pub prefixes: Vec<String>,
    /// Target spacing between cycle starts.
    pub interval: Duration,
    /// Size of the probe worker pool.
    pub probe_workers: usize,
}
