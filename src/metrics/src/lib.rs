// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Metrics for the topic freshness exporter.
//!
//! Each subsystem keeps its metrics in a struct of its own, registered once
//! into a [`MetricsRegistry`] that is constructed in `main` and passed by
//! reference to whoever needs it. There are no global gauges: everything a
//! scrape can observe hangs off a registry somebody explicitly built.
//!
//! ```rust
//! use tfx_metrics::{metric, IntGauge, MetricsRegistry};
//!
//! #[derive(Debug, Clone)]
//! struct Metrics {
//!     cycles: IntGauge,
//! }
//!
//! impl Metrics {
//!     fn register_into(registry: &MetricsRegistry) -> Metrics {
//!         Metrics {
//!             cycles: registry.register(metric!(
//!                 name: "cycles",
//!                 help: "number of refresh cycles driven",
//!             )),
//!         }
//!     }
//! }
//! ```

#![warn(missing_docs, missing_debug_implementations)]

mod registry;

pub mod http;

pub use registry::{MakeCollector, MetricsRegistry};

pub use prometheus::Opts as PrometheusOpts;
pub use prometheus::{
    Counter, CounterVec, Gauge, GaugeVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
};

/// Defines the [`PrometheusOpts`] for a metric.
#[macro_export]
macro_rules! metric {
    (
        name: $name:expr,
        help: $help:expr
        $(, const_labels: { $($cl_key:expr => $cl_value:expr ),* })?
        $(, var_labels: [ $($vl_name:expr),* ])?
        $(,)?
    ) => {{
        let const_labels: ::std::collections::HashMap<String, String> = (&[
            $($(
                ($cl_key.to_string(), $cl_value.to_string()),
            )*)?
        ]).into_iter().cloned().collect();
        let var_labels: ::std::vec::Vec<String> = vec![
            $(
                $($vl_name.into(),)*
            )?];
        $crate::PrometheusOpts::new($name, $help)
            .const_labels(const_labels)
            .variable_labels(var_labels)
    }}
}
