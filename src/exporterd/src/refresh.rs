// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The refresh cycle: resolve topics, fan out probes, apply results.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tfx_kafka_util::gateway::{BrokerConnector, DiscoveryError};
use tokio::task;
use tracing::{error, info, warn};

use crate::metrics::ExporterMetrics;
use crate::probe::{probe_topic, ProbeError};
use crate::resolve::resolve_topics;

/// What one refresh cycle accomplished. Not persisted across cycles.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct RefreshOutcome {
    /// Number of topics that matched the configured prefixes.
    pub topics_discovered: usize,
    /// Number of topics that yielded a freshness timestamp.
    pub topics_with_data: usize,
    /// Whether the cycle completed without a cycle-level error.
    pub healthy: bool,
}

/// Runs one refresh cycle.
///
/// Health reflects only cycle-framing failures: an unreachable broker
/// during discovery marks the cycle unhealthy and skips all metric updates,
/// while individual probe failures are logged, absorbed, and simply leave
/// that topic's gauge untouched. A cycle over zero matching topics is
/// healthy.
///
/// Probes run on a worker pool of `workers` blocking tasks; each task opens
/// its own connection. Results are applied to the gauges in completion
/// order.
pub async fn refresh<C>(
    connector: &Arc<C>,
    metrics: &ExporterMetrics,
    prefixes: &[String],
    workers: usize,
) -> RefreshOutcome
where
    C: BrokerConnector,
{
    let topics = {
        let connector = Arc::clone(connector);
        let prefixes = prefixes.to_vec();
        task::spawn_blocking(move || -> Result<Vec<String>, DiscoveryError> {
            let gateway = connector.connect()?;
            resolve_topics(&gateway, &prefixes)
        })
        .await
    };
    let topics = match topics {
        Ok(Ok(topics)) => topics,
        Ok(Err(e)) => {
            error!("kafka error during refresh: {}", e);
            return fail_cycle(metrics);
        }
        Err(e) => {
            error!("discovery task failed: {}", e);
            return fail_cycle(metrics);
        }
    };

    if topics.is_empty() {
        warn!(
            "no topics found matching prefixes {:?}; no freshness gauges will be emitted",
            prefixes
        );
        metrics.set_healthy();
        metrics.refresh_cycles.with_label_values(&["success"]).inc();
        return RefreshOutcome {
            topics_discovered: 0,
            topics_with_data: 0,
            healthy: true,
        };
    }

    let topics_discovered = topics.len();
    info!(
        "processing {} topic(s) with {} worker(s)",
        topics_discovered, workers
    );

    let mut probes = stream::iter(topics.into_iter().map(|topic| {
        let connector = Arc::clone(connector);
        async move {
            task::spawn_blocking(move || -> Result<_, ProbeError> {
                let gateway = connector.connect().map_err(|source| ProbeError {
                    topic: topic.clone(),
                    source,
                })?;
                probe_topic(&gateway, &topic).map_err(|source| ProbeError { topic, source })
            })
            .await
        }
    }))
    .buffer_unordered(workers);

    let mut topics_with_data = 0;
    while let Some(completed) = probes.next().await {
        match completed {
            Ok(Ok(freshness)) => match freshness.max_timestamp_ms {
                Some(ms) => {
                    metrics.set_topic_freshness(&freshness.topic, ms as f64 / 1000.0);
                    topics_with_data += 1;
                }
                None => info!(
                    topic = %freshness.topic,
                    "no retrievable timestamp; skipping metric update"
                ),
            },
            Ok(Err(e)) => error!("{}", e),
            Err(e) => error!("probe task failed: {}", e),
        }
    }

    metrics.set_healthy();
    metrics.refresh_cycles.with_label_values(&["success"]).inc();
    info!(
        "refresh cycle complete: {}/{} topic(s) with data",
        topics_with_data, topics_discovered
    );
    RefreshOutcome {
        topics_discovered,
        topics_with_data,
        healthy: true,
    }
}

fn fail_cycle(metrics: &ExporterMetrics) -> RefreshOutcome {
    metrics.set_unhealthy();
    metrics.refresh_cycles.with_label_values(&["error"]).inc();
    RefreshOutcome {
        topics_discovered: 0,
        topics_with_data: 0,
        healthy: false,
    }
}
