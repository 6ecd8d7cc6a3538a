// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The cycle scheduler.

use std::cmp;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tfx_kafka_util::gateway::BrokerConnector;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::metrics::ExporterMetrics;
use crate::refresh::refresh;
use crate::ExporterConfig;

/// The longest uninterruptible stretch of inter-cycle sleep. Shutdown is
/// observed at least this often while idle.
pub const SLEEP_INCREMENT: Duration = Duration::from_secs(1);

/// Drives refresh cycles until `shutdown` is cancelled.
///
/// Cycles are strictly sequential. The sleep between cycles is compensated
/// for the cycle's own duration; a cycle that overruns the interval is
/// followed immediately by the next one, with no attempt to catch up on
/// missed cycles and no overlap. A shutdown request is honored between
/// cycles and between sleep increments, never by interrupting a cycle in
/// flight.
pub async fn run_loop<C>(
    connector: Arc<C>,
    metrics: ExporterMetrics,
    config: ExporterConfig,
    shutdown: CancellationToken,
) where
    C: BrokerConnector,
{
    'cycles: while !shutdown.is_cancelled() {
        info!("beginning refresh cycle");
        let cycle_start = Instant::now();
        let outcome = refresh(
            &connector,
            &metrics,
            &config.prefixes,
            config.probe_workers,
        )
        .await;
        let elapsed = cycle_start.elapsed();

        let sleep_for = config.interval.saturating_sub(elapsed);
        info!(
            healthy = outcome.healthy,
            "refresh took {:.2}s; sleeping {:.2}s",
            elapsed.as_secs_f64(),
            sleep_for.as_secs_f64(),
        );

        let mut remaining = sleep_for;
        while remaining > Duration::ZERO {
            let step = cmp::min(remaining, SLEEP_INCREMENT);
            tokio::select! {
                _ = shutdown.cancelled() => break 'cycles,
                _ = time::sleep(step) => remaining -= step,
            }
        }
    }
    info!("exporter shut down cleanly");
}
