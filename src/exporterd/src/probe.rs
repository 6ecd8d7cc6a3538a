// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Per-topic freshness probing.

use tfx_kafka_util::gateway::{BrokerGateway, DiscoveryError};
use tracing::{debug, info, warn};

/// The freshness result for a single topic in a single cycle.
///
/// `max_timestamp_ms` is `None` when no partition yielded a usable
/// timestamp: the topic was absent, every partition was empty, or every
/// poll timed out or errored. That is a normal outcome, not a failure.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TopicFreshness {
    /// The topic name.
    pub topic: String,
    /// The maximum record timestamp observed across the topic's partitions,
    /// in milliseconds since the Unix epoch.
    pub max_timestamp_ms: Option<i64>,
}

impl TopicFreshness {
    fn absent(topic: &str) -> TopicFreshness {
        TopicFreshness {
            topic: topic.to_owned(),
            max_timestamp_ms: None,
        }
    }
}

/// A probe failure for one topic.
///
/// Absorbed by the refresh cycle: the topic simply gets no metric update.
#[derive(Debug, thiserror::Error)]
#[error("failed to probe topic {topic}: {source}")]
pub struct ProbeError {
    /// The topic being probed.
    pub topic: String,
    /// The underlying broker failure.
    #[source]
    pub source: DiscoveryError,
}

/// Computes the maximum record timestamp across all partitions of `topic`.
///
/// One record is read per non-empty partition, at the offset just below the
/// high watermark. Partitions whose watermark fetch fails are skipped;
/// records whose timestamp the broker reports as negative are ignored as
/// "unknown". Only a broker-unreachable error from the describe call
/// escapes this function.
pub fn probe_topic<G>(gateway: &G, topic: &str) -> Result<TopicFreshness, DiscoveryError>
where
    G: BrokerGateway,
{
    let Some(partitions) = gateway.describe_topic(topic)? else {
        warn!(topic, "could not retrieve topic metadata; reporting no data");
        return Ok(TopicFreshness::absent(topic));
    };
    debug!(topic, "topic has {} partition(s)", partitions.len());

    let mut targets = Vec::with_capacity(partitions.len());
    for pid in partitions {
        let watermark = match gateway.fetch_watermarks(topic, pid) {
            Ok(watermark) => watermark,
            Err(e) => {
                warn!(
                    topic,
                    partition = pid,
                    "could not fetch watermarks; skipping partition: {}",
                    e
                );
                continue;
            }
        };
        if watermark.is_empty() {
            debug!(
                topic,
                partition = pid,
                low = watermark.low,
                high = watermark.high,
                "partition is empty"
            );
            continue;
        }
        targets.push((pid, watermark.latest_offset()));
    }

    if targets.is_empty() {
        return Ok(TopicFreshness::absent(topic));
    }

    let max_timestamp_ms = gateway
        .poll_latest(topic, &targets)
        .into_iter()
        // A negative timestamp is a broker-defined "unknown", not an error.
        .filter(|ts| *ts >= 0)
        .max();

    info!(
        topic,
        "max timestamp across partitions = {:?} ms", max_timestamp_ms
    );
    Ok(TopicFreshness {
        topic: topic.to_owned(),
        max_timestamp_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{StaticCluster, StaticPartition};

    #[test]
    fn test_absent_topic_yields_no_data() {
        let cluster = StaticCluster::default();
        let result = probe_topic(&cluster, "missing").unwrap();
        assert_eq!(result.max_timestamp_ms, None);
    }

    #[test]
    fn test_all_empty_partitions_yield_no_data() {
        let cluster = StaticCluster::default().topic(
            "t",
            vec![
                StaticPartition::empty(),
                StaticPartition { low: 4, high: 4, ..StaticPartition::empty() },
            ],
        );
        let result = probe_topic(&cluster, "t").unwrap();
        assert_eq!(result.max_timestamp_ms, None);
    }

    #[test]
    fn test_single_record_partition_beside_empty_one() {
        let cluster = StaticCluster::default().topic(
            "t",
            vec![StaticPartition::with_latest(1000), StaticPartition::empty()],
        );
        let result = probe_topic(&cluster, "t").unwrap();
        assert_eq!(result.max_timestamp_ms, Some(1000));
    }

    #[test]
    fn test_max_across_partitions_is_order_independent() {
        for partitions in [
            vec![StaticPartition::with_latest(500), StaticPartition::with_latest(900)],
            vec![StaticPartition::with_latest(900), StaticPartition::with_latest(500)],
        ] {
            let cluster = StaticCluster::default().topic("t", partitions);
            let result = probe_topic(&cluster, "t").unwrap();
            assert_eq!(result.max_timestamp_ms, Some(900));
        }
    }

    #[test]
    fn test_watermark_failure_skips_partition_only() {
        let cluster = StaticCluster::default().topic(
            "t",
            vec![
                StaticPartition::with_latest(700),
                StaticPartition::watermark_error(),
            ],
        );
        let result = probe_topic(&cluster, "t").unwrap();
        assert_eq!(result.max_timestamp_ms, Some(700));
    }

    #[test]
    fn test_negative_timestamps_are_discarded() {
        let cluster = StaticCluster::default().topic(
            "t",
            vec![StaticPartition::with_latest(-1), StaticPartition::with_latest(300)],
        );
        let result = probe_topic(&cluster, "t").unwrap();
        assert_eq!(result.max_timestamp_ms, Some(300));

        let cluster =
            StaticCluster::default().topic("t", vec![StaticPartition::with_latest(-1)]);
        let result = probe_topic(&cluster, "t").unwrap();
        assert_eq!(result.max_timestamp_ms, None);
    }

    #[test]
    fn test_unreachable_broker_is_fatal() {
        let cluster = StaticCluster::unreachable();
        assert!(probe_topic(&cluster, "t").is_err());
    }

    #[test]
    fn test_probe_error_names_topic_and_keeps_source() {
        let cluster = StaticCluster::unreachable();
        let source = probe_topic(&cluster, "t").unwrap_err();
        let err = ProbeError {
            topic: "t".into(),
            source,
        };
        assert!(err.to_string().starts_with("failed to probe topic t:"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
