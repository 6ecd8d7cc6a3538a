// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! An in-memory broker gateway for unit tests.

use std::collections::{BTreeMap, BTreeSet};

use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use tfx_kafka_util::gateway::{BrokerGateway, DiscoveryError, PartitionId, Watermark};

/// One partition of a [`StaticCluster`] topic.
#[derive(Debug, Clone)]
pub(crate) struct StaticPartition {
    pub low: i64,
    pub high: i64,
    /// Timestamp of the record at `high - 1`, or `None` when the poll for
    /// it should time out.
    pub latest_timestamp_ms: Option<i64>,
    /// When set, the watermark fetch for this partition fails.
    pub watermark_err: bool,
}

impl StaticPartition {
    pub fn empty() -> StaticPartition {
        StaticPartition {
            low: 0,
            high: 0,
            latest_timestamp_ms: None,
            watermark_err: false,
        }
    }

    pub fn with_latest(timestamp_ms: i64) -> StaticPartition {
        StaticPartition {
            low: 0,
            high: 5,
            latest_timestamp_ms: Some(timestamp_ms),
            watermark_err: false,
        }
    }

    pub fn watermark_error() -> StaticPartition {
        StaticPartition {
            watermark_err: true,
            ..StaticPartition::with_latest(0)
        }
    }
}

/// A fixed set of topics acting as a broker gateway.
#[derive(Debug, Clone, Default)]
pub(crate) struct StaticCluster {
    topics: BTreeMap<String, Vec<StaticPartition>>,
    unreachable: bool,
}

impl StaticCluster {
    /// A cluster whose every call fails as broker-unreachable.
    pub fn unreachable() -> StaticCluster {
        StaticCluster {
            unreachable: true,
            ..StaticCluster::default()
        }
    }

    /// A cluster of empty single-partition topics with the given names.
    pub fn with_topic_names(names: &[&str]) -> StaticCluster {
        let mut cluster = StaticCluster::default();
        for name in names {
            cluster = cluster.topic(name, vec![StaticPartition::empty()]);
        }
        cluster
    }

    pub fn topic(mut self, name: &str, partitions: Vec<StaticPartition>) -> StaticCluster {
        self.topics.insert(name.to_owned(), partitions);
        self
    }

    fn check_reachable(&self) -> Result<(), DiscoveryError> {
        if self.unreachable {
            Err(DiscoveryError::Metadata(KafkaError::MetadataFetch(
                RDKafkaErrorCode::BrokerTransportFailure,
            )))
        } else {
            Ok(())
        }
    }
}

impl BrokerGateway for StaticCluster {
    fn list_topics(&self) -> Result<BTreeSet<String>, DiscoveryError> {
        self.check_reachable()?;
        Ok(self.topics.keys().cloned().collect())
    }

    fn describe_topic(&self, topic: &str) -> Result<Option<Vec<PartitionId>>, DiscoveryError> {
        self.check_reachable()?;
        Ok(self
            .topics
            .get(topic)
            .map(|partitions| (0..partitions.len() as PartitionId).collect()))
    }

    fn fetch_watermarks(&self, topic: &str, pid: PartitionId) -> Result<Watermark, KafkaError> {
        let partition = self
            .topics
            .get(topic)
            .and_then(|ps| ps.get(pid as usize))
            .ok_or(KafkaError::MetadataFetch(
                RDKafkaErrorCode::UnknownPartition,
            ))?;
        if partition.watermark_err {
            return Err(KafkaError::MetadataFetch(
                RDKafkaErrorCode::OperationTimedOut,
            ));
        }
        Ok(Watermark {
            low: partition.low,
            high: partition.high,
        })
    }

    fn poll_latest(&self, topic: &str, targets: &[(PartitionId, i64)]) -> Vec<i64> {
        let Some(partitions) = self.topics.get(topic) else {
            return vec![];
        };
        let mut timestamps = vec![];
        for (pid, offset) in targets {
            let Some(partition) = partitions.get(*pid as usize) else {
                continue;
            };
            if *offset == partition.high - 1 {
                if let Some(ts) = partition.latest_timestamp_ms {
                    timestamps.push(ts);
                }
            }
        }
        timestamps
    }
}
