// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The broker gateway: the narrow call surface the freshness engine uses to
//! talk to a Kafka cluster.
//!
//! The engine is written against the [`BrokerGateway`] and
//! [`BrokerConnector`] traits so it can be driven by an in-memory fake in
//! tests. The real implementation, [`FreshnessReader`], wraps a
//! [`BaseConsumer`] that is created per call site, assigned partitions
//! explicitly, and thrown away at the end of the probe. It never joins a
//! consumer group and never commits an offset.

use std::collections::BTreeSet;

use rdkafka::consumer::{BaseConsumer, Consumer};
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::message::Message;
use rdkafka::{Offset, TopicPartitionList};
use tokio::runtime::Handle;
use tracing::level_filters::LevelFilter;
use tracing::{debug, warn, Level};

use crate::addr::KafkaAddrs;
use crate::client::{create_client_config, BrokerAuth, ExporterClientContext, TimeoutConfig};

/// Id of a partition in a topic.
pub type PartitionId = i32;

/// The offset bounds currently available for a partition.
///
/// `high` is exclusive: one past the offset of the last produced record.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Watermark {
    /// The lowest available offset.
    pub low: i64,
    /// One past the highest available offset.
    pub high: i64,
}

impl Watermark {
    /// Reports whether the partition currently holds no records.
    pub fn is_empty(&self) -> bool {
        self.high <= self.low
    }

    /// The offset of the most recently produced record.
    pub fn latest_offset(&self) -> i64 {
        self.high - 1
    }
}

/// An error reaching the broker for metadata.
///
/// This is the cycle-fatal error class: per-partition watermark and poll
/// failures are absorbed by callers, but a `DiscoveryError` from topic
/// listing means the cluster itself is unreachable.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// The Kafka client could not be created.
    #[error("failed to create kafka client: {0}")]
    Connect(#[source] KafkaError),
    /// The metadata request failed outright.
    #[error("failed to fetch cluster metadata: {0}")]
    Metadata(#[source] KafkaError),
}

/// The calls the freshness engine issues against a Kafka cluster.
pub trait BrokerGateway {
    /// Returns the names of all topics in the cluster.
    fn list_topics(&self) -> Result<BTreeSet<String>, DiscoveryError>;

    /// Returns the partition ids of `topic`, or `None` if the topic does not
    /// exist or its metadata carries a per-topic error.
    ///
    /// `Err` is reserved for the broker itself being unreachable.
    fn describe_topic(&self, topic: &str) -> Result<Option<Vec<PartitionId>>, DiscoveryError>;

    /// Returns the watermark offsets for one partition.
    fn fetch_watermarks(&self, topic: &str, pid: PartitionId) -> Result<Watermark, KafkaError>;

    /// Assigns all `(partition, offset)` targets to this reader at once and
    /// polls once per expected record, accepting the first delivery per
    /// partition in whatever order the broker produces them.
    ///
    /// Returns the timestamps (milliseconds) of the records that arrived
    /// before their poll timed out. Timestamps the broker reports as
    /// unavailable are omitted; negative values are passed through for the
    /// caller to judge.
    fn poll_latest(&self, topic: &str, targets: &[(PartitionId, i64)]) -> Vec<i64>;
}

/// Hands out connections to the cluster.
///
/// Each discovery call and each probe task owns its own gateway, so
/// connector implementations must be shareable across tasks.
pub trait BrokerConnector: Send + Sync + 'static {
    /// The gateway type produced by [`connect`](BrokerConnector::connect).
    type Gateway: BrokerGateway;

    /// Opens a fresh connection to the cluster.
    fn connect(&self) -> Result<Self::Gateway, DiscoveryError>;
}

/// Connection settings for the real cluster.
#[derive(Clone, Debug)]
pub struct FreshnessConnector {
    addrs: KafkaAddrs,
    auth: BrokerAuth,
    timeouts: TimeoutConfig,
    runtime: Handle,
}

impl FreshnessConnector {
    /// Creates a connector.
    ///
    /// `runtime` must outlive every gateway handed out: token generation for
    /// MSK IAM auth blocks on it.
    pub fn new(
        addrs: KafkaAddrs,
        auth: BrokerAuth,
        timeouts: TimeoutConfig,
        runtime: Handle,
    ) -> FreshnessConnector {
        FreshnessConnector {
            addrs,
            auth,
            timeouts,
            runtime,
        }
    }
}

impl BrokerConnector for FreshnessConnector {
    type Gateway = FreshnessReader;

    fn connect(&self) -> Result<FreshnessReader, DiscoveryError> {
        let level = LevelFilter::current().into_level().unwrap_or(Level::INFO);
        let config = create_client_config(&self.addrs, &self.auth, &self.timeouts, level);
        let context = ExporterClientContext::new(&self.auth, self.runtime.clone());
        let consumer = config
            .create_with_context(context)
            .map_err(DiscoveryError::Connect)?;
        Ok(FreshnessReader {
            consumer,
            timeouts: self.timeouts,
        })
    }
}

/// A short-lived reader over one Kafka connection.
pub struct FreshnessReader {
    consumer: BaseConsumer<ExporterClientContext>,
    timeouts: TimeoutConfig,
}

impl std::fmt::Debug for FreshnessReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FreshnessReader")
            .field("timeouts", &self.timeouts)
            .finish_non_exhaustive()
    }
}

impl BrokerGateway for FreshnessReader {
    fn list_topics(&self) -> Result<BTreeSet<String>, DiscoveryError> {
        let meta = self
            .consumer
            .fetch_metadata(None, self.timeouts.fetch_metadata_timeout)
            .map_err(DiscoveryError::Metadata)?;
        Ok(meta
            .topics()
            .iter()
            .map(|t| t.name().to_owned())
            .collect())
    }

    fn describe_topic(&self, topic: &str) -> Result<Option<Vec<PartitionId>>, DiscoveryError> {
        let meta = self
            .consumer
            .fetch_metadata(Some(topic), self.timeouts.fetch_metadata_timeout)
            .map_err(DiscoveryError::Metadata)?;

        // Asking for one topic yields exactly one entry; the entry carries a
        // per-topic error code when the topic is unknown.
        let Some(meta_topic) = meta.topics().iter().find(|t| t.name() == topic) else {
            return Ok(None);
        };
        if let Some(err) = meta_topic.error() {
            debug!(
                topic,
                "topic metadata carries error {:?}; treating as absent",
                RDKafkaErrorCode::from(err)
            );
            return Ok(None);
        }

        let mut partition_ids = Vec::with_capacity(meta_topic.partitions().len());
        for partition_meta in meta_topic.partitions() {
            if partition_meta.error().is_some() {
                warn!(
                    topic,
                    partition = partition_meta.id(),
                    "partition metadata errored; skipping partition"
                );
                continue;
            }
            partition_ids.push(partition_meta.id());
        }
        Ok(Some(partition_ids))
    }

    fn fetch_watermarks(&self, topic: &str, pid: PartitionId) -> Result<Watermark, KafkaError> {
        let (low, high) = self.consumer.fetch_watermarks(
            topic,
            pid,
            self.timeouts.fetch_metadata_timeout,
        )?;
        Ok(Watermark { low, high })
    }

    fn poll_latest(&self, topic: &str, targets: &[(PartitionId, i64)]) -> Vec<i64> {
        let mut assignment = TopicPartitionList::with_capacity(targets.len());
        for (pid, offset) in targets {
            if let Err(e) = assignment.add_partition_offset(topic, *pid, Offset::Offset(*offset)) {
                warn!(topic, partition = pid, "failed to stage assignment: {}", e);
            }
        }
        if let Err(e) = self.consumer.assign(&assignment) {
            warn!(topic, "failed to assign partitions: {}", e);
            return vec![];
        }

        let mut timestamps = Vec::with_capacity(targets.len());
        for _ in 0..targets.len() {
            match self.consumer.poll(self.timeouts.poll_timeout) {
                Some(Ok(message)) => {
                    if let Some(ts) = message.timestamp().to_millis() {
                        timestamps.push(ts);
                    }
                }
                Some(Err(e)) => {
                    warn!(topic, "poll returned an error; skipping record: {}", e);
                }
                None => {
                    debug!(topic, "poll timed out waiting for a record");
                }
            }
        }
        timestamps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watermark_emptiness() {
        assert!(Watermark { low: 0, high: 0 }.is_empty());
        assert!(Watermark { low: 5, high: 5 }.is_empty());
        // Retention can advance `low` past a stale `high`.
        assert!(Watermark { low: 7, high: 5 }.is_empty());
        let w = Watermark { low: 3, high: 10 };
        assert!(!w.is_empty());
        assert_eq!(w.latest_offset(), 9);
    }
}
