// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Construction and configuration of Kafka clients.

use std::cmp;
use std::error::Error;
use std::time::Duration;

use rdkafka::client::OAuthToken;
use rdkafka::config::{ClientConfig, RDKafkaLogLevel};
use rdkafka::consumer::ConsumerContext;
use rdkafka::error::KafkaError;
use rdkafka::ClientContext;
use tokio::runtime::Handle;
use tracing::{debug, info, warn, Level};

use crate::addr::KafkaAddrs;
use crate::aws;
use aws_types::SdkConfig;

/// A reasonable default timeout when fetching topic metadata.
pub const DEFAULT_FETCH_METADATA_TIMEOUT: Duration = Duration::from_secs(10);
/// A reasonable default timeout when polling for a single record.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(2);

/// Configurable timeouts for the exporter's Kafka calls.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TimeoutConfig {
    /// The timeout for metadata and watermark requests.
    pub fetch_metadata_timeout: Duration,
    /// The timeout for polling the latest record from a partition.
    pub poll_timeout: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        TimeoutConfig {
            fetch_metadata_timeout: DEFAULT_FETCH_METADATA_TIMEOUT,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

/// How the exporter authenticates to the brokers.
#[derive(Clone, Debug)]
pub enum BrokerAuth {
    /// No authentication and no encryption. Local development and CI.
    Plaintext,
    /// SASL_SSL with OAUTHBEARER tokens minted from AWS IAM credentials.
    MskIam(SdkConfig),
}

/// A `ClientContext` that routes librdkafka logs through `tracing` and
/// generates MSK IAM OAuth tokens when token authentication is configured.
pub struct ExporterClientContext {
    sdk_config: Option<SdkConfig>,
    runtime: Handle,
}

impl ExporterClientContext {
    /// Constructs a context for the given auth mode.
    ///
    /// The `runtime` handle is used to drive the async credential fetch from
    /// within librdkafka's synchronous token callback.
    pub fn new(auth: &BrokerAuth, runtime: Handle) -> ExporterClientContext {
        let sdk_config = match auth {
            BrokerAuth::Plaintext => None,
            BrokerAuth::MskIam(sdk_config) => Some(sdk_config.clone()),
        };
        ExporterClientContext {
            sdk_config,
            runtime,
        }
    }
}

impl std::fmt::Debug for ExporterClientContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExporterClientContext")
            .field("iam", &self.sdk_config.is_some())
            .finish_non_exhaustive()
    }
}

impl ClientContext for ExporterClientContext {
    const ENABLE_REFRESH_OAUTH_TOKEN: bool = true;

    fn log(&self, level: RDKafkaLogLevel, fac: &str, log_message: &str) {
        use rdkafka::config::RDKafkaLogLevel::*;
        match level {
            // Error-level events are downgraded to warnings: almost all of
            // them are transient broker hiccups that the refresh cycle
            // already reflects in the health gauge.
            Emerg | Alert | Critical | Error => {
                warn!(target: "librdkafka", "error: {} {}", fac, log_message);
            }
            Warning => warn!(target: "librdkafka", "warning: {} {}", fac, log_message),
            Notice | Info => info!(target: "librdkafka", "{} {}", fac, log_message),
            Debug => debug!(target: "librdkafka", "{} {}", fac, log_message),
        }
    }

    fn error(&self, error: KafkaError, reason: &str) {
        warn!(target: "librdkafka", "error: {}: {}", error, reason);
    }

    fn generate_oauth_token(
        &self,
        _oauthbearer_config: Option<&str>,
    ) -> Result<OAuthToken, Box<dyn Error>> {
        // Invoked by librdkafka on new connections and proactively before
        // the current token expires. A failure here fails the connection
        // attempt that needed the token, not the process.
        let Some(sdk_config) = &self.sdk_config else {
            return Err("OAuth token requested but no AWS configuration present".into());
        };

        info!(target: "librdkafka", "generating MSK IAM auth token");
        match self.runtime.block_on(aws::generate_auth_token(sdk_config)) {
            Ok((token, lifetime_ms)) => {
                debug!(target: "librdkafka", %lifetime_ms, "generated MSK IAM auth token");
                Ok(OAuthToken {
                    token,
                    lifetime_ms,
                    principal_name: "".to_string(),
                })
            }
            Err(e) => {
                warn!(target: "librdkafka", "failed to generate MSK IAM auth token: {e:#}");
                Err(e.into())
            }
        }
    }
}

impl ConsumerContext for ExporterClientContext {}

/// Builds the [`ClientConfig`] for a freshness reader.
///
/// The resulting consumer never commits: the group id exists only because
/// librdkafka requires one, auto commit and the offset store are disabled,
/// and topic auto-creation is off.
pub fn create_client_config(
    addrs: &KafkaAddrs,
    auth: &BrokerAuth,
    timeouts: &TimeoutConfig,
    tracing_level: Level,
) -> ClientConfig {
    let mut config = ClientConfig::new();
    config.set_log_level(log_level_for(tracing_level));

    config.set("bootstrap.servers", addrs.to_string());
    config.set("group.id", "tfx-exporter-no-commit");
    config.set("enable.auto.commit", "false");
    config.set("enable.auto.offset.store", "false");
    config.set("auto.offset.reset", "latest");
    config.set("allow.auto.create.topics", "false");
    config.set("broker.address.family", "v4");
    config.set(
        "socket.timeout.ms",
        timeouts.poll_timeout.as_millis().to_string(),
    );
    // librdkafka rejects session timeouts under its 6s broker-side floor.
    let session_timeout = cmp::max(timeouts.poll_timeout * 2, Duration::from_secs(6));
    config.set("session.timeout.ms", session_timeout.as_millis().to_string());

    match auth {
        BrokerAuth::Plaintext => {
            config.set("security.protocol", "PLAINTEXT");
        }
        BrokerAuth::MskIam(_) => {
            config.set("security.protocol", "SASL_SSL");
            config.set("sasl.mechanism", "OAUTHBEARER");
        }
    }

    config
}

fn log_level_for(tracing_level: Level) -> RDKafkaLogLevel {
    if tracing_level >= Level::DEBUG {
        RDKafkaLogLevel::Debug
    } else if tracing_level >= Level::INFO {
        RDKafkaLogLevel::Info
    } else if tracing_level >= Level::WARN {
        RDKafkaLogLevel::Warning
    } else {
        RDKafkaLogLevel::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_no_commit() {
        let addrs: KafkaAddrs = "broker1,broker2:9094".parse().unwrap();
        let config = create_client_config(
            &addrs,
            &BrokerAuth::Plaintext,
            &TimeoutConfig::default(),
            Level::INFO,
        );
        assert_eq!(
            config.get("bootstrap.servers"),
            Some("broker1:9092,broker2:9094")
        );
        assert_eq!(config.get("enable.auto.commit"), Some("false"));
        assert_eq!(config.get("enable.auto.offset.store"), Some("false"));
        assert_eq!(config.get("allow.auto.create.topics"), Some("false"));
        assert_eq!(config.get("security.protocol"), Some("PLAINTEXT"));
    }

    #[test]
    fn test_session_timeout_floor() {
        let addrs: KafkaAddrs = "broker".parse().unwrap();
        let timeouts = TimeoutConfig {
            poll_timeout: Duration::from_millis(500),
            ..Default::default()
        };
        let config =
            create_client_config(&addrs, &BrokerAuth::Plaintext, &timeouts, Level::INFO);
        assert_eq!(config.get("socket.timeout.ms"), Some("500"));
        assert_eq!(config.get("session.timeout.ms"), Some("6000"));
    }
}
