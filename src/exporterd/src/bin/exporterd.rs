// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The Kafka topic freshness exporter daemon.
//!
//! Periodically publishes, per topic matching the configured prefixes, the
//! timestamp of the most recently produced record, as the Prometheus gauge
//! `topic_last_event_timestamp_seconds{topic=...}` alongside an
//! `exporter_up` health gauge. Exits 0 after a clean shutdown on SIGINT or
//! SIGTERM.

use std::net::{Ipv4Addr, SocketAddr};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use aws_types::region::Region;
use clap::{Parser, ValueEnum};
use tokio::net::TcpListener;
use tokio::runtime::Handle;
use tokio::signal::unix::{signal, SignalKind};
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use tfx_exporterd::metrics::ExporterMetrics;
use tfx_exporterd::resolve::split_prefixes;
use tfx_exporterd::{schedule, ExporterConfig};
use tfx_kafka_util::addr::KafkaAddrs;
use tfx_kafka_util::client::{BrokerAuth, TimeoutConfig};
use tfx_kafka_util::gateway::FreshnessConnector;
use tfx_metrics::MetricsRegistry;

/// How the exporter authenticates to the Kafka brokers.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
enum SecurityMode {
    /// No authentication and no encryption. Local development and CI.
    Plaintext,
    /// SASL_SSL with AWS MSK IAM tokens.
    SaslSslIam,
}

#[derive(Debug, Parser)]
#[clap(name = "exporterd", about = "Kafka topic freshness exporter.")]
struct Args {
    /// Comma-separated list of Kafka broker host[:port] pairs.
    #[clap(long, env = "KAFKA_BOOTSTRAP_SERVERS", value_name = "HOST:PORT,...")]
    bootstrap_servers: KafkaAddrs,
    /// Semicolon-separated list of topic name prefixes to scrape.
    #[clap(long, env = "TOPIC_PREFIX", value_name = "PREFIX[;PREFIX...]")]
    topic_prefix: String,
    /// AWS region used when generating MSK IAM tokens.
    #[clap(long, env = "AWS_REGION", value_name = "REGION")]
    aws_region: Option<String>,
    /// Broker security mode.
    #[clap(long, env = "KAFKA_SECURITY_PROTOCOL", value_enum, default_value = "sasl-ssl-iam")]
    security: SecurityMode,
    /// How often to refresh all topic gauges, in seconds.
    #[clap(long, env = "SCRAPE_INTERVAL_SECONDS", default_value = "600", value_name = "SECONDS")]
    scrape_interval_seconds: u64,
    /// TCP port the metrics HTTP server listens on.
    #[clap(long, env = "METRICS_PORT", default_value = "8000", value_name = "PORT")]
    metrics_port: u16,
    /// Milliseconds to wait when polling for the latest record.
    #[clap(long, env = "CONSUMER_TIMEOUT_MS", default_value = "2000", value_name = "MILLIS")]
    consumer_timeout_ms: u64,
    /// Seconds to wait for broker metadata responses.
    #[clap(long, env = "TOPIC_DISCOVERY_TIMEOUT_S", default_value = "10", value_name = "SECONDS")]
    topic_discovery_timeout_s: u64,
    /// Number of concurrent per-topic probe workers.
    #[clap(long, env = "PROBE_WORKERS", default_value = "10", value_name = "COUNT")]
    probe_workers: usize,
    /// Which log messages to emit, as a tracing filter directive.
    #[clap(long, env = "LOG_FILTER", default_value = "info", value_name = "FILTER")]
    log_filter: String,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("exporterd: {:#}", err);
        process::exit(1);
    }
}

fn run() -> Result<(), anyhow::Error> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&args.log_filter).context("parsing --log-filter")?)
        .with(fmt::layer())
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating tokio runtime")?;
    runtime.block_on(serve(args))
}

async fn serve(args: Args) -> Result<(), anyhow::Error> {
    if args.scrape_interval_seconds < 1 {
        bail!("--scrape-interval-seconds must be at least 1");
    }
    if args.probe_workers < 1 {
        bail!("--probe-workers must be at least 1");
    }
    let prefixes = split_prefixes(&args.topic_prefix);
    if prefixes.is_empty() {
        bail!("--topic-prefix must name at least one non-empty prefix");
    }

    info!(
        "starting exporterd: bootstrap={} prefixes={:?} interval={}s security={:?}",
        args.bootstrap_servers, prefixes, args.scrape_interval_seconds, args.security,
    );

    let auth = match args.security {
        SecurityMode::Plaintext => BrokerAuth::Plaintext,
        SecurityMode::SaslSslIam => {
            let region = args
                .aws_region
                .clone()
                .context("--aws-region is required with --security=sasl-ssl-iam")?;
            let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
                .region(Region::new(region))
                .load()
                .await;
            BrokerAuth::MskIam(sdk_config)
        }
    };

    let registry = MetricsRegistry::new();
    let metrics = ExporterMetrics::register_into(&registry);

    let shutdown = CancellationToken::new();

    let metrics_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, args.metrics_port));
    let listener = TcpListener::bind(metrics_addr)
        .await
        .with_context(|| format!("binding metrics listener on {}", metrics_addr))?;
    info!("serving metrics on http://{}/metrics", metrics_addr);
    task::spawn({
        let registry = registry.clone();
        let shutdown = shutdown.clone();
        async move {
            // A dead metrics endpoint makes the exporter useless, so a
            // server failure shuts the whole process down.
            match tfx_metrics::http::serve(listener, registry).await {
                Ok(()) => error!("metrics server exited unexpectedly"),
                Err(e) => error!("metrics server failed: {:#}", e),
            }
            shutdown.cancel();
        }
    });

    let connector = Arc::new(FreshnessConnector::new(
        args.bootstrap_servers.clone(),
        auth,
        TimeoutConfig {
            fetch_metadata_timeout: Duration::from_secs(args.topic_discovery_timeout_s),
            poll_timeout: Duration::from_millis(args.consumer_timeout_ms),
        },
        Handle::current(),
    ));

    let mut sigterm = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("installing SIGINT handler")?;
    task::spawn({
        let shutdown = shutdown.clone();
        async move {
            tokio::select! {
                _ = sigterm.recv() => info!("received SIGTERM; initiating graceful shutdown"),
                _ = sigint.recv() => info!("received SIGINT; initiating graceful shutdown"),
            }
            shutdown.cancel();
        }
    });

    let config = ExporterConfig {
        prefixes,
        interval: Duration::from_secs(args.scrape_interval_seconds),
        probe_workers: args.probe_workers,
    };
    schedule::run_loop(connector, metrics, config, shutdown).await;
    Ok(())
}
