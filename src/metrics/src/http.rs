// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The metrics exposition HTTP endpoint.

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{routing, Router};
use prometheus::{Encoder, TextEncoder};
use tokio::net::TcpListener;
use tracing::error;

use crate::MetricsRegistry;

/// Serves `GET /metrics` on `listener` until the process exits.
///
/// Every request re-gathers the registry, so scrapes always observe the
/// current gauge values; nothing is pushed or cached.
pub async fn serve(listener: TcpListener, registry: MetricsRegistry) -> Result<(), anyhow::Error> {
    let router = Router::new()
        .route("/metrics", routing::get(handle_metrics))
        .with_state(registry);
    axum::serve(listener, router).await?;
    Ok(())
}

async fn handle_metrics(State(registry): State<MetricsRegistry>) -> Response {
    let families = registry.gather();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buffer) {
        error!("failed to encode metrics: {}", e);
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    (
        [(header::CONTENT_TYPE, encoder.format_type().to_owned())],
        buffer,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use axum::extract::State;

    use crate::{metric, IntGauge, MetricsRegistry};

    #[tokio::test]
    async fn test_metrics_exposition() {
        let registry = MetricsRegistry::new();
        let up: IntGauge = registry.register(metric!(
            name: "exporter_up",
            help: "1 if the last refresh cycle succeeded",
        ));
        up.set(1);

        let response = super::handle_metrics(State(registry)).await;
        assert_eq!(response.status(), axum::http::StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("exporter_up 1"), "body was: {text}");
    }
}
