//! HTTP surface: `GET /v1/weather?city=` and `GET /healthz`.

use std::{future::Future, sync::Arc, time::Instant};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tokio::net::TcpListener;

use crate::{
    lookup::{LookupError, WeatherLookup},
    model::Weather,
};

#[derive(Debug, Deserialize)]
pub struct WeatherParams {
    pub city: Option<String>,
}

impl IntoResponse for LookupError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_GATEWAY, self.to_string()).into_response()
    }
}

pub fn router(lookup: Arc<WeatherLookup>) -> Router {
    Router::new()
        .route("/v1/weather", get(weather))
        .route("/healthz", get(healthz))
        .layer(middleware::from_fn(log_requests))
        .with_state(lookup)
}

async fn weather(
    State(lookup): State<Arc<WeatherLookup>>,
    Query(params): Query<WeatherParams>,
) -> Result<Json<Weather>, LookupError> {
    let served = lookup.lookup(params.city.as_deref()).await?;
    tracing::debug!(source = ?served.source, "weather served");
    Ok(Json(served.weather))
}

async fn healthz() -> &'static str {
    "ok"
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started = Instant::now();
    tracing::debug!(%method, %path, "request received");

    let response = next.run(request).await;

    tracing::info!(
        %method,
        %path,
        status = response.status().as_u16(),
        elapsed = ?started.elapsed(),
        "request handled"
    );
    response
}

/// Serve until `shutdown` resolves, then drain in-flight requests.
pub async fn serve<F>(
    listener: TcpListener,
    lookup: Arc<WeatherLookup>,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let address = listener
        .local_addr()
        .context("Failed to read listener address")?;
    tracing::info!(%address, providers = lookup.providers().len(), "listening");

    axum::serve(listener, router(lookup))
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server terminated with an error")?;

    tracing::info!("server stopped");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(error) => {
                tracing::error!(%error, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!(signal = "ctrl-c", "shutdown signal received"),
        () = terminate => tracing::info!(signal = "sigterm", "shutdown signal received"),
    }
}
