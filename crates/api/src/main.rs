//! FaultGate demo harness.
//!
//! A thin HTTP collaborator around the resilience engine: `GET /hello`
//! invokes a simulated flaky downstream call through the gate and
//! renders the outcome. All of the real engineering lives in
//! `faultgate-core`; this binary only wires it to a socket.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use faultgate_core::FaultGate;
use rand::Rng;
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
enum DownstreamError {
    #[error("Simulated failure")]
    Simulated,
}

/// Simulate a potentially failing downstream call (~50% failure).
async fn perform_operation() -> Result<(), DownstreamError> {
    if rand::thread_rng().gen_bool(0.5) {
        info!("Simulated failure");
        Err(DownstreamError::Simulated)
    } else {
        Ok(())
    }
}

async fn hello(State(gate): State<Arc<FaultGate>>) -> impl IntoResponse {
    match gate.execute(perform_operation).await {
        Ok(()) => {
            info!("Operation succeeded");
            (StatusCode::OK, "Hello world!").into_response()
        }
        Err(err) => {
            let snapshot = gate.snapshot();
            error!(error = %err, breaker_state = %snapshot.state, "Request failed");
            (StatusCode::SERVICE_UNAVAILABLE, err.to_string()).into_response()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Retry configuration mirrors the demonstration defaults: three
    // attempts with a 500ms flat wait, default breaker thresholds.
    let mut builder = FaultGate::builder()
        .max_attempts(3)
        .wait_between_attempts(Duration::from_millis(500));

    // The periodic forced reset defeats the breaker during sustained
    // outages, so it stays off unless explicitly requested.
    if let Ok(raw) = std::env::var("FAULTGATE_RESET_INTERVAL_MS") {
        let millis: u64 =
            raw.parse().context("FAULTGATE_RESET_INTERVAL_MS must be an integer")?;
        builder = builder.reset_interval(Duration::from_millis(millis));
        info!(interval_ms = millis, "Periodic forced reset enabled");
    }

    let gate = Arc::new(builder.build()?);

    let app = Router::new().route("/hello", get(hello)).with_state(Arc::clone(&gate));

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8080")
        .await
        .context("Failed to bind 0.0.0.0:8080")?;
    info!("HTTP server started on {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("HTTP server error")?;
    Ok(())
}
