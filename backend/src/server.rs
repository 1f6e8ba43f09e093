use std::sync::Arc;

use aide::openapi::OpenApi;
use axum::Extension;
use datadog_tracing::axum::{shutdown_signal, OtelAxumLayer, OtelInResponseLayer};
use identity_verifier::{ConfigStore, DeepLinkEncoder, ProofVerifier};
use tokio::net::TcpListener;

use crate::routes;
use crate::{pool::VerificationPool, types::Environment};

/// Starts the server with the given environment and dependencies
///
/// # Errors
///
/// Returns an error if the server fails to start or bind to the port
pub async fn start(
    environment: Environment,
    verifier: Arc<ProofVerifier>,
    config_store: Arc<dyn ConfigStore>,
    pool: Arc<VerificationPool>,
    encoder: Arc<DeepLinkEncoder>,
) -> anyhow::Result<()> {
    let mut openapi = OpenApi::default();

    let router = routes::handler()
        .finish_api(&mut openapi)
        .layer(Extension(openapi))
        .layer(Extension(environment))
        .layer(Extension(verifier))
        .layer(Extension(config_store))
        .layer(Extension(pool.clone()))
        .layer(Extension(encoder))
        // Include trace context as header into the response
        .layer(OtelInResponseLayer)
        // Start OpenTelemetry trace on incoming request
        .layer(OtelAxumLayer::default())
        .layer(tower_http::timeout::TimeoutLayer::new(
            std::time::Duration::from_secs(5),
        ));

    let addr = std::net::SocketAddr::from((
        [0, 0, 0, 0],
        std::env::var("PORT").map_or(Ok(8001), |p| p.parse())?,
    ));

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("🔄 Identity Verification Backend started on http://{addr}");

    let result = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(anyhow::Error::from);

    pool.close();
    tracing::info!(in_flight = pool.in_flight(), "Verification pool closed");

    result
}
