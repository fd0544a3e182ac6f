use crate::topology::{Discovery, TopologyViews};
use anyhow::{Context, Result};
use axum::{
    Extension, Router,
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    routing::get,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{Span, debug_span, info};
use ulid::Ulid;

mod handlers;
pub mod shutdown;

pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: Option<&str> = built_info::GIT_COMMIT_HASH;

/// Read-only state shared with the handlers: the published views plus the
/// static index → host-name mapping. Handlers never touch probe connections.
#[derive(Clone)]
pub struct TopologyState {
    pub views: TopologyViews,
    pub host_names: Arc<[String]>,
}

/// Serves the topology over HTTP until a shutdown signal arrives.
///
/// # Errors
///
/// Returns an error if the listener cannot bind or the server fails.
pub async fn new(port: u16, listen: Option<String>, discovery: &Discovery) -> Result<()> {
    let state = TopologyState {
        views: discovery.views(),
        host_names: discovery.host_names(),
    };

    let app = Router::new()
        .route("/topology", get(handlers::topology))
        .route("/health", get(handlers::health).options(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(state)),
        );

    let addr = listen.unwrap_or_else(|| "::0".to_string());
    let listener = TcpListener::bind(format!("{addr}:{port}"))
        .await
        .with_context(|| format!("failed to bind {addr}:{port}"))?;

    info!(%addr, %port, "topology endpoint listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown::shutdown_signal_handler())
        .await?;

    Ok(())
}

// span carrying the request id so probe logs and request logs correlate
fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("");

    debug_span!(
        "http.request",
        http.method = %request.method(),
        http.url = %request.uri(),
        request_id = %request_id,
    )
}
