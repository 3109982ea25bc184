//! HTTP surface: routes, shared extensions and request tracing.

use axum::routing::any;
use axum::{Extension, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::proxy::handlers::handle_token;
use crate::registry::handlers::{handle_health, handle_home, handle_new};
use crate::registry::service::Registry;

/// Builds the discovery router.
///
/// Fixed routes are registered explicitly; every other path falls through to the
/// token proxy, which enforces the `[a-f0-9]{32}` token shape and per-route methods.
pub fn build_router(registry: Arc<Registry>) -> Router {
    let proxy = registry.proxy().clone();

    Router::new()
        .route("/", any(handle_home))
        .route("/new", any(handle_new))
        .route("/health", any(handle_health))
        .fallback(handle_token)
        .layer(Extension(registry))
        .layer(Extension(proxy))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

pub async fn serve(listener: TcpListener, router: Router) -> anyhow::Result<()> {
    tracing::info!("discovery serving on {}", listener.local_addr()?);
    axum::serve(listener, router).await?;
    Ok(())
}
