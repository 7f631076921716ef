//! HTTP surface spoken by ExternalDNS.
//!
//! ExternalDNS runs this service as a sidecar and talks to it over the webhook provider protocol:
//! - `GET /` negotiates the domain filter
//! - `GET /records` returns the current record sets
//! - `POST /records` applies a change set
//! - `POST /adjustendpoints` normalizes endpoints before planning
//!
//! `GET /healthz` is a liveness probe that never contacts the provider.

mod error;
mod handlers;

pub use self::error::WebhookError;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    extract::Request,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        Method, StatusCode,
    },
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use log::{error, info};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use crate::{config::Ttl, fqdn::ManagedDomains, provider::Provider};

/// Shared state of all request handlers
#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn Provider>,
    pub domains: ManagedDomains,
    pub default_ttl: Ttl,
}

/// Build the webhook router with all routes and the CORS policy applied
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION, ACCEPT])
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/", get(handlers::negotiate))
        .route("/healthz", get(handlers::healthz))
        .route(
            "/records",
            get(handlers::get_records).post(handlers::apply_changes),
        )
        .route("/adjustendpoints", post(handlers::adjust_endpoints))
        .with_state(state)
        .layer(cors)
        .layer(middleware::from_fn(options_no_content))
}

// The cors layer answers every OPTIONS request with an empty 200
async fn options_no_content(req: Request, next: Next) -> Response {
    let options = req.method() == Method::OPTIONS;
    let mut resp = next.run(req).await;
    if options && resp.status() == StatusCode::OK {
        *resp.status_mut() = StatusCode::NO_CONTENT;
    }
    resp
}

/// Serve the webhook on `addr` until the process receives Ctrl-C
pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Webhook listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Unable to listen for shutdown signal: {}", e);
    }
    info!("Shutting down");
}
