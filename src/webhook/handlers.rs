use axum::{
    body::Bytes,
    extract::State,
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use log::{debug, info, trace};
use serde::{de::DeserializeOwned, Serialize};
use tokio::task;

use super::{error::WebhookError, AppState};
use crate::{
    endpoint::{Changes, DomainFilter, Endpoint, MEDIA_TYPE_VERSION},
    executor::Executor,
    provider,
};

fn webhook_json<T: Serialize>(value: T) -> Response {
    ([(CONTENT_TYPE, MEDIA_TYPE_VERSION)], Json(value)).into_response()
}

fn parse<T: DeserializeOwned>(body: &Bytes) -> Result<T, WebhookError> {
    serde_json::from_slice(body).map_err(|e| WebhookError::BadRequest(e.to_string()))
}

// Run blocking provider work off the async workers
async fn blocking<F, T, E>(f: F) -> Result<T, WebhookError>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<WebhookError> + Send + 'static,
{
    task::spawn_blocking(f)
        .await
        .map_err(|e| WebhookError::Internal(e.to_string()))?
        .map_err(Into::into)
}

/// `GET /`: domain filter negotiation
pub async fn negotiate(State(state): State<AppState>) -> Response {
    debug!("Negotiating domain filter with ExternalDNS");
    webhook_json(DomainFilter {
        include: state.domains.domains().to_vec(),
        exclude: Vec::new(),
    })
}

pub async fn healthz() -> &'static str {
    "OK"
}

/// `GET /records`: all record sets of the managed domains
pub async fn get_records(State(state): State<AppState>) -> Result<Response, WebhookError> {
    let AppState {
        provider, domains, ..
    } = state;
    let sets = blocking(move || provider::current_state(provider.as_ref(), &domains)).await?;

    let endpoints = sets.into_iter().map(|s| s.endpoint).collect::<Vec<_>>();
    debug!("Returning {} record sets", endpoints.len());
    Ok(webhook_json(endpoints))
}

/// `POST /records`: apply a change set
pub async fn apply_changes(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<StatusCode, WebhookError> {
    let changes: Changes = parse(&body)?;
    trace!("Received changes: {:?}", changes);
    if changes.is_empty() {
        debug!("Received empty change set");
    }

    let result = blocking(move || {
        Executor::new(state.provider.as_ref(), &state.domains, state.default_ttl).sync(&changes)
    })
    .await?;
    info!("Applied {} record changes", result.total());
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /adjustendpoints`: normalize names the way records are stored
pub async fn adjust_endpoints(body: Bytes) -> Result<Response, WebhookError> {
    let endpoints: Vec<Endpoint> = parse(&body)?;
    let adjusted = endpoints
        .into_iter()
        .map(Endpoint::normalized)
        .collect::<Vec<_>>();
    trace!("Adjusted endpoints: {:?}", adjusted);
    Ok(webhook_json(adjusted))
}
