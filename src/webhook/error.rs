use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use log::{error, warn};
use thiserror::Error;

use crate::{executor::ExecutorError, fqdn::ResolveError, provider::ProviderError};

/// Error answered to ExternalDNS.
///
/// ExternalDNS only tells client errors (4xx, not retried) apart from server errors (5xx, retried later)
#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("invalid request body: {0}")]
    BadRequest(String),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("no provider record id known for record set `{0}`")]
    MissingRecordId(String),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ExecutorError> for WebhookError {
    fn from(e: ExecutorError) -> Self {
        match e {
            ExecutorError::Resolve(e) => WebhookError::Resolve(e),
            ExecutorError::MissingRecordId(s) => WebhookError::MissingRecordId(s),
            ExecutorError::Provider(e) => WebhookError::Provider(e),
        }
    }
}

impl WebhookError {
    pub fn status(&self) -> StatusCode {
        match self {
            WebhookError::BadRequest(_) | WebhookError::Resolve(_) => StatusCode::BAD_REQUEST,
            WebhookError::MissingRecordId(_)
            | WebhookError::Provider(_)
            | WebhookError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Rejected request: {}", self);
        }
        (status, self.to_string()).into_response()
    }
}
