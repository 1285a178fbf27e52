use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use core_sim::SimError;
use runtime::{ExportError, SessionError};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Export(#[from] ExportError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Session(SessionError::Closed) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Session(SessionError::Rejected(err)) => match err {
                SimError::InvalidActionQuantity(_) | SimError::InvalidPrice(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                SimError::InvalidState { .. }
                | SimError::NoMarketPrice
                | SimError::ActionLimitReached { .. } => StatusCode::CONFLICT,
                SimError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
