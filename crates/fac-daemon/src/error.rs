//! HTTP mapping of engine errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fac_schemas::FinanceError;

use crate::api_types::ErrorResponse;

#[derive(Debug)]
pub enum ApiError {
    Finance(FinanceError),
    /// No usable principal on the request.
    Unauthenticated(String),
}

impl From<FinanceError> for ApiError {
    fn from(e: FinanceError) -> Self {
        ApiError::Finance(e)
    }
}

pub fn status_for(e: &FinanceError) -> StatusCode {
    match e {
        FinanceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        FinanceError::InvalidStateTransition { .. } => StatusCode::CONFLICT,
        FinanceError::NotFound { .. } => StatusCode::NOT_FOUND,
        FinanceError::Conflict(_) => StatusCode::CONFLICT,
        FinanceError::CollaboratorUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        FinanceError::Forbidden(_) => StatusCode::FORBIDDEN,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Finance(e) => (
                status_for(&e),
                ErrorResponse {
                    error: e.code().to_string(),
                    message: e.to_string(),
                },
            ),
            ApiError::Unauthenticated(message) => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse {
                    error: "UNAUTHENTICATED".to_string(),
                    message,
                },
            ),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
