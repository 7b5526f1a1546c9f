use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use raahein_core::CoreError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Unauthorized(String),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Json(#[from] JsonRejection),
    #[error(transparent)]
    Query(#[from] QueryRejection),
    #[error(transparent)]
    Path(#[from] PathRejection),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Json(rejection) => rejection.status(),
            AppError::Query(rejection) => rejection.status(),
            AppError::Path(rejection) => rejection.status(),
            AppError::Core(err) => match err {
                CoreError::NotFound { .. } => StatusCode::NOT_FOUND,
                CoreError::NotOwner(_) | CoreError::Forbidden(_) | CoreError::NotEligible(_) => {
                    StatusCode::FORBIDDEN
                }
                CoreError::InvalidState(_) | CoreError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                CoreError::Conflict(_) => StatusCode::CONFLICT,
                CoreError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = match self {
            AppError::Core(CoreError::Storage(msg)) => {
                tracing::error!("Internal Server Error: {}", msg);
                "Internal Server Error".to_string()
            }
            AppError::Unauthorized(msg) => msg,
            AppError::Json(rejection) => rejection.body_text(),
            AppError::Query(rejection) => rejection.body_text(),
            AppError::Path(rejection) => rejection.body_text(),
            AppError::Core(err) => {
                tracing::debug!(status = %status, "Request refused: {}", err);
                message(err)
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// The caller-facing text, without the variant prefix `Display` adds.
fn message(err: CoreError) -> String {
    match err {
        CoreError::NotOwner(msg)
        | CoreError::Forbidden(msg)
        | CoreError::NotEligible(msg)
        | CoreError::InvalidState(msg)
        | CoreError::Conflict(msg)
        | CoreError::InvalidInput(msg)
        | CoreError::Storage(msg) => msg,
        not_found @ CoreError::NotFound { .. } => not_found.to_string(),
    }
}
