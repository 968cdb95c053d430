//! Maps [`EngineError`] onto the HTTP boundary (`§6.1`, `§7`): a status code plus, where the
//! error has one, the machine-readable `code` the spec reserves for client-actionable cases.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use mta_core::error::EngineError;
use serde::Serialize;

/// `§7`: "HTTP errors carry `{success:false, message, code?}`".
#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
    code: Option<&'static str>,
}

pub struct ApiError(pub EngineError);

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            EngineError::Validation(_) => StatusCode::BAD_REQUEST,
            EngineError::InvalidScenario(_) => StatusCode::BAD_REQUEST,
            EngineError::MaxTestsReached => StatusCode::TOO_MANY_REQUESTS,
            EngineError::TestNotFound(_) => StatusCode::NOT_FOUND,
            EngineError::InvalidStatus(_) => StatusCode::CONFLICT,
            EngineError::TestActive(_) => StatusCode::CONFLICT,
            EngineError::Llm(_) => StatusCode::BAD_GATEWAY,
            EngineError::GameClient(_) => StatusCode::BAD_GATEWAY,
            EngineError::Voice(_) => StatusCode::BAD_GATEWAY,
            EngineError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            EngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        } else {
            tracing::warn!(error = %self.0, "request rejected");
        }

        let body = ErrorBody { success: false, message: self.0.to_string(), code: self.0.code() };
        (status, Json(body)).into_response()
    }
}
