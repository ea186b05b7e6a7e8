use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use chainrun_core::error::ChainError;

/// A [`ChainError`] rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub ChainError);

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        if self.0.is_not_found() {
            StatusCode::NOT_FOUND
        } else if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        }
        let body = Json(serde_json::json!({ "detail": self.0.to_string() }));
        (status, body).into_response()
    }
}
