use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Failures surfaced by the HTTP layer, each mapped to a status code.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Missing multipart field 'file'")]
    MissingFile,

    #[error("Malformed multipart request: {0}")]
    BadMultipart(String),

    #[error("Uploaded file exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("Uploaded file is not a decodable image: {0}")]
    UndecodableImage(String),

    #[error("Model failure: {0}")]
    Model(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingFile | ApiError::BadMultipart(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::UndecodableImage(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Model(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::warn!(error = %self, "Rejected request");
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
