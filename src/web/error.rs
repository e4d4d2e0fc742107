use crate::error::ForumError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

pub struct AppError(pub ForumError);

impl AppError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ForumError::InvalidData(_) => StatusCode::BAD_REQUEST,
            ForumError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ForumError::Forbidden => StatusCode::FORBIDDEN,
            ForumError::NotFound(_) => StatusCode::NOT_FOUND,
            ForumError::BackendUnsupported(_) | ForumError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self.0 {
            ForumError::Internal(e) => {
                tracing::error!("Application error: {:?}", e);
                "Internal server error".to_string()
            }
            ForumError::BackendUnsupported(_) => {
                tracing::warn!("{}", self.0);
                self.0.to_string()
            }
            other => other.to_string(),
        };
        let body = serde_json::json!({
            "error": status.canonical_reason().unwrap_or("Error"),
            "message": message,
        });
        (status, Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<ForumError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

pub type AppResult<T> = Result<T, AppError>;
