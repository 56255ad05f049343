use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// API 错误类型
pub struct AppError(pub StatusCode, pub anyhow::Error);

pub type Result<T, E = AppError> = std::result::Result<T, E>;

impl AppError {
    pub fn unauthorized(msg: &str) -> Self {
        Self(StatusCode::UNAUTHORIZED, anyhow::anyhow!("{msg}"))
    }

    pub fn not_found(msg: &str) -> Self {
        Self(StatusCode::NOT_FOUND, anyhow::anyhow!("{msg}"))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.0, format!("Something went wrong: {}", self.1)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(StatusCode::INTERNAL_SERVER_ERROR, err.into())
    }
}
