use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    /// The interaction stream for a build was empty. Scoring needs at least
    /// one user to establish normalization bounds.
    #[error("empty interaction stream: nothing to rank")]
    EmptyInput,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No snapshot has ever been published (first boot before a successful
    /// build, or the persisted snapshot failed to load).
    #[error("no recommendation snapshot loaded")]
    SnapshotUnavailable,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("snapshot build failed: {0}")]
    BuildFailed(String),

    #[error("snapshot persistence error: {0}")]
    Persistence(String),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let code = self.status_code();
        HttpResponse::build(code).json(ErrorResponse {
            error: self.to_string(),
            code: code.as_u16(),
        })
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_) | AppError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
            AppError::EmptyInput => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::SnapshotUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            AppError::BuildFailed(_) | AppError::Persistence(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Persistence(err.to_string())
    }
}
