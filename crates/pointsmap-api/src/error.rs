use axum::http::StatusCode;
use thiserror::Error;
use tracing::error;

/// Failures of the award, report and layout controllers.
#[derive(Debug, Error)]
pub enum PointsError {
    #[error("caller lacks grading capability")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("invalid request: {0}")]
    Invalid(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl PointsError {
    pub fn status(&self) -> StatusCode {
        match self {
            PointsError::Forbidden => StatusCode::FORBIDDEN,
            PointsError::NotFound(_) => StatusCode::NOT_FOUND,
            PointsError::Invalid(_) => StatusCode::BAD_REQUEST,
            PointsError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<PointsError> for StatusCode {
    fn from(err: PointsError) -> Self {
        match &err {
            PointsError::Storage(e) => error!("Storage failure: {:#}", e),
            other => tracing::debug!("Request rejected: {}", other),
        }
        err.status()
    }
}
