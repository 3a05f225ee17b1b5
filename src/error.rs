//! API Error
//! ハンドラ共通のエラー型と `{success: false, error}` レスポンス

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::pricing::PricingError;
use crate::store::StoreError;
use crate::submission::{SubmissionError, ValidationErrors};

#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<ValidationErrors>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Please correct the errors before proceeding.")]
    Validation(ValidationErrors),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    BadGateway(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = self.to_string();
        warn!("API Error: {} ({})", error, status);

        let fields = match self {
            ApiError::Validation(fields) => Some(fields),
            _ => None,
        };
        (
            status,
            Json(ErrorResponse {
                success: false,
                error,
                fields,
            }),
        )
            .into_response()
    }
}

impl From<SubmissionError> for ApiError {
    fn from(err: SubmissionError) -> Self {
        match err {
            SubmissionError::Validation(fields) => ApiError::Validation(fields),
            SubmissionError::Commit(StoreError::DuplicateId(id)) => {
                ApiError::Conflict(format!("Error listing car: id {} already exists", id))
            }
            SubmissionError::WrongStep(step) => ApiError::BadRequest(format!("Cannot submit from the {:?} step", step)),
        }
    }
}

impl From<PricingError> for ApiError {
    fn from(err: PricingError) -> Self {
        match err {
            PricingError::MissingDetails => ApiError::BadRequest(err.to_string()),
            PricingError::NotConfigured => ApiError::Unavailable(err.to_string()),
            PricingError::Http(_) | PricingError::Upstream { .. } | PricingError::Malformed(_) => {
                ApiError::BadGateway(err.to_string())
            }
        }
    }
}
