//! Error handling

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::features::{frame::format_column_list, FrameError};
use crate::model::ModelError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub enum AppError {
    // Upload is missing required feature columns
    MissingColumns(Vec<String>),

    // Request body could not be read
    BadRequest(String),

    // Required form field absent
    Validation(String),

    // Parse, transform or scoring failure
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingColumns(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn detail(&self) -> String {
        match self {
            AppError::MissingColumns(columns) => format!("Missing columns: {}", format_column_list(columns)),
            AppError::BadRequest(msg) | AppError::Validation(msg) | AppError::Internal(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = self.detail();

        match &self {
            AppError::Internal(_) => tracing::error!("Prediction failed: {}", detail),
            _ => tracing::debug!("Rejected request ({}): {}", status.as_u16(), detail),
        }

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

impl From<FrameError> for AppError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::MissingColumns(columns) => AppError::MissingColumns(columns),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<ModelError> for AppError {
    fn from(err: ModelError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        tracing::debug!("Multipart error: {}", err.body_text());
        AppError::BadRequest("There was an error parsing the body".to_string())
    }
}
