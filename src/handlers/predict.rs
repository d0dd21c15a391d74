//! Prediction handler

use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::features::{FeatureFrame, PREDICTION_COLUMN, PROBABILITY_COLUMN};
use crate::model::InferenceEngine;
use crate::{AppError, AppResult, AppState};

/// Form field carrying the CSV upload
const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    pub predictions: Vec<Map<String, Value>>,
}

/// Score an uploaded CSV and return the first rows with predictions appended
pub async fn predict_file(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<PredictionResponse>> {
    let mut multipart = multipart.map_err(|rejection| {
        tracing::debug!("Multipart rejected: {}", rejection.body_text());
        AppError::BadRequest("There was an error parsing the body".to_string())
    })?;

    let mut upload: Option<Bytes> = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload.csv").to_string();
        let data = field.bytes().await?;

        tracing::info!("Received file: {} ({} bytes)", file_name, data.len());
        upload = Some(data);
        break;
    }

    let data = upload.ok_or_else(|| AppError::Validation(format!("Field required: {}", FILE_FIELD)))?;

    let engine = state.engine.clone();
    let limit = state.config.preview_rows;
    let predictions = tokio::task::spawn_blocking(move || score_upload(&engine, &data, limit)).await??;

    Ok(Json(PredictionResponse { predictions }))
}

/// Parse, score every row, keep the first `limit` rows
pub fn score_upload(engine: &InferenceEngine, data: &[u8], limit: usize) -> AppResult<Vec<Map<String, Value>>> {
    let frame = FeatureFrame::from_bytes(data)?;
    let predictions = engine.predict(frame.to_matrix().view())?;

    let mut records = frame.head_records(limit);
    for (record, prediction) in records.iter_mut().zip(&predictions) {
        record.insert(PREDICTION_COLUMN.to_string(), Value::from(prediction.label));
        record.insert(PROBABILITY_COLUMN.to_string(), Value::from(prediction.probability));
    }

    tracing::debug!(
        "Scored {} rows, returning {}, {} flagged",
        predictions.len(),
        records.len(),
        predictions.iter().filter(|p| p.label == 1).count()
    );

    Ok(records)
}
