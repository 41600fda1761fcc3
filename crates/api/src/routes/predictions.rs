//! Prediction Routes

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use inference_engine::{ClassLabel, ImageRef, PredictionRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::service::{ServiceError, Upload};
use crate::AppState;

/// Query parameters for uploads
#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    /// Original file name, used as a type hint
    pub filename: Option<String>,
}

/// Prediction as rendered by clients
#[derive(Debug, Serialize)]
pub struct PredictionView {
    pub class_label: ClassLabel,
    pub display_name: &'static str,
    pub localized_name: &'static str,
    pub code: &'static str,
    pub color: &'static str,
    pub confidence_percent: f64,
    pub inference_latency_seconds: f64,
    pub probabilities: [f32; 3],
    pub source_image: ImageRef,
    pub predicted_at: DateTime<Utc>,
}

impl From<PredictionRecord> for PredictionView {
    fn from(record: PredictionRecord) -> Self {
        let label = record.class_label;
        Self {
            class_label: label,
            display_name: label.display_name(),
            localized_name: label.localized_name(),
            code: label.code(),
            color: label.color(),
            confidence_percent: record.confidence_percent,
            inference_latency_seconds: record.inference_latency_seconds,
            probabilities: record.probabilities,
            source_image: record.source_image,
            predicted_at: record.predicted_at,
        }
    }
}

/// Shown once per session after the model was loaded
#[derive(Debug, Serialize)]
pub struct ModelLoadNotice {
    pub model_load_duration_seconds: f64,
}

/// Response for the upload endpoint
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub session_id: Uuid,
    pub prediction: PredictionView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_load: Option<ModelLoadNotice>,
}

/// Submit an image for classification
pub async fn submit_prediction(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    Query(params): Query<UploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SubmitResponse>, ServiceError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let upload = Upload {
        bytes: body,
        content_type,
        file_name: params.filename,
    };
    let outcome = state.service.submit(session_id, upload).await?;

    Ok(Json(SubmitResponse {
        session_id,
        prediction: outcome.record.into(),
        model_load: outcome
            .model_load_seconds
            .map(|secs| ModelLoadNotice {
                model_load_duration_seconds: secs,
            }),
    }))
}

/// Get the current (last good) prediction
pub async fn get_prediction(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<PredictionView>, ServiceError> {
    let result = state.service.current(session_id)?;
    Ok(Json(result.record.into()))
}

/// Clear the session's prediction
pub async fn clear_prediction(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.service.clear(session_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Serve the upload behind the current prediction
pub async fn get_image(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let result = state.service.current(session_id)?;
    let mime = result.record.source_image.kind.mime_type();
    Ok(([(header::CONTENT_TYPE, mime)], result.image).into_response())
}
