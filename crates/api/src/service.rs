//! Classification service
//!
//! One `submit` call per user interaction: boundary check, preprocessing,
//! model resolution, inference, and session cache update.

use axum::http::StatusCode;
use bytes::Bytes;
use image_preprocessor::{ImagePreprocessor, UnsupportedFormatError, UploadKind};
use inference_engine::{ImageRef, InferenceEngine, InferenceError, PredictionRecord};
use model_provider::{ModelAcquisitionError, ModelHandle, ModelProvider};
use session_cache::{SessionError, SessionId, SessionResult, SessionStore};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Any failure of a submission
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    UnsupportedFormat(#[from] UnsupportedFormatError),
    #[error(transparent)]
    ModelAcquisition(#[from] ModelAcquisitionError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("Preprocessing worker panicked")]
    PreprocessPanicked,
}

impl ServiceError {
    /// Stable error kind for clients and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::UnsupportedFormat(_) => "unsupported_format",
            ServiceError::ModelAcquisition(_) => "model_acquisition",
            ServiceError::Inference(_) => "inference",
            ServiceError::Session(SessionError::NotFound(_)) => "session_not_found",
            ServiceError::Session(SessionError::Busy(_)) => "session_busy",
            ServiceError::Session(SessionError::NoResult(_)) => "no_result",
            ServiceError::Session(SessionError::Lock(_)) => "internal",
            ServiceError::Session(SessionError::Full(_)) => "capacity",
            ServiceError::PreprocessPanicked => "internal",
        }
    }

    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ServiceError::ModelAcquisition(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::Session(SessionError::NotFound(_) | SessionError::NoResult(_)) => {
                StatusCode::NOT_FOUND
            }
            ServiceError::Session(SessionError::Busy(_)) => StatusCode::CONFLICT,
            ServiceError::Session(SessionError::Full(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Session(SessionError::Lock(_)) | ServiceError::PreprocessPanicked => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Raw upload with its declared type
#[derive(Debug, Clone)]
pub struct Upload {
    pub bytes: Bytes,
    pub content_type: Option<String>,
    pub file_name: Option<String>,
}

/// Successful submission
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub record: PredictionRecord,
    /// Model load duration, reported once per session
    pub model_load_seconds: Option<f64>,
}

/// Serves predictions for all sessions of the process
pub struct ClassificationService {
    provider: Arc<ModelProvider>,
    preprocessor: ImagePreprocessor,
    engine: InferenceEngine,
    sessions: Arc<SessionStore>,
}

impl ClassificationService {
    /// Create a new service
    pub fn new(
        provider: Arc<ModelProvider>,
        preprocessor: ImagePreprocessor,
        engine: InferenceEngine,
        sessions: Arc<SessionStore>,
    ) -> Self {
        info!("Creating classification service");
        Self {
            provider,
            preprocessor,
            engine,
            sessions,
        }
    }

    pub fn provider(&self) -> &ModelProvider {
        &self.provider
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Resolve the model ahead of the first submission
    pub async fn warm_up(&self) -> Result<ModelHandle, ModelAcquisitionError> {
        self.provider.get_model().await
    }

    /// Classify an upload for a session and cache the result.
    ///
    /// Rejected uploads leave the session untouched. A failure after the
    /// session entered `Computing` restores its last good result.
    pub async fn submit(
        &self,
        session: SessionId,
        upload: Upload,
    ) -> Result<SubmitOutcome, ServiceError> {
        let result = self.try_submit(session, upload).await;
        match &result {
            Ok(outcome) => {
                metrics::counter!("predictions_total", "label" => outcome.record.class_label.as_str())
                    .increment(1);
                metrics::histogram!("inference_latency_seconds")
                    .record(outcome.record.inference_latency_seconds);
            }
            Err(e) => {
                warn!("Submission for session {} failed: {}", session, e);
                metrics::counter!("prediction_failures_total", "kind" => e.kind()).increment(1);
            }
        }
        result
    }

    async fn try_submit(
        &self,
        session: SessionId,
        upload: Upload,
    ) -> Result<SubmitOutcome, ServiceError> {
        let declared =
            UploadKind::from_hint(upload.content_type.as_deref(), upload.file_name.as_deref())?;
        if !self.sessions.contains(session)? {
            return Err(SessionError::NotFound(session).into());
        }

        let preprocessor = self.preprocessor.clone();
        let raw = upload.bytes.clone();
        let (kind, tensor) = tokio::task::spawn_blocking(move || preprocessor.preprocess_upload(&raw))
            .await
            .map_err(|_| ServiceError::PreprocessPanicked)??;
        if kind != declared {
            debug!(
                "Session {}: upload declared {:?} but decoded as {:?}",
                session, declared, kind
            );
        }

        let guard = self.sessions.begin_submission(session)?;

        let model = match self.warm_up().await {
            Ok(model) => model,
            Err(e) => {
                guard.fail();
                return Err(e.into());
            }
        };

        let source = ImageRef::new(kind, upload.file_name.clone(), upload.bytes.len());
        let record = match self.engine.predict(&model, tensor, source).await {
            Ok(record) => record,
            Err(e) => {
                guard.fail();
                return Err(e.into());
            }
        };

        guard.complete(SessionResult {
            record: record.clone(),
            image: upload.bytes,
        })?;

        let model_load_seconds = self
            .sessions
            .take_load_notice(session)?
            .then(|| model.load_duration_secs());

        info!(
            "Session {}: {} ({:.2}%) in {:.4}s",
            session,
            record.class_label.display_name(),
            record.confidence_percent,
            record.inference_latency_seconds
        );
        Ok(SubmitOutcome {
            record,
            model_load_seconds,
        })
    }

    /// Latest result of a session
    pub fn current(&self, session: SessionId) -> Result<SessionResult, ServiceError> {
        self.sessions
            .current(session)?
            .ok_or_else(|| SessionError::NoResult(session).into())
    }

    /// Forget a session's result
    pub fn clear(&self, session: SessionId) -> Result<(), ServiceError> {
        Ok(self.sessions.clear(session)?)
    }
}
