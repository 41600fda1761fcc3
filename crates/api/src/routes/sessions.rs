//! Session Routes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::service::ServiceError;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct SessionCreated {
    pub session_id: Uuid,
}

/// Open a new session
pub async fn create_session(State(state): State<Arc<AppState>>) -> Response {
    match state.service.sessions().create() {
        Ok(session_id) => (StatusCode::CREATED, Json(SessionCreated { session_id })).into_response(),
        Err(e) => ServiceError::from(e).into_response(),
    }
}

/// End a session
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Response {
    match state.service.sessions().remove(session_id) {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => super::not_found(format!("Session {} not found", session_id)),
        Err(e) => ServiceError::from(e).into_response(),
    }
}
