use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

use crate::server::types::ApiErrorType;
use crate::types::AppState;

fn store_error(context: &str, e: impl ToString) -> Response {
    error!("{context}: {}", e.to_string());
    ApiErrorType::from((StatusCode::INTERNAL_SERVER_ERROR, context, Some(e.to_string())))
        .into_response()
}

/// GET /assignments
/// Returns every saved course with its assignments
pub async fn get_assignments(State(s): State<Arc<AppState>>) -> Response {
    info!("GET /assignments");

    match s.store.load_assignments() {
        Ok(saved) => (StatusCode::OK, Json(saved.assignments)).into_response(),
        Err(e) => store_error("Failed to load saved assignments", e),
    }
}

/// GET /assignments/:course
/// Returns the saved assignments for one course
pub async fn get_course_assignments(
    Path(course): Path<String>,
    State(s): State<Arc<AppState>>,
) -> Response {
    info!("GET /assignments/{}", course);

    match s.store.load_assignments() {
        Ok(mut saved) => match saved.assignments.remove(&course) {
            Some(records) => (StatusCode::OK, Json(records)).into_response(),
            None => ApiErrorType::from((
                StatusCode::NOT_FOUND,
                "No saved assignments for course",
                Some(course),
            ))
            .into_response(),
        },
        Err(e) => store_error("Failed to load saved assignments", e),
    }
}

/// GET /saved_course
/// Returns the most recently processed course (empty if the last run saved nothing)
pub async fn get_saved_course(State(s): State<Arc<AppState>>) -> Response {
    info!("GET /saved_course");

    match s.store.load_assignments() {
        Ok(saved) => {
            (StatusCode::OK, Json(json!({ "saved_course": saved.saved_course }))).into_response()
        }
        Err(e) => store_error("Failed to load saved course", e),
    }
}

/// DELETE /assignments
/// Clears every saved assignment
pub async fn delete_assignments(State(s): State<Arc<AppState>>) -> Response {
    info!("DELETE /assignments");

    match s.store.clear_saved_assignments() {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => store_error("Failed to clear saved assignments", e),
    }
}
