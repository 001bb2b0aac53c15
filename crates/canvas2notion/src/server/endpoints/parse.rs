use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use url::Url;

use crate::extract::{self, ExtractError, RunSummary};
use crate::notify::{notify_all, CollectingNotifier};
use crate::server::types::ApiErrorType;
use crate::types::AppState;

/// Body of POST /parse.
#[derive(Debug, Deserialize)]
pub struct ParseRequest {
    /// Rendered HTML of a Canvas assignments page
    pub html: String,
    /// Page URL, used to resolve relative assignment links
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ParseResponse {
    #[serde(flatten)]
    pub summary: RunSummary,
    pub notifications: Vec<String>,
}

/// POST /parse
/// Extracts assignments from the posted page and merges them into the store
pub async fn post_parse(
    State(s): State<Arc<AppState>>,
    Json(request): Json<ParseRequest>,
) -> Response {
    info!("POST /parse ({} bytes)", request.html.len());

    let page_url = match request.url.as_deref().map(Url::parse).transpose() {
        Ok(url) => url,
        Err(e) => {
            return ApiErrorType::from((
                StatusCode::BAD_REQUEST,
                "Invalid page URL",
                Some(e.to_string()),
            ))
            .into_response()
        }
    };

    // Parsing and SQLite I/O are blocking; keep them off the async workers
    let run = tokio::task::spawn_blocking(move || {
        extract::process_page(&s.store, &request.html, page_url.as_ref(), Utc::now())
    })
    .await;

    let result = match run {
        Ok(result) => result,
        Err(e) => {
            error!("Extraction task failed: {}", e);
            return ApiErrorType::from((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Extraction run failed",
                Some(e.to_string()),
            ))
            .into_response();
        }
    };

    match result {
        Ok(summary) => {
            let mut notifier = CollectingNotifier::default();
            notify_all(&summary.diagnostics, &mut notifier);
            let response = ParseResponse {
                summary,
                notifications: notifier.messages,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            error!("Extraction run failed: {}", e);
            let status = match e {
                ExtractError::MixedCourses { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            ApiErrorType::from((status, "Extraction run failed", Some(e.to_string())))
                .into_response()
        }
    }
}
