use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::server::endpoints::{assignments, parse, status};
use crate::types::AppState;

mod endpoints;
mod types;

pub use endpoints::parse::{ParseRequest, ParseResponse};

/// Creates a router that can be used by `axum`.
///
/// # Parameters
/// - `app_state`: The app server state.
///
/// # Returns
/// The router.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let assignments_router = Router::new()
        .route(
            "/assignments",
            get(assignments::get_assignments).delete(assignments::delete_assignments),
        )
        .route(
            "/assignments/:course",
            get(assignments::get_course_assignments),
        )
        .route("/saved_course", get(assignments::get_saved_course));

    Router::new()
        .route("/health", get(status::get_health))
        .route("/parse", post(parse::post_parse))
        .merge(assignments_router)
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const PAGE: &str = r#"
        <html><body>
            <nav class="ic-app-crumbs"><ul>
                <li><span>Dashboard</span></li>
                <li><span>CS101</span></li>
            </ul></nav>
            <div class="assignment">
                <a class="ig-title" href="/courses/1/assignments/1">Final Project</a>
                <div class="assignment-date-due"><span class="screenreader-only">Dec 31, 2999 at 11:59pm</span></div>
            </div>
        </body></html>
    "#;

    fn app() -> Router {
        create_router(Arc::new(AppState::new(Store::in_memory().unwrap())))
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_parse_then_read_back() {
        let app = app();
        let body = json!({ "html": PAGE, "url": "https://canvas.example.edu/courses/1/assignments" });

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/parse")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let parsed = body_json(response).await;
        assert_eq!(parsed["outcome"]["status"], "saved");
        assert_eq!(parsed["valid"], 1);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/assignments/CS101")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let records = body_json(response).await;
        assert_eq!(records[0]["name"], "Final Project");
        assert_eq!(
            records[0]["url"],
            "https://canvas.example.edu/courses/1/assignments/1"
        );

        let response = app
            .oneshot(Request::builder().uri("/saved_course").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_json(response).await["saved_course"], "CS101");
    }

    #[tokio::test]
    async fn test_unknown_course_is_not_found() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/assignments/NOPE")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_parse_rejects_bad_url() {
        let body = json!({ "html": PAGE, "url": "not a url" });
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/parse")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
