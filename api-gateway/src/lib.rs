//! Quiz API - routes and handlers.
//!
//! Endpoints:
//! - GET / - Informational page
//! - GET /health - Liveness probe
//! - POST /api/generate-quiz - Generate, store and return questions
//! - GET /api/questions - List stored questions, newest first

use std::any::Any;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use shared::{
    error_response, json_response, ApiResponse, Error, GenerateQuizPayload, GenerateQuizResponse,
    GenerationClient, GenerationRequest, QuestionPage, QuestionStore,
};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PER_PAGE: u32 = 10;
pub const MAX_PER_PAGE: u32 = 50;

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>Quiz Generator</title>
</head>
<body>
    <h1>Quiz Generator API</h1>
    <p>Use POST /api/generate-quiz with a JSON payload:
       <code>{"topics": ["..."], "type": "multiple choice", "difficulty": "medium", "num_questions": 5}</code></p>
    <p>Use GET /api/questions?page=1&amp;per_page=10 to retrieve saved questions</p>
</body>
</html>
"#;

/// Application state shared across requests.
pub struct AppState {
    pub generator: GenerationClient,
    pub store: Arc<dyn QuestionStore>,
    pub max_questions: u32,
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/generate-quiz", post(generate_quiz))
        .route("/api/questions", get(list_questions))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(handle_panic))
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health() -> Response {
    json_response(200, &ApiResponse::success(serde_json::json!({ "status": "ok" })))
}

async fn generate_quiz(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let started = Instant::now();

    let request = match parse_generate_request(&body, state.max_questions) {
        Ok(request) => request,
        Err(e) => return e.into_response(),
    };

    info!(
        topics = ?request.topics,
        question_type = %request.question_type,
        difficulty = %request.difficulty,
        requested = request.requested_count,
        "Generating quiz"
    );

    let questions = match state.generator.generate(&request).await {
        Ok(questions) => questions,
        Err(e) => {
            warn!(kind = e.kind(), error = %e, "Quiz generation failed");
            return e.into_response();
        }
    };

    let mut response = GenerateQuizResponse {
        success: true,
        count: questions.len(),
        questions,
        processing_time: 0.0,
        warning: None,
        db_error: None,
    };

    let status = match state.store.save_questions(&request, &response.questions).await {
        Ok(()) => 200,
        Err(e) => {
            warn!(error = %e, "Questions generated but not saved");
            response.warning = Some("Questions generated but not saved".to_string());
            response.db_error = Some(e.to_string());
            207
        }
    };

    response.processing_time = started.elapsed().as_secs_f64();
    json_response(status, &response)
}

fn parse_generate_request(body: &[u8], max_questions: u32) -> shared::Result<GenerationRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(Error::validation("Request payload missing"));
    }

    let payload: GenerateQuizPayload = serde_json::from_slice(body).map_err(|e| {
        Error::Validation {
            message: "Invalid input".to_string(),
            details: [("body".to_string(), e.to_string())].into_iter().collect(),
        }
    })?;

    GenerationRequest::from_payload(payload, max_questions)
}

/// Raw pagination query. Unparseable values fall back to defaults.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    page: Option<String>,
    per_page: Option<String>,
}

impl PageParams {
    /// Resolve to `(page, per_page)` with `page >= 1` and `per_page` in `[1, MAX_PER_PAGE]`.
    pub fn resolve(&self) -> (u32, u32) {
        let page = parse_number(self.page.as_deref())
            .unwrap_or(i64::from(DEFAULT_PAGE))
            .clamp(1, i64::from(u32::MAX)) as u32;
        let per_page = parse_number(self.per_page.as_deref())
            .unwrap_or(i64::from(DEFAULT_PER_PAGE))
            .clamp(1, i64::from(MAX_PER_PAGE)) as u32;
        (page, per_page)
    }
}

fn parse_number(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|v| v.trim().parse().ok())
}

#[derive(Debug, Serialize)]
struct ListQuestionsResponse {
    success: bool,
    #[serde(flatten)]
    page: QuestionPage,
}

async fn list_questions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PageParams>,
) -> Response {
    let (page, per_page) = params.resolve();

    match state.store.list_questions(page, per_page).await {
        Ok(page) => json_response(
            200,
            &ListQuestionsResponse {
                success: true,
                page,
            },
        ),
        Err(e) => {
            error!(error = %e, "Failed to fetch questions");
            e.into_response()
        }
    }
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(panic = detail, "Unexpected error while handling request");
    error_response(500, "Internal server error")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(page: Option<&str>, per_page: Option<&str>) -> PageParams {
        PageParams {
            page: page.map(String::from),
            per_page: per_page.map(String::from),
        }
    }

    #[test]
    fn test_page_params_defaults() {
        assert_eq!(PageParams::default().resolve(), (1, 10));
        assert_eq!(params(Some("abc"), Some("")).resolve(), (1, 10));
    }

    #[test]
    fn test_page_params_clamped() {
        assert_eq!(params(Some("0"), Some("500")).resolve(), (1, 50));
        assert_eq!(params(Some("-4"), Some("0")).resolve(), (1, 1));
        assert_eq!(params(Some("3"), Some("25")).resolve(), (3, 25));
    }

    #[test]
    fn test_empty_body_is_missing_payload() {
        let err = parse_generate_request(b"  ", 20).unwrap_err();
        assert_eq!(err.public_message(), "Request payload missing");
    }

    #[test]
    fn test_wrong_json_type_is_validation_error() {
        let err = parse_generate_request(br#"{"topics": "rust"}"#, 20).unwrap_err();
        match err {
            Error::Validation { details, .. } => assert!(details.contains_key("body")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
