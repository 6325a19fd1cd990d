//! REST API handlers
//!
//! Both POST endpoints always answer with a JSON envelope whose `status` is
//! `"success"` or `"error"`, including for bodies that fail to parse.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::AppState;
use crate::feedback::followup::FollowUpRequest;
use crate::feedback::FeedbackRequest;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ── Feedback ────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeedbackBody {
    pub question: Option<String>,
    pub text: Option<String>,
    pub model_preference: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FeedbackResponse {
    #[serde(rename_all = "camelCase")]
    Success {
        feedback: String,
        word_count: usize,
        student_text_numbered: String,
    },
    Error {
        message: String,
    },
}

/// Full report for one submission.
pub async fn feedback(
    State(state): State<Arc<AppState>>,
    body: Result<Json<FeedbackBody>, JsonRejection>,
) -> Json<FeedbackResponse> {
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => {
            warn!("Rejected feedback body: {}", rejection);
            return Json(FeedbackResponse::Error {
                message: rejection.body_text(),
            });
        }
    };

    let request = FeedbackRequest {
        question: body.question.unwrap_or_default(),
        text: body.text.unwrap_or_default(),
        model_preference: body.model_preference,
    };
    info!(
        "Feedback requested ({} chars, preference {:?})",
        request.text.chars().count(),
        request.model_preference
    );

    match state.service.run(&request).await {
        Ok(outcome) => Json(FeedbackResponse::Success {
            feedback: outcome.feedback,
            word_count: outcome.word_count,
            student_text_numbered: outcome.numbered_text,
        }),
        Err(e) => {
            warn!("Feedback request failed ({:?}): {}", e.kind(), e);
            Json(FeedbackResponse::Error {
                message: e.to_string(),
            })
        }
    }
}

// ── Follow-up ───────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FollowUpBody {
    pub question: Option<String>,
    pub original_question: Option<String>,
    pub original_text: Option<String>,
    pub feedback: Option<String>,
    pub model_preference: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FollowUpResponse {
    Success { answer: String },
    Error { message: String },
}

/// One follow-up question about an earlier report.
pub async fn follow_up(
    State(state): State<Arc<AppState>>,
    body: Result<Json<FollowUpBody>, JsonRejection>,
) -> Json<FollowUpResponse> {
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => {
            warn!("Rejected follow-up body: {}", rejection);
            return Json(FollowUpResponse::Error {
                message: rejection.body_text(),
            });
        }
    };

    let request = FollowUpRequest {
        question: body.question.unwrap_or_default(),
        original_question: body.original_question.unwrap_or_default(),
        original_text: body.original_text.unwrap_or_default(),
        feedback: body.feedback.unwrap_or_default(),
        model_preference: body.model_preference,
    };

    match state.service.answer(&request).await {
        Ok(answer) => Json(FollowUpResponse::Success { answer }),
        Err(e) => {
            warn!("Follow-up request failed ({:?}): {}", e.kind(), e);
            Json(FollowUpResponse::Error {
                message: e.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelSelection;
    use crate::feedback::testing::{Route, RoutedGenerator};
    use crate::feedback::FeedbackService;
    use crate::generation::GenerationError;
    use crate::http::create_router;
    use axum_test::TestServer;
    use serde_json::{json, Value};

    fn create_test_server(generator: RoutedGenerator) -> TestServer {
        let service = FeedbackService::new(Arc::new(generator), ModelSelection::default());
        TestServer::new(create_router(Arc::new(AppState::new(service)))).unwrap()
    }

    #[tokio::test]
    async fn health_reports_version() {
        let server = create_test_server(RoutedGenerator::clean());

        let response = server.get("/api/health").await;
        response.assert_status_ok();

        let body: HealthResponse = response.json();
        assert_eq!(body.status, "ok");
        assert_eq!(body.version, env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn feedback_success_envelope() {
        let server = create_test_server(RoutedGenerator::clean());

        let response = server
            .post("/api/feedback")
            .json(&json!({ "question": "Agree?", "text": "I agree. It is good.", "modelPreference": "pro" }))
            .await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(body["status"], "success");
        assert_eq!(body["wordCount"], 5);
        assert_eq!(body["studentTextNumbered"], "¶1 [S1] I agree. [S2] It is good.");
        assert!(body["feedback"].as_str().unwrap().starts_with("A. 配点サマリー"));
    }

    #[tokio::test]
    async fn feedback_without_text_is_error_envelope() {
        let server = create_test_server(RoutedGenerator::clean());

        let body: Value = server
            .post("/api/feedback")
            .json(&json!({ "question": "Agree?" }))
            .await
            .json();
        assert_eq!(body, json!({ "status": "error", "message": "入力されたテキストがありません。" }));
    }

    #[tokio::test]
    async fn feedback_upstream_failure_is_error_envelope() {
        let server = create_test_server(
            RoutedGenerator::clean().replace(Route::ContentEvaluation, Err(GenerationError::ConfigurationMissing)),
        );

        let body: Value = server
            .post("/api/feedback")
            .json(&json!({ "text": "I agree." }))
            .await
            .json();
        assert_eq!(body["status"], "error");
        assert!(body["message"].as_str().unwrap().contains("GEMINI_API_KEY"));
        assert!(body.get("feedback").is_none());
    }

    #[tokio::test]
    async fn unparseable_body_is_error_envelope() {
        let server = create_test_server(RoutedGenerator::clean());

        let response = server.post("/api/feedback").text("not json").await;
        let body: Value = response.json();
        assert_eq!(body["status"], "error");
        assert!(!body["message"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn qa_success_envelope() {
        let server = create_test_server(RoutedGenerator::clean());

        let body: Value = server
            .post("/api/qa")
            .json(&json!({ "question": "S1 はなぜ誤り？", "originalText": "I go yesterday." }))
            .await
            .json();
        assert_eq!(body, json!({ "status": "success", "answer": "S1 は時制が違います。" }));
    }

    #[tokio::test]
    async fn qa_without_question_is_error_envelope() {
        let server = create_test_server(RoutedGenerator::clean());

        let body: Value = server.post("/api/qa").json(&json!({})).await.json();
        assert_eq!(body, json!({ "status": "error", "message": "question が未指定です。" }));
    }
}
