//! Shared data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::Result;

pub const DEFAULT_QUESTION_TYPE: &str = "multiple choice";
pub const DEFAULT_DIFFICULTY: &str = "medium";
pub const DEFAULT_QUESTION_COUNT: i64 = 5;

/// Generate quiz request payload, as sent by the caller.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct GenerateQuizPayload {
    #[serde(default)]
    #[validate(
        length(min = 1, message = "At least one topic is required"),
        custom(function = "validate_topics")
    )]
    pub topics: Vec<String>,
    #[serde(rename = "type")]
    pub question_type: Option<String>,
    pub difficulty: Option<String>,
    pub num_questions: Option<i64>,
}

fn validate_topics(topics: &[String]) -> std::result::Result<(), ValidationError> {
    if topics.iter().any(|t| t.trim().is_empty()) {
        let mut err = ValidationError::new("blank_topic");
        err.message = Some("Topics must be non-empty strings".into());
        return Err(err);
    }
    Ok(())
}

/// A normalised generation request. `requested_count` is always within `[1, max_questions]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub topics: Vec<String>,
    pub question_type: String,
    pub difficulty: String,
    pub requested_count: u32,
}

impl GenerationRequest {
    /// Validate a caller payload and apply defaults and the server-side count cap.
    pub fn from_payload(payload: GenerateQuizPayload, max_questions: u32) -> Result<Self> {
        payload.validate()?;

        let max = max_questions.max(1);
        let requested = payload.num_questions.unwrap_or(DEFAULT_QUESTION_COUNT);
        let requested_count = requested.clamp(1, i64::from(max)) as u32;

        Ok(Self {
            topics: payload
                .topics
                .iter()
                .map(|t| t.trim().to_string())
                .collect(),
            question_type: non_blank_or(payload.question_type, DEFAULT_QUESTION_TYPE),
            difficulty: non_blank_or(payload.difficulty, DEFAULT_DIFFICULTY),
            requested_count,
        })
    }
}

fn non_blank_or(value: Option<String>, default: &str) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// One question/answer pair extracted from generated text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedQuestion {
    #[serde(rename = "question")]
    pub question_text: String,
    #[serde(rename = "answer")]
    pub answer_text: String,
}

impl ParsedQuestion {
    pub fn new(question_text: impl Into<String>, answer_text: impl Into<String>) -> Self {
        Self {
            question_text: question_text.into(),
            answer_text: answer_text.into(),
        }
    }
}

/// Stored question row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct QuestionRecord {
    pub id: Uuid,
    pub topics: Json<Vec<String>>,
    pub question_text: String,
    pub correct_answer: String,
    pub question_type: String,
    pub difficulty: String,
    pub created_at: DateTime<Utc>,
}

/// Pagination metadata for list responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
    pub pages: i64,
}

impl Pagination {
    pub fn new(page: u32, per_page: u32, total: i64) -> Self {
        let per = i64::from(per_page.max(1));
        Self {
            page,
            per_page,
            total,
            pages: (total + per - 1) / per,
        }
    }
}

/// A page of stored questions.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionPage {
    pub data: Vec<QuestionRecord>,
    pub pagination: Pagination,
}

/// Generate quiz response payload.
#[derive(Debug, Serialize)]
pub struct GenerateQuizResponse {
    pub success: bool,
    pub questions: Vec<ParsedQuestion>,
    pub count: usize,
    /// Wall-clock seconds spent serving the request
    pub processing_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_error: Option<String>,
}
