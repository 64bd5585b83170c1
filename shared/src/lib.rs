//! Shared library for the quiz generator service.
//!
//! Holds everything except HTTP routing: configuration, the error taxonomy, the
//! generation pipeline (prompt, rate limiting, retries, backend client, parsing)
//! and question storage.

pub mod backend;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod generator;
pub mod http;
pub mod models;
pub mod parser;
pub mod prompt;
pub mod rate_limit;
pub mod retry;

pub use backend::{BackendReply, GenerationBackend, HttpBackend};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use db::{create_pool, PgQuestionStore, QuestionStore};
pub use error::{Error, Result};
pub use generator::GenerationClient;
pub use http::{error_response, json_response, ApiResponse};
pub use models::{
    GenerateQuizPayload, GenerateQuizResponse, GenerationRequest, Pagination, ParsedQuestion,
    QuestionPage, QuestionRecord,
};
pub use parser::parse_questions;
pub use rate_limit::RateLimiter;
pub use retry::RetryPolicy;
