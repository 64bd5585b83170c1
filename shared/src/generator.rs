//! Question generation: prompt, throttled and retried backend call, parsing.

use std::sync::Arc;

use tracing::{info, warn};

use crate::backend::{GenerationBackend, HttpBackend};
use crate::clock::{Clock, SystemClock};
use crate::models::{GenerationRequest, ParsedQuestion};
use crate::parser::parse_questions;
use crate::prompt::build_prompt;
use crate::rate_limit::RateLimiter;
use crate::retry::RetryPolicy;
use crate::{Config, Error, Result};

/// Turns a [`GenerationRequest`] into parsed questions.
pub struct GenerationClient {
    backend: Arc<dyn GenerationBackend>,
    limiter: RateLimiter,
    retry: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl GenerationClient {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        limiter: RateLimiter,
        retry: RetryPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            backend,
            limiter,
            retry,
            clock,
        }
    }

    /// HTTP backend on the wall clock, configured from `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let backend = Arc::new(HttpBackend::from_config(config)?);

        Ok(Self::new(
            backend,
            RateLimiter::new(config.min_interval, clock.clone()),
            RetryPolicy::default().with_max_attempts(config.max_attempts),
            clock,
        ))
    }

    /// Generate and parse questions for `request`.
    ///
    /// Every attempt, retries included, passes through the rate limiter.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<Vec<ParsedQuestion>> {
        let prompt = build_prompt(request);
        let prompt = prompt.as_str();

        let reply = self
            .retry
            .run(self.clock.as_ref(), |attempt| async move {
                let waited = self.limiter.acquire().await;
                info!(
                    attempt,
                    waited_ms = waited.as_millis() as u64,
                    "Calling generation backend"
                );
                self.backend.complete(prompt).await
            })
            .await?;

        let text = reply.into_text();
        let questions = parse_questions(&text, request.requested_count as usize).map_err(|e| {
            warn!(error = %e, reply_chars = text.chars().count(), "Backend reply was unusable");
            Error::Parse("backend produced no valid questions".to_string())
        })?;

        info!(
            requested = request.requested_count,
            produced = questions.len(),
            "Generated questions"
        );
        Ok(questions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendReply;
    use crate::clock::ManualClock;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replays queued results and records every prompt it receives.
    struct ScriptedBackend {
        replies: Mutex<VecDeque<Result<BackendReply>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn new(replies: Vec<Result<BackendReply>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl GenerationBackend for ScriptedBackend {
        async fn complete(&self, prompt: &str) -> Result<BackendReply> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::Internal("script exhausted".into())))
        }
    }

    fn request(count: u32) -> GenerationRequest {
        GenerationRequest {
            topics: vec!["geography".to_string()],
            question_type: "short answer".to_string(),
            difficulty: "easy".to_string(),
            requested_count: count,
        }
    }

    fn client(backend: Arc<ScriptedBackend>, clock: Arc<ManualClock>) -> GenerationClient {
        GenerationClient::new(
            backend,
            RateLimiter::new(Duration::from_secs(1), clock.clone()),
            RetryPolicy::default(),
            clock,
        )
    }

    fn text(body: &str) -> Result<BackendReply> {
        Ok(BackendReply::Text(body.to_string()))
    }

    #[tokio::test]
    async fn test_generates_parsed_questions() {
        let backend = ScriptedBackend::new(vec![text(
            "1. What is 2+2?\n||4\n2. Capital of France?\n||Paris",
        )]);
        let clock = Arc::new(ManualClock::new());

        let questions = client(backend.clone(), clock).generate(&request(5)).await.unwrap();

        assert_eq!(
            questions,
            vec![
                ParsedQuestion::new("What is 2+2?", "4"),
                ParsedQuestion::new("Capital of France?", "Paris"),
            ]
        );
        assert!(backend.prompts.lock().unwrap()[0].contains("geography"));
    }

    #[tokio::test]
    async fn test_retries_transient_failures_then_succeeds() {
        let backend = ScriptedBackend::new(vec![
            Err(Error::BackendTransient("timed out".into())),
            Err(Error::BackendTransient("502 Bad Gateway".into())),
            text("1. Q?\n|| A"),
        ]);
        let clock = Arc::new(ManualClock::new());

        let questions = client(backend.clone(), clock.clone())
            .generate(&request(5))
            .await
            .unwrap();

        assert_eq!(questions.len(), 1);
        assert_eq!(backend.calls(), 3);
        // Backoff sleeps exceed the rate-limit interval, so the limiter never waits.
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_secs(5), Duration::from_secs(10)]
        );
    }

    #[tokio::test]
    async fn test_gives_up_after_three_transient_failures() {
        let backend = ScriptedBackend::new(vec![
            Err(Error::BackendTransient("connection refused".into())),
            Err(Error::BackendTransient("connection refused".into())),
            Err(Error::BackendTransient("connection refused".into())),
        ]);
        let clock = Arc::new(ManualClock::new());

        let err = client(backend.clone(), clock)
            .generate(&request(5))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::BackendTransient(_)));
        assert_eq!(backend.calls(), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_surfaced_immediately() {
        let backend = ScriptedBackend::new(vec![Err(Error::BackendPermanent(
            "404 model not found".into(),
        ))]);
        let clock = Arc::new(ManualClock::new());

        let err = client(backend.clone(), clock)
            .generate(&request(5))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::BackendPermanent(_)));
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_unusable_reply_is_a_parse_error() {
        let backend = ScriptedBackend::new(vec![text("I cannot help with that.")]);
        let clock = Arc::new(ManualClock::new());

        let err = client(backend, clock).generate(&request(5)).await.unwrap_err();

        assert!(matches!(err, Error::Parse(_)));
    }

    #[tokio::test]
    async fn test_unexpected_shape_is_still_parsed() {
        let backend = ScriptedBackend::new(vec![Ok(BackendReply::UnexpectedShape(
            serde_json::Value::String("1. Q?\n|| A".into()),
        ))]);
        let clock = Arc::new(ManualClock::new());

        let questions = client(backend, clock).generate(&request(5)).await.unwrap();

        assert_eq!(questions, vec![ParsedQuestion::new("Q?", "A")]);
    }

    #[tokio::test]
    async fn test_consecutive_requests_are_throttled() {
        let backend = ScriptedBackend::new(vec![text("1. Q?\n|| A"), text("1. R?\n|| B")]);
        let clock = Arc::new(ManualClock::new());
        let client = client(backend, clock.clone());

        client.generate(&request(1)).await.unwrap();
        clock.advance(Duration::from_millis(400));
        client.generate(&request(1)).await.unwrap();

        assert_eq!(clock.sleeps(), vec![Duration::from_millis(600)]);
    }
}
