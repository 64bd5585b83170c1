//! Client for the text-generation backend.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{Config, Error, Result};

/// A single prompt-in, text-out backend call. Implementations classify their
/// failures into [`Error::BackendTransient`] or [`Error::BackendPermanent`].
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<BackendReply>;
}

/// Payload returned by the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendReply {
    /// The expected shape: a JSON object whose `response` field is a string
    Text(String),
    /// Anything else; still handed to the parser after coercion
    UnexpectedShape(Value),
}

impl BackendReply {
    pub fn from_payload(payload: Value) -> Self {
        match payload.get("response") {
            Some(Value::String(text)) => BackendReply::Text(text.clone()),
            _ => BackendReply::UnexpectedShape(payload),
        }
    }

    /// Coerce the reply to text. Malformed replies are rendered rather than rejected.
    pub fn into_text(self) -> String {
        match self {
            BackendReply::Text(text) => text,
            BackendReply::UnexpectedShape(payload) => {
                warn!("Backend reply has no string `response` field, coercing");
                match payload {
                    Value::String(text) => text,
                    Value::Object(mut fields) => match fields.remove("response") {
                        Some(Value::String(text)) => text,
                        Some(other) => other.to_string(),
                        None => Value::Object(fields).to_string(),
                    },
                    other => other.to_string(),
                }
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

/// Backend reached over HTTP with a JSON `{model, prompt, stream, options}` body.
pub struct HttpBackend {
    http_client: reqwest::Client,
    endpoint: String,
    model: String,
    temperature: f32,
}

impl HttpBackend {
    pub fn from_config(config: &Config) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            endpoint: config.backend_url.clone(),
            model: config.backend_model.clone(),
            temperature: config.backend_temperature,
        })
    }
}

#[async_trait]
impl GenerationBackend for HttpBackend {
    async fn complete(&self, prompt: &str) -> Result<BackendReply> {
        let body = GenerateBody {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(classify_send_error)?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::BackendTransient(format!("Failed to read backend reply: {}", e)))?;

        if !status.is_success() {
            let message = format!("Backend returned {}: {}", status, snippet(&text));
            return Err(classify_status(status.as_u16(), message));
        }

        debug!(bytes = text.len(), "Received backend reply");

        match serde_json::from_str::<Value>(&text) {
            Ok(payload) => Ok(BackendReply::from_payload(payload)),
            Err(_) => Ok(BackendReply::UnexpectedShape(Value::String(text))),
        }
    }
}

fn classify_send_error(e: reqwest::Error) -> Error {
    if e.is_timeout() || e.is_connect() || e.is_request() {
        Error::BackendTransient(format!("Backend request failed: {}", e))
    } else {
        Error::BackendPermanent(format!("Backend request failed: {}", e))
    }
}

/// 5xx and 429 are worth retrying; every other non-success status is final.
pub fn classify_status(status: u16, message: String) -> Error {
    if status >= 500 || status == 429 {
        Error::BackendTransient(message)
    } else {
        Error::BackendPermanent(message)
    }
}

fn snippet(text: &str) -> String {
    text.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_response_field_is_text() {
        let reply = BackendReply::from_payload(json!({"model": "llama3", "response": "1. Q\n|| A"}));
        assert_eq!(reply, BackendReply::Text("1. Q\n|| A".to_string()));
    }

    #[test]
    fn test_missing_response_field_is_coerced() {
        let reply = BackendReply::from_payload(json!({"done": true}));
        assert!(matches!(reply, BackendReply::UnexpectedShape(_)));
        assert_eq!(reply.into_text(), r#"{"done":true}"#);
    }

    #[test]
    fn test_non_string_response_field_is_rendered() {
        let reply = BackendReply::from_payload(json!({"response": ["1. Q || A"]}));
        assert_eq!(reply.into_text(), r#"["1. Q || A"]"#);
    }

    #[test]
    fn test_plain_text_body_passes_through() {
        let reply = BackendReply::UnexpectedShape(Value::String("1. Q\n|| A".into()));
        assert_eq!(reply.into_text(), "1. Q\n|| A");
    }

    #[test]
    fn test_status_classification() {
        assert!(classify_status(503, "unavailable".into()).is_transient());
        assert!(classify_status(429, "slow down".into()).is_transient());
        assert!(!classify_status(404, "no such model".into()).is_transient());
        assert!(!classify_status(400, "bad prompt".into()).is_transient());
    }

    #[test]
    fn test_request_body_shape() {
        let body = GenerateBody {
            model: "llama3",
            prompt: "hi",
            stream: false,
            options: GenerateOptions { temperature: 0.5 },
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"model": "llama3", "prompt": "hi", "stream": false, "options": {"temperature": 0.5}})
        );
    }
}
