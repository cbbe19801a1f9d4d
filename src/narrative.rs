//! Narrative generation through an external text-completion service.
//!
//! Narrative text is decoration: the pipeline asks for it after scoring and
//! after executing actions, and any failure is replaced by a fixed sentinel.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Narrative text used whenever the service call fails
pub const NARRATIVE_ERROR_SENTINEL: &str = "Error calling narrative model";

/// Narrative text used when narrative generation is switched off
pub const NARRATIVE_DISABLED: &str = "Narrative generation disabled";

#[derive(Debug, Error)]
pub enum NarrativeError {
    #[error("narrative request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("narrative service returned status {0}")]
    Status(u16),

    #[error("narrative response contained no text")]
    EmptyResponse,
}

/// Opaque text-completion oracle
#[async_trait]
pub trait Narrator: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, NarrativeError>;
}

/// Ask `narrator` for text, substituting the sentinel on failure.
pub async fn narrate_or_sentinel(narrator: &dyn Narrator, prompt: &str) -> String {
    match narrator.complete(prompt).await {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "Narrative generation failed, using sentinel");
            NARRATIVE_ERROR_SENTINEL.to_string()
        }
    }
}

/// Returns the same text for every prompt
#[derive(Debug, Clone)]
pub struct StaticNarrator {
    text: String,
}

impl StaticNarrator {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn disabled() -> Self {
        Self::new(NARRATIVE_DISABLED)
    }
}

#[async_trait]
impl Narrator for StaticNarrator {
    async fn complete(&self, _prompt: &str) -> Result<String, NarrativeError> {
        Ok(self.text.clone())
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [CompletionMessage<'a>; 1],
}

#[derive(Serialize)]
struct CompletionMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

/// Messages-style completion endpoint over HTTP
pub struct HttpNarrator {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    max_tokens: u32,
}

impl HttpNarrator {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Self, NarrativeError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            model: model.into(),
            max_tokens,
        })
    }
}

#[async_trait]
impl Narrator for HttpNarrator {
    async fn complete(&self, prompt: &str) -> Result<String, NarrativeError> {
        let request = CompletionRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: [CompletionMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self.client.post(&self.endpoint).json(&request).send().await?;
        if !response.status().is_success() {
            return Err(NarrativeError::Status(response.status().as_u16()));
        }

        let body: CompletionResponse = response.json().await?;
        let text = body
            .content
            .into_iter()
            .find_map(|block| block.text)
            .filter(|text| !text.trim().is_empty())
            .ok_or(NarrativeError::EmptyResponse)?;

        debug!(model = %self.model, chars = text.len(), "Narrative generated");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Unreachable;

    #[async_trait]
    impl Narrator for Unreachable {
        async fn complete(&self, _prompt: &str) -> Result<String, NarrativeError> {
            Err(NarrativeError::Status(503))
        }
    }

    #[tokio::test]
    async fn test_static_narrator() {
        let narrator = StaticNarrator::new("looks fine");
        assert_eq!(narrate_or_sentinel(&narrator, "prompt").await, "looks fine");
    }

    #[tokio::test]
    async fn test_failure_becomes_sentinel() {
        assert_eq!(
            narrate_or_sentinel(&Unreachable, "prompt").await,
            NARRATIVE_ERROR_SENTINEL
        );
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_becomes_sentinel() {
        let narrator = HttpNarrator::new(
            "http://127.0.0.1:9/v1/messages",
            "model",
            16,
            Duration::from_millis(200),
        )
        .unwrap();

        assert_eq!(
            narrate_or_sentinel(&narrator, "prompt").await,
            NARRATIVE_ERROR_SENTINEL
        );
    }

    #[test]
    fn test_completion_response_parsing() {
        let raw = r#"{"content":[{"type":"text","text":"Likely fraud."}]}"#;
        let body: CompletionResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(body.content[0].text.as_deref(), Some("Likely fraud."));
    }
}
