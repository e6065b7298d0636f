use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{CompletionProvider, CompletionRequest, CompletionResponse, UsageMetadata};
use crate::error::{Error, Result};

/// Remote completion provider using an OpenAI-compatible HTTP API
pub struct RemoteCompletionProvider {
    base_url: String,
    api_key: String,
    model: String,
    default_timeout: Duration,
    default_max_tokens: usize,
    default_temperature: f32,
    client: reqwest::Client,
}

impl RemoteCompletionProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            default_timeout: Duration::from_secs(30),
            default_max_tokens: 500,
            default_temperature: 0.7,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_defaults(
        mut self,
        timeout_secs: u64,
        max_tokens: usize,
        temperature: f32,
    ) -> Self {
        self.default_timeout = Duration::from_secs(timeout_secs);
        self.default_max_tokens = max_tokens;
        self.default_temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait::async_trait]
impl CompletionProvider for RemoteCompletionProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let timeout = request
            .timeout_seconds
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout);

        let max_tokens = request.max_tokens.unwrap_or(self.default_max_tokens);
        let temperature = request.temperature.unwrap_or(self.default_temperature);

        // Build OpenAI-compatible request
        let req_body = OpenAiRequest {
            model: self.model.clone(),
            messages: request
                .messages
                .iter()
                .map(|turn| Message {
                    role: turn.role.as_str().to_string(),
                    content: turn.content.clone(),
                })
                .collect(),
            max_tokens: Some(max_tokens),
            temperature: Some(temperature),
        };

        // Make HTTP request with timeout
        let response = tokio::time::timeout(
            timeout,
            self.client
                .post(&self.base_url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&req_body)
                .send(),
        )
        .await
        .map_err(|_| Error::completion_unavailable("request timed out"))?
        .map_err(Error::completion_unavailable)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::completion_unavailable(format!("{}: {}", status, body)));
        }

        let resp_body: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| Error::MalformedModelOutput(format!("invalid completion body: {}", e)))?;

        let choice = resp_body
            .choices
            .first()
            .ok_or_else(|| Error::MalformedModelOutput("completion has no choices".into()))?;

        let usage = resp_body.usage.unwrap_or_default();
        let usage = UsageMetadata {
            prompt_tokens: usage.prompt_tokens.unwrap_or(0),
            completion_tokens: usage.completion_tokens.unwrap_or(0),
            total_tokens: usage.total_tokens.unwrap_or(0),
        };

        Ok(CompletionResponse {
            content: choice.message.content.clone(),
            usage,
            model: resp_body.model.unwrap_or_else(|| self.model.clone()),
        })
    }
}

/// Build the provider from configuration, reading the bearer key from the
/// env var named there. Returns `CredentialMissing` when no key is set so
/// the caller can run without a completion capability.
pub fn provider_from_config(config: &common::LlmConfig) -> Result<RemoteCompletionProvider> {
    let api_key_env = config.api_key_env.as_deref().ok_or(Error::CredentialMissing)?;
    let api_key = std::env::var(api_key_env).map_err(|_| Error::CredentialMissing)?;

    let api_url = config
        .api_url
        .clone()
        .unwrap_or_else(|| "http://localhost:11434/v1/chat/completions".to_string());
    let model = config
        .model
        .clone()
        .unwrap_or_else(|| "qwen/qwen3-32b".to_string());

    Ok(RemoteCompletionProvider::new(api_url, api_key, model).with_defaults(
        config.timeout_seconds.unwrap_or(30),
        config.max_tokens.unwrap_or(500),
        0.7,
    ))
}

// OpenAI API request/response structures
#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    model: Option<String>,
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: Option<usize>,
    #[serde(default)]
    completion_tokens: Option<usize>,
    #[serde(default)]
    total_tokens: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;

    #[test]
    fn request_serializes_roles_lowercase() {
        let req = OpenAiRequest {
            model: "m".into(),
            messages: vec![Message {
                role: Role::System.as_str().into(),
                content: "hi".into(),
            }],
            max_tokens: None,
            temperature: None,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains(r#""role":"system""#));
        assert!(!json.contains("max_tokens"));
    }
}
