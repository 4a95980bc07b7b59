//! Anthropic Messages API adapter.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{LanguageModel, ModelError};
use crate::config::AnthropicConfig;

const API_VERSION: &str = "2023-06-01";

/// Claude over HTTP.
///
/// With a prefill the request ends with an assistant turn holding it, and the
/// prefill is put back in front of the returned text so callers see the
/// complete reply. `complete` uses the configured prefill.
#[derive(Clone)]
pub struct AnthropicModel {
    client: reqwest::Client,
    api_key: String,
    settings: AnthropicConfig,
    name: String,
}

impl AnthropicModel {
    pub fn new(api_key: impl Into<String>, settings: AnthropicConfig) -> Result<Self, ModelError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(ModelError::NoApiKey);
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ModelError::Network(e.to_string()))?;
        Ok(Self {
            client,
            api_key,
            name: format!("anthropic/{}", settings.model),
            settings,
        })
    }

    /// Read the key from `ANTHROPIC_API_KEY`.
    pub fn from_env(settings: AnthropicConfig) -> Result<Self, ModelError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| ModelError::NoApiKey)?;
        Self::new(api_key, settings)
    }

    fn headers(&self) -> Result<HeaderMap, ModelError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|_| ModelError::Api { status: 0, message: "invalid API key characters".into() })?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        Ok(headers)
    }

    fn request<'a>(&'a self, prompt: &'a str, prefill: &'a str) -> ApiRequest<'a> {
        let mut messages = vec![ApiMessage { role: "user", content: prompt }];
        if !prefill.is_empty() {
            messages.push(ApiMessage {
                role: "assistant",
                content: prefill,
            });
        }
        ApiRequest {
            model: &self.settings.model,
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            messages,
        }
    }
}

#[async_trait]
impl LanguageModel for AnthropicModel {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        self.complete_prefilled(prompt, &self.settings.prefill).await
    }

    async fn complete_prefilled(&self, prompt: &str, prefill: &str) -> Result<String, ModelError> {
        let response = self
            .client
            .post(&self.settings.endpoint)
            .headers(self.headers()?)
            .json(&self.request(prompt, prefill))
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ModelError::RateLimited);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ModelError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ApiResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Parse(e.to_string()))?;
        debug!(model = %self.settings.model, stop_reason = ?body.stop_reason, "completion received");

        let text: String = body
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect();
        if text.is_empty() {
            return Err(ModelError::EmptyCompletion);
        }

        Ok(format!("{prefill}{text}"))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ApiMessage<'a>>,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_key_rejected() {
        let err = AnthropicModel::new("", AnthropicConfig::default()).err();
        assert_eq!(err, Some(ModelError::NoApiKey));
    }

    #[test]
    fn test_request_carries_prefill() {
        let model = AnthropicModel::new("sk-test", AnthropicConfig::default()).unwrap();
        let json = serde_json::to_value(model.request("next events?", "[")).unwrap();

        let messages = json["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[0]["content"], "next events?");
        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(messages[1]["content"], "[");
        assert_eq!(model.name(), "anthropic/claude-3-5-sonnet-20241022");
    }

    #[test]
    fn test_request_without_prefill() {
        let model = AnthropicModel::new("sk-test", AnthropicConfig::default()).unwrap();
        let json = serde_json::to_value(model.request("hi", "")).unwrap();
        assert_eq!(json["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_response_blocks() {
        let body: ApiResponse = serde_json::from_str(
            r#"{"content":[{"type":"text","text":"{\"a\":1}]"},{"type":"tool_use","id":"x"}],"stop_reason":"end_turn"}"#,
        )
        .unwrap();
        assert_eq!(body.content.len(), 2);
        assert!(matches!(&body.content[0], ContentBlock::Text { text } if text == "{\"a\":1}]"));
        assert!(matches!(body.content[1], ContentBlock::Other));
    }
}
