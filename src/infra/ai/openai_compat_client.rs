// Client for OpenAI-style `/chat/completions` endpoints.
//
// DeepSeek, xAI (Grok) and Groq all speak this dialect, so one client covers
// them; only the base URL and the label used in logs and errors differ.

use super::http_errors::{classify_failure, transport_failure};
use crate::core::ai::{AiMessage, AiProvider, GenerationParams, ProviderError};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com/v1";
pub const XAI_BASE_URL: &str = "https://api.x.ai/v1";
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

pub struct OpenAiCompatClient {
    client: Client,
    label: String,
    base_url: String,
    api_key: String,
}

impl OpenAiCompatClient {
    pub fn new(label: impl Into<String>, base_url: impl Into<String>, api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            label: label.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn deepseek(api_key: String) -> Self {
        Self::new("DeepSeek", DEEPSEEK_BASE_URL, api_key)
    }

    pub fn xai(api_key: String) -> Self {
        Self::new("Grok", XAI_BASE_URL, api_key)
    }

    pub fn groq(api_key: String) -> Self {
        Self::new("Groq", GROQ_BASE_URL, api_key)
    }

    fn payload(messages: &[AiMessage], model: &str, params: &GenerationParams) -> serde_json::Value {
        let mut payload = json!({
            "model": model,
            "messages": messages,
            "temperature": params.temperature,
        });
        if let Some(max_tokens) = params.max_tokens {
            payload["max_tokens"] = json!(max_tokens);
        }
        payload
    }

    fn extract_content(&self, response_json: &serde_json::Value) -> Result<String, ProviderError> {
        response_json["choices"][0]["message"]["content"]
            .as_str()
            .filter(|content| !content.trim().is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                ProviderError::Failed(format!("Failed to parse {} response content", self.label))
            })
    }
}

#[async_trait]
impl AiProvider for OpenAiCompatClient {
    async fn chat_complete(
        &self,
        messages: &[AiMessage],
        model: &str,
        params: &GenerationParams,
    ) -> Result<String, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let payload = Self::payload(messages, model, params);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| transport_failure(&self.label, e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let text = response.text().await.unwrap_or_default();
            return Err(classify_failure(&self.label, status, retry_after.as_deref(), &text));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| transport_failure(&self.label, e))?;

        if let Some(tokens) = response_json["usage"]["total_tokens"].as_u64() {
            tracing::debug!(backend = %self.label, model, tokens, "Completion usage");
        }

        self.extract_content(&response_json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_carries_params() {
        let messages = vec![AiMessage::system("be nice"), AiMessage::user("bob: hey")];
        let payload = OpenAiCompatClient::payload(&messages, "deepseek-chat", &GenerationParams::default());

        assert_eq!(payload["model"], "deepseek-chat");
        assert_eq!(payload["max_tokens"], 1000);
        assert_eq!(payload["messages"][0]["role"], "system");
        assert_eq!(payload["messages"][1]["content"], "bob: hey");
    }

    #[test]
    fn payload_omits_missing_max_tokens() {
        let params = GenerationParams {
            temperature: 0.5,
            max_tokens: None,
        };
        let payload = OpenAiCompatClient::payload(&[], "m", &params);
        assert!(payload.get("max_tokens").is_none());
    }

    #[test]
    fn content_is_extracted_from_first_choice() {
        let client = OpenAiCompatClient::groq("key".to_string());
        let body = json!({ "choices": [{ "message": { "role": "assistant", "content": "hi!" } }] });
        assert_eq!(client.extract_content(&body).unwrap(), "hi!");

        let empty = json!({ "choices": [] });
        assert!(matches!(
            client.extract_content(&empty),
            Err(ProviderError::Failed(_))
        ));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = OpenAiCompatClient::new("Custom", "https://example.test/v1/", "k".to_string());
        assert_eq!(client.base_url, "https://example.test/v1");
    }
}
