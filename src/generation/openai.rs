//! OpenAI Chat Completions

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::{GenerationProvider, GenerationRequest};

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

/// 기본 모델
pub const DEFAULT_MODEL: &str = "gpt-4";

pub struct OpenAiChat {
    model: String,
    client: reqwest::Client,
}

impl OpenAiChat {
    pub fn new(api_key: String, model: Option<String>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).context("invalid OpenAI API key")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .default_headers(headers)
            .build()
            .context("failed to build OpenAI HTTP client")?;

        Ok(Self {
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            client,
        })
    }
}

#[async_trait]
impl GenerationProvider for OpenAiChat {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: request.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: request.user_prompt,
                },
            ],
        };

        let resp = self
            .client
            .post(OPENAI_CHAT_URL)
            .json(&body)
            .send()
            .await
            .context("failed to call OpenAI chat completions")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            bail!("OpenAI returned {}: {}", status, text);
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .context("failed to parse OpenAI response")?;

        answer_text(parsed)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// 첫 번째 비어 있지 않은 선택지의 내용. 없으면 에러
fn answer_text(response: ChatResponse) -> Result<String> {
    if response.choices.is_empty() {
        bail!("OpenAI returned no choices");
    }

    response
        .choices
        .into_iter()
        .filter_map(|choice| choice.message.content)
        .find(|content| !content.trim().is_empty())
        .ok_or_else(|| anyhow::anyhow!("OpenAI returned an empty answer"))
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_model() {
        let chat = OpenAiChat::new("sk-test".to_string(), None).unwrap();
        assert_eq!(chat.name(), "gpt-4");
    }

    #[test]
    fn test_answer_text() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"Borrowing lends access."}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(answer_text(parsed).unwrap(), "Borrowing lends access.");
    }

    #[test]
    fn test_null_content_is_error() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert!(answer_text(parsed).is_err());
    }

    #[test]
    fn test_empty_choices_is_error() {
        let parsed: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        let err = answer_text(parsed).unwrap_err();
        assert!(err.to_string().contains("no choices"));
    }
}
