//! OpenAI 임베딩 (`/v1/embeddings`)
//!
//! 배치 하나를 요청 하나로 보냅니다. 응답은 `index` 기준으로 정렬합니다.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::EmbeddingProvider;

const OPENAI_EMBED_URL: &str = "https://api.openai.com/v1/embeddings";

/// 기본 모델
pub const DEFAULT_MODEL: &str = "text-embedding-ada-002";

/// ada-002 고정 차원
const ADA_DIMENSION: usize = 1536;

/// OpenAI 임베딩 구현체
#[derive(Debug, Clone)]
pub struct OpenAiEmbedding {
    client: reqwest::Client,
    model: String,
    dimension: usize,
    /// text-embedding-3 계열만 dimensions 파라미터를 받음
    request_dimensions: Option<usize>,
}

impl OpenAiEmbedding {
    /// 새 OpenAI 임베딩 클라이언트
    ///
    /// # Arguments
    /// * `api_key` - OpenAI API 키
    /// * `model` - 모델 이름 (None이면 `text-embedding-ada-002`)
    /// * `dimension` - 출력 차원 (None이면 1536)
    pub fn new(api_key: String, model: Option<String>, dimension: Option<usize>) -> Result<Self> {
        anyhow::ensure!(!api_key.trim().is_empty(), "missing OpenAI API key");
        let model = model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let dimension = dimension.unwrap_or(ADA_DIMENSION);

        let supports_dimensions = model.starts_with("text-embedding-3");
        if !supports_dimensions && dimension != ADA_DIMENSION {
            anyhow::bail!(
                "Model {} has a fixed dimension of {}; got {}",
                model,
                ADA_DIMENSION,
                dimension
            );
        }

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
            client,
            model,
            dimension,
            request_dimensions: supports_dimensions.then_some(dimension),
        })
    }

    async fn request(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: inputs,
            dimensions: self.request_dimensions,
        };

        let resp = self
            .client
            .post(OPENAI_EMBED_URL)
            .json(&request)
            .send()
            .await
            .context("failed to call OpenAI embeddings")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            anyhow::bail!("OpenAI embeddings request failed ({}): {}", status, body);
        }

        let mut parsed: EmbeddingResponse = resp
            .json()
            .await
            .context("failed to parse OpenAI embedding response")?;
        parsed.data.sort_by_key(|entry| entry.index);
        anyhow::ensure!(
            parsed.data.len() == inputs.len(),
            "OpenAI returned {} embeddings for {} inputs",
            parsed.data.len(),
            inputs.len()
        );

        Ok(parsed.data.into_iter().map(|entry| entry.embedding).collect())
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.request(&[text]).await?;
        vectors
            .pop()
            .ok_or_else(|| anyhow::anyhow!("OpenAI returned no embedding"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let inputs: Vec<&str> = texts.iter().map(String::as_str).collect();
        self.request(&inputs).await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model
    }
}
