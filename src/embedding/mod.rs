//! 임베딩 모듈 - 텍스트 벡터화
//!
//! 텍스트를 고정 차원 벡터로 변환하는 프로바이더들입니다.
//! 수집과 질의는 반드시 같은 프로바이더/모델/차원을 사용해야 합니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = create_embedder(&EmbeddingConfig::default())?;
//! let embedding = embedder.embed("Hello, world!").await?;
//! ```

mod gemini;
mod openai;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::{EmbeddingConfig, Provider};

pub use gemini::GeminiEmbedding;
pub use openai::OpenAiEmbedding;

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
///
/// 텍스트를 벡터로 변환하는 인터페이스입니다.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 단일 텍스트 임베딩 (질의용)
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// 배치 임베딩 (문서 청크용, 기본 구현: 순차 호출)
    ///
    /// 결과 벡터의 순서는 입력 순서와 같습니다.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// 임베딩 차원 수
    fn dimension(&self) -> usize;

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// API Key Management
// ============================================================================

/// 프로바이더별 API 키 환경변수 (우선순위 순)
fn api_key_vars(provider: Provider) -> &'static [&'static str] {
    match provider {
        Provider::Gemini => &["GEMINI_API_KEY", "GOOGLE_AI_API_KEY"],
        Provider::OpenAi => &["OPENAI_API_KEY"],
    }
}

/// 키 조회 함수로 API 키 찾기 (우선순위 순, 빈 값은 건너뜀)
fn api_key_from<F>(provider: Provider, lookup: F) -> Option<(&'static str, String)>
where
    F: Fn(&str) -> Option<String>,
{
    api_key_vars(provider).iter().find_map(|var| {
        lookup(var)
            .filter(|key| !key.trim().is_empty())
            .map(|key| (*var, key))
    })
}

/// API 키 로드 (환경변수에서)
///
/// Gemini: `GEMINI_API_KEY` > `GOOGLE_AI_API_KEY`
/// OpenAI: `OPENAI_API_KEY`
pub fn get_api_key(provider: Provider) -> Result<String> {
    match api_key_from(provider, |var| std::env::var(var).ok()) {
        Some((var, key)) => {
            tracing::debug!("Using API key from {}", var);
            Ok(key)
        }
        None => anyhow::bail!(
            "API key not found. Set {} environment variable.",
            api_key_vars(provider).join(" or ")
        ),
    }
}

/// API 키 존재 여부 확인
pub fn has_api_key(provider: Provider) -> bool {
    api_key_from(provider, |var| std::env::var(var).ok()).is_some()
}

// ============================================================================
// Factory Function
// ============================================================================

/// 설정에 맞는 임베딩 프로바이더 생성
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let api_key = get_api_key(config.provider)?;

    let embedder: Arc<dyn EmbeddingProvider> = match config.provider {
        Provider::Gemini => Arc::new(GeminiEmbedding::with_options(
            api_key,
            config.model.clone(),
            config.dimension.unwrap_or(gemini::DEFAULT_DIMENSION),
        )?),
        Provider::OpenAi => Arc::new(OpenAiEmbedding::new(
            api_key,
            config.model.clone(),
            config.dimension,
        )?),
    };

    tracing::info!(
        "Using {} embedding (dimension: {})",
        embedder.name(),
        embedder.dimension()
    );
    Ok(embedder)
}

// ============================================================================
// Tests
// ============================================================================
