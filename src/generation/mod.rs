//! 텍스트 생성 모듈
//!
//! 검색된 컨텍스트와 질문으로 최종 답변을 만드는 LLM 프로바이더입니다.

mod gemini;
mod openai;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::{GenerationConfig, Provider};
use crate::embedding::get_api_key;

pub use gemini::GeminiGeneration;
pub use openai::OpenAiChat;

/// 생성 요청
#[derive(Debug, Clone)]
pub struct GenerationRequest<'a> {
    pub system_prompt: &'a str,
    pub user_prompt: &'a str,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// 텍스트 생성 프로바이더 트레이트
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// 프롬프트로 답변 생성
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String>;

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

/// 설정에 맞는 생성 프로바이더 생성
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn GenerationProvider>> {
    let api_key = get_api_key(config.provider)?;

    let generator: Arc<dyn GenerationProvider> = match config.provider {
        Provider::Gemini => Arc::new(GeminiGeneration::new(api_key, config.model.clone())?),
        Provider::OpenAi => Arc::new(OpenAiChat::new(api_key, config.model.clone())?),
    };

    tracing::info!("Using {} for answer generation", generator.name());
    Ok(generator)
}
