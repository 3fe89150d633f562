//! 질의 응답기 (Retriever)
//!
//! 질의 임베딩 -> 최근접 청크 검색 (실패 시 순위 없는 샘플) -> 컨텍스트 조립 -> 답변 생성.
//! 호출 간 상태는 없으며 저장소는 읽기만 합니다.

use std::sync::Arc;

use serde::Serialize;

use crate::config::RetrievalConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::RagError;
use crate::generation::{GenerationProvider, GenerationRequest};

use super::manifest::{EmbeddingManifest, ManifestFile};
use super::vector::{RetrievedChunk, VectorStore};

/// 컨텍스트가 없을 때의 고정 답변
pub const INSUFFICIENT_CONTEXT_ANSWER: &str = "I don't have enough context to answer your question accurately. Could you please provide more details or rephrase your question?";

/// 생성 모델 시스템 프롬프트
pub const SYSTEM_PROMPT: &str =
    "You are a helpful assistant that answers questions based on the provided context.";

// ============================================================================
// Types
// ============================================================================

/// 컨텍스트를 얻은 경로
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    /// 벡터 유사도 순위
    Ranked,
    /// 유사도 검색 실패/무결과로 순위 없는 샘플 사용 (관련도 보장 없음)
    Fallback,
}

/// 답변
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    /// 프롬프트에 사용된 청크 텍스트 (순위 순)
    pub context_used: Vec<String>,
    pub retrieval_mode: RetrievalMode,
}

// ============================================================================
// Retriever
// ============================================================================

/// 질의 응답기
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn GenerationProvider>,
    store: Arc<dyn VectorStore>,
    config: RetrievalConfig,
    manifest: ManifestFile,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn GenerationProvider>,
        store: Arc<dyn VectorStore>,
        config: RetrievalConfig,
        manifest: ManifestFile,
    ) -> Self {
        Self {
            embedder,
            generator,
            store,
            config,
            manifest,
        }
    }

    /// 질문에 답변
    ///
    /// 컨텍스트가 비어 있으면 생성 모델을 호출하지 않고 고정 답변을 반환합니다.
    pub async fn answer(&self, query: &str) -> Result<Answer, RagError> {
        tracing::info!("Answering query ({} chars)", query.chars().count());

        let (chunks, retrieval_mode) = self.retrieve(query).await?;
        let context_used: Vec<String> = chunks.into_iter().map(|c| c.text).collect();

        if context_used.is_empty() {
            tracing::info!("No context found; returning canned answer");
            return Ok(Answer {
                answer: INSUFFICIENT_CONTEXT_ANSWER.to_string(),
                context_used,
                retrieval_mode,
            });
        }

        let context = context_used.join(" ");
        let prompt = build_prompt(&context, query);

        let request = GenerationRequest {
            system_prompt: SYSTEM_PROMPT,
            user_prompt: &prompt,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let answer = self.generator.generate(&request).await.map_err(|e| {
            tracing::error!("Generation failed via {}: {:#}", self.generator.name(), e);
            RagError::Upstream(e)
        })?;

        tracing::info!(
            "Generated answer from {} context chunks ({:?})",
            context_used.len(),
            retrieval_mode
        );

        Ok(Answer {
            answer,
            context_used,
            retrieval_mode,
        })
    }

    /// 질의에 맞는 청크 검색
    ///
    /// 유사도 검색이 에러이거나 결과가 없으면 `sample_all`로 대체합니다.
    /// 저장된 벡터가 다른 임베딩 모델로 만들어졌으면 `RagError::Config`입니다.
    pub async fn retrieve(
        &self,
        query: &str,
    ) -> Result<(Vec<RetrievedChunk>, RetrievalMode), RagError> {
        self.ensure_same_embedding().await?;

        let query_embedding = self.embedder.embed(query).await.map_err(|e| {
            tracing::error!("Query embedding failed via {}: {:#}", self.embedder.name(), e);
            RagError::Upstream(e)
        })?;
        tracing::debug!("Query embedding of length {}", query_embedding.len());

        match self.store.count().await {
            Ok(n) => tracing::debug!("Store holds {} chunks", n),
            Err(e) => tracing::debug!("Could not count stored chunks: {:#}", e),
        }

        let k = self.config.top_k;
        match self
            .store
            .nearest_neighbors(&query_embedding, k, self.config.candidate_pool)
            .await
        {
            Ok(results) if !results.is_empty() => {
                tracing::debug!("Vector search returned {} results", results.len());
                return Ok((results, RetrievalMode::Ranked));
            }
            Ok(_) => tracing::warn!("Vector search returned no results; using unranked sample"),
            Err(e) => tracing::warn!("Vector search failed: {:#}; using unranked sample", e),
        }

        let sample = self.store.sample_all(k).await.map_err(|e| {
            tracing::error!("Fallback sample query failed: {:#}", e);
            RagError::Store(e)
        })?;
        tracing::debug!("Fallback sample returned {} results", sample.len());

        Ok((sample, RetrievalMode::Fallback))
    }

    /// 저장된 벡터의 모델/차원이 현재 임베딩 프로바이더와 같은지 확인
    async fn ensure_same_embedding(&self) -> Result<(), RagError> {
        let stored = match self.manifest.load().await.map_err(RagError::Store)? {
            Some(stored) => stored,
            None => return Ok(()),
        };

        let current = EmbeddingManifest::of(self.embedder.as_ref());
        if stored != current {
            tracing::error!("Embedding mismatch: stored {}, configured {}", stored, current);
            return Err(RagError::Config(format!(
                "stored chunks were embedded with {} but the configured embedder is {}; \
                 re-ingest the document or restore the previous embedding settings",
                stored, current
            )));
        }

        Ok(())
    }
}

/// 컨텍스트와 질문으로 사용자 프롬프트 생성
pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "Use your knowledge to answer the question in a conversational manner. \
         Please give a short and brief answer no longer than 3 sentences. \
         If your knowledge doesn't contain relevant information, let them know you don't know \
         the answer, or that it is out of your scope.\n\n\
         Your Knowledge: {}\n\n\
         Question: {}\n\n\
         Answer: ",
        context, question
    )
}

// ============================================================================
// Tests
// ============================================================================
